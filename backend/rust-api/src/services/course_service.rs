use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection, Database,
};

use super::{upsert_one, ServiceError, ServiceResult};
use crate::models::course::{CompleteLessonOutcome, Lesson, Progress, ProgressView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStep {
    Advance,
    AlreadyCompleted,
    Blocked,
}

/// Lessons are completed strictly in order; repeating an earlier one is a no-op.
pub fn lesson_step(lesson_index: i64, current_index: i64) -> LessonStep {
    match lesson_index.cmp(&current_index) {
        std::cmp::Ordering::Equal => LessonStep::Advance,
        std::cmp::Ordering::Less => LessonStep::AlreadyCompleted,
        std::cmp::Ordering::Greater => LessonStep::Blocked,
    }
}

pub struct CourseService {
    mongo: Database,
}

impl CourseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn lessons(&self) -> Collection<Lesson> {
        self.mongo.collection("lessons")
    }

    fn progress(&self) -> Collection<Progress> {
        self.mongo.collection("progress")
    }

    pub async fn list_progress(&self, student_id: &ObjectId) -> ServiceResult<Vec<ProgressView>> {
        let mut cursor = self
            .progress()
            .find(doc! { "student_id": student_id })
            .await?;

        let mut rows = Vec::new();
        while let Some(progress) = cursor.try_next().await? {
            rows.push(progress.into());
        }
        Ok(rows)
    }

    pub async fn complete_lesson(
        &self,
        student_id: &ObjectId,
        lesson_id: &ObjectId,
    ) -> ServiceResult<CompleteLessonOutcome> {
        let lesson = self
            .lessons()
            .find_one(doc! { "_id": lesson_id })
            .await?
            .ok_or_else(|| ServiceError::NotFound("Lesson not found".to_string()))?;

        let key = doc! { "student_id": student_id, "course_id": lesson.course_id };

        upsert_one(
            &self.progress(),
            key.clone(),
            doc! { "$setOnInsert": {
                "current_lesson_index": 1_i64,
                "completed_lessons_count": 0_i64,
            } },
        )
        .await?;

        let current = self
            .progress()
            .find_one(key.clone())
            .await?
            .ok_or_else(|| anyhow::anyhow!("Progress row missing after upsert"))?;

        match lesson_step(lesson.index, current.current_lesson_index) {
            LessonStep::Advance => {
                let mut filter = key;
                filter.insert("current_lesson_index", lesson.index);

                let advanced = self
                    .progress()
                    .find_one_and_update(
                        filter,
                        doc! { "$inc": {
                            "current_lesson_index": 1_i64,
                            "completed_lessons_count": 1_i64,
                        } },
                    )
                    .with_options(
                        FindOneAndUpdateOptions::builder()
                            .return_document(ReturnDocument::After)
                            .build(),
                    )
                    .await?;

                match advanced {
                    Some(progress) => {
                        tracing::info!(
                            student_id = %student_id,
                            course_id = %lesson.course_id,
                            lesson_index = lesson.index,
                            "Lesson completed"
                        );
                        Ok(CompleteLessonOutcome::Advanced(progress))
                    }
                    // A concurrent request advanced past this lesson first
                    None => Ok(CompleteLessonOutcome::AlreadyCompleted),
                }
            }
            LessonStep::AlreadyCompleted => Ok(CompleteLessonOutcome::AlreadyCompleted),
            LessonStep::Blocked => Err(ServiceError::Validation(
                "Please complete previous lessons first".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_lesson_advances() {
        assert_eq!(lesson_step(1, 1), LessonStep::Advance);
        assert_eq!(lesson_step(4, 4), LessonStep::Advance);
    }

    #[test]
    fn earlier_lesson_is_already_completed() {
        assert_eq!(lesson_step(2, 5), LessonStep::AlreadyCompleted);
    }

    #[test]
    fn skipping_ahead_is_blocked() {
        assert_eq!(lesson_step(3, 1), LessonStep::Blocked);
    }
}
