use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Lesson stored in MongoDB "lessons" collection. `index` is 1-based within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub course_id: ObjectId,
    pub index: i64,
    pub title: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Per-student course progress stored in MongoDB "progress" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: ObjectId,
    pub course_id: ObjectId,
    pub current_lesson_index: i64,
    pub completed_lessons_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressView {
    pub course_id: String,
    pub current_lesson_index: i64,
    pub completed_lessons_count: i64,
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        ProgressView {
            course_id: progress.course_id.to_hex(),
            current_lesson_index: progress.current_lesson_index,
            completed_lessons_count: progress.completed_lessons_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteLessonRequest {
    pub lesson_id: Option<String>,
}

#[derive(Debug)]
pub enum CompleteLessonOutcome {
    Advanced(Progress),
    AlreadyCompleted,
}
