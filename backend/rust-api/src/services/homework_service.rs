use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Collection, Database,
};

use super::{
    begin_transaction, finish_transaction, wallet_service::WalletService, ServiceError,
    ServiceResult,
};
use crate::models::homework::{
    HomeworkStatus, HomeworkSubmission, HomeworkView, ReviewHomeworkRequest,
};
use crate::utils::time::chrono_to_bson;

const PENDING_LIMIT: i64 = 100;

/// Validates a review decision against the submission's current status.
pub fn check_review(current: HomeworkStatus, target: HomeworkStatus) -> ServiceResult<()> {
    if target == HomeworkStatus::Submitted {
        return Err(ServiceError::Validation(
            "status must be one of VIEWED, ACCEPTED, REJECTED".to_string(),
        ));
    }
    if current == HomeworkStatus::Accepted {
        return Err(ServiceError::Conflict(
            "Homework has already been accepted".to_string(),
        ));
    }
    Ok(())
}

/// Coins only move when the work is accepted.
pub fn payable_reward(target: HomeworkStatus, coins_reward: i64) -> i64 {
    if target == HomeworkStatus::Accepted {
        coins_reward.max(0)
    } else {
        0
    }
}

pub struct HomeworkService {
    mongo: Database,
}

impl HomeworkService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn submissions(&self) -> Collection<HomeworkSubmission> {
        self.mongo.collection("homework_submissions")
    }

    pub async fn submit(
        &self,
        student_id: &ObjectId,
        lesson_id: &ObjectId,
        file_url: &str,
    ) -> ServiceResult<HomeworkView> {
        let lesson_exists = self
            .mongo
            .collection::<mongodb::bson::Document>("lessons")
            .count_documents(doc! { "_id": lesson_id })
            .await?;
        if lesson_exists == 0 {
            return Err(ServiceError::NotFound("Lesson not found".to_string()));
        }

        let submission = HomeworkSubmission {
            id: ObjectId::new(),
            student_id: *student_id,
            lesson_id: *lesson_id,
            file_url: file_url.trim().to_string(),
            status: HomeworkStatus::Submitted,
            teacher_comment: String::new(),
            coins_reward: 0,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        self.submissions().insert_one(&submission).await?;

        tracing::info!(
            student_id = %student_id,
            submission_id = %submission.id,
            lesson_id = %lesson_id,
            "Homework submitted"
        );
        Ok(submission.into())
    }

    pub async fn list_mine(&self, student_id: &ObjectId) -> ServiceResult<Vec<HomeworkView>> {
        self.collect(
            doc! { "student_id": student_id },
            FindOptions::builder().sort(doc! { "createdAt": -1 }).build(),
        )
        .await
    }

    /// Review queue, oldest first.
    pub async fn list_pending(&self) -> ServiceResult<Vec<HomeworkView>> {
        self.collect(
            doc! { "status": { "$in": [
                HomeworkStatus::Submitted.as_str(),
                HomeworkStatus::Viewed.as_str(),
            ] } },
            FindOptions::builder()
                .sort(doc! { "createdAt": 1 })
                .limit(PENDING_LIMIT)
                .build(),
        )
        .await
    }

    async fn collect(
        &self,
        filter: mongodb::bson::Document,
        options: FindOptions,
    ) -> ServiceResult<Vec<HomeworkView>> {
        let mut cursor = self.submissions().find(filter).with_options(options).await?;
        let mut rows = Vec::new();
        while let Some(submission) = cursor.try_next().await? {
            rows.push(submission.into());
        }
        Ok(rows)
    }

    /// Records a review. Accepting pays the reward in the same transaction as
    /// the status change; the status guard keeps it from being paid twice.
    pub async fn review(
        &self,
        reviewer_id: &ObjectId,
        submission_id: &ObjectId,
        req: &ReviewHomeworkRequest,
    ) -> ServiceResult<HomeworkView> {
        let existing = self
            .submissions()
            .find_one(doc! { "_id": submission_id })
            .await?
            .ok_or_else(|| ServiceError::NotFound("Homework submission not found".to_string()))?;
        check_review(existing.status, req.status)?;

        let reward = payable_reward(req.status, req.coins_reward);
        let wallet = WalletService::new(self.mongo.clone());

        let mut session = begin_transaction(&self.mongo).await?;
        let result: ServiceResult<HomeworkSubmission> = async {
            let updated = self
                .submissions()
                .find_one_and_update(
                    doc! {
                        "_id": submission_id,
                        "status": { "$ne": HomeworkStatus::Accepted.as_str() },
                    },
                    doc! { "$set": {
                        "status": req.status.as_str(),
                        "teacher_comment": req.teacher_comment.trim(),
                        "coins_reward": reward,
                        "reviewed_by": reviewer_id,
                        "reviewedAt": chrono_to_bson(Utc::now()),
                    } },
                )
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .session(&mut session)
                .await?
                .ok_or_else(|| {
                    ServiceError::Conflict("Homework has already been accepted".to_string())
                })?;

            if reward > 0 {
                wallet
                    .credit(&mut session, &updated.student_id, reward, 0, "homework")
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Student not found".to_string()))?;
            }

            Ok(updated)
        }
        .await;
        let updated = finish_transaction(&mut session, result).await?;

        tracing::info!(
            submission_id = %submission_id,
            reviewer_id = %reviewer_id,
            status = updated.status.as_str(),
            reward,
            "Homework reviewed"
        );
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_homework_is_final() {
        let err = check_review(HomeworkStatus::Accepted, HomeworkStatus::Rejected).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn cannot_move_back_to_submitted() {
        let err = check_review(HomeworkStatus::Viewed, HomeworkStatus::Submitted).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn rejected_homework_can_be_reviewed_again() {
        assert!(check_review(HomeworkStatus::Rejected, HomeworkStatus::Accepted).is_ok());
        assert!(check_review(HomeworkStatus::Submitted, HomeworkStatus::Viewed).is_ok());
    }

    #[test]
    fn only_acceptance_pays() {
        assert_eq!(payable_reward(HomeworkStatus::Accepted, 25), 25);
        assert_eq!(payable_reward(HomeworkStatus::Rejected, 25), 0);
        assert_eq!(payable_reward(HomeworkStatus::Viewed, 25), 0);
    }
}
