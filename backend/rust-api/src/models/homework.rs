use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HomeworkStatus {
    Submitted,
    Viewed,
    Accepted,
    Rejected,
}

impl HomeworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HomeworkStatus::Submitted => "SUBMITTED",
            HomeworkStatus::Viewed => "VIEWED",
            HomeworkStatus::Accepted => "ACCEPTED",
            HomeworkStatus::Rejected => "REJECTED",
        }
    }
}

/// Homework submission stored in MongoDB "homework_submissions" collection.
/// The archive itself lives in external storage; only its URL is kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeworkSubmission {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student_id: ObjectId,
    pub lesson_id: ObjectId,
    pub file_url: String,
    pub status: HomeworkStatus,
    #[serde(default)]
    pub teacher_comment: String,
    #[serde(default)]
    pub coins_reward: i64,
    #[serde(default)]
    pub reviewed_by: Option<ObjectId>,
    #[serde(
        rename = "reviewedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeworkView {
    pub id: String,
    pub student_id: String,
    pub lesson_id: String,
    pub file_url: String,
    pub status: HomeworkStatus,
    pub teacher_comment: String,
    pub coins_reward: i64,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<HomeworkSubmission> for HomeworkView {
    fn from(s: HomeworkSubmission) -> Self {
        HomeworkView {
            id: s.id.to_hex(),
            student_id: s.student_id.to_hex(),
            lesson_id: s.lesson_id.to_hex(),
            file_url: s.file_url,
            status: s.status,
            teacher_comment: s.teacher_comment,
            coins_reward: s.coins_reward,
            reviewed_by: s.reviewed_by.map(|id| id.to_hex()),
            reviewed_at: s.reviewed_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitHomeworkRequest {
    pub lesson_id: String,
    #[validate(url(message = "file_url must be a valid URL"))]
    pub file_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewHomeworkRequest {
    pub status: HomeworkStatus,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub teacher_comment: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000, message = "coins_reward must be between 0 and 10000"))]
    pub coins_reward: i64,
}
