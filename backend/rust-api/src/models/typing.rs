use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::bson_datetime_as_chrono;

/// Typing attempt stored in MongoDB "typing_attempts" collection. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingAttempt {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student_id: ObjectId,
    /// Active season at submission time, if any
    pub season_id: Option<ObjectId>,
    pub wpm: f64,
    pub accuracy: f64,
    pub score: f64,
    #[serde(default)]
    pub coins_reward: i64,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTypingRequest {
    #[validate(range(min = 0.0, message = "wpm must be a non-negative number"))]
    pub wpm: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "accuracy must be between 0 and 100"))]
    pub accuracy: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TypingAttemptView {
    pub id: String,
    pub season_id: Option<String>,
    pub wpm: f64,
    pub accuracy: f64,
    pub score: f64,
    pub coins_reward: i64,
    pub created_at: DateTime<Utc>,
}

impl From<TypingAttempt> for TypingAttemptView {
    fn from(attempt: TypingAttempt) -> Self {
        TypingAttemptView {
            id: attempt.id.to_hex(),
            season_id: attempt.season_id.map(|id| id.to_hex()),
            wpm: attempt.wpm,
            accuracy: attempt.accuracy,
            score: attempt.score,
            coins_reward: attempt.coins_reward,
            created_at: attempt.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitTypingResponse {
    pub attempt: TypingAttemptView,
    pub coins_awarded: i64,
    pub new_balance: i64,
}
