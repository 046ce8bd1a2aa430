use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::season::SeasonSummary;

/// Per-student aggregate of one season's attempts, as returned by the `$group` stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentTotals {
    #[serde(rename = "_id")]
    pub student_id: ObjectId,
    pub total_score: f64,
    pub attempts_count: i64,
    pub best_wpm: f64,
    #[serde(default)]
    pub first_attempt_at: Option<mongodb::bson::DateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub rank: u32,
    pub student_id: ObjectId,
    pub total_score: f64,
    pub attempts_count: i64,
    pub best_wpm: f64,
    pub reward: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub total_score: f64,
    pub attempts_count: i64,
    pub best_wpm: f64,
    pub potential_reward: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub season: Option<SeasonSummary>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub current_user_rank: Option<u32>,
    pub generated_at: DateTime<Utc>,
}
