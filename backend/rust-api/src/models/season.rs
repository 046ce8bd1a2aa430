use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::time::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Rank ("1", "2", ...) to reward amount. Ranks missing from the table earn nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardTable(pub BTreeMap<String, i64>);

impl RewardTable {
    pub fn amount_for_rank(&self, rank: u32) -> i64 {
        self.0.get(&rank.to_string()).copied().unwrap_or(0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stored table, or `fallback` when the season was saved without one.
    pub fn or_default_table(&self, fallback: &BTreeMap<String, i64>) -> RewardTable {
        if self.is_empty() {
            RewardTable(fallback.clone())
        } else {
            self.clone()
        }
    }
}

impl From<BTreeMap<String, i64>> for RewardTable {
    fn from(map: BTreeMap<String, i64>) -> Self {
        RewardTable(map)
    }
}

/// Season model stored in MongoDB "seasons" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    /// ISO dates; string comparison orders them chronologically
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub rewards: RewardTable,
    pub is_active: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disbursements: Vec<Disbursement>,
}

/// One paid-out season reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub rank: u32,
    pub user_id: ObjectId,
    #[serde(default)]
    pub username: Option<String>,
    pub total_score: f64,
    pub reward: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseTrigger {
    Expired,
    Manual,
}

#[derive(Debug, Serialize)]
pub struct SeasonSummary {
    pub id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rewards: RewardTable,
    pub is_active: bool,
    pub is_completed: bool,
    pub time_remaining_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct DisbursementView {
    pub rank: u32,
    pub user_id: String,
    pub username: Option<String>,
    pub total_score: f64,
    pub reward: i64,
}

impl From<&Disbursement> for DisbursementView {
    fn from(d: &Disbursement) -> Self {
        DisbursementView {
            rank: d.rank,
            user_id: d.user_id.to_hex(),
            username: d.username.clone(),
            total_score: d.total_score,
            reward: d.reward,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeasonClosure {
    pub season_id: String,
    pub title: String,
    pub trigger: CloseTrigger,
    pub disbursements: Vec<DisbursementView>,
    pub total_awarded: i64,
}

#[derive(Debug, Serialize)]
pub struct EndSeasonResponse {
    pub closed: SeasonClosure,
    pub next_season: SeasonSummary,
}

/// Outcome of one rotation run, also used as the admin "rotate" response.
#[derive(Debug, Default, Serialize)]
pub struct RotationReport {
    pub closed: Vec<SeasonClosure>,
    /// Seasons that were already processed or locked by a concurrent run
    pub skipped: Vec<String>,
    pub created: Option<SeasonSummary>,
}
