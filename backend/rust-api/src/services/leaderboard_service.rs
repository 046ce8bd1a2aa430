use std::{cmp::Ordering, collections::HashMap};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    Database,
};

use super::{season_service, ServiceResult};
use crate::models::{
    leaderboard::{LeaderboardEntry, LeaderboardResponse, Standing, StudentTotals},
    season::{RewardTable, Season},
    user::User,
};

pub struct LeaderboardService {
    mongo: Database,
}

impl LeaderboardService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Sums each student's attempt scores for one season, best first. Ties keep
    /// the student who entered the season earliest ahead.
    pub async fn season_totals(
        &self,
        season_id: &ObjectId,
        limit: i64,
    ) -> ServiceResult<Vec<StudentTotals>> {
        let pipeline = vec![
            doc! { "$match": { "season_id": season_id } },
            doc! {
                "$group": {
                    "_id": "$student_id",
                    "total_score": { "$sum": "$score" },
                    "attempts_count": { "$sum": 1 },
                    "best_wpm": { "$max": "$wpm" },
                    "first_attempt_at": { "$min": "$createdAt" }
                }
            },
            // Sums of floats drift (0.1 + 0.2 != 0.3); compare at cent precision
            doc! { "$set": { "total_score": { "$round": ["$total_score", 2] } } },
            doc! { "$sort": { "total_score": -1, "first_attempt_at": 1, "_id": 1 } },
            doc! { "$limit": limit.max(1) },
        ];

        let mut cursor = self
            .mongo
            .collection::<Document>("typing_attempts")
            .aggregate(pipeline)
            .await?;

        let mut totals = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            let parsed: StudentTotals = mongodb::bson::from_document(row)
                .context("Malformed leaderboard aggregation row")?;
            totals.push(parsed);
        }
        Ok(totals)
    }

    pub async fn leaderboard(
        &self,
        active: Option<Season>,
        default_rewards: &RewardTable,
        viewer_id: &ObjectId,
        size: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<LeaderboardResponse> {
        let Some(season) = active else {
            return Ok(LeaderboardResponse {
                season: None,
                leaderboard: Vec::new(),
                current_user_rank: None,
                generated_at: now,
            });
        };

        let rewards = season.rewards.or_default_table(&default_rewards.0);
        let standings = assign_standings(self.season_totals(&season.id, size).await?, &rewards);
        let users = self.load_users(&standings).await?;

        let current_user_rank = standings
            .iter()
            .find(|standing| &standing.student_id == viewer_id)
            .map(|standing| standing.rank);

        let leaderboard = standings
            .into_iter()
            .map(|standing| {
                let user = users.get(&standing.student_id);
                LeaderboardEntry {
                    rank: standing.rank,
                    user_id: standing.student_id.to_hex(),
                    username: user
                        .map(|u| u.username.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    avatar_url: user.and_then(|u| u.avatar_url.clone()),
                    total_score: standing.total_score,
                    attempts_count: standing.attempts_count,
                    best_wpm: standing.best_wpm,
                    potential_reward: standing.reward,
                }
            })
            .collect();

        Ok(LeaderboardResponse {
            season: Some(season_service::summarize(&season, default_rewards, now)),
            leaderboard,
            current_user_rank,
            generated_at: now,
        })
    }

    async fn load_users(&self, standings: &[Standing]) -> ServiceResult<HashMap<ObjectId, User>> {
        if standings.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<ObjectId> = standings.iter().map(|s| s.student_id).collect();
        let mut cursor = self
            .mongo
            .collection::<User>("users")
            .find(doc! { "_id": { "$in": ids } })
            .await?;

        let mut users = HashMap::new();
        while let Some(user) = cursor.try_next().await? {
            users.insert(user.id, user);
        }
        Ok(users)
    }
}

/// Ranks aggregated totals 1..N and attaches the reward each rank would earn.
/// Totals are rounded to cents before sorting. The sort is stable, so equal
/// totals keep their incoming order.
pub fn assign_standings(mut totals: Vec<StudentTotals>, rewards: &RewardTable) -> Vec<Standing> {
    for row in totals.iter_mut() {
        row.total_score = round2(row.total_score);
    }
    totals.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
    });

    totals
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let rank = idx as u32 + 1;
            Standing {
                rank,
                student_id: row.student_id,
                total_score: row.total_score,
                attempts_count: row.attempts_count,
                best_wpm: row.best_wpm,
                reward: rewards.amount_for_rank(rank),
            }
        })
        .collect()
}

/// Same ties-to-even rounding as Mongo's `$round`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
