use anyhow::Context;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, to_bson},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use super::{
    begin_transaction, finish_transaction,
    leaderboard_service::{assign_standings, LeaderboardService},
    season_service::{summarize, SeasonService},
    wallet_service::WalletService,
    AppState, ServiceError, ServiceResult,
};
use crate::config::SeasonSettings;
use crate::metrics::SEASON_REWARDS_DISBURSED_TOTAL;
use crate::models::{
    leaderboard::Standing,
    season::{
        CloseTrigger, Disbursement, DisbursementView, EndSeasonResponse, RewardTable,
        RotationReport, Season, SeasonClosure,
    },
};
use crate::utils::time::chrono_to_bson;

/// Ranks that receive a season reward.
pub const PODIUM_SIZE: usize = 3;

const ROTATION_LOCK_KEY: &str = "season:rotation:lock";

const RELEASE_LOCK_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPlan {
    /// An unexpired season is running; nothing to do.
    Idle,
    /// No season exists or all were closed earlier; open one.
    OpenFirst,
    /// Close this many expired seasons, then open the next one if none stays active.
    CloseExpired(usize),
}

pub fn plan_rotation(expired: usize, has_active: bool) -> RotationPlan {
    match (expired, has_active) {
        (0, true) => RotationPlan::Idle,
        (0, false) => RotationPlan::OpenFirst,
        (n, _) => RotationPlan::CloseExpired(n),
    }
}

/// Top ranks that get paid; everyone below the podium receives nothing.
pub fn podium(standings: Vec<Standing>) -> Vec<Standing> {
    standings.into_iter().take(PODIUM_SIZE).collect()
}

/// Closes seasons and pays out their rewards. Runs are serialized through a
/// Redis lock, and each season is claimed with a conditional update before any
/// coins move, so a season is never paid out twice.
pub struct RotationService {
    mongo: Database,
    redis: ConnectionManager,
    settings: SeasonSettings,
}

impl RotationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            mongo: state.mongo.clone(),
            redis: state.redis.clone(),
            settings: state.config.season.clone(),
        }
    }

    fn seasons(&self) -> SeasonService {
        SeasonService::new(self.mongo.clone(), self.settings.clone())
    }

    fn default_rewards(&self) -> RewardTable {
        RewardTable(self.settings.default_rewards.clone())
    }

    pub async fn rotate(&self, now: DateTime<Utc>) -> ServiceResult<RotationReport> {
        let token = self.acquire_lock().await?;
        let result = self.rotate_locked(now).await;
        self.release_lock(&token).await;
        result
    }

    /// Admin action: closes the active season early and opens the next one.
    pub async fn end_active_season(&self, now: DateTime<Utc>) -> ServiceResult<EndSeasonResponse> {
        let token = self.acquire_lock().await?;
        let result = self.end_active_locked(now).await;
        self.release_lock(&token).await;
        result
    }

    async fn rotate_locked(&self, now: DateTime<Utc>) -> ServiceResult<RotationReport> {
        let seasons = self.seasons();
        let today = now.date_naive();
        let expired = seasons.find_expired_active(today).await?;
        let has_active = seasons.find_active().await?.is_some();
        let mut report = RotationReport::default();

        match plan_rotation(expired.len(), has_active) {
            RotationPlan::Idle => {
                tracing::info!("No expired seasons found; active season continues");
                return Ok(report);
            }
            RotationPlan::OpenFirst => {
                tracing::info!("No active season found; creating one");
            }
            RotationPlan::CloseExpired(count) => {
                tracing::info!(count, "Closing expired seasons");
                for season in &expired {
                    match self.close_season(season, CloseTrigger::Expired, now).await {
                        Ok(closure) => report.closed.push(closure),
                        Err(ServiceError::Conflict(reason)) => {
                            tracing::warn!(season_id = %season.id, %reason, "Skipping season");
                            report.skipped.push(season.id.to_hex());
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        if seasons.count_active().await? == 0 {
            let created = seasons.create_next(today).await?;
            report.created = Some(summarize(&created, &self.default_rewards(), now));
        }

        Ok(report)
    }

    async fn end_active_locked(&self, now: DateTime<Utc>) -> ServiceResult<EndSeasonResponse> {
        let seasons = self.seasons();
        let active = seasons
            .find_active()
            .await?
            .ok_or_else(|| ServiceError::NotFound("No active season".to_string()))?;

        let closed = self.close_season(&active, CloseTrigger::Manual, now).await?;

        let next = match seasons.find_active().await? {
            Some(season) => season,
            None => seasons.create_next(now.date_naive()).await?,
        };

        Ok(EndSeasonResponse {
            closed,
            next_season: summarize(&next, &self.default_rewards(), now),
        })
    }

    async fn close_season(
        &self,
        season: &Season,
        trigger: CloseTrigger,
        now: DateTime<Utc>,
    ) -> ServiceResult<SeasonClosure> {
        tracing::info!(season_id = %season.id, title = %season.title, ?trigger, "Processing season");

        let rewards = season.rewards.or_default_table(&self.settings.default_rewards);
        let seasons = self.seasons().collection();
        let wallet = WalletService::new(self.mongo.clone());
        let leaderboard = LeaderboardService::new(self.mongo.clone());

        let mut session = begin_transaction(&self.mongo).await?;
        let result: ServiceResult<Vec<Disbursement>> = async {
            // Claiming flips the processed marker; a second claim matches nothing
            let claimed = seasons
                .find_one_and_update(
                    doc! { "_id": season.id, "is_completed": false },
                    doc! { "$set": {
                        "is_active": false,
                        "is_completed": true,
                        "completedAt": chrono_to_bson(now),
                    } },
                )
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .session(&mut session)
                .await?;
            if claimed.is_none() {
                return Err(ServiceError::Conflict(format!(
                    "Season \"{}\" was already completed",
                    season.title
                )));
            }

            let totals = leaderboard
                .season_totals(&season.id, PODIUM_SIZE as i64)
                .await?;
            let mut disbursements = Vec::new();
            for standing in podium(assign_standings(totals, &rewards)) {
                let credited = wallet
                    .credit(
                        &mut session,
                        &standing.student_id,
                        standing.reward,
                        standing.reward,
                        "season_reward",
                    )
                    .await?;
                let Some(user) = credited else {
                    tracing::warn!(
                        student_id = %standing.student_id,
                        rank = standing.rank,
                        "Skipping reward for unknown student"
                    );
                    continue;
                };

                tracing::info!(
                    rank = standing.rank,
                    username = %user.username,
                    total_score = standing.total_score,
                    reward = standing.reward,
                    "Awarded season reward"
                );
                disbursements.push(Disbursement {
                    rank: standing.rank,
                    user_id: standing.student_id,
                    username: Some(user.username),
                    total_score: standing.total_score,
                    reward: standing.reward,
                });
            }

            let summary =
                to_bson(&disbursements).context("Failed to encode season disbursements")?;
            seasons
                .update_one(
                    doc! { "_id": season.id },
                    doc! { "$set": { "disbursements": summary } },
                )
                .session(&mut session)
                .await?;

            Ok(disbursements)
        }
        .await;
        let disbursements = finish_transaction(&mut session, result).await?;

        let paid = disbursements.iter().filter(|d| d.reward > 0).count();
        SEASON_REWARDS_DISBURSED_TOTAL.inc_by(paid as u64);
        let total_awarded: i64 = disbursements.iter().map(|d| d.reward).sum();
        tracing::info!(
            season_id = %season.id,
            title = %season.title,
            total_awarded,
            "Season completed"
        );

        Ok(SeasonClosure {
            season_id: season.id.to_hex(),
            title: season.title.clone(),
            trigger,
            disbursements: disbursements.iter().map(DisbursementView::from).collect(),
            total_awarded,
        })
    }

    async fn acquire_lock(&self) -> ServiceResult<String> {
        let mut conn = self.redis.clone();
        let token = Uuid::new_v4().to_string();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(ROTATION_LOCK_KEY)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(self.settings.lock_ttl_secs)
            .query_async(&mut conn)
            .await?;

        match acquired {
            Some(_) => Ok(token),
            None => Err(ServiceError::Locked("Season rotation".to_string())),
        }
    }

    async fn release_lock(&self, token: &str) {
        let mut conn = self.redis.clone();
        let released: Result<i32, redis::RedisError> = redis::Script::new(RELEASE_LOCK_SCRIPT)
            .key(ROTATION_LOCK_KEY)
            .arg(token)
            .invoke_async(&mut conn)
            .await;

        match released {
            Ok(1) => tracing::debug!("Season rotation lock released"),
            Ok(_) => tracing::warn!("Season rotation lock expired before release"),
            Err(err) => tracing::error!(error = %err, "Failed to release season rotation lock"),
        }
    }
}
