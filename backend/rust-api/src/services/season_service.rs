use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneOptions, FindOptions},
    Collection, Database,
};

use super::ServiceResult;
use crate::config::SeasonSettings;
use crate::models::season::{RewardTable, Season, SeasonSummary};
use crate::utils::time::end_of_day;

pub struct SeasonService {
    mongo: Database,
    settings: SeasonSettings,
}

impl SeasonService {
    pub fn new(mongo: Database, settings: SeasonSettings) -> Self {
        Self { mongo, settings }
    }

    pub fn collection(&self) -> Collection<Season> {
        self.mongo.collection("seasons")
    }

    pub fn default_rewards(&self) -> RewardTable {
        RewardTable(self.settings.default_rewards.clone())
    }

    /// The current season is whichever active season started first; uniqueness is
    /// maintained by the rotation job rather than a database constraint.
    pub async fn find_active(&self) -> ServiceResult<Option<Season>> {
        let options = FindOneOptions::builder()
            .sort(doc! { "start_date": 1, "createdAt": 1 })
            .build();
        Ok(self
            .collection()
            .find_one(doc! { "is_active": true })
            .with_options(options)
            .await?)
    }

    /// Active seasons whose last day is before `today`.
    pub async fn find_expired_active(&self, today: NaiveDate) -> ServiceResult<Vec<Season>> {
        let options = FindOptions::builder()
            .sort(doc! { "end_date": 1, "createdAt": 1 })
            .build();
        let mut cursor = self
            .collection()
            .find(expired_active_filter(today))
            .with_options(options)
            .await?;

        let mut seasons = Vec::new();
        while let Some(season) = cursor.try_next().await? {
            seasons.push(season);
        }
        Ok(seasons)
    }

    pub async fn count_active(&self) -> ServiceResult<u64> {
        Ok(self
            .collection()
            .count_documents(doc! { "is_active": true })
            .await?)
    }

    /// Opens a new season starting `today` with the configured duration and reward table.
    pub async fn create_next(&self, today: NaiveDate) -> ServiceResult<Season> {
        let latest = self
            .collection()
            .find_one(doc! {})
            .with_options(
                FindOneOptions::builder()
                    .sort(doc! { "createdAt": -1, "_id": -1 })
                    .build(),
            )
            .await?;
        let count = self.collection().count_documents(doc! {}).await?;

        let title = next_season_title(
            &self.settings.title_prefix,
            latest.as_ref().map(|s| s.title.as_str()),
            count,
        );
        let season = new_season(title, today, &self.settings, Utc::now());

        self.collection().insert_one(&season).await?;

        tracing::info!(
            season_id = %season.id,
            title = %season.title,
            start = %season.start_date,
            end = %season.end_date,
            "Created new season"
        );
        Ok(season)
    }
}

pub fn new_season(
    title: String,
    start_date: NaiveDate,
    settings: &SeasonSettings,
    now: DateTime<Utc>,
) -> Season {
    let end_date = start_date
        .checked_add_days(Days::new(settings.duration_days.max(1) as u64))
        .unwrap_or(start_date);

    Season {
        id: ObjectId::new(),
        title,
        start_date,
        end_date,
        rewards: RewardTable(settings.default_rewards.clone()),
        is_active: true,
        is_completed: false,
        created_at: now,
        completed_at: None,
        disbursements: Vec::new(),
    }
}

/// "Season 4" follows "Season 3"; titles without a trailing number fall back to count + 1.
pub fn next_season_title(prefix: &str, last_title: Option<&str>, existing: u64) -> String {
    let number = last_title
        .and_then(|title| title.split_whitespace().last())
        .and_then(|token| token.parse::<u64>().ok())
        .map(|n| n + 1)
        .unwrap_or(existing + 1);
    format!("{} {}", prefix, number)
}

/// Seconds until the end of the season's last day, 0 once it has passed.
pub fn time_remaining(season: &Season, now: DateTime<Utc>) -> i64 {
    let end = end_of_day(season.end_date);
    if now > end {
        0
    } else {
        (end - now).num_seconds()
    }
}

/// `end_date` is inclusive: a season ending today is still running.
pub fn expired_active_filter(today: NaiveDate) -> Document {
    doc! {
        "is_active": true,
        "end_date": { "$lt": today.to_string() }
    }
}

pub fn summarize(
    season: &Season,
    fallback_rewards: &RewardTable,
    now: DateTime<Utc>,
) -> SeasonSummary {
    SeasonSummary {
        id: season.id.to_hex(),
        title: season.title.clone(),
        start_date: season.start_date,
        end_date: season.end_date,
        rewards: season.rewards.or_default_table(&fallback_rewards.0),
        is_active: season.is_active,
        is_completed: season.is_completed,
        time_remaining_seconds: if season.is_active {
            time_remaining(season, now)
        } else {
            0
        },
    }
}
