use crate::config::Config;
use anyhow::Context;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, UpdateOptions},
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        ensure_indexes(&mongo).await?;

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

/// Unique keys behind the attendance and progress upserts, plus the
/// leaderboard aggregation index. Idempotent.
pub async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    let unique = |name: &str| {
        IndexOptions::builder()
            .unique(true)
            .name(name.to_string())
            .build()
    };

    mongo
        .collection::<Document>("attendance")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "student_id": 1, "group_id": 1, "date": 1 })
                .options(unique("attendance_student_group_date"))
                .build(),
        )
        .await
        .context("Failed to create attendance index")?;

    mongo
        .collection::<Document>("progress")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "student_id": 1, "course_id": 1 })
                .options(unique("progress_student_course"))
                .build(),
        )
        .await
        .context("Failed to create progress index")?;

    mongo
        .collection::<Document>("typing_attempts")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "season_id": 1, "student_id": 1 })
                .build(),
        )
        .await
        .context("Failed to create typing attempts index")?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

/// E11000: the write hit a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref we)) => we.code == 11000,
        ErrorKind::Command(ref ce) => ce.code == 11000,
        _ => false,
    }
}

/// Upserts one document. Two concurrent upserts on the same unique key can both
/// try to insert; the loser gets a duplicate key error and is retried once, which
/// then matches the winner's document.
pub async fn upsert_one<T: Send + Sync>(
    collection: &Collection<T>,
    filter: Document,
    update: Document,
) -> ServiceResult<()> {
    let options = UpdateOptions::builder().upsert(true).build();
    match collection
        .update_one(filter.clone(), update.clone())
        .with_options(options.clone())
        .await
    {
        Err(err) if is_duplicate_key(&err) => {
            tracing::debug!(collection = collection.name(), "Upsert lost a unique key race; retrying");
            collection
                .update_one(filter, update)
                .with_options(options)
                .await?;
        }
        other => {
            other?;
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Not enough coins")]
    InsufficientFunds { balance: i64, price: i64 },
    #[error("Out of stock")]
    OutOfStock,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} is being processed by another worker")]
    Locked(String),
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub fn parse_object_id(value: &str, field: &str) -> ServiceResult<ObjectId> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| ServiceError::Validation(format!("Invalid {}: must be ObjectId", field)))
}

/// Starts a client session with an open transaction. Requires a replica set deployment.
pub async fn begin_transaction(mongo: &Database) -> ServiceResult<ClientSession> {
    let mut session = mongo.client().start_session().await?;
    session.start_transaction().await?;
    Ok(session)
}

/// Commits on success, aborts on failure; the original error wins over an abort failure.
pub async fn finish_transaction<T>(
    session: &mut ClientSession,
    result: ServiceResult<T>,
) -> ServiceResult<T> {
    match result {
        Ok(value) => {
            session.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                tracing::warn!(error = %abort_err, "Failed to abort transaction");
            }
            Err(err)
        }
    }
}

pub mod attendance_service;
pub mod course_service;
pub mod homework_service;
pub mod leaderboard_service;
pub mod rotation_service;
pub mod season_service;
pub mod season_worker;
pub mod shop_service;
pub mod typing_service;
pub mod wallet_service;
