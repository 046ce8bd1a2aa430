use anyhow::Context;
use tracing_subscriber::EnvFilter;

use eduverse_api::{
    config::Config,
    services::{season_worker::SeasonWorker, AppState},
};

/// One rotation pass: close expired seasons, pay their podiums, open the next season.
/// Meant for cron; takes no arguments.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "eduverse_api=info".into()),
        )
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).context("Failed to create Redis client")?;

    let app_state = AppState::new(config, mongo_client, redis_client)
        .await
        .context("Failed to initialize app state")?;

    let report = SeasonWorker::new(&app_state)
        .run_once()
        .await
        .context("Season rotation failed")?;

    for closure in &report.closed {
        tracing::info!(
            title = %closure.title,
            winners = closure.disbursements.len(),
            total_awarded = closure.total_awarded,
            "Closed season"
        );
    }
    if let Some(created) = &report.created {
        tracing::info!(title = %created.title, end = %created.end_date, "Opened season");
    }

    Ok(())
}
