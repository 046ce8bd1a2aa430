use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    metrics::SEASON_ROTATIONS_TOTAL,
    models::season::RotationReport,
    services::{rotation_service::RotationService, AppState, ServiceError, ServiceResult},
};

/// Outcome label for the rotation counter.
pub fn rotation_status(report: &RotationReport) -> &'static str {
    match (report.closed.is_empty(), report.created.is_some()) {
        (false, _) => "closed",
        (true, true) => "created",
        (true, false) if !report.skipped.is_empty() => "skipped",
        (true, false) => "noop",
    }
}

pub struct SeasonWorker {
    rotation: RotationService,
    interval: Duration,
}

impl SeasonWorker {
    pub fn new(state: &AppState) -> Self {
        Self {
            rotation: RotationService::new(state),
            interval: Duration::from_secs(state.config.season.rotation_interval_secs.max(1)),
        }
    }

    pub async fn run(&self) {
        info!(
            "Starting season rotation loop (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            if let Err(err) = self.run_once().await {
                warn!(error = %err, "Season rotation tick failed");
            }
            sleep(self.interval).await;
        }
    }

    /// One rotation pass. A run that finds the lock held is counted as `locked`, not failed.
    pub async fn run_once(&self) -> ServiceResult<RotationReport> {
        match self.rotation.rotate(Utc::now()).await {
            Ok(report) => {
                let status = rotation_status(&report);
                SEASON_ROTATIONS_TOTAL.with_label_values(&[status]).inc();
                info!(
                    status,
                    closed = report.closed.len(),
                    skipped = report.skipped.len(),
                    created = report.created.is_some(),
                    "Season rotation finished"
                );
                Ok(report)
            }
            Err(ServiceError::Locked(what)) => {
                SEASON_ROTATIONS_TOTAL.with_label_values(&["locked"]).inc();
                info!("{} is already running elsewhere; skipping", what);
                Ok(RotationReport::default())
            }
            Err(err) => {
                SEASON_ROTATIONS_TOTAL.with_label_values(&["error"]).inc();
                Err(err)
            }
        }
    }
}
