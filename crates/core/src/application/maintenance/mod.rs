// Maintenance Service
// Scheduled pruning of finished jobs

use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{Maintenance, MaintenanceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Default maintenance cadence (hourly)
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);

/// Maintenance scheduler
///
/// Runs periodic job retention in the background
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    config: MaintenanceConfig,
    every: Duration,
}

impl MaintenanceScheduler {
    pub fn new(maintenance: Arc<dyn Maintenance>, config: MaintenanceConfig, every: Duration) -> Self {
        Self {
            maintenance,
            config,
            every,
        }
    }

    /// Run maintenance loop until `shutdown` is raised (spawn with tokio::spawn)
    ///
    /// The first pass runs immediately.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            every_secs = self.every.as_secs(),
            retention_days = self.config.completed_retention_days,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.every);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            match self.maintenance.run_full_maintenance(&self.config).await {
                Ok(stats) => {
                    info!(
                        db_size_mb = stats.db_size_mb(),
                        job_count = stats.job_count,
                        completed_jobs = stats.completed_job_count,
                        dead_lettered_jobs = stats.dead_lettered_job_count,
                        "Scheduled maintenance completed"
                    );
                }
                Err(e) => {
                    error!(error = ?e, "Scheduled maintenance failed");
                }
            }
        }
        info!("Maintenance scheduler stopped");
    }

    /// Run maintenance immediately (manual trigger)
    pub async fn run_now(&self) -> Result<()> {
        let stats = self.maintenance.run_full_maintenance(&self.config).await?;

        info!(
            db_size_mb = stats.db_size_mb(),
            job_count = stats.job_count,
            "Manual maintenance completed"
        );

        Ok(())
    }
}
