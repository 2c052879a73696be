// Job queue maintenance port
use crate::error::Result;
use async_trait::async_trait;

/// Queue table statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceStats {
    pub db_size_bytes: i64,
    pub job_count: i64,
    pub completed_job_count: i64,
    pub dead_lettered_job_count: i64,
}

impl MaintenanceStats {
    pub fn db_size_mb(&self) -> f64 {
        self.db_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Retention rules for finished jobs
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Completed jobs older than this are removed (days)
    pub completed_retention_days: i64,

    /// Newest completed jobs always kept
    pub completed_keep: i64,

    /// Newest dead-lettered jobs kept; older ones are removed
    pub dead_lettered_keep: i64,

    /// DB size that triggers VACUUM (MB)
    pub max_db_size_mb: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            completed_retention_days: 7,
            completed_keep: 100,
            dead_lettered_keep: 1000,
            max_db_size_mb: 1000.0,
        }
    }
}

/// Database maintenance operations
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Run VACUUM; returns space reclaimed in MB
    async fn vacuum(&self) -> Result<f64>;

    /// Delete completed jobs finished more than `retention_days` ago,
    /// sparing the newest `keep`
    ///
    /// # Returns
    /// Number of jobs deleted
    async fn prune_completed_jobs(&self, retention_days: i64, keep: i64) -> Result<i64>;

    /// Delete all but the newest `keep` dead-lettered jobs
    async fn prune_dead_lettered_jobs(&self, keep: i64) -> Result<i64>;

    async fn get_stats(&self) -> Result<MaintenanceStats>;

    /// Prune both finished states, then VACUUM if the DB is large
    async fn run_full_maintenance(&self, config: &MaintenanceConfig) -> Result<MaintenanceStats> {
        let stats_before = self.get_stats().await?;

        let pruned_completed = self
            .prune_completed_jobs(config.completed_retention_days, config.completed_keep)
            .await?;
        let pruned_dead = self
            .prune_dead_lettered_jobs(config.dead_lettered_keep)
            .await?;

        let reclaimed_mb = if stats_before.db_size_mb() > config.max_db_size_mb {
            self.vacuum().await?
        } else {
            0.0
        };

        let stats_after = self.get_stats().await?;

        tracing::info!(
            pruned_completed,
            pruned_dead,
            reclaimed_mb,
            db_size_mb = stats_after.db_size_mb(),
            "Maintenance completed"
        );

        Ok(stats_after)
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records the prune calls it receives
    #[derive(Default)]
    pub struct RecordingMaintenance {
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Maintenance for RecordingMaintenance {
        async fn vacuum(&self) -> Result<f64> {
            self.calls.lock().unwrap().push("vacuum".to_string());
            Ok(0.0)
        }

        async fn prune_completed_jobs(&self, retention_days: i64, keep: i64) -> Result<i64> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("completed:{}:{}", retention_days, keep));
            Ok(0)
        }

        async fn prune_dead_lettered_jobs(&self, keep: i64) -> Result<i64> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("dead_lettered:{}", keep));
            Ok(0)
        }

        async fn get_stats(&self) -> Result<MaintenanceStats> {
            Ok(MaintenanceStats::default())
        }
    }
}
