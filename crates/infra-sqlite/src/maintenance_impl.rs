// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use envprov_core::domain::JobState;
use envprov_core::error::Result;
use envprov_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn db_size_bytes(&self) -> Result<i64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(page_count * page_size)
    }

    async fn count_state(&self, state: JobState) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE state = ?")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        info!("Running VACUUM to optimize database...");

        let size_before = self.db_size_bytes().await?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let size_after = self.db_size_bytes().await?;
        let reclaimed = (size_before - size_after).max(0) as f64 / (1024.0 * 1024.0);

        info!(
            size_before_bytes = size_before,
            size_after_bytes = size_after,
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn prune_completed_jobs(&self, retention_days: i64, keep: i64) -> Result<i64> {
        let cutoff_time = self.time_provider.now_millis() - retention_days * DAY_MS;

        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state = ?1
            AND finished_at IS NOT NULL
            AND finished_at < ?2
            AND id NOT IN (
                SELECT id FROM jobs
                WHERE state = ?1
                ORDER BY finished_at DESC, id DESC
                LIMIT ?3
            )
            "#,
        )
        .bind(JobState::Completed.as_str())
        .bind(cutoff_time)
        .bind(keep.max(0))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected() as i64;
        info!(
            retention_days,
            keep,
            cutoff_time,
            deleted_jobs = deleted,
            "Pruned completed jobs"
        );
        Ok(deleted)
    }

    async fn prune_dead_lettered_jobs(&self, keep: i64) -> Result<i64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state = ?1
            AND id NOT IN (
                SELECT id FROM jobs
                WHERE state = ?1
                ORDER BY finished_at DESC, id DESC
                LIMIT ?2
            )
            "#,
        )
        .bind(JobState::DeadLettered.as_str())
        .bind(keep.max(0))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected() as i64;
        info!(keep, deleted_jobs = deleted, "Pruned dead-lettered jobs");
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.db_size_bytes().await?;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(MaintenanceStats {
            db_size_bytes,
            job_count,
            completed_job_count: self.count_state(JobState::Completed).await?,
            dead_lettered_job_count: self.count_state(JobState::DeadLettered).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobRepository};
    use envprov_core::domain::{Job, JobPayload};
    use envprov_core::port::time_provider::mocks::ManualClock;
    use envprov_core::port::JobRepository;
    use tokio_test::assert_ok;

    const NOW: i64 = 100 * DAY_MS;

    struct Fixture {
        jobs: SqliteJobRepository,
        maintenance: SqliteMaintenance,
    }

    async fn fixture() -> Fixture {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        Fixture {
            jobs: SqliteJobRepository::new(pool.clone(), clock.clone()),
            maintenance: SqliteMaintenance::new(pool, clock),
        }
    }

    async fn finished(jobs: &SqliteJobRepository, id: &str, state: JobState, finished_at: i64) {
        let mut job = Job::new(id, finished_at, "vm-provision", JobPayload::new(serde_json::json!({})));
        job.state = state;
        job.attempts = 1;
        job.finished_at = Some(finished_at);
        jobs.insert(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_on_empty_db() {
        let f = fixture().await;
        let stats = f.maintenance.get_stats().await.unwrap();

        assert!(stats.db_size_bytes > 0);
        assert_eq!(stats.job_count, 0);
        assert_eq!(stats.completed_job_count, 0);
        assert_eq!(stats.dead_lettered_job_count, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let f = fixture().await;
        let reclaimed = assert_ok!(f.maintenance.vacuum().await);
        assert!(reclaimed >= 0.0);
    }

    #[tokio::test]
    async fn test_prune_completed_respects_age_and_keep() {
        let f = fixture().await;
        // three old, one recent
        finished(&f.jobs, "old-1", JobState::Completed, NOW - 30 * DAY_MS).await;
        finished(&f.jobs, "old-2", JobState::Completed, NOW - 20 * DAY_MS).await;
        finished(&f.jobs, "old-3", JobState::Completed, NOW - 10 * DAY_MS).await;
        finished(&f.jobs, "recent", JobState::Completed, NOW - DAY_MS).await;
        finished(&f.jobs, "dead", JobState::DeadLettered, NOW - 30 * DAY_MS).await;

        // newest two are always kept, so only old-1 and old-2 go
        let deleted = f.maintenance.prune_completed_jobs(7, 2).await.unwrap();
        assert_eq!(deleted, 2);

        assert!(f.jobs.find_by_id(&"old-1".to_string()).await.unwrap().is_none());
        assert!(f.jobs.find_by_id(&"old-3".to_string()).await.unwrap().is_some());
        assert!(f.jobs.find_by_id(&"recent".to_string()).await.unwrap().is_some());
        assert!(f.jobs.find_by_id(&"dead".to_string()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prune_dead_lettered_keeps_newest() {
        let f = fixture().await;
        for i in 0..5 {
            finished(&f.jobs, &format!("dead-{}", i), JobState::DeadLettered, NOW - i * DAY_MS).await;
        }

        let deleted = f.maintenance.prune_dead_lettered_jobs(3).await.unwrap();
        assert_eq!(deleted, 2);

        let stats = f.maintenance.get_stats().await.unwrap();
        assert_eq!(stats.dead_lettered_job_count, 3);
        assert!(f.jobs.find_by_id(&"dead-0".to_string()).await.unwrap().is_some());
        assert!(f.jobs.find_by_id(&"dead-4".to_string()).await.unwrap().is_none());
    }
}
