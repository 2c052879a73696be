// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use envprov_core::domain::{Job, JobId, JobPayload, JobState};
use envprov_core::error::{AppError, Result};
use envprov_core::port::{JobRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, payload, state,
                attempts, max_attempts, backoff_factor,
                created_at, run_at, started_at, finished_at, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(job.payload.as_value().to_string())
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.backoff_factor)
        .bind(job.created_at)
        .bind(job.run_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.last_error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(JobRow::into_job)
            .transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                state = ?, attempts = ?, run_at = ?,
                started_at = ?, finished_at = ?, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.run_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.last_error)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {}", job.id)));
        }
        Ok(())
    }

    async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
        // Single statement: select + claim cannot interleave with another worker
        let now = self.time_provider.now_millis();

        sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = ? AND run_at <= ?
                ORDER BY run_at ASC, created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Running.as_str())
        .bind(now)
        .bind(queue)
        .bind(JobState::Queued.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .map(JobRow::into_job)
        .transpose()
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
            .bind(queue)
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(JobRow::into_job)
        .collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    payload: String,
    state: String,
    attempts: i32,
    max_attempts: i32,
    backoff_factor: f64,
    created_at: i64,
    run_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    last_error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let state: JobState = self.state.parse()?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            payload: JobPayload::new(payload),
            state,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff_factor: self.backoff_factor,
            created_at: self.created_at,
            run_at: self.run_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            last_error: self.last_error,
        })
    }
}
