// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence (the durable queue)
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Update job
    async fn update(&self, job: &Job) -> Result<()>;

    /// Atomically claim the oldest due QUEUED job of a queue
    ///
    /// The returned job is already RUNNING with `attempts` incremented.
    /// A job is due once `run_at <= now`.
    async fn pop_next(&self, queue: &str) -> Result<Option<Job>>;

    /// Count jobs by state
    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64>;

    /// Find all jobs by state (recovery)
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory job repository with the same claim semantics as the SQLite one
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobId, Job>>,
        time_provider: Arc<dyn TimeProvider>,
    }

    impl InMemoryJobRepository {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                jobs: Mutex::new(HashMap::new()),
                time_provider,
            }
        }

        pub fn all(&self) -> Vec<Job> {
            let mut jobs: Vec<Job> = self.jobs.lock().unwrap().values().cloned().collect();
            jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            jobs
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Conflict(format!("Job {} already exists", job.id)));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn update(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&job.id) {
                Some(existing) => {
                    *existing = job.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("Job {}", job.id))),
            }
        }

        async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            let next_id = jobs
                .values()
                .filter(|j| j.queue == queue && j.state == JobState::Queued && j.run_at <= now)
                .min_by(|a, b| {
                    a.run_at
                        .cmp(&b.run_at)
                        .then(a.created_at.cmp(&b.created_at))
                        .then(a.id.cmp(&b.id))
                })
                .map(|j| j.id.clone());

            let Some(id) = next_id else {
                return Ok(None);
            };
            let job = jobs
                .get_mut(&id)
                .ok_or_else(|| AppError::Internal(format!("Job {} vanished", id)))?;
            job.start(now)?;
            Ok(Some(job.clone()))
        }

        async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.queue == queue && j.state == state)
                .count() as i64)
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            Ok(self
                .all()
                .into_iter()
                .filter(|j| j.state == state)
                .collect())
        }
    }
}
