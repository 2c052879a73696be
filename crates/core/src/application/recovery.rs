// Crash recovery logic
use crate::port::{JobRepository, TimeProvider};
use crate::domain::JobState;
use std::sync::Arc;
use tracing::{info, warn};

/// Crash recovery service
///
/// On startup, no worker of this process owns a RUNNING job yet, so every
/// RUNNING job was orphaned by a previous process and is put back in the queue.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(job_repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            job_repo,
            time_provider,
        }
    }

    /// Requeue orphaned RUNNING jobs
    ///
    /// The interrupted run already counted as an attempt; a job whose budget
    /// is spent is dead-lettered instead.
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let running_jobs = self.job_repo.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for mut job in running_jobs {
            if job.has_attempts_left() {
                info!(
                    job_id = %job.id,
                    queue = %job.queue,
                    attempts = job.attempts,
                    "Requeueing orphaned job"
                );
                job.requeue(now, "interrupted by daemon restart");
            } else {
                warn!(
                    job_id = %job.id,
                    queue = %job.queue,
                    attempts = job.attempts,
                    "Orphaned job has no attempts left, dead-lettering"
                );
                job.dead_letter(now, "interrupted by daemon restart");
            }
            self.job_repo.update(&job).await?;
            recovered_count += 1;
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}
