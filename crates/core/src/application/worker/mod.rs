// Worker - Job execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::Job;
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Business logic bound to one queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process one job; an error consumes one attempt
    async fn handle(&self, job: &Job) -> Result<()>;
}

/// Job lifecycle notification (logging/metrics only)
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Completed {
        job_id: String,
        queue: String,
        attempts: i32,
    },
    Failed {
        job_id: String,
        queue: String,
        attempts: i32,
        error: String,
        dead_lettered: bool,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Completed { job_id, .. } | JobEvent::Failed { job_id, .. } => job_id,
        }
    }
}

/// One worker slot: claims jobs of a single queue and runs them to completion
pub struct Worker {
    queue: String,
    slot: usize,
    job_repo: Arc<dyn JobRepository>,
    handler: Arc<dyn JobHandler>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>,
    events: broadcast::Sender<JobEvent>,
}

impl Worker {
    pub fn new(
        queue: impl Into<String>,
        slot: usize,
        job_repo: Arc<dyn JobRepository>,
        handler: Arc<dyn JobHandler>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
        events: broadcast::Sender<JobEvent>,
    ) -> Self {
        Self {
            queue: queue.into(),
            slot,
            job_repo,
            handler,
            retry_policy,
            time_provider,
            events,
        }
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// Shutdown is only observed between jobs; an in-flight job always finishes.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(queue = %self.queue, slot = self.slot, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, slot = self.slot, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
            }
        }
        info!(queue = %self.queue, slot = self.slot, "Worker stopped");
        Ok(())
    }

    /// Process next due job from the queue (returns true if a job was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Already RUNNING in the repository, attempt counted
        let job = match self.job_repo.pop_next(&self.queue).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        info!(
            job_id = %job.id,
            queue = %job.queue,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        // Spawned so a panicking handler cannot take the worker down
        let job_arc = Arc::new(job);
        let job_for_exec = Arc::clone(&job_arc);
        let handler = Arc::clone(&self.handler);
        let handle = tokio::task::spawn(async move { handler.handle(&job_for_exec).await });
        let execution_result = handle.await;

        let mut job = Arc::try_unwrap(job_arc).unwrap_or_else(|arc| (*arc).clone());
        let now = self.time_provider.now_millis();

        match execution_result {
            Ok(Ok(())) => {
                job.complete(now)?;
                self.job_repo.update(&job).await?;
                info!(job_id = %job.id, queue = %job.queue, "Job completed");
                self.publish(JobEvent::Completed {
                    job_id: job.id.clone(),
                    queue: job.queue.clone(),
                    attempts: job.attempts,
                });
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                let decision = self.retry_policy.apply_failure(&mut job, &message);
                self.job_repo.update(&job).await?;
                let dead_lettered = decision == RetryDecision::DeadLetter;
                if dead_lettered {
                    error!(
                        job_id = %job.id,
                        queue = %job.queue,
                        attempts = job.attempts,
                        error = %message,
                        "Job dead-lettered after max retries"
                    );
                } else {
                    warn!(
                        job_id = %job.id,
                        queue = %job.queue,
                        attempts = job.attempts,
                        run_at = job.run_at,
                        error = %message,
                        "Job failed, retry scheduled"
                    );
                }
                self.publish(JobEvent::Failed {
                    job_id: job.id.clone(),
                    queue: job.queue.clone(),
                    attempts: job.attempts,
                    error: message,
                    dead_lettered,
                });
            }
            Err(join_err) => {
                // Panics are not retried
                let message = if join_err.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler cancelled".to_string()
                };
                error!(job_id = %job.id, queue = %job.queue, error = ?join_err, "Job aborted");
                job.dead_letter(now, &message);
                self.job_repo.update(&job).await?;
                self.publish(JobEvent::Failed {
                    job_id: job.id.clone(),
                    queue: job.queue.clone(),
                    attempts: job.attempts,
                    error: message,
                    dead_lettered: true,
                });
            }
        }
        Ok(true)
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobPayload, JobState};
    use crate::error::AppError;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Succeed,
        Fail,
        Panic,
    }

    struct TestHandler {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl TestHandler {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JobHandler for TestHandler {
        async fn handle(&self, _job: &Job) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(AppError::ProviderApi("Contabo API error: 503".to_string())),
                Behavior::Panic => panic!("handler exploded"),
            }
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        repo: Arc<InMemoryJobRepository>,
        events: broadcast::Receiver<JobEvent>,
        worker: Worker,
    }

    async fn fixture(handler: Arc<TestHandler>) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let (tx, rx) = broadcast::channel(16);
        let policy = Arc::new(RetryPolicy::new(clock.clone(), 2000));
        let worker = Worker::new(
            "vm-provision",
            0,
            repo.clone(),
            handler,
            policy,
            clock.clone(),
            tx,
        );
        let job = Job::new("job-1", 1_000, "vm-provision", JobPayload::new(serde_json::json!({})));
        repo.insert(&job).await.unwrap();
        Fixture {
            clock,
            repo,
            events: rx,
            worker,
        }
    }

    async fn stored(repo: &InMemoryJobRepository) -> Job {
        repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_success_completes_job() {
        let handler = TestHandler::new(Behavior::Succeed);
        let mut fx = fixture(handler.clone()).await;

        assert!(fx.worker.process_next_job().await.unwrap());
        assert!(!fx.worker.process_next_job().await.unwrap());

        let job = stored(&fx.repo).await;
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.attempts, 1);
        assert!(matches!(fx.events.try_recv().unwrap(), JobEvent::Completed { .. }));
    }

    #[tokio::test]
    async fn test_failure_backs_off_then_dead_letters() {
        let handler = TestHandler::new(Behavior::Fail);
        let mut fx = fixture(handler.clone()).await;

        assert!(fx.worker.process_next_job().await.unwrap());
        let job = stored(&fx.repo).await;
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.run_at, 3_000);

        // not due yet
        assert!(!fx.worker.process_next_job().await.unwrap());

        fx.clock.set(3_000);
        assert!(fx.worker.process_next_job().await.unwrap());
        assert_eq!(stored(&fx.repo).await.run_at, 7_000);

        fx.clock.set(7_000);
        assert!(fx.worker.process_next_job().await.unwrap());
        let job = stored(&fx.repo).await;
        assert_eq!(job.state, JobState::DeadLettered);
        assert_eq!(job.attempts, 3);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        let mut last = None;
        while let Ok(event) = fx.events.try_recv() {
            last = Some(event);
        }
        match last.unwrap() {
            JobEvent::Failed { dead_lettered, error, .. } => {
                assert!(dead_lettered);
                assert!(error.contains("503"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_is_isolated_and_dead_letters() {
        let handler = TestHandler::new(Behavior::Panic);
        let fx = fixture(handler).await;

        assert!(fx.worker.process_next_job().await.unwrap());
        let job = stored(&fx.repo).await;
        assert_eq!(job.state, JobState::DeadLettered);
        assert_eq!(job.last_error.as_deref(), Some("handler panicked"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let handler = TestHandler::new(Behavior::Succeed);
        let fx = fixture(handler.clone()).await;
        let (tx, token) = shutdown_channel();

        let worker = Arc::new(fx.worker);
        let running = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run(token).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.shutdown();
        running.await.unwrap().unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stored(&fx.repo).await.state, JobState::Completed);
    }
}
