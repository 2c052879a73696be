// Job Queue - durable per-queue dispatcher with worker pools

use crate::application::recovery::RecoveryService;
use crate::application::retry::{RetryPolicy, DEFAULT_RETRY_BASE_DELAY_MS};
use crate::application::worker::constants::EVENT_CHANNEL_CAPACITY;
use crate::application::worker::{shutdown_channel, JobEvent, JobHandler, ShutdownSender, Worker};
use crate::domain::queue::validate_queue_name;
use crate::domain::{Job, JobId, JobPayload, JobState, QueueConfig, KNOWN_QUEUES};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Job queue tuning
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    pub retry_base_delay_ms: i64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

/// Result of `register_worker`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRegistration {
    pub queue: String,
    pub concurrency: usize,
    /// false when the queue already had workers and this call was a no-op
    pub newly_registered: bool,
}

/// Per-state job counts of one queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub queued: i64,
    pub running: i64,
    pub completed: i64,
    pub dead_lettered: i64,
}

struct Pool {
    concurrency: usize,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    queues: HashSet<String>,
    pools: HashMap<String, Pool>,
    shutdown: Option<ShutdownSender>,
}

/// Queue registry, constructed once at service start and shared by reference
///
/// Lifecycle: `initialize` -> `enqueue` / `register_worker` -> `shutdown`.
pub struct JobQueue {
    job_repo: Arc<dyn JobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    retry_policy: Arc<RetryPolicy>,
    events: broadcast::Sender<JobEvent>,
    registry: Mutex<Registry>,
}

impl JobQueue {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: JobQueueConfig,
    ) -> Self {
        let retry_policy = Arc::new(RetryPolicy::new(
            Arc::clone(&time_provider),
            config.retry_base_delay_ms,
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            job_repo,
            id_provider,
            time_provider,
            retry_policy,
            events,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Recover orphaned jobs and open the known queues
    ///
    /// Calling it again while initialized is a no-op returning 0.
    ///
    /// # Returns
    /// Number of orphaned jobs recovered
    pub async fn initialize(&self) -> Result<usize> {
        if self.is_initialized()? {
            return Ok(0);
        }

        let recovered = RecoveryService::new(
            Arc::clone(&self.job_repo),
            Arc::clone(&self.time_provider),
        )
        .recover_orphaned_jobs()
        .await?;

        let mut registry = self.lock()?;
        registry.queues = KNOWN_QUEUES.iter().map(|q| q.to_string()).collect();
        let (sender, _) = shutdown_channel();
        registry.shutdown = Some(sender);
        info!(queues = ?KNOWN_QUEUES, recovered, "Job queue initialized");
        Ok(recovered)
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.lock()?.shutdown.is_some())
    }

    /// Durably record a job; returns once it is persisted
    pub async fn enqueue<T: Serialize>(&self, queue: &str, payload: &T) -> Result<JobId> {
        {
            let registry = self.lock()?;
            if registry.shutdown.is_none() {
                return Err(AppError::InvalidState(
                    "Job queue is not initialized".to_string(),
                ));
            }
            if !registry.queues.contains(queue) {
                return Err(AppError::InvalidState(format!(
                    "Queue '{}' is not initialized",
                    queue
                )));
            }
        }

        let payload = JobPayload::new(serde_json::to_value(payload)?);
        let job = Job::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            queue,
            payload,
        );
        self.job_repo.insert(&job).await?;

        info!(job_id = %job.id, queue = %queue, "Job enqueued");
        Ok(job.id)
    }

    /// Start `concurrency` worker slots for a queue
    ///
    /// Idempotent per queue name: a second call leaves the running pool alone
    /// and reports its concurrency.
    pub fn register_worker(
        &self,
        config: QueueConfig,
        handler: Arc<dyn JobHandler>,
    ) -> Result<WorkerRegistration> {
        validate_queue_name(&config.name)?;

        let mut registry = self.lock()?;
        let token = match &registry.shutdown {
            Some(sender) => sender.token(),
            None => {
                return Err(AppError::InvalidState(
                    "Job queue is not initialized".to_string(),
                ))
            }
        };

        if let Some(pool) = registry.pools.get(&config.name) {
            return Ok(WorkerRegistration {
                queue: config.name,
                concurrency: pool.concurrency,
                newly_registered: false,
            });
        }

        let handles = (0..config.concurrency)
            .map(|slot| {
                let worker = Worker::new(
                    config.name.clone(),
                    slot,
                    Arc::clone(&self.job_repo),
                    Arc::clone(&handler),
                    Arc::clone(&self.retry_policy),
                    Arc::clone(&self.time_provider),
                    self.events.clone(),
                );
                let token = token.clone();
                tokio::spawn(async move {
                    if let Err(e) = worker.run(token).await {
                        error!(error = %e, "Worker exited with error");
                    }
                })
            })
            .collect();

        registry.queues.insert(config.name.clone());
        registry.pools.insert(
            config.name.clone(),
            Pool {
                concurrency: config.concurrency,
                handles,
            },
        );

        info!(queue = %config.name, concurrency = config.concurrency, "Workers registered");
        Ok(WorkerRegistration {
            queue: config.name,
            concurrency: config.concurrency,
            newly_registered: true,
        })
    }

    /// Completion/failure notifications
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub async fn counts(&self, queue: &str) -> Result<QueueCounts> {
        Ok(QueueCounts {
            queued: self.job_repo.count_by_state(queue, JobState::Queued).await?,
            running: self.job_repo.count_by_state(queue, JobState::Running).await?,
            completed: self.job_repo.count_by_state(queue, JobState::Completed).await?,
            dead_lettered: self
                .job_repo
                .count_by_state(queue, JobState::DeadLettered)
                .await?,
        })
    }

    /// Signal every worker, wait for in-flight jobs, clear the registry
    pub async fn shutdown(&self) -> Result<()> {
        let (sender, pools) = {
            let mut registry = self.lock()?;
            let sender = registry.shutdown.take();
            registry.queues.clear();
            (sender, std::mem::take(&mut registry.pools))
        };

        let Some(sender) = sender else {
            return Ok(());
        };
        sender.shutdown();

        for (queue, pool) in pools {
            for handle in pool.handles {
                if let Err(e) = handle.await {
                    error!(queue = %queue, error = %e, "Worker task failed to join");
                }
            }
        }

        info!("Job queue stopped");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Registry>> {
        self.registry
            .lock()
            .map_err(|_| AppError::Internal("Job queue registry poisoned".to_string()))
    }
}
