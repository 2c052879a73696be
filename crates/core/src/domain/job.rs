// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Default attempt budget per job
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Default exponential backoff factor
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    DeadLettered,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::DeadLettered => "DEAD_LETTERED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::DeadLettered)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = super::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "COMPLETED" => Ok(JobState::Completed),
            "DEAD_LETTERED" => Ok(JobState::DeadLettered),
            other => Err(super::DomainError::ValidationError(format!(
                "Unknown job state: {}",
                other
            ))),
        }
    }
}

/// Job Payload (opaque to the queue, interpreted by handlers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode the payload into a typed contract
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.0.clone())
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub payload: JobPayload,
    pub state: JobState,

    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_factor: f64,

    pub created_at: i64, // epoch ms
    pub run_at: i64,     // earliest dispatch time, epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub last_error: Option<String>,
}

impl Job {
    /// Create a new queued job
    ///
    /// `id` and `created_at` are injected (IdProvider / TimeProvider), never generated here.
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            payload,
            state: JobState::Queued,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            created_at,
            run_at: created_at,
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp (tests only).
    pub fn new_test(queue: impl Into<String>, payload: JobPayload) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("test-{}", counter),
            (counter * 1000) as i64,
            queue,
            payload,
        )
    }

    /// QUEUED -> RUNNING; counts one attempt
    pub fn start(&mut self, now_millis: i64) -> super::error::Result<()> {
        if self.state != JobState::Queued {
            return Err(super::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        self.attempts += 1;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// RUNNING -> COMPLETED
    pub fn complete(&mut self, now_millis: i64) -> super::error::Result<()> {
        if self.state != JobState::Running {
            return Err(super::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Completed.to_string(),
            });
        }
        self.state = JobState::Completed;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// RUNNING -> QUEUED, not dispatched before `run_at`
    pub fn requeue(&mut self, run_at: i64, error: impl Into<String>) {
        self.state = JobState::Queued;
        self.run_at = run_at;
        self.started_at = None;
        self.last_error = Some(error.into());
    }

    /// Terminal failure after the attempt budget is spent
    pub fn dead_letter(&mut self, now_millis: i64, error: impl Into<String>) {
        self.state = JobState::DeadLettered;
        self.finished_at = Some(now_millis);
        self.last_error = Some(error.into());
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
