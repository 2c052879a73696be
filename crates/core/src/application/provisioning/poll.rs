// Poll policies for provider convergence

use std::time::Duration;

/// Attempt-bounded polling schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Address acquisition: 5s x 10
    pub const fn address() -> Self {
        Self::new(Duration::from_secs(5), 10)
    }

    /// Readiness: 10s x 30
    pub const fn readiness() -> Self {
        Self::new(Duration::from_secs(10), 30)
    }

    /// Zero-interval policy for tests
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(Duration::ZERO, max_attempts)
    }

    /// Worst-case wall time spent sleeping
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}
