// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are due (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a repository error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Capacity of the job event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default worker slots per queue
pub const DEFAULT_CONCURRENCY: usize = 1;
