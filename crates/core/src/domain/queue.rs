// Queue Domain Model

/// Queue identifier
pub type QueueId = String;

/// Queue carrying `{ environment, plan }` provision payloads
pub const PROVISION_QUEUE: &str = "vm-provision";

/// Queue carrying `{ environmentId }` deprovision payloads
pub const DEPROVISION_QUEUE: &str = "vm-deprovision";

/// Queues created by `JobQueue::initialize`
pub const KNOWN_QUEUES: &[&str] = &[PROVISION_QUEUE, DEPROVISION_QUEUE];

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Worker pool configuration for one queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub name: QueueId,
    pub concurrency: usize,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            // A pool with zero slots would never drain its queue
            concurrency: concurrency.max(1),
        }
    }
}

/// Validate a queue name (non-empty, bounded, `[a-zA-Z0-9_-]`)
pub fn validate_queue_name(name: &str) -> super::error::Result<()> {
    use super::error::DomainError;

    if name.is_empty() {
        return Err(DomainError::ValidationError(
            "Queue name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(DomainError::ValidationError(format!(
            "Queue name too long (max {} chars)",
            MAX_QUEUE_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DomainError::ValidationError(
            "Queue name must be alphanumeric with '_' or '-'".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_queue_names_are_valid() {
        for name in KNOWN_QUEUES {
            assert!(validate_queue_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_queue_names() {
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name(&"q".repeat(65)).is_err());
        assert!(validate_queue_name("vm provision!").is_err());
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(QueueConfig::new(PROVISION_QUEUE, 0).concurrency, 1);
    }
}
