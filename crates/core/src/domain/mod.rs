// Domain Layer - Pure business logic and entities

pub mod environment;
pub mod error;
pub mod job;
pub mod plan;
pub mod queue;

// Re-exports
pub use environment::{Environment, EnvironmentId, EnvironmentPatch, EnvironmentStatus};
pub use error::DomainError;
pub use job::{Job, JobId, JobPayload, JobState};
pub use plan::{Plan, PlanCatalog};
pub use queue::{QueueConfig, QueueId, DEPROVISION_QUEUE, KNOWN_QUEUES, PROVISION_QUEUE};
