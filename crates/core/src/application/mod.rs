// Application Layer - Use Cases and Business Logic

pub mod environment;
pub mod job_queue;
pub mod jobs;
pub mod maintenance;
pub mod provisioning;
pub mod recovery;
pub mod retry;
pub mod slug;
pub mod worker;

// Re-exports
pub use environment::{CreateEnvironmentRequest, EnvironmentPage, EnvironmentService, EnvironmentStats};
pub use job_queue::{JobQueue, JobQueueConfig, QueueCounts, WorkerRegistration};
pub use jobs::{DeprovisionJobHandler, DeprovisionJobPayload, ProvisionJobHandler, ProvisionJobPayload};
pub use maintenance::MaintenanceScheduler;
pub use provisioning::{DnsOutcome, Orchestrator, PollPolicy, ProvisionOutcome, ProvisioningSettings};
pub use worker::{shutdown_channel, JobEvent, JobHandler, ShutdownSender, ShutdownToken, Worker};
