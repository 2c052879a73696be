// Port Layer - Interfaces for external dependencies

pub mod bootstrap;
pub mod compute_provider;
pub mod dns_registrar;
pub mod environment_repository;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod maintenance;
pub mod time_provider;

// Re-exports
pub use bootstrap::BootstrapRenderer;
pub use compute_provider::{
    ComputeProvider, CreateInstanceRequest, ImageSummary, InstanceDetail, SecretSummary,
};
pub use dns_registrar::{DnsRecord, DnsRegistrar};
pub use environment_repository::{EnvironmentFilter, EnvironmentRepository, Pagination};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use time_provider::TimeProvider;
