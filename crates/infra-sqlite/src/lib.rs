// Envprov Infrastructure - SQLite Adapter
// Implements: JobRepository, EnvironmentRepository, Maintenance

mod connection;
mod environment_repository;
mod error;
mod job_repository;
mod maintenance_impl;
mod migration;

pub use connection::create_pool;
pub use environment_repository::SqliteEnvironmentRepository;
pub use job_repository::SqliteJobRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;

// sqlx::Error cannot implement From into AppError here (orphan rule);
// adapters go through error::map_sqlx_error instead.
