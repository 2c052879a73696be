//! Envprov Daemon - Main Entry Point
//! Composition root: settings, storage, gateways, job queue, RPC server

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use config::Settings;
use envprov_api_rpc::{RpcServer, RpcServerConfig};
use envprov_core::application::maintenance::DEFAULT_MAINTENANCE_INTERVAL;
use envprov_core::application::{
    shutdown_channel, DeprovisionJobHandler, EnvironmentService, JobEvent, JobQueue,
    JobQueueConfig, MaintenanceScheduler, Orchestrator, ProvisionJobHandler,
};
use envprov_core::domain::{QueueConfig, DEPROVISION_QUEUE, PROVISION_QUEUE};
use envprov_core::port::id_provider::UuidProvider;
use envprov_core::port::time_provider::SystemTimeProvider;
use envprov_core::port::{BootstrapRenderer, MaintenanceConfig};
use envprov_infra_cloud::{CloudInitTemplate, CloudflareDnsClient, ContaboClient};
use envprov_infra_sqlite::{
    create_pool, run_migrations, SqliteEnvironmentRepository, SqliteJobRepository,
    SqliteMaintenance,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (+ optional OpenTelemetry)
    telemetry::init(telemetry::LogFormat::from_env())?;
    info!("Envprov daemon v{} starting...", VERSION);

    // 2. Configuration
    let settings = Settings::from_env().context("Invalid configuration")?;
    info!(
        db_path = %settings.db_path,
        domain = %settings.domain,
        region = %settings.region,
        "Configuration loaded"
    );

    // 3. Database
    if let Some(parent) = std::path::Path::new(&settings.db_path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let pool = create_pool(&settings.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Adapters (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));
    let env_repo = Arc::new(SqliteEnvironmentRepository::new(pool.clone()));
    let compute = Arc::new(ContaboClient::new(
        settings.contabo.clone(),
        time_provider.clone(),
    )?);
    let dns = Arc::new(CloudflareDnsClient::new(settings.cloudflare.clone())?);
    let bootstrap: Arc<dyn BootstrapRenderer> = match &settings.cloud_init_template {
        Some(path) => Arc::new(CloudInitTemplate::from_file(path)?),
        None => Arc::new(CloudInitTemplate::default()),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        env_repo.clone(),
        compute,
        dns,
        bootstrap,
        time_provider.clone(),
        settings.plans.clone(),
        settings.provisioning(),
    ));

    // 5. Job queue: recovery, then workers
    let queue = Arc::new(JobQueue::new(
        job_repo,
        id_provider.clone(),
        time_provider.clone(),
        JobQueueConfig::default(),
    ));
    let recovered = queue.initialize().await?;
    info!(recovered_jobs = recovered, "Job queue ready");

    spawn_event_logger(&queue);

    queue.register_worker(
        QueueConfig::new(PROVISION_QUEUE, settings.provision_concurrency),
        Arc::new(ProvisionJobHandler::new(env_repo.clone(), orchestrator.clone())),
    )?;
    queue.register_worker(
        QueueConfig::new(DEPROVISION_QUEUE, settings.deprovision_concurrency),
        Arc::new(DeprovisionJobHandler::new(env_repo.clone(), orchestrator.clone())),
    )?;

    // 6. JSON-RPC server
    let service = Arc::new(EnvironmentService::new(
        env_repo,
        queue.clone(),
        orchestrator,
        id_provider,
        time_provider.clone(),
        settings.domain.clone(),
    ));
    let (rpc_addr, rpc_handle) = RpcServer::new(
        RpcServerConfig {
            port: settings.rpc_port,
            ..Default::default()
        },
        service,
    )
    .start()
    .await
    .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 7. Maintenance
    let maintenance = Arc::new(SqliteMaintenance::new(pool.clone(), time_provider));
    let maintenance_scheduler = MaintenanceScheduler::new(
        maintenance,
        MaintenanceConfig::default(),
        DEFAULT_MAINTENANCE_INTERVAL,
    );
    let (maintenance_stop, maintenance_token) = shutdown_channel();
    let maintenance_handle = tokio::spawn(maintenance_scheduler.run(maintenance_token));

    info!(rpc_addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop intake, drain in-flight jobs
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    maintenance_stop.shutdown();
    if let Err(e) = maintenance_handle.await {
        error!(error = %e, "Maintenance task failed to join");
    }
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, queue.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Job queue shutdown failed"),
        Err(_) => warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "In-flight jobs did not finish; they will be recovered on next start"
        ),
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

/// Job completion/failure log lines
fn spawn_event_logger(queue: &JobQueue) {
    let mut events = queue.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(JobEvent::Completed {
                    job_id,
                    queue,
                    attempts,
                }) => info!(job_id = %job_id, queue = %queue, attempts, "Job completed"),
                Ok(JobEvent::Failed {
                    job_id,
                    queue,
                    attempts,
                    error,
                    dead_lettered: true,
                }) => error!(
                    job_id = %job_id,
                    queue = %queue,
                    attempts,
                    error = %error,
                    "Job dead-lettered"
                ),
                Ok(JobEvent::Failed {
                    job_id,
                    queue,
                    attempts,
                    error,
                    ..
                }) => warn!(
                    job_id = %job_id,
                    queue = %queue,
                    attempts,
                    error = %error,
                    "Job failed, will retry"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Job event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
