//! Shared wiring for the integration suites: SQLite stores, scripted
//! provider adapters and a job queue with zero retry backoff.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use envprov_core::application::{
    DeprovisionJobHandler, EnvironmentService, JobEvent, JobQueue, JobQueueConfig, Orchestrator,
    PollPolicy, ProvisionJobHandler, ProvisioningSettings,
};
use envprov_core::domain::{Environment, PlanCatalog, QueueConfig, DEPROVISION_QUEUE, PROVISION_QUEUE};
use envprov_core::port::bootstrap::mocks::StaticBootstrap;
use envprov_core::port::compute_provider::mocks::ScriptedComputeProvider;
use envprov_core::port::dns_registrar::mocks::InMemoryDnsRegistrar;
use envprov_core::port::id_provider::UuidProvider;
use envprov_core::port::time_provider::SystemTimeProvider;
use envprov_core::port::{EnvironmentRepository, TimeProvider};
use envprov_infra_sqlite::{
    create_pool, run_migrations, SqliteEnvironmentRepository, SqliteJobRepository,
};
use sqlx::SqlitePool;
use tokio::sync::broadcast;

pub const TEST_DOMAIN: &str = "envs.test";

pub struct Harness {
    pub pool: SqlitePool,
    pub envs: Arc<SqliteEnvironmentRepository>,
    pub jobs: Arc<SqliteJobRepository>,
    pub compute: Arc<ScriptedComputeProvider>,
    pub dns: Arc<InMemoryDnsRegistrar>,
    pub orchestrator: Arc<Orchestrator>,
    pub queue: Arc<JobQueue>,
}

impl Harness {
    pub async fn new(compute: ScriptedComputeProvider, dns: InMemoryDnsRegistrar) -> Self {
        Self::with_url("sqlite::memory:", compute, dns).await
    }

    pub async fn with_url(
        url: &str,
        compute: ScriptedComputeProvider,
        dns: InMemoryDnsRegistrar,
    ) -> Self {
        let pool = create_pool(url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let envs = Arc::new(SqliteEnvironmentRepository::new(pool.clone()));
        let jobs = Arc::new(SqliteJobRepository::new(pool.clone(), time.clone()));
        let compute = Arc::new(compute);
        let dns = Arc::new(dns);

        let settings = ProvisioningSettings {
            ssh_public_key: "ssh-ed25519 AAAAC3Nz test@envprov".to_string(),
            address_poll: PollPolicy::immediate(3),
            readiness_poll: PollPolicy::immediate(3),
            ..Default::default()
        };
        let orchestrator = Arc::new(Orchestrator::new(
            envs.clone(),
            compute.clone(),
            dns.clone(),
            Arc::new(StaticBootstrap),
            time.clone(),
            PlanCatalog::default(),
            settings,
        ));

        let queue = Arc::new(JobQueue::new(
            jobs.clone(),
            Arc::new(UuidProvider),
            time,
            JobQueueConfig {
                retry_base_delay_ms: 0,
            },
        ));
        queue.initialize().await.unwrap();

        Self {
            pool,
            envs,
            jobs,
            compute,
            dns,
            orchestrator,
            queue,
        }
    }

    pub fn start_workers(&self, provision_slots: usize, deprovision_slots: usize) {
        self.queue
            .register_worker(
                QueueConfig::new(PROVISION_QUEUE, provision_slots),
                Arc::new(ProvisionJobHandler::new(
                    self.envs.clone(),
                    self.orchestrator.clone(),
                )),
            )
            .unwrap();
        self.queue
            .register_worker(
                QueueConfig::new(DEPROVISION_QUEUE, deprovision_slots),
                Arc::new(DeprovisionJobHandler::new(
                    self.envs.clone(),
                    self.orchestrator.clone(),
                )),
            )
            .unwrap();
    }

    pub fn service(&self) -> EnvironmentService {
        EnvironmentService::new(
            self.envs.clone(),
            self.queue.clone(),
            self.orchestrator.clone(),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
            TEST_DOMAIN,
        )
    }

    /// Insert a `pending` record with a fixed slug
    pub async fn seed(&self, id: &str, slug: &str) -> Environment {
        let now = SystemTimeProvider.now_millis();
        let env = Environment::new(id, now, slug, TEST_DOMAIN, "owner-1", "solo");
        self.envs.insert(&env).await.unwrap();
        env
    }

    pub async fn stored(&self, id: &str) -> Option<Environment> {
        self.envs.find_by_id(&id.to_string()).await.unwrap()
    }
}

/// Collect `n` terminal job events (completed or dead-lettered)
pub async fn wait_for_terminal(
    events: &mut broadcast::Receiver<JobEvent>,
    n: usize,
) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while seen.len() < n {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("timed out waiting for job events")
            .expect("event channel closed");
        let terminal = match &event {
            JobEvent::Completed { .. } => true,
            JobEvent::Failed { dead_lettered, .. } => *dead_lettered,
        };
        if terminal {
            seen.push(event);
        }
    }
    seen
}
