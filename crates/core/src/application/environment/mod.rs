// Environment Service - user-facing environment use cases

pub mod create;

pub use create::CreateEnvironmentRequest;

use crate::application::jobs::DeprovisionJobPayload;
use crate::application::job_queue::JobQueue;
use crate::application::provisioning::Orchestrator;
use crate::domain::{Environment, EnvironmentStatus, DEPROVISION_QUEUE};
use crate::error::{AppError, Result};
use crate::port::{EnvironmentFilter, EnvironmentRepository, IdProvider, Pagination, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPage {
    pub items: Vec<Environment>,
    pub total: i64,
    pub skip: i64,
    pub take: i64,
}

/// Environment counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStats {
    pub total: i64,
    pub pending: i64,
    pub provisioning: i64,
    pub running: i64,
    pub stopped: i64,
    pub error: i64,
    pub deleting: i64,
}

impl EnvironmentStats {
    fn set(&mut self, status: EnvironmentStatus, count: i64) {
        let slot = match status {
            EnvironmentStatus::Pending => &mut self.pending,
            EnvironmentStatus::Provisioning => &mut self.provisioning,
            EnvironmentStatus::Running => &mut self.running,
            EnvironmentStatus::Stopped => &mut self.stopped,
            EnvironmentStatus::Error => &mut self.error,
            EnvironmentStatus::Deleting => &mut self.deleting,
        };
        *slot = count;
    }
}

pub struct EnvironmentService {
    envs: Arc<dyn EnvironmentRepository>,
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    domain: String,
}

impl EnvironmentService {
    pub fn new(
        envs: Arc<dyn EnvironmentRepository>,
        queue: Arc<JobQueue>,
        orchestrator: Arc<Orchestrator>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            envs,
            queue,
            orchestrator,
            id_provider,
            time_provider,
            domain: domain.into(),
        }
    }

    /// Record a `pending` environment and enqueue its provisioning
    pub async fn create(&self, req: CreateEnvironmentRequest) -> Result<Environment> {
        create::execute(
            self.envs.as_ref(),
            self.queue.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            &self.domain,
            req,
        )
        .await
    }

    /// Mark `deleting` and enqueue teardown
    ///
    /// Deleting an environment already in `deleting` returns it unchanged.
    pub async fn delete(&self, id: &str) -> Result<Environment> {
        let mut env = self.get(id).await?;
        if env.status == EnvironmentStatus::Deleting {
            return Ok(env);
        }

        let patch = env.transition(EnvironmentStatus::Deleting, self.time_provider.now_millis())?;
        self.envs.update(&env.id, &patch).await?;
        self.queue
            .enqueue(
                DEPROVISION_QUEUE,
                &DeprovisionJobPayload {
                    environment_id: env.id.clone(),
                },
            )
            .await?;

        info!(env_id = %env.id, slug = %env.slug, "Environment deletion requested");
        Ok(env)
    }

    pub async fn get(&self, id: &str) -> Result<Environment> {
        self.envs
            .find_by_id(&id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Environment {}", id)))
    }

    pub async fn list(
        &self,
        filter: &EnvironmentFilter,
        pagination: Pagination,
    ) -> Result<EnvironmentPage> {
        let total = self.envs.count(filter).await?;
        let items = self.envs.list(filter, pagination).await?;
        Ok(EnvironmentPage {
            items,
            total,
            skip: pagination.skip,
            take: pagination.take,
        })
    }

    pub async fn stats(&self) -> Result<EnvironmentStats> {
        let mut stats = EnvironmentStats {
            total: self.envs.count(&EnvironmentFilter::default()).await?,
            ..Default::default()
        };
        for status in EnvironmentStatus::ALL {
            let filter = EnvironmentFilter {
                status: Some(status),
                ..Default::default()
            };
            stats.set(status, self.envs.count(&filter).await?);
        }
        Ok(stats)
    }

    /// Provider-reported status of the environment's instance
    pub async fn live_status(&self, id: &str) -> Result<String> {
        let env = self.get(id).await?;
        self.orchestrator.get_status(&env).await
    }
}
