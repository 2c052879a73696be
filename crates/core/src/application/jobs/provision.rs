// `vm-provision` handler

use crate::application::provisioning::Orchestrator;
use crate::application::worker::JobHandler;
use crate::domain::{Environment, EnvironmentStatus, Job};
use crate::error::Result;
use crate::port::EnvironmentRepository;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Payload of a provision job: `{ environment, plan }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionJobPayload {
    pub environment: Environment,
    pub plan: String,
}

pub struct ProvisionJobHandler {
    envs: Arc<dyn EnvironmentRepository>,
    orchestrator: Arc<Orchestrator>,
}

impl ProvisionJobHandler {
    pub fn new(envs: Arc<dyn EnvironmentRepository>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { envs, orchestrator }
    }
}

#[async_trait]
impl JobHandler for ProvisionJobHandler {
    /// Provision from the stored record, not the payload snapshot
    ///
    /// A `provisioning` record with an instance handle was left by an
    /// interrupted attempt and is resumed from address polling. A record that
    /// is gone, or in any other status, was already handled by an earlier
    /// delivery or a deletion.
    async fn handle(&self, job: &Job) -> Result<()> {
        let payload: ProvisionJobPayload = job.payload.decode()?;
        let env_id = payload.environment.id;

        let Some(env) = self.envs.find_by_id(&env_id).await? else {
            info!(job_id = %job.id, env_id = %env_id, "Environment gone, skipping provision");
            return Ok(());
        };

        let outcome = if env.status.awaits_provisioning() {
            self.orchestrator.provision(&env, &payload.plan).await?
        } else if env.status == EnvironmentStatus::Provisioning
            && env.provider_instance_id.is_some()
        {
            self.orchestrator.resume(&env).await?
        } else {
            info!(
                job_id = %job.id,
                env_id = %env_id,
                status = %env.status,
                "Environment already handled, skipping provision"
            );
            return Ok(());
        };
        info!(
            job_id = %job.id,
            env_id = %env_id,
            status = %outcome.status,
            instance_id = %outcome.instance_id,
            "Provision job finished"
        );
        Ok(())
    }
}
