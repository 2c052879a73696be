// `vm-deprovision` handler

use crate::application::provisioning::Orchestrator;
use crate::application::worker::JobHandler;
use crate::domain::{EnvironmentId, Job};
use crate::error::Result;
use crate::port::EnvironmentRepository;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Payload of a deprovision job: `{ environmentId }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprovisionJobPayload {
    pub environment_id: EnvironmentId,
}

pub struct DeprovisionJobHandler {
    envs: Arc<dyn EnvironmentRepository>,
    orchestrator: Arc<Orchestrator>,
}

impl DeprovisionJobHandler {
    pub fn new(envs: Arc<dyn EnvironmentRepository>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { envs, orchestrator }
    }
}

#[async_trait]
impl JobHandler for DeprovisionJobHandler {
    /// Tear down the instance (if any) and remove the record
    async fn handle(&self, job: &Job) -> Result<()> {
        let payload: DeprovisionJobPayload = job.payload.decode()?;
        let env_id = payload.environment_id;

        let Some(env) = self.envs.find_by_id(&env_id).await? else {
            info!(job_id = %job.id, env_id = %env_id, "Environment gone, skipping deprovision");
            return Ok(());
        };

        if env.provider_instance_id.is_some() {
            self.orchestrator.deprovision(&env).await?;
        } else {
            info!(env_id = %env_id, "No provider instance, removing record only");
        }

        self.envs.delete(&env_id).await?;
        info!(job_id = %job.id, env_id = %env_id, slug = %env.slug, "Environment removed");
        Ok(())
    }
}
