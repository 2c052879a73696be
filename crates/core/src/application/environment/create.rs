// Create Environment Use Case

use crate::application::job_queue::JobQueue;
use crate::application::jobs::ProvisionJobPayload;
use crate::application::slug::{generate_slug, generate_unique_slug};
use crate::domain::{Environment, Plan, PROVISION_QUEUE};
use crate::error::{AppError, Result};
use crate::port::{EnvironmentRepository, IdProvider, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Maximum owner id length
pub const MAX_OWNER_ID_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentRequest {
    pub owner_id: String,
    pub plan: String,
}

pub(crate) fn validate_request(req: &CreateEnvironmentRequest) -> Result<Plan> {
    if req.owner_id.trim().is_empty() {
        return Err(AppError::Validation("ownerId cannot be empty".to_string()));
    }
    if req.owner_id.len() > MAX_OWNER_ID_LEN {
        return Err(AppError::Validation(format!(
            "ownerId too long (max {} chars)",
            MAX_OWNER_ID_LEN
        )));
    }
    req.plan
        .parse::<Plan>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Execute the create use case
///
/// # Arguments
///
/// * `envs` - Environment repository
/// * `queue` - Initialized job queue
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `domain` - Zone under which `hostname = slug.domain`
/// * `req` - Create request
pub async fn execute(
    envs: &dyn EnvironmentRepository,
    queue: &JobQueue,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    domain: &str,
    req: CreateEnvironmentRequest,
) -> Result<Environment> {
    let plan = validate_request(&req)?;
    let now = time_provider.now_millis();

    let slug = generate_unique_slug(envs, now, || generate_slug(&mut rand::thread_rng())).await?;
    let mut env = Environment::new(
        id_provider.generate_id(),
        now,
        slug,
        domain,
        req.owner_id,
        plan.as_str(),
    );
    envs.insert(&env).await?;

    let payload = ProvisionJobPayload {
        environment: env.clone(),
        plan: plan.as_str().to_string(),
    };
    if let Err(e) = queue.enqueue(PROVISION_QUEUE, &payload).await {
        error!(env_id = %env.id, error = %e, "Failed to enqueue provisioning");
        let patch = env.fail(format!("enqueue failed: {}", e), time_provider.now_millis())?;
        envs.update(&env.id, &patch).await?;
        return Err(e);
    }

    info!(
        env_id = %env.id,
        slug = %env.slug,
        owner_id = %env.owner_id,
        plan = %plan,
        "Environment created"
    );
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(owner: &str, plan: &str) -> CreateEnvironmentRequest {
        CreateEnvironmentRequest {
            owner_id: owner.to_string(),
            plan: plan.to_string(),
        }
    }

    #[test]
    fn test_validate_request() {
        assert_eq!(validate_request(&request("u1", "team")).unwrap(), Plan::Team);

        let err = validate_request(&request(" ", "solo")).unwrap_err();
        assert!(err.to_string().contains("empty"));

        let err = validate_request(&request(&"u".repeat(129), "solo")).unwrap_err();
        assert!(err.to_string().contains("too long"));

        let err = validate_request(&request("u1", "platinum")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
