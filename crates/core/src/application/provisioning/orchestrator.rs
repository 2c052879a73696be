// Provisioning Orchestrator

use super::image::{select_image, ImagePreference};
use super::poll::PollPolicy;
use crate::domain::error::Result as DomainResult;
use crate::domain::{Environment, EnvironmentPatch, EnvironmentStatus, PlanCatalog};
use crate::error::{AppError, Result};
use crate::port::compute_provider::INSTANCE_STATUS_RUNNING;
use crate::port::{
    BootstrapRenderer, ComputeProvider, CreateInstanceRequest, DnsRecord, DnsRegistrar,
    EnvironmentRepository, TimeProvider,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default provider region
pub const DEFAULT_REGION: &str = "US-east";

/// Default name of the shared SSH credential at the provider
pub const DEFAULT_SSH_KEY_NAME: &str = "envprov-admin-key";

/// Static provisioning parameters
#[derive(Debug, Clone)]
pub struct ProvisioningSettings {
    pub region: String,
    pub default_image_id: Option<String>,
    pub ssh_key_name: String,
    pub ssh_public_key: String,
    /// Billing period in months
    pub billing_period: u32,
    pub image_preference: ImagePreference,
    pub address_poll: PollPolicy,
    pub readiness_poll: PollPolicy,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            default_image_id: None,
            ssh_key_name: DEFAULT_SSH_KEY_NAME.to_string(),
            ssh_public_key: String::new(),
            billing_period: 1,
            image_preference: ImagePreference::default(),
            address_poll: PollPolicy::address(),
            readiness_poll: PollPolicy::readiness(),
        }
    }
}

/// Result of a DNS side effect; never fatal to provisioning
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DnsOutcome {
    Applied { record: Option<DnsRecord> },
    Degraded { message: String },
}

impl DnsOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DnsOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOutcome {
    pub instance_id: String,
    pub ipv4: Option<String>,
    pub status: EnvironmentStatus,
    pub dns: Option<DnsOutcome>,
}

/// Drives environments through the provisioning state machine
///
/// ```text
/// pending -> provisioning -> running
///                  |
///                  +-> error
/// ```
pub struct Orchestrator {
    envs: Arc<dyn EnvironmentRepository>,
    compute: Arc<dyn ComputeProvider>,
    dns: Arc<dyn DnsRegistrar>,
    bootstrap: Arc<dyn BootstrapRenderer>,
    time_provider: Arc<dyn TimeProvider>,
    plans: PlanCatalog,
    settings: ProvisioningSettings,
}

impl Orchestrator {
    pub fn new(
        envs: Arc<dyn EnvironmentRepository>,
        compute: Arc<dyn ComputeProvider>,
        dns: Arc<dyn DnsRegistrar>,
        bootstrap: Arc<dyn BootstrapRenderer>,
        time_provider: Arc<dyn TimeProvider>,
        plans: PlanCatalog,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            envs,
            compute,
            dns,
            bootstrap,
            time_provider,
            plans,
            settings,
        }
    }

    /// Create the instance, bind DNS and wait for readiness
    ///
    /// Ends in `running`, in `provisioning` when a poll budget runs out, or
    /// in `error` when instance creation or persistence fails (the error is
    /// returned as well).
    pub async fn provision(&self, env: &Environment, plan: &str) -> Result<ProvisionOutcome> {
        if !env.status.awaits_provisioning() {
            return Err(AppError::InvalidState(format!(
                "Environment {} is {} and cannot be provisioned",
                env.id, env.status
            )));
        }

        let mut env = env.clone();
        match self.run_provision(&mut env, plan).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(env_id = %env.id, slug = %env.slug, error = %e, "Provisioning failed");
                self.mark_error(&mut env, &e).await;
                Err(e)
            }
        }
    }

    async fn run_provision(&self, env: &mut Environment, plan: &str) -> Result<ProvisionOutcome> {
        let product_id = self.plans.product_for(plan).to_string();

        let images = self.compute.list_images().await?;
        let image = select_image(
            &images,
            &self.settings.image_preference,
            self.settings.default_image_id.as_deref(),
        )
        .map_err(|e| AppError::Config(e.to_string()))?;

        let ssh_key_id = self
            .compute
            .get_or_create_ssh_secret(&self.settings.ssh_key_name, &self.settings.ssh_public_key)
            .await?;

        let request = CreateInstanceRequest {
            product_id,
            region: self.settings.region.clone(),
            image_id: image.image_id,
            display_name: env.slug.clone(),
            user_data: self.bootstrap.render(env)?,
            period: self.settings.billing_period,
            ssh_key_ids: vec![ssh_key_id],
        };
        let instance_id = self.compute.create_instance(&request).await?;
        info!(
            env_id = %env.id,
            slug = %env.slug,
            instance_id = %instance_id,
            product_id = %request.product_id,
            image_id = %request.image_id,
            "Instance created"
        );

        let attached = instance_id.clone();
        if let Err(e) = self
            .persist(env, move |e, now| e.attach_instance(attached, now))
            .await
        {
            self.discard_instance(&env.id, &instance_id).await;
            return Err(e);
        }

        self.converge(env, instance_id).await
    }

    /// Continue an interrupted attempt from address polling
    ///
    /// Requires a `provisioning` record that already holds an instance handle;
    /// no new instance is created. An address already on record is reused and
    /// its DNS binding is repaired if missing.
    pub async fn resume(&self, env: &Environment) -> Result<ProvisionOutcome> {
        if env.status != EnvironmentStatus::Provisioning {
            return Err(AppError::InvalidState(format!(
                "Environment {} is {} and cannot be resumed",
                env.id, env.status
            )));
        }
        let instance_id = required_instance(env)?.to_string();
        info!(
            env_id = %env.id,
            slug = %env.slug,
            instance_id = %instance_id,
            has_address = env.ipv4.is_some(),
            "Resuming provisioning"
        );

        let mut env = env.clone();
        match self.converge(&mut env, instance_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(env_id = %env.id, slug = %env.slug, error = %e, "Resumed provisioning failed");
                self.mark_error(&mut env, &e).await;
                Err(e)
            }
        }
    }

    /// Steps after instance creation: address, DNS, readiness
    async fn converge(&self, env: &mut Environment, instance_id: String) -> Result<ProvisionOutcome> {
        let (ipv4, dns) = match env.ipv4.clone() {
            Some(ipv4) => {
                let dns = self.ensure_dns(&env.slug, &ipv4).await;
                (ipv4, dns)
            }
            None => {
                let Some(ipv4) = self.poll_address(&instance_id).await else {
                    warn!(
                        env_id = %env.id,
                        instance_id = %instance_id,
                        budget_secs = self.settings.address_poll.budget().as_secs(),
                        "No address assigned within poll budget, leaving environment provisioning"
                    );
                    return Ok(ProvisionOutcome {
                        instance_id,
                        ipv4: None,
                        status: env.status,
                        dns: None,
                    });
                };
                let assigned = ipv4.clone();
                self.persist(env, move |e, now| Ok(e.assign_address(assigned, now)))
                    .await?;
                let dns = self.register_dns(&env.slug, &ipv4).await;
                (ipv4, dns)
            }
        };

        if self.poll_readiness(&instance_id).await {
            self.persist(env, |e, now| e.transition(EnvironmentStatus::Running, now))
                .await?;
            info!(env_id = %env.id, slug = %env.slug, ipv4 = %ipv4, "Environment running");
        } else {
            warn!(
                env_id = %env.id,
                instance_id = %instance_id,
                budget_secs = self.settings.readiness_poll.budget().as_secs(),
                "Instance not running within poll budget, leaving environment provisioning"
            );
        }

        Ok(ProvisionOutcome {
            instance_id,
            ipv4: Some(ipv4),
            status: env.status,
            dns: Some(dns),
        })
    }

    /// Delete the instance and its DNS binding, then mark `deleting`
    pub async fn deprovision(&self, env: &Environment) -> Result<DnsOutcome> {
        let instance_id = required_instance(env)?;

        self.compute.delete_instance(instance_id).await?;
        info!(env_id = %env.id, instance_id = %instance_id, "Instance deleted");

        let dns = match self.dns.delete_a_record(&env.slug).await {
            Ok(removed) => {
                debug!(slug = %env.slug, removed, "DNS records removed");
                DnsOutcome::Applied { record: None }
            }
            Err(e) => {
                warn!(slug = %env.slug, error = %e, "DNS cleanup failed, continuing");
                DnsOutcome::Degraded {
                    message: e.to_string(),
                }
            }
        };

        let mut env = env.clone();
        self.persist(&mut env, |e, now| e.transition(EnvironmentStatus::Deleting, now))
            .await?;
        Ok(dns)
    }

    /// Live status string reported by the provider
    pub async fn get_status(&self, env: &Environment) -> Result<String> {
        let instance_id = required_instance(env)?;
        self.compute.get_instance_status(instance_id).await
    }

    async fn poll_address(&self, instance_id: &str) -> Option<String> {
        let policy = self.settings.address_poll;
        for attempt in 1..=policy.max_attempts {
            sleep(policy.interval).await;
            match self.compute.get_instance(instance_id).await {
                Ok(detail) => match detail.ipv4.filter(|ip| !ip.is_empty()) {
                    Some(ip) => {
                        info!(instance_id = %instance_id, ipv4 = %ip, attempt, "Address assigned");
                        return Some(ip);
                    }
                    None => debug!(instance_id = %instance_id, attempt, "No address yet"),
                },
                Err(e) => {
                    warn!(instance_id = %instance_id, attempt, error = %e, "Address poll failed")
                }
            }
        }
        None
    }

    async fn poll_readiness(&self, instance_id: &str) -> bool {
        let policy = self.settings.readiness_poll;
        for attempt in 1..=policy.max_attempts {
            match self.compute.get_instance_status(instance_id).await {
                Ok(status) if status == INSTANCE_STATUS_RUNNING => return true,
                Ok(status) => {
                    debug!(instance_id = %instance_id, status = %status, attempt, "Not ready yet")
                }
                Err(e) => {
                    warn!(instance_id = %instance_id, attempt, error = %e, "Readiness poll failed")
                }
            }
            if attempt < policy.max_attempts {
                sleep(policy.interval).await;
            }
        }
        false
    }

    async fn register_dns(&self, slug: &str, ipv4: &str) -> DnsOutcome {
        match self.dns.create_a_record(slug, ipv4).await {
            Ok(record) => {
                info!(slug = %slug, ipv4 = %ipv4, record_id = %record.id, "DNS record created");
                DnsOutcome::Applied {
                    record: Some(record),
                }
            }
            Err(e) => {
                warn!(slug = %slug, ipv4 = %ipv4, error = %e, "DNS registration failed, continuing");
                DnsOutcome::Degraded {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Keep an existing binding, point a stale one at `ipv4`, or create it
    async fn ensure_dns(&self, slug: &str, ipv4: &str) -> DnsOutcome {
        match self.dns.find_a_record(slug).await {
            Ok(Some(record)) if record.content == ipv4 => DnsOutcome::Applied {
                record: Some(record),
            },
            Ok(Some(_)) => match self.dns.update_a_record(slug, ipv4).await {
                Ok(record) => {
                    info!(slug = %slug, ipv4 = %ipv4, "DNS record repointed");
                    DnsOutcome::Applied {
                        record: Some(record),
                    }
                }
                Err(e) => {
                    warn!(slug = %slug, ipv4 = %ipv4, error = %e, "DNS update failed, continuing");
                    DnsOutcome::Degraded {
                        message: e.to_string(),
                    }
                }
            },
            Ok(None) => self.register_dns(slug, ipv4).await,
            Err(e) => {
                warn!(slug = %slug, error = %e, "DNS lookup failed, continuing");
                DnsOutcome::Degraded {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Best effort: an instance whose handle could not be recorded is orphaned
    async fn discard_instance(&self, env_id: &str, instance_id: &str) {
        match self.compute.delete_instance(instance_id).await {
            Ok(()) => warn!(
                env_id = %env_id,
                instance_id = %instance_id,
                "Instance handle not recorded, instance deleted"
            ),
            Err(e) => error!(
                env_id = %env_id,
                instance_id = %instance_id,
                error = %e,
                "Instance handle not recorded and instance delete failed"
            ),
        }
    }

    /// Apply a domain change, persist its patch, then commit it locally
    async fn persist<F>(&self, env: &mut Environment, change: F) -> Result<()>
    where
        F: FnOnce(&mut Environment, i64) -> DomainResult<EnvironmentPatch>,
    {
        let mut next = env.clone();
        let patch = change(&mut next, self.time_provider.now_millis())?;
        self.envs.update(&env.id, &patch).await?;
        *env = next;
        Ok(())
    }

    /// Best effort: the original error is what the caller sees
    async fn mark_error(&self, env: &mut Environment, cause: &AppError) {
        if !env.status.can_transition_to(EnvironmentStatus::Error) {
            warn!(env_id = %env.id, status = %env.status, "Cannot record error from this status");
            return;
        }
        let message = cause.to_string();
        if let Err(e) = self.persist(env, |e, now| e.fail(message, now)).await {
            error!(env_id = %env.id, error = %e, "Failed to record provisioning error");
        }
    }
}

fn required_instance(env: &Environment) -> Result<&str> {
    env.provider_instance_id.as_deref().ok_or_else(|| {
        AppError::InvalidState(format!(
            "Environment {} has no provider instance",
            env.id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::bootstrap::mocks::StaticBootstrap;
    use crate::port::compute_provider::mocks::ScriptedComputeProvider;
    use crate::port::dns_registrar::mocks::InMemoryDnsRegistrar;
    use crate::port::environment_repository::mocks::InMemoryEnvironmentRepository;
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::ImageSummary;

    struct Fixture {
        envs: Arc<InMemoryEnvironmentRepository>,
        compute: Arc<ScriptedComputeProvider>,
        dns: Arc<InMemoryDnsRegistrar>,
        orchestrator: Orchestrator,
        env: Environment,
    }

    fn settings() -> ProvisioningSettings {
        ProvisioningSettings {
            ssh_public_key: "ssh-ed25519 AAAA test".to_string(),
            address_poll: PollPolicy::immediate(10),
            readiness_poll: PollPolicy::immediate(30),
            ..Default::default()
        }
    }

    fn fixture(compute: ScriptedComputeProvider, dns: InMemoryDnsRegistrar) -> Fixture {
        let env = Environment::new("env-1", 1_000, "brave-tiger", "example.dev", "owner-1", "solo");
        let envs = Arc::new(InMemoryEnvironmentRepository::with(vec![env.clone()]));
        let compute = Arc::new(compute);
        let dns = Arc::new(dns);
        let orchestrator = Orchestrator::new(
            envs.clone(),
            compute.clone(),
            dns.clone(),
            Arc::new(StaticBootstrap),
            Arc::new(ManualClock::new(2_000)),
            PlanCatalog::default(),
            settings(),
        );
        Fixture {
            envs,
            compute,
            dns,
            orchestrator,
            env,
        }
    }

    #[tokio::test]
    async fn test_provision_happy_path() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_addresses(vec![None, Some("10.0.0.5")]),
            InMemoryDnsRegistrar::new(),
        );

        let outcome = fx.orchestrator.provision(&fx.env, "solo").await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Running);
        assert_eq!(outcome.ipv4.as_deref(), Some("10.0.0.5"));
        assert!(outcome.dns.unwrap().is_applied());

        let stored = fx.envs.get("env-1").unwrap();
        assert_eq!(stored.status, EnvironmentStatus::Running);
        assert_eq!(stored.provider_instance_id.as_deref(), Some("100"));
        assert_eq!(stored.ipv4.as_deref(), Some("10.0.0.5"));

        let created = fx.compute.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].product_id, "V91");
        assert_eq!(created[0].region, DEFAULT_REGION);
        assert_eq!(created[0].image_id, "img-jammy");
        assert_eq!(created[0].display_name, "brave-tiger");
        assert_eq!(created[0].period, 1);
        assert!(created[0].user_data.contains("brave-tiger"));

        let records = fx.dns.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "brave-tiger");
        assert_eq!(records[0].content, "10.0.0.5");
    }

    #[tokio::test]
    async fn test_no_address_leaves_provisioning() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_addresses(vec![None]),
            InMemoryDnsRegistrar::new(),
        );

        let outcome = fx.orchestrator.provision(&fx.env, "solo").await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Provisioning);
        assert!(outcome.ipv4.is_none());
        assert!(outcome.dns.is_none());
        assert_eq!(fx.compute.call_count("get_instance"), 10);
        assert_eq!(fx.compute.call_count("get_instance_status"), 0);

        let stored = fx.envs.get("env-1").unwrap();
        assert_eq!(stored.status, EnvironmentStatus::Provisioning);
        assert!(stored.ipv4.is_none());
        assert!(stored.provider_instance_id.is_some());
        assert!(fx.dns.records().is_empty());
    }

    #[tokio::test]
    async fn test_dns_failure_is_not_fatal() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_addresses(vec![Some("10.0.0.5")]),
            InMemoryDnsRegistrar::failing("Cloudflare API error: 500"),
        );

        let outcome = fx.orchestrator.provision(&fx.env, "team").await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Running);
        assert!(matches!(outcome.dns, Some(DnsOutcome::Degraded { .. })));
        assert_eq!(fx.envs.get("env-1").unwrap().ipv4.as_deref(), Some("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_poll_errors_are_tolerated() {
        let fx = fixture(
            ScriptedComputeProvider::new()
                .with_addresses(vec![Some("10.0.0.7")])
                .with_failing_polls(3)
                .with_statuses(vec!["provisioning", "provisioning", "running"]),
            InMemoryDnsRegistrar::new(),
        );

        let outcome = fx.orchestrator.provision(&fx.env, "solo").await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Running);
        assert_eq!(fx.compute.call_count("get_instance"), 4);
        assert_eq!(fx.compute.call_count("get_instance_status"), 3);
    }

    #[tokio::test]
    async fn test_readiness_ceiling_leaves_provisioning() {
        let fx = fixture(
            ScriptedComputeProvider::new()
                .with_addresses(vec![Some("10.0.0.5")])
                .with_statuses(vec!["installing"]),
            InMemoryDnsRegistrar::new(),
        );

        let outcome = fx.orchestrator.provision(&fx.env, "solo").await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Provisioning);
        assert_eq!(outcome.ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(fx.compute.call_count("get_instance_status"), 30);
    }

    #[tokio::test]
    async fn test_create_failure_marks_error() {
        let fx = fixture(
            ScriptedComputeProvider::new().fail_create("Contabo API error: quota exceeded"),
            InMemoryDnsRegistrar::new(),
        );

        let err = fx.orchestrator.provision(&fx.env, "solo").await.unwrap_err();
        assert!(matches!(err, AppError::ProviderApi(_)));

        let stored = fx.envs.get("env-1").unwrap();
        assert_eq!(stored.status, EnvironmentStatus::Error);
        assert!(stored.error_message.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_missing_image_marks_error() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_images(vec![ImageSummary::new("d", "debian-12")]),
            InMemoryDnsRegistrar::new(),
        );

        let err = fx.orchestrator.provision(&fx.env, "solo").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(fx.compute.call_count("create_instance"), 0);
        assert_eq!(fx.envs.get("env-1").unwrap().status, EnvironmentStatus::Error);
    }

    #[tokio::test]
    async fn test_retry_from_error_clears_message() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_addresses(vec![Some("10.0.0.5")]),
            InMemoryDnsRegistrar::new(),
        );
        let mut failed = fx.env.clone();
        let patch = failed.fail("earlier failure", 1_500).unwrap();
        fx.envs.update(&failed.id, &patch).await.unwrap();

        let outcome = fx.orchestrator.provision(&failed, "solo").await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Running);
        assert!(fx.envs.get("env-1").unwrap().error_message.is_none());
    }

    #[tokio::test]
    async fn test_provision_rejects_running_environment() {
        let fx = fixture(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new());
        let mut running = fx.env.clone();
        running.status = EnvironmentStatus::Running;

        let err = fx.orchestrator.provision(&running, "solo").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(fx.compute.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deprovision_requires_instance_before_network() {
        let fx = fixture(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new());

        let err = fx.orchestrator.deprovision(&fx.env).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(fx.compute.calls().is_empty());

        let err = fx.orchestrator.get_status(&fx.env).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_deprovision_tolerates_dns_failure() {
        let fx = fixture(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::failing("down"));
        let mut env = fx.env.clone();
        env.provider_instance_id = Some("555".to_string());
        env.status = EnvironmentStatus::Running;

        let dns = fx.orchestrator.deprovision(&env).await.unwrap();
        assert!(!dns.is_applied());
        assert_eq!(fx.compute.deleted(), vec!["555".to_string()]);
        assert_eq!(fx.envs.get("env-1").unwrap().status, EnvironmentStatus::Deleting);
    }

    #[tokio::test]
    async fn test_get_status_reads_provider() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_statuses(vec!["stopped"]),
            InMemoryDnsRegistrar::new(),
        );
        let mut env = fx.env.clone();
        env.provider_instance_id = Some("555".to_string());
        assert_eq!(fx.orchestrator.get_status(&env).await.unwrap(), "stopped");
    }

    /// Record state left behind by an attempt that died after instance creation
    async fn interrupted(fx: &Fixture, ipv4: Option<&str>) -> Environment {
        let mut env = fx.env.clone();
        let mut patch = env.attach_instance("100", 1_500).unwrap();
        if let Some(ip) = ipv4 {
            patch = patch.ipv4(ip);
            env.ipv4 = Some(ip.to_string());
        }
        fx.envs.update(&env.id, &patch).await.unwrap();
        env
    }

    #[tokio::test]
    async fn test_resume_polls_stored_instance_without_creating() {
        let fx = fixture(
            ScriptedComputeProvider::new().with_addresses(vec![Some("10.0.0.8")]),
            InMemoryDnsRegistrar::new(),
        );
        let env = interrupted(&fx, None).await;

        let outcome = fx.orchestrator.resume(&env).await.unwrap();
        assert_eq!(outcome.instance_id, "100");
        assert_eq!(outcome.status, EnvironmentStatus::Running);
        assert_eq!(fx.compute.call_count("create_instance"), 0);
        assert_eq!(fx.compute.call_count("list_images"), 0);

        let stored = fx.envs.get("env-1").unwrap();
        assert_eq!(stored.status, EnvironmentStatus::Running);
        assert_eq!(stored.ipv4.as_deref(), Some("10.0.0.8"));
        assert_eq!(fx.dns.records()[0].content, "10.0.0.8");
    }

    #[tokio::test]
    async fn test_resume_with_address_repairs_missing_dns() {
        let fx = fixture(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new());
        let env = interrupted(&fx, Some("10.0.0.5")).await;

        let outcome = fx.orchestrator.resume(&env).await.unwrap();
        assert_eq!(outcome.status, EnvironmentStatus::Running);
        assert!(outcome.dns.unwrap().is_applied());
        assert_eq!(fx.compute.call_count("get_instance"), 0);
        assert_eq!(fx.dns.records().len(), 1);

        // an intact binding is left alone
        fx.orchestrator
            .resume(&interrupted(&fx, Some("10.0.0.5")).await)
            .await
            .unwrap();
        assert_eq!(fx.dns.records().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_requires_provisioning_with_instance() {
        let fx = fixture(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new());

        let err = fx.orchestrator.resume(&fx.env).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let mut handleless = fx.env.clone();
        handleless.status = EnvironmentStatus::Provisioning;
        let err = fx.orchestrator.resume(&handleless).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(fx.compute.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unrecorded_instance_is_deleted() {
        let fx = fixture(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new());
        fx.envs.fail_updates("database is locked");

        let err = fx.orchestrator.provision(&fx.env, "solo").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(fx.compute.created().len(), 1);
        assert_eq!(fx.compute.deleted(), vec!["100".to_string()]);
    }
}
