// Job handlers bound to the provisioning queues

mod deprovision;
mod provision;

pub use deprovision::{DeprovisionJobHandler, DeprovisionJobPayload};
pub use provision::{ProvisionJobHandler, ProvisionJobPayload};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::provisioning::{Orchestrator, PollPolicy, ProvisioningSettings};
    use crate::application::worker::JobHandler;
    use crate::domain::{
        Environment, EnvironmentStatus, Job, JobPayload, PlanCatalog, DEPROVISION_QUEUE,
        PROVISION_QUEUE,
    };
    use crate::port::bootstrap::mocks::StaticBootstrap;
    use crate::port::compute_provider::mocks::ScriptedComputeProvider;
    use crate::port::dns_registrar::mocks::InMemoryDnsRegistrar;
    use crate::port::environment_repository::mocks::InMemoryEnvironmentRepository;
    use crate::port::EnvironmentRepository;
    use crate::port::time_provider::mocks::ManualClock;
    use std::sync::Arc;

    struct Fixture {
        envs: Arc<InMemoryEnvironmentRepository>,
        compute: Arc<ScriptedComputeProvider>,
        dns: Arc<InMemoryDnsRegistrar>,
        provision: ProvisionJobHandler,
        deprovision: DeprovisionJobHandler,
        env: Environment,
    }

    fn fixture() -> Fixture {
        let env = Environment::new("env-1", 1_000, "brave-tiger", "example.dev", "owner-1", "solo");
        let envs = Arc::new(InMemoryEnvironmentRepository::with(vec![env.clone()]));
        let compute = Arc::new(ScriptedComputeProvider::new().with_addresses(vec![Some("10.0.0.5")]));
        let dns = Arc::new(InMemoryDnsRegistrar::new());
        let orchestrator = Arc::new(Orchestrator::new(
            envs.clone(),
            compute.clone(),
            dns.clone(),
            Arc::new(StaticBootstrap),
            Arc::new(ManualClock::new(2_000)),
            PlanCatalog::default(),
            ProvisioningSettings {
                address_poll: PollPolicy::immediate(3),
                readiness_poll: PollPolicy::immediate(3),
                ..Default::default()
            },
        ));
        Fixture {
            provision: ProvisionJobHandler::new(envs.clone(), orchestrator.clone()),
            deprovision: DeprovisionJobHandler::new(envs.clone(), orchestrator),
            envs,
            compute,
            dns,
            env,
        }
    }

    fn provision_job(env: &Environment) -> Job {
        let payload = ProvisionJobPayload {
            environment: env.clone(),
            plan: "solo".to_string(),
        };
        Job::new_test(
            PROVISION_QUEUE,
            JobPayload::new(serde_json::to_value(payload).unwrap()),
        )
    }

    fn deprovision_job(id: &str) -> Job {
        Job::new_test(
            DEPROVISION_QUEUE,
            JobPayload::new(serde_json::json!({ "environmentId": id })),
        )
    }

    #[tokio::test]
    async fn test_duplicate_provision_delivery_is_skipped() {
        let fx = fixture();
        let job = provision_job(&fx.env);

        fx.provision.handle(&job).await.unwrap();
        fx.provision.handle(&job).await.unwrap();

        assert_eq!(fx.compute.call_count("create_instance"), 1);
        assert_eq!(fx.envs.get("env-1").unwrap().status, EnvironmentStatus::Running);
    }

    #[tokio::test]
    async fn test_provision_of_removed_environment_is_skipped() {
        let fx = fixture();
        let job = provision_job(&fx.env);
        fx.envs.delete(&"env-1".to_string()).await.unwrap();

        fx.provision.handle(&job).await.unwrap();
        assert!(fx.compute.calls().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_provision_resumes_stored_instance() {
        let fx = fixture();
        let mut env = fx.env.clone();
        let patch = env.attach_instance("100", 1_500).unwrap();
        fx.envs.update(&env.id, &patch).await.unwrap();

        fx.provision.handle(&provision_job(&fx.env)).await.unwrap();

        let stored = fx.envs.get("env-1").unwrap();
        assert_eq!(stored.status, EnvironmentStatus::Running);
        assert_eq!(stored.ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(fx.dns.records().len(), 1);
        assert_eq!(fx.compute.call_count("create_instance"), 0);
        assert!(fx.compute.call_count("get_instance") >= 1);
    }

    #[tokio::test]
    async fn test_provision_failure_propagates() {
        let fx = fixture();
        let job = Job::new_test(PROVISION_QUEUE, JobPayload::new(serde_json::json!({"plan": 1})));
        assert!(fx.provision.handle(&job).await.is_err());
    }

    #[tokio::test]
    async fn test_deprovision_removes_record_and_dns() {
        let fx = fixture();
        fx.provision.handle(&provision_job(&fx.env)).await.unwrap();
        assert_eq!(fx.dns.records().len(), 1);

        fx.deprovision.handle(&deprovision_job("env-1")).await.unwrap();
        assert!(fx.envs.get("env-1").is_none());
        assert_eq!(fx.compute.deleted(), vec!["100".to_string()]);
        assert!(fx.dns.records().is_empty());

        // redelivery after removal is a no-op
        fx.deprovision.handle(&deprovision_job("env-1")).await.unwrap();
        assert_eq!(fx.compute.call_count("delete_instance"), 1);
    }

    #[tokio::test]
    async fn test_deprovision_without_instance_only_removes_record() {
        let fx = fixture();
        fx.deprovision.handle(&deprovision_job("env-1")).await.unwrap();
        assert!(fx.envs.get("env-1").is_none());
        assert!(fx.compute.calls().is_empty());
    }
}
