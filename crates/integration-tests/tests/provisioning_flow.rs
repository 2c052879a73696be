//! Provisioning lifecycle against SQLite stores and scripted provider adapters
//!
//! Covers create -> provision -> running, the partial outcomes the
//! orchestrator tolerates (no address, DNS outage) and teardown.

mod common;

use common::{wait_for_terminal, Harness, TEST_DOMAIN};
use envprov_core::application::{CreateEnvironmentRequest, DnsOutcome, JobEvent};
use envprov_core::domain::EnvironmentStatus;
use envprov_core::port::compute_provider::mocks::ScriptedComputeProvider;
use envprov_core::port::dns_registrar::mocks::InMemoryDnsRegistrar;
use envprov_core::port::DnsRegistrar;
use envprov_core::AppError;

#[tokio::test]
async fn test_create_runs_to_running_with_dns() {
    let harness = Harness::new(
        ScriptedComputeProvider::new().with_addresses(vec![None, Some("10.0.0.7")]),
        InMemoryDnsRegistrar::new(),
    )
    .await;
    let mut events = harness.queue.subscribe();
    harness.start_workers(1, 1);

    let env = harness
        .service()
        .create(CreateEnvironmentRequest {
            owner_id: "owner-42".to_string(),
            plan: "team".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(env.status, EnvironmentStatus::Pending);
    assert_eq!(env.hostname, format!("{}.{}", env.slug, TEST_DOMAIN));

    let done = wait_for_terminal(&mut events, 1).await;
    assert!(matches!(done[0], JobEvent::Completed { .. }));

    let stored = harness.stored(&env.id).await.unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Running);
    assert_eq!(stored.ipv4.as_deref(), Some("10.0.0.7"));
    assert_eq!(stored.provider_instance_id.as_deref(), Some("100"));
    assert!(stored.error_message.is_none());

    let created = harness.compute.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].display_name, env.slug);
    assert_eq!(created[0].product_id, "V91");
    assert_eq!(created[0].image_id, "img-jammy");

    let record = harness.dns.find_a_record(&env.slug).await.unwrap().unwrap();
    assert_eq!(record.content, "10.0.0.7");

    harness.queue.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_address_within_budget_stays_provisioning() {
    let harness = Harness::new(
        ScriptedComputeProvider::new().with_addresses(vec![None]),
        InMemoryDnsRegistrar::new(),
    )
    .await;
    let env = harness.seed("env-brave", "brave-tiger").await;

    let outcome = harness.orchestrator.provision(&env, "solo").await.unwrap();
    assert_eq!(outcome.status, EnvironmentStatus::Provisioning);
    assert!(outcome.ipv4.is_none());
    assert!(outcome.dns.is_none());

    let stored = harness.stored("env-brave").await.unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Provisioning);
    assert!(stored.ipv4.is_none());
    assert_eq!(stored.provider_instance_id.as_deref(), Some("100"));
    assert_eq!(harness.compute.call_count("get_instance"), 3);
    assert!(harness.dns.records().is_empty());
}

#[tokio::test]
async fn test_dns_outage_still_reaches_running() {
    let harness = Harness::new(
        ScriptedComputeProvider::new().with_addresses(vec![Some("10.0.0.5")]),
        InMemoryDnsRegistrar::failing("Cloudflare API error: zone locked"),
    )
    .await;
    let env = harness.seed("env-dns", "calm-otter").await;

    let outcome = harness.orchestrator.provision(&env, "solo").await.unwrap();
    assert_eq!(outcome.status, EnvironmentStatus::Running);
    assert_eq!(outcome.ipv4.as_deref(), Some("10.0.0.5"));
    match outcome.dns {
        Some(DnsOutcome::Degraded { message }) => assert!(message.contains("zone locked")),
        other => panic!("expected degraded DNS, got {:?}", other),
    }

    let stored = harness.stored("env-dns").await.unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Running);
    assert_eq!(stored.ipv4.as_deref(), Some("10.0.0.5"));
}

#[tokio::test]
async fn test_create_failure_records_error_then_dead_letters() {
    let harness = Harness::new(
        ScriptedComputeProvider::new().fail_create("Contabo API error: quota exceeded"),
        InMemoryDnsRegistrar::new(),
    )
    .await;
    let mut events = harness.queue.subscribe();
    harness.start_workers(1, 1);

    let env = harness
        .service()
        .create(CreateEnvironmentRequest {
            owner_id: "owner-1".to_string(),
            plan: "solo".to_string(),
        })
        .await
        .unwrap();

    let done = wait_for_terminal(&mut events, 1).await;
    match &done[0] {
        JobEvent::Failed {
            attempts,
            dead_lettered,
            error,
            ..
        } => {
            assert_eq!(*attempts, 3);
            assert!(*dead_lettered);
            assert!(error.contains("quota exceeded"));
        }
        other => panic!("expected dead-letter, got {:?}", other),
    }

    let stored = harness.stored(&env.id).await.unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Error);
    assert!(stored
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("quota exceeded"));
    assert!(stored.provider_instance_id.is_none());
    assert_eq!(harness.compute.call_count("create_instance"), 3);

    let counts = harness.queue.counts(envprov_core::domain::PROVISION_QUEUE).await.unwrap();
    assert_eq!(counts.dead_lettered, 1);
    assert_eq!(counts.queued, 0);

    harness.queue.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delete_tears_down_instance_dns_and_record() {
    let harness = Harness::new(
        ScriptedComputeProvider::new().with_addresses(vec![Some("10.0.0.9")]),
        InMemoryDnsRegistrar::new(),
    )
    .await;
    let mut events = harness.queue.subscribe();
    harness.start_workers(1, 1);
    let service = harness.service();

    let env = service
        .create(CreateEnvironmentRequest {
            owner_id: "owner-1".to_string(),
            plan: "enterprise".to_string(),
        })
        .await
        .unwrap();
    wait_for_terminal(&mut events, 1).await;
    assert_eq!(harness.dns.records().len(), 1);

    let deleting = service.delete(&env.id).await.unwrap();
    assert_eq!(deleting.status, EnvironmentStatus::Deleting);

    // a repeated delete is a no-op and enqueues nothing
    let again = service.delete(&env.id).await.unwrap();
    assert_eq!(again.status, EnvironmentStatus::Deleting);

    let done = wait_for_terminal(&mut events, 1).await;
    assert!(matches!(done[0], JobEvent::Completed { .. }));

    assert!(harness.stored(&env.id).await.is_none());
    assert_eq!(harness.compute.deleted(), vec!["100".to_string()]);
    assert!(harness.dns.records().is_empty());

    let counts = harness
        .queue
        .counts(envprov_core::domain::DEPROVISION_QUEUE)
        .await
        .unwrap();
    assert_eq!(counts.completed, 1);

    harness.queue.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deprovision_without_instance_is_invalid_state() {
    let harness = Harness::new(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new()).await;
    let env = harness.seed("env-bare", "quiet-heron").await;

    let err = harness.orchestrator.deprovision(&env).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert!(harness.compute.deleted().is_empty());
    assert_eq!(
        harness.stored("env-bare").await.unwrap().status,
        EnvironmentStatus::Pending
    );
}

#[tokio::test]
async fn test_delete_before_provisioning_removes_record_only() {
    let harness = Harness::new(ScriptedComputeProvider::new(), InMemoryDnsRegistrar::new()).await;
    let env = harness.seed("env-early", "shy-lynx").await;
    let service = harness.service();

    service.delete(&env.id).await.unwrap();

    let mut events = harness.queue.subscribe();
    harness.start_workers(1, 1);
    wait_for_terminal(&mut events, 1).await;

    assert!(harness.stored("env-early").await.is_none());
    assert_eq!(harness.compute.call_count("delete_instance"), 0);

    harness.queue.shutdown().await.unwrap();
}
