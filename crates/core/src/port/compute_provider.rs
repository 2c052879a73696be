// Compute Provider Port (Interface)

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Instance status literal reported once an instance is ready
pub const INSTANCE_STATUS_RUNNING: &str = "running";

/// OS image offered by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub image_id: String,
    pub name: String,
}

impl ImageSummary {
    pub fn new(image_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            name: name.into(),
        }
    }
}

/// Provider view of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetail {
    pub instance_id: String,
    pub display_name: String,
    pub name: String,
    pub status: String,
    pub region: String,
    pub product_id: String,
    pub ipv4: Option<String>,
    pub created_date: Option<String>,
}

/// Instance creation parameters
///
/// `user_data` is the raw bootstrap script; gateways apply any wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInstanceRequest {
    pub product_id: String,
    pub region: String,
    pub image_id: String,
    pub display_name: String,
    pub user_data: String,
    pub period: u32,
    pub ssh_key_ids: Vec<i64>,
}

/// Stored credential at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSummary {
    pub secret_id: i64,
    pub name: String,
}

/// Compute provider gateway
///
/// Implementations never retry; failures surface as
/// `AppError::ProviderApi` (or `AppError::Authentication` for credential exchange).
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    async fn list_instances(&self) -> Result<Vec<InstanceDetail>>;

    async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetail>;

    /// Returns the provider's instance handle
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String>;

    async fn delete_instance(&self, instance_id: &str) -> Result<()>;

    async fn list_ssh_secrets(&self) -> Result<Vec<SecretSummary>>;

    async fn create_ssh_secret(&self, name: &str, public_key: &str) -> Result<i64>;

    /// Reuse the secret named `name`, creating it on first use
    async fn get_or_create_ssh_secret(&self, name: &str, public_key: &str) -> Result<i64> {
        let existing = self.list_ssh_secrets().await?;
        if let Some(secret) = existing.into_iter().find(|s| s.name == name) {
            return Ok(secret.secret_id);
        }
        self.create_ssh_secret(name, public_key).await
    }

    /// Live status string of an instance
    async fn get_instance_status(&self, instance_id: &str) -> Result<String> {
        Ok(self.get_instance(instance_id).await?.status)
    }
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Script {
        images: Vec<ImageSummary>,
        secrets: Vec<SecretSummary>,
        next_instance_id: i64,
        created: Vec<CreateInstanceRequest>,
        deleted: Vec<String>,
        addresses: VecDeque<Option<String>>,
        statuses: VecDeque<String>,
        failing_polls: usize,
        fail_create: Option<String>,
        fail_list_images: Option<String>,
        fail_delete: Option<String>,
        calls: Vec<String>,
    }

    /// Scripted compute provider
    ///
    /// Address polls (`get_instance`) and readiness polls (`get_instance_status`)
    /// consume their own scripts; the last entry repeats once a script runs dry.
    pub struct ScriptedComputeProvider {
        script: Mutex<Script>,
    }

    impl Default for ScriptedComputeProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScriptedComputeProvider {
        pub fn new() -> Self {
            Self {
                script: Mutex::new(Script {
                    images: vec![ImageSummary::new("img-jammy", "ubuntu-22.04")],
                    next_instance_id: 100,
                    statuses: VecDeque::from(vec![INSTANCE_STATUS_RUNNING.to_string()]),
                    ..Default::default()
                }),
            }
        }

        pub fn with_images(self, images: Vec<ImageSummary>) -> Self {
            self.script.lock().unwrap().images = images;
            self
        }

        pub fn with_secret(self, secret_id: i64, name: &str) -> Self {
            self.script.lock().unwrap().secrets.push(SecretSummary {
                secret_id,
                name: name.to_string(),
            });
            self
        }

        /// Successive `get_instance` address results
        pub fn with_addresses(self, addresses: Vec<Option<&str>>) -> Self {
            self.script.lock().unwrap().addresses =
                addresses.into_iter().map(|a| a.map(str::to_string)).collect();
            self
        }

        /// Successive `get_instance_status` results
        pub fn with_statuses(self, statuses: Vec<&str>) -> Self {
            self.script.lock().unwrap().statuses =
                statuses.into_iter().map(str::to_string).collect();
            self
        }

        /// The first `n` polls of either kind fail
        pub fn with_failing_polls(self, n: usize) -> Self {
            self.script.lock().unwrap().failing_polls = n;
            self
        }

        pub fn fail_create(self, message: &str) -> Self {
            self.script.lock().unwrap().fail_create = Some(message.to_string());
            self
        }

        pub fn fail_list_images(self, message: &str) -> Self {
            self.script.lock().unwrap().fail_list_images = Some(message.to_string());
            self
        }

        pub fn fail_delete(self, message: &str) -> Self {
            self.script.lock().unwrap().fail_delete = Some(message.to_string());
            self
        }

        pub fn created(&self) -> Vec<CreateInstanceRequest> {
            self.script.lock().unwrap().created.clone()
        }

        pub fn deleted(&self) -> Vec<String> {
            self.script.lock().unwrap().deleted.clone()
        }

        pub fn secrets(&self) -> Vec<SecretSummary> {
            self.script.lock().unwrap().secrets.clone()
        }

        /// Every operation invoked, in order
        pub fn calls(&self) -> Vec<String> {
            self.script.lock().unwrap().calls.clone()
        }

        pub fn call_count(&self, op: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == op).count()
        }

        fn record(&self, op: &str) {
            self.script.lock().unwrap().calls.push(op.to_string());
        }

        fn poll_failure(&self) -> Option<AppError> {
            let mut script = self.script.lock().unwrap();
            if script.failing_polls > 0 {
                script.failing_polls -= 1;
                return Some(AppError::ProviderApi(
                    "Contabo API error: poll unavailable".to_string(),
                ));
            }
            None
        }

        fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        }
    }

    #[async_trait]
    impl ComputeProvider for ScriptedComputeProvider {
        async fn list_images(&self) -> Result<Vec<ImageSummary>> {
            self.record("list_images");
            let script = self.script.lock().unwrap();
            if let Some(message) = &script.fail_list_images {
                return Err(AppError::ProviderApi(message.clone()));
            }
            Ok(script.images.clone())
        }

        async fn list_instances(&self) -> Result<Vec<InstanceDetail>> {
            self.record("list_instances");
            Ok(Vec::new())
        }

        async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetail> {
            self.record("get_instance");
            if let Some(err) = self.poll_failure() {
                return Err(err);
            }
            let mut script = self.script.lock().unwrap();
            let ipv4 = Self::next(&mut script.addresses).flatten();
            Ok(InstanceDetail {
                instance_id: instance_id.to_string(),
                display_name: String::new(),
                name: format!("vmi{}", instance_id),
                status: "provisioning".to_string(),
                region: "US-east".to_string(),
                product_id: "V91".to_string(),
                ipv4,
                created_date: None,
            })
        }

        async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String> {
            self.record("create_instance");
            let mut script = self.script.lock().unwrap();
            if let Some(message) = &script.fail_create {
                return Err(AppError::ProviderApi(message.clone()));
            }
            script.created.push(request.clone());
            let id = script.next_instance_id;
            script.next_instance_id += 1;
            Ok(id.to_string())
        }

        async fn delete_instance(&self, instance_id: &str) -> Result<()> {
            self.record("delete_instance");
            let mut script = self.script.lock().unwrap();
            if let Some(message) = &script.fail_delete {
                return Err(AppError::ProviderApi(message.clone()));
            }
            script.deleted.push(instance_id.to_string());
            Ok(())
        }

        async fn list_ssh_secrets(&self) -> Result<Vec<SecretSummary>> {
            self.record("list_ssh_secrets");
            Ok(self.secrets())
        }

        async fn create_ssh_secret(&self, name: &str, _public_key: &str) -> Result<i64> {
            self.record("create_ssh_secret");
            let mut script = self.script.lock().unwrap();
            let secret_id = 9000 + script.secrets.len() as i64;
            script.secrets.push(SecretSummary {
                secret_id,
                name: name.to_string(),
            });
            Ok(secret_id)
        }

        async fn get_instance_status(&self, _instance_id: &str) -> Result<String> {
            self.record("get_instance_status");
            if let Some(err) = self.poll_failure() {
                return Err(err);
            }
            let mut script = self.script.lock().unwrap();
            Self::next(&mut script.statuses)
                .ok_or_else(|| AppError::ProviderApi("no status scripted".to_string()))
        }
    }
}
