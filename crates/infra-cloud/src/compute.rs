// Contabo Compute Provider Gateway

use crate::credentials::{CredentialCache, PasswordGrant};
use crate::http::{build_client, failure_message, join_url};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use envprov_core::error::{AppError, Result};
use envprov_core::port::{
    ComputeProvider, CreateInstanceRequest, ImageSummary, InstanceDetail, SecretSummary,
    TimeProvider,
};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_CONTABO_API_URL: &str = "https://api.contabo.com";
pub const DEFAULT_CONTABO_AUTH_URL: &str =
    "https://auth.contabo.com/auth/realms/contabo/protocol/openid-connect/token";

#[derive(Debug, Clone)]
pub struct ContaboConfig {
    pub api_url: String,
    pub auth_url: String,
    pub grant: PasswordGrant,
}

impl ContaboConfig {
    pub fn new(grant: PasswordGrant) -> Self {
        Self {
            api_url: DEFAULT_CONTABO_API_URL.to_string(),
            auth_url: DEFAULT_CONTABO_AUTH_URL.to_string(),
            grant,
        }
    }
}

/// `{ "data": [...] }` envelope used by every Contabo response
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiImage {
    image_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInstance {
    instance_id: i64,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    name: String,
    status: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    ip_config: Option<ApiIpConfig>,
    #[serde(default)]
    created_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiIpConfig {
    v4: Option<ApiIpV4>,
}

#[derive(Debug, Deserialize)]
struct ApiIpV4 {
    ip: String,
}

impl From<ApiInstance> for InstanceDetail {
    fn from(instance: ApiInstance) -> Self {
        Self {
            instance_id: instance.instance_id.to_string(),
            display_name: instance.display_name,
            name: instance.name,
            status: instance.status,
            region: instance.region,
            product_id: instance.product_id,
            ipv4: instance
                .ip_config
                .and_then(|config| config.v4)
                .map(|v4| v4.ip)
                .filter(|ip| !ip.is_empty()),
            created_date: instance.created_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCreatedInstance {
    instance_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSecret {
    secret_id: i64,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiCreateInstance<'a> {
    product_id: &'a str,
    region: &'a str,
    image_id: &'a str,
    display_name: &'a str,
    user_data: String,
    period: u32,
    ssh_keys: &'a [i64],
}

#[derive(Debug, Serialize)]
struct ApiCreateSecret<'a> {
    name: &'a str,
    value: &'a str,
    #[serde(rename = "type")]
    secret_type: &'a str,
}

fn api_error(message: impl std::fmt::Display) -> AppError {
    AppError::ProviderApi(format!("Contabo API error: {}", message))
}

fn first<T>(envelope: DataEnvelope<T>, what: &str) -> Result<T> {
    envelope
        .data
        .into_iter()
        .next()
        .ok_or_else(|| api_error(format!("empty {} response", what)))
}

/// Contabo REST client
///
/// Every request carries a bearer token from the credential cache and a fresh
/// UUID v4 `x-request-id`. Failures are never retried here.
pub struct ContaboClient {
    http: Client,
    api_url: String,
    credentials: CredentialCache,
}

impl ContaboClient {
    pub fn new(config: ContaboConfig, time_provider: Arc<dyn TimeProvider>) -> Result<Self> {
        let http = build_client()?;
        let credentials =
            CredentialCache::new(http.clone(), config.auth_url, config.grant, time_provider);
        Ok(Self {
            http,
            api_url: config.api_url,
            credentials,
        })
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let token = self.credentials.bearer_token().await?;
        let request_id = Uuid::new_v4().to_string();

        debug!(%method, endpoint, request_id = %request_id, "Contabo API request");

        let mut request = self
            .http
            .request(method.clone(), join_url(&self.api_url, endpoint))
            .bearer_auth(token)
            .header("x-request-id", &request_id);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%method, endpoint, error = %e, "Contabo API request failed");
            api_error(e)
        })?;

        if !response.status().is_success() {
            let message = failure_message(response).await;
            warn!(%method, endpoint, error = %message, "Contabo API request failed");
            return Err(api_error(message));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.send(Method::GET, endpoint, None).await?.json().await.map_err(api_error)
    }
}

#[async_trait]
impl ComputeProvider for ContaboClient {
    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let images: DataEnvelope<ApiImage> = self.get_json("/v1/compute/images").await?;
        Ok(images
            .data
            .into_iter()
            .map(|image| ImageSummary::new(image.image_id, image.name))
            .collect())
    }

    async fn list_instances(&self) -> Result<Vec<InstanceDetail>> {
        let instances: DataEnvelope<ApiInstance> = self.get_json("/v1/compute/instances").await?;
        Ok(instances.data.into_iter().map(InstanceDetail::from).collect())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetail> {
        let instances: DataEnvelope<ApiInstance> = self
            .get_json(&format!("/v1/compute/instances/{}", instance_id))
            .await?;
        first(instances, "instance").map(InstanceDetail::from)
    }

    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String> {
        let payload = ApiCreateInstance {
            product_id: &request.product_id,
            region: &request.region,
            image_id: &request.image_id,
            display_name: &request.display_name,
            user_data: BASE64.encode(request.user_data.as_bytes()),
            period: request.period,
            ssh_keys: &request.ssh_key_ids,
        };

        let created: DataEnvelope<ApiCreatedInstance> = self
            .send(
                Method::POST,
                "/v1/compute/instances",
                Some(serde_json::to_value(&payload)?),
            )
            .await?
            .json()
            .await
            .map_err(api_error)?;
        let instance_id = first(created, "create instance")?.instance_id.to_string();

        info!(
            instance_id = %instance_id,
            display_name = %request.display_name,
            product_id = %request.product_id,
            region = %request.region,
            "Contabo instance created"
        );
        Ok(instance_id)
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        self.send(
            Method::DELETE,
            &format!("/v1/compute/instances/{}", instance_id),
            None,
        )
        .await?;
        info!(instance_id, "Contabo instance deleted");
        Ok(())
    }

    async fn list_ssh_secrets(&self) -> Result<Vec<SecretSummary>> {
        let secrets: DataEnvelope<ApiSecret> = self.get_json("/v1/secrets?type=ssh").await?;
        Ok(secrets
            .data
            .into_iter()
            .map(|secret| SecretSummary {
                secret_id: secret.secret_id,
                name: secret.name,
            })
            .collect())
    }

    async fn create_ssh_secret(&self, name: &str, public_key: &str) -> Result<i64> {
        let payload = ApiCreateSecret {
            name,
            value: public_key,
            secret_type: "ssh",
        };
        let created: DataEnvelope<ApiSecret> = self
            .send(
                Method::POST,
                "/v1/secrets",
                Some(serde_json::to_value(&payload)?),
            )
            .await?
            .json()
            .await
            .map_err(api_error)?;
        let secret = first(created, "create secret")?;

        info!(secret_id = secret.secret_id, name, "SSH secret created");
        Ok(secret.secret_id)
    }
}
