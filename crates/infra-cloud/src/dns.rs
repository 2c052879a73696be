// Cloudflare DNS Registrar Gateway

use crate::http::{build_client, failure_message, join_url};
use async_trait::async_trait;
use envprov_core::error::{AppError, Result};
use envprov_core::port::dns_registrar::DEFAULT_TTL;
use envprov_core::port::{DnsRecord, DnsRegistrar};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

#[derive(Clone)]
pub struct CloudflareConfig {
    pub api_url: String,
    pub api_token: String,
    pub zone_id: String,
    /// Zone apex; record names are qualified as `<name>.<domain>` for lookups
    pub domain: String,
}

impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("zone_id", &self.zone_id)
            .field("domain", &self.domain)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<'a> RecordBody<'a> {
    fn a(name: &'a str, ipv4: &'a str) -> Self {
        Self {
            record_type: "A",
            name,
            content: ipv4,
            ttl: DEFAULT_TTL,
            proxied: false,
        }
    }
}

fn api_error(message: impl std::fmt::Display) -> AppError {
    AppError::ProviderApi(format!("Cloudflare API error: {}", message))
}

/// A-record management for one Cloudflare zone
pub struct CloudflareDnsClient {
    http: Client,
    config: CloudflareConfig,
}

impl CloudflareDnsClient {
    pub fn new(config: CloudflareConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            config,
        })
    }

    fn fqdn(&self, name: &str) -> String {
        format!("{}.{}", name, self.config.domain)
    }

    fn records_url(&self, suffix: &str) -> String {
        join_url(
            &self.config.api_url,
            &format!("zones/{}/dns_records{}", self.config.zone_id, suffix),
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        query: &[(&str, String)],
        body: Option<&RecordBody<'_>>,
    ) -> Result<Option<T>> {
        debug!(%method, url = %url, "Cloudflare API request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.config.api_token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response: Response = request.send().await.map_err(|e| {
            warn!(%method, url = %url, error = %e, "Cloudflare API request failed");
            api_error(e)
        })?;
        if !response.status().is_success() {
            return Err(api_error(failure_message(response).await));
        }

        let envelope: Envelope<T> = response.json().await.map_err(api_error)?;
        if !envelope.success {
            let message = envelope
                .errors
                .first()
                .map(|e| format!("{} (code {})", e.message, e.code))
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(api_error(message));
        }
        Ok(envelope.result)
    }

    async fn a_records_named(&self, name: &str) -> Result<Vec<DnsRecord>> {
        let query = [("type", "A".to_string()), ("name", self.fqdn(name))];
        Ok(self
            .call::<Vec<DnsRecord>>(Method::GET, self.records_url(""), &query, None)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl DnsRegistrar for CloudflareDnsClient {
    async fn create_a_record(&self, name: &str, ipv4: &str) -> Result<DnsRecord> {
        // the zone appends its apex to a bare label
        let record = self
            .call::<DnsRecord>(
                Method::POST,
                self.records_url(""),
                &[],
                Some(&RecordBody::a(name, ipv4)),
            )
            .await?
            .ok_or_else(|| api_error("create returned no record"))?;

        info!(name = %self.fqdn(name), ipv4, record_id = %record.id, "DNS A record created");
        Ok(record)
    }

    async fn find_a_record(&self, name: &str) -> Result<Option<DnsRecord>> {
        Ok(self.a_records_named(name).await?.into_iter().next())
    }

    async fn update_a_record(&self, name: &str, ipv4: &str) -> Result<DnsRecord> {
        let existing = self
            .find_a_record(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("DNS A record {}", self.fqdn(name))))?;

        let record = self
            .call::<DnsRecord>(
                Method::PUT,
                self.records_url(&format!("/{}", existing.id)),
                &[],
                Some(&RecordBody::a(name, ipv4)),
            )
            .await?
            .ok_or_else(|| api_error("update returned no record"))?;

        info!(name = %self.fqdn(name), ipv4, "DNS A record updated");
        Ok(record)
    }

    async fn delete_a_record(&self, name: &str) -> Result<usize> {
        let records = self.a_records_named(name).await?;
        if records.is_empty() {
            warn!(name = %self.fqdn(name), "No DNS A record to delete");
            return Ok(0);
        }

        for record in &records {
            self.call::<serde_json::Value>(
                Method::DELETE,
                self.records_url(&format!("/{}", record.id)),
                &[],
                None,
            )
            .await?;
            info!(name = %self.fqdn(name), record_id = %record.id, "DNS A record deleted");
        }
        Ok(records.len())
    }

    async fn list_records(
        &self,
        record_type: Option<&str>,
        per_page: u32,
    ) -> Result<Vec<DnsRecord>> {
        let mut query = vec![("per_page", per_page.to_string())];
        if let Some(record_type) = record_type {
            query.push(("type", record_type.to_string()));
        }
        Ok(self
            .call::<Vec<DnsRecord>>(Method::GET, self.records_url(""), &query, None)
            .await?
            .unwrap_or_default())
    }
}
