//! Daemon settings, read from environment variables

use envprov_core::application::provisioning::orchestrator::DEFAULT_SSH_KEY_NAME;
use envprov_core::application::provisioning::ProvisioningSettings;
use envprov_core::domain::plan::DEFAULT_PRODUCT_ID;
use envprov_core::domain::PlanCatalog;
use envprov_core::error::{AppError, Result};
use envprov_infra_cloud::{
    CloudflareConfig, ContaboConfig, PasswordGrant, DEFAULT_CLOUDFLARE_API_URL,
    DEFAULT_CONTABO_API_URL, DEFAULT_CONTABO_AUTH_URL,
};
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "~/.envprov/envprov.db";
const DEFAULT_RPC_PORT: u16 = 9527;
const DEFAULT_REGION: &str = "US-east";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: String,
    pub rpc_port: u16,
    pub domain: String,
    pub contabo: ContaboConfig,
    pub cloudflare: CloudflareConfig,
    pub region: String,
    pub default_image_id: Option<String>,
    pub ssh_key_name: String,
    pub ssh_public_key: String,
    pub cloud_init_template: Option<PathBuf>,
    pub plans: PlanCatalog,
    pub provision_concurrency: usize,
    pub deprovision_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut env = Lookup {
            lookup: &lookup,
            missing: Vec::new(),
        };

        let domain = env.required("ENVPROV_DOMAIN");
        let grant = PasswordGrant {
            client_id: env.required("CONTABO_CLIENT_ID"),
            client_secret: env.required("CONTABO_CLIENT_SECRET"),
            username: env.required("CONTABO_API_USER"),
            password: env.required("CONTABO_API_PASSWORD"),
        };
        let api_token = env.required("CLOUDFLARE_API_TOKEN");
        let zone_id = env.required("CLOUDFLARE_ZONE_ID");
        let ssh_public_key = env.required("ENVPROV_SSH_PUBLIC_KEY");

        if !env.missing.is_empty() {
            return Err(AppError::Config(format!(
                "Missing required environment variables: {}",
                env.missing.join(", ")
            )));
        }

        let default_product = env
            .optional("ENVPROV_DEFAULT_PRODUCT")
            .unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string());
        let plans = PlanCatalog::parse(
            &env.optional("ENVPROV_PLAN_PRODUCTS").unwrap_or_default(),
            &default_product,
        )
        .map_err(|e| AppError::Config(format!("ENVPROV_PLAN_PRODUCTS: {}", e)))?;

        let db_path = env
            .optional("ENVPROV_DB_PATH")
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        Ok(Self {
            db_path: shellexpand::tilde(&db_path).into_owned(),
            rpc_port: env.parsed("ENVPROV_RPC_PORT", DEFAULT_RPC_PORT)?,
            contabo: ContaboConfig {
                api_url: env
                    .optional("CONTABO_API_URL")
                    .unwrap_or_else(|| DEFAULT_CONTABO_API_URL.to_string()),
                auth_url: env
                    .optional("CONTABO_AUTH_URL")
                    .unwrap_or_else(|| DEFAULT_CONTABO_AUTH_URL.to_string()),
                grant,
            },
            cloudflare: CloudflareConfig {
                api_url: env
                    .optional("CLOUDFLARE_API_URL")
                    .unwrap_or_else(|| DEFAULT_CLOUDFLARE_API_URL.to_string()),
                api_token,
                zone_id,
                domain: domain.clone(),
            },
            domain,
            region: env
                .optional("CONTABO_REGION")
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            default_image_id: env.optional("CONTABO_DEFAULT_IMAGE"),
            ssh_key_name: env
                .optional("ENVPROV_SSH_KEY_NAME")
                .unwrap_or_else(|| DEFAULT_SSH_KEY_NAME.to_string()),
            ssh_public_key,
            cloud_init_template: env.optional("ENVPROV_CLOUD_INIT_TEMPLATE").map(PathBuf::from),
            plans,
            provision_concurrency: env.parsed("ENVPROV_PROVISION_CONCURRENCY", 1)?,
            deprovision_concurrency: env.parsed("ENVPROV_DEPROVISION_CONCURRENCY", 1)?,
        })
    }

    pub fn provisioning(&self) -> ProvisioningSettings {
        ProvisioningSettings {
            region: self.region.clone(),
            default_image_id: self.default_image_id.clone(),
            ssh_key_name: self.ssh_key_name.clone(),
            ssh_public_key: self.ssh_public_key.clone(),
            ..Default::default()
        }
    }
}

struct Lookup<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
    missing: Vec<&'static str>,
}

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &'static str) -> String {
        self.optional(key).unwrap_or_else(|| {
            self.missing.push(key);
            String::new()
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        }
    }
}
