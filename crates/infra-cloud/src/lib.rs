// Envprov Infrastructure - Cloud Adapters
// Implements: ComputeProvider (Contabo), DnsRegistrar (Cloudflare), BootstrapRenderer (cloud-init)

mod bootstrap;
mod compute;
mod credentials;
mod dns;
mod http;

pub use bootstrap::{CloudInitTemplate, DEFAULT_CLOUD_INIT_TEMPLATE};
pub use compute::{ContaboClient, ContaboConfig, DEFAULT_CONTABO_API_URL, DEFAULT_CONTABO_AUTH_URL};
pub use credentials::{CredentialCache, PasswordGrant, TOKEN_REFRESH_MARGIN_SECS};
pub use dns::{CloudflareConfig, CloudflareDnsClient, DEFAULT_CLOUDFLARE_API_URL};
