// DNS Registrar Port (Interface)

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// TTL applied to every A record
pub const DEFAULT_TTL: u32 = 300;

/// Default page size for record listings
pub const DEFAULT_PER_PAGE: u32 = 100;

/// One name-resolution record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// A-record CRUD scoped to one zone
///
/// `name` is the subdomain label (the environment slug); implementations
/// qualify it with the zone domain for lookups.
#[async_trait]
pub trait DnsRegistrar: Send + Sync {
    /// Create an A record (TTL 300, not proxied). No duplicate pre-check.
    async fn create_a_record(&self, name: &str, ipv4: &str) -> Result<DnsRecord>;

    /// First A record matching `name`
    async fn find_a_record(&self, name: &str) -> Result<Option<DnsRecord>>;

    /// Point the first match at `ipv4`; a missing record is `NotFound`
    async fn update_a_record(&self, name: &str, ipv4: &str) -> Result<DnsRecord>;

    /// Delete every match; returns the number removed (0 is not an error)
    async fn delete_a_record(&self, name: &str) -> Result<usize>;

    async fn list_records(&self, record_type: Option<&str>, per_page: u32)
        -> Result<Vec<DnsRecord>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory zone with switchable failure
    #[derive(Default)]
    pub struct InMemoryDnsRegistrar {
        records: Mutex<Vec<DnsRecord>>,
        failure: Mutex<Option<String>>,
        next_id: Mutex<u64>,
    }

    impl InMemoryDnsRegistrar {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call fails with a provider error carrying `message`
        pub fn failing(message: &str) -> Self {
            let registrar = Self::default();
            registrar.set_failure(Some(message));
            registrar
        }

        pub fn set_failure(&self, message: Option<&str>) {
            *self.failure.lock().unwrap() = message.map(str::to_string);
        }

        pub fn records(&self) -> Vec<DnsRecord> {
            self.records.lock().unwrap().clone()
        }

        fn check(&self) -> Result<()> {
            match self.failure.lock().unwrap().as_ref() {
                Some(message) => Err(AppError::ProviderApi(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl DnsRegistrar for InMemoryDnsRegistrar {
        async fn create_a_record(&self, name: &str, ipv4: &str) -> Result<DnsRecord> {
            self.check()?;
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let record = DnsRecord {
                id: format!("rec-{}", next_id),
                record_type: "A".to_string(),
                name: name.to_string(),
                content: ipv4.to_string(),
                ttl: DEFAULT_TTL,
                proxied: false,
            };
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn find_a_record(&self, name: &str) -> Result<Option<DnsRecord>> {
            self.check()?;
            Ok(self
                .records()
                .into_iter()
                .find(|r| r.record_type == "A" && r.name == name))
        }

        async fn update_a_record(&self, name: &str, ipv4: &str) -> Result<DnsRecord> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.record_type == "A" && r.name == name)
                .ok_or_else(|| AppError::NotFound(format!("DNS record {}", name)))?;
            record.content = ipv4.to_string();
            Ok(record.clone())
        }

        async fn delete_a_record(&self, name: &str) -> Result<usize> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| !(r.record_type == "A" && r.name == name));
            Ok(before - records.len())
        }

        async fn list_records(
            &self,
            record_type: Option<&str>,
            per_page: u32,
        ) -> Result<Vec<DnsRecord>> {
            self.check()?;
            Ok(self
                .records()
                .into_iter()
                .filter(|r| record_type.map_or(true, |t| r.record_type == t))
                .take(per_page as usize)
                .collect())
        }
    }
}
