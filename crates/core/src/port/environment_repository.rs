// Environment Repository Port (Interface)

use crate::domain::{Environment, EnvironmentId, EnvironmentPatch, EnvironmentStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size for listings
pub const MAX_PAGE_SIZE: i64 = 100;

/// Listing filter; every field narrows the result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentFilter {
    pub owner_id: Option<String>,
    pub status: Option<EnvironmentStatus>,
    /// Substring match on slug, hostname or owner id
    pub search: Option<String>,
}

impl EnvironmentFilter {
    pub fn matches(&self, env: &Environment) -> bool {
        if let Some(owner) = &self.owner_id {
            if &env.owner_id != owner {
                return false;
            }
        }
        if let Some(status) = self.status {
            if env.status != status {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            return env.slug.to_lowercase().contains(&term)
                || env.hostname.to_lowercase().contains(&term)
                || env.owner_id.to_lowercase().contains(&term);
        }
        true
    }
}

/// Offset pagination, newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: i64,
    pub take: i64,
}

impl Pagination {
    /// Clamp to `skip >= 0` and `1 <= take <= MAX_PAGE_SIZE`
    pub fn new(skip: i64, take: i64) -> Self {
        Self {
            skip: skip.max(0),
            take: take.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// Repository interface for Environment persistence
#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    /// Insert a new environment (slug conflicts surface as `AppError::Conflict`)
    async fn insert(&self, env: &Environment) -> Result<()>;

    async fn find_by_id(&self, id: &EnvironmentId) -> Result<Option<Environment>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Environment>>;

    /// Unconditional partial overwrite; `NotFound` if the record is gone
    async fn update(&self, id: &EnvironmentId, patch: &EnvironmentPatch) -> Result<()>;

    /// Remove the record; returns whether a row existed
    async fn delete(&self, id: &EnvironmentId) -> Result<bool>;

    async fn count(&self, filter: &EnvironmentFilter) -> Result<i64>;

    async fn list(
        &self,
        filter: &EnvironmentFilter,
        pagination: Pagination,
    ) -> Result<Vec<Environment>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory environment repository
    #[derive(Default)]
    pub struct InMemoryEnvironmentRepository {
        envs: Mutex<Vec<Environment>>,
        fail_updates: Mutex<Option<String>>,
    }

    impl InMemoryEnvironmentRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed records directly
        pub fn with(envs: Vec<Environment>) -> Self {
            Self {
                envs: Mutex::new(envs),
                fail_updates: Mutex::new(None),
            }
        }

        /// Make every subsequent `update` fail with a database error
        pub fn fail_updates(&self, message: impl Into<String>) {
            *self.fail_updates.lock().unwrap() = Some(message.into());
        }

        pub fn get(&self, id: &str) -> Option<Environment> {
            self.envs.lock().unwrap().iter().find(|e| e.id == id).cloned()
        }
    }

    #[async_trait]
    impl EnvironmentRepository for InMemoryEnvironmentRepository {
        async fn insert(&self, env: &Environment) -> Result<()> {
            let mut envs = self.envs.lock().unwrap();
            if envs.iter().any(|e| e.slug == env.slug) {
                return Err(AppError::Conflict(format!("Slug {} already taken", env.slug)));
            }
            envs.push(env.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &EnvironmentId) -> Result<Option<Environment>> {
            Ok(self.get(id))
        }

        async fn find_by_slug(&self, slug: &str) -> Result<Option<Environment>> {
            Ok(self
                .envs
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.slug == slug)
                .cloned())
        }

        async fn update(&self, id: &EnvironmentId, patch: &EnvironmentPatch) -> Result<()> {
            if let Some(message) = self.fail_updates.lock().unwrap().clone() {
                return Err(AppError::Database(message));
            }
            let mut envs = self.envs.lock().unwrap();
            let env = envs
                .iter_mut()
                .find(|e| &e.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Environment {}", id)))?;
            patch.apply_to(env);
            Ok(())
        }

        async fn delete(&self, id: &EnvironmentId) -> Result<bool> {
            let mut envs = self.envs.lock().unwrap();
            let before = envs.len();
            envs.retain(|e| &e.id != id);
            Ok(envs.len() != before)
        }

        async fn count(&self, filter: &EnvironmentFilter) -> Result<i64> {
            Ok(self
                .envs
                .lock()
                .unwrap()
                .iter()
                .filter(|e| filter.matches(e))
                .count() as i64)
        }

        async fn list(
            &self,
            filter: &EnvironmentFilter,
            pagination: Pagination,
        ) -> Result<Vec<Environment>> {
            let mut matched: Vec<Environment> = self
                .envs
                .lock()
                .unwrap()
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect();
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            Ok(matched
                .into_iter()
                .skip(pagination.skip as usize)
                .take(pagination.take as usize)
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let env = Environment::new("e1", 1, "brave-tiger", "example.dev", "Owner-7", "solo");
        let filter = EnvironmentFilter {
            search: Some("TIGER".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&env));

        let filter = EnvironmentFilter {
            search: Some("owner-7".to_string()),
            status: Some(EnvironmentStatus::Running),
            ..Default::default()
        };
        assert!(!filter.matches(&env));
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(Pagination::new(-5, 0), Pagination { skip: 0, take: 1 });
        assert_eq!(Pagination::new(10, 500).take, MAX_PAGE_SIZE);
    }
}
