// Environment Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Environment ID (UUID v4)
pub type EnvironmentId = String;

/// Environment lifecycle status (wire-level lowercase literals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    Pending,
    Provisioning,
    Running,
    Stopped,
    Error,
    Deleting,
}

impl EnvironmentStatus {
    pub const ALL: [EnvironmentStatus; 6] = [
        EnvironmentStatus::Pending,
        EnvironmentStatus::Provisioning,
        EnvironmentStatus::Running,
        EnvironmentStatus::Stopped,
        EnvironmentStatus::Error,
        EnvironmentStatus::Deleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentStatus::Pending => "pending",
            EnvironmentStatus::Provisioning => "provisioning",
            EnvironmentStatus::Running => "running",
            EnvironmentStatus::Stopped => "stopped",
            EnvironmentStatus::Error => "error",
            EnvironmentStatus::Deleting => "deleting",
        }
    }

    /// Edges of the lifecycle graph.
    ///
    /// ```text
    /// pending ──> provisioning ──> running
    ///    │            │   ▲           │
    ///    └──> error <─┘   └── error   │
    /// pending|provisioning|running|stopped|error ──> deleting ──> (removed)
    /// ```
    pub fn can_transition_to(&self, next: EnvironmentStatus) -> bool {
        use EnvironmentStatus::*;
        matches!(
            (self, next),
            (Pending, Provisioning)
                | (Provisioning, Running)
                | (Pending, Error)
                | (Provisioning, Error)
                // fresh provisioning attempt after a failed one
                | (Error, Provisioning)
                | (Pending, Deleting)
                | (Provisioning, Deleting)
                | (Running, Deleting)
                | (Stopped, Deleting)
                | (Error, Deleting)
                | (Deleting, Deleting)
        )
    }

    /// Statuses from which an environment still awaits provisioning work
    pub fn awaits_provisioning(&self) -> bool {
        matches!(self, EnvironmentStatus::Pending | EnvironmentStatus::Error)
    }
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvironmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        EnvironmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// Environment entity: one tenant workspace backed by one instance and one DNS binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: EnvironmentId,
    pub slug: String,
    pub hostname: String,
    pub owner_id: String,
    pub plan: String,
    pub status: EnvironmentStatus,
    pub provider_instance_id: Option<String>,
    pub ipv4: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
}

impl Environment {
    /// Create a new `pending` environment
    ///
    /// `id` and `now_millis` are injected (IdProvider / TimeProvider).
    pub fn new(
        id: impl Into<String>,
        now_millis: i64,
        slug: impl Into<String>,
        domain: &str,
        owner_id: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        let slug = slug.into();
        Self {
            id: id.into(),
            hostname: format!("{}.{}", slug, domain),
            slug,
            owner_id: owner_id.into(),
            plan: plan.into(),
            status: EnvironmentStatus::Pending,
            provider_instance_id: None,
            ipv4: None,
            error_message: None,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    /// Move along the lifecycle graph, returning the patch to persist
    pub fn transition(
        &mut self,
        next: EnvironmentStatus,
        now_millis: i64,
    ) -> Result<EnvironmentPatch> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now_millis;
        Ok(EnvironmentPatch::new(now_millis).status(next))
    }

    /// Record the provider instance handle and enter `provisioning`
    ///
    /// Clears an error message left by a previous failed attempt.
    pub fn attach_instance(
        &mut self,
        instance_id: impl Into<String>,
        now_millis: i64,
    ) -> Result<EnvironmentPatch> {
        let instance_id = instance_id.into();
        let cleared = self.error_message.take().is_some();
        let mut patch = self
            .transition(EnvironmentStatus::Provisioning, now_millis)?
            .provider_instance_id(instance_id.clone());
        if cleared {
            patch = patch.clear_error_message();
        }
        self.provider_instance_id = Some(instance_id);
        Ok(patch)
    }

    /// Record the provider-assigned address (status unchanged)
    pub fn assign_address(&mut self, ipv4: impl Into<String>, now_millis: i64) -> EnvironmentPatch {
        let ipv4 = ipv4.into();
        self.ipv4 = Some(ipv4.clone());
        self.updated_at = now_millis;
        EnvironmentPatch::new(now_millis).ipv4(ipv4)
    }

    /// Enter `error` with a message
    pub fn fail(&mut self, message: impl Into<String>, now_millis: i64) -> Result<EnvironmentPatch> {
        let message = message.into();
        let patch = self
            .transition(EnvironmentStatus::Error, now_millis)?
            .error_message(message.clone());
        self.error_message = Some(message);
        Ok(patch)
    }
}

/// Partial update applied by `EnvironmentRepository::update`
///
/// `None` leaves a column untouched. `error_message: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentPatch {
    pub status: Option<EnvironmentStatus>,
    pub provider_instance_id: Option<String>,
    pub ipv4: Option<String>,
    pub error_message: Option<Option<String>>,
    pub updated_at: i64,
}

impl EnvironmentPatch {
    pub fn new(updated_at: i64) -> Self {
        Self {
            updated_at,
            ..Default::default()
        }
    }

    pub fn status(mut self, status: EnvironmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn provider_instance_id(mut self, id: impl Into<String>) -> Self {
        self.provider_instance_id = Some(id.into());
        self
    }

    pub fn ipv4(mut self, ipv4: impl Into<String>) -> Self {
        self.ipv4 = Some(ipv4.into());
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    pub fn clear_error_message(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    /// Apply this patch to an in-memory record
    pub fn apply_to(&self, env: &mut Environment) {
        if let Some(status) = self.status {
            env.status = status;
        }
        if let Some(id) = &self.provider_instance_id {
            env.provider_instance_id = Some(id.clone());
        }
        if let Some(ipv4) = &self.ipv4 {
            env.ipv4 = Some(ipv4.clone());
        }
        if let Some(message) = &self.error_message {
            env.error_message = message.clone();
        }
        env.updated_at = self.updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EnvironmentStatus::*;

    fn env() -> Environment {
        Environment::new("env-1", 1_000, "brave-tiger", "example.dev", "owner-1", "solo")
    }

    #[test]
    fn test_new_environment_is_pending() {
        let env = env();
        assert_eq!(env.status, Pending);
        assert_eq!(env.hostname, "brave-tiger.example.dev");
        assert!(env.provider_instance_id.is_none());
        assert!(env.ipv4.is_none());
        assert_eq!(env.created_at, env.updated_at);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut env = env();
        let patch = env.attach_instance("12345", 2_000).unwrap();
        assert_eq!(patch.status, Some(Provisioning));
        assert_eq!(patch.provider_instance_id.as_deref(), Some("12345"));
        assert_eq!(patch.error_message, None);

        env.assign_address("10.0.0.5", 3_000);
        env.transition(Running, 4_000).unwrap();
        assert_eq!(env.status, Running);
        assert_eq!(env.updated_at, 4_000);

        env.transition(Deleting, 5_000).unwrap();
        assert_eq!(env.status, Deleting);
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!Pending.can_transition_to(Running));
        assert!(!Running.can_transition_to(Provisioning));
        assert!(!Running.can_transition_to(Error));
        assert!(!Deleting.can_transition_to(Running));
        assert!(!Deleting.can_transition_to(Pending));
        assert!(!Error.can_transition_to(Running));

        let mut env = env();
        let err = env.transition(Running, 2_000).unwrap_err();
        assert!(err.to_string().contains("pending -> running"));
        assert_eq!(env.status, Pending);
        assert_eq!(env.updated_at, 1_000);
    }

    #[test]
    fn test_fail_then_fresh_attempt_clears_message() {
        let mut env = env();
        let patch = env.fail("Contabo API error: quota", 2_000).unwrap();
        assert_eq!(patch.status, Some(Error));
        assert_eq!(env.error_message.as_deref(), Some("Contabo API error: quota"));

        let patch = env.attach_instance("999", 3_000).unwrap();
        assert_eq!(patch.error_message, Some(None));
        assert!(env.error_message.is_none());
        assert_eq!(env.status, Provisioning);
    }

    #[test]
    fn test_deleting_is_idempotent() {
        let mut env = env();
        env.transition(Deleting, 2_000).unwrap();
        assert!(env.transition(Deleting, 3_000).is_ok());
    }

    #[test]
    fn test_status_wire_literals() {
        for status in EnvironmentStatus::ALL {
            assert_eq!(status.as_str().parse::<EnvironmentStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("PENDING".parse::<EnvironmentStatus>().is_err());
    }

    #[test]
    fn test_patch_apply() {
        let mut env = env();
        env.error_message = Some("old".to_string());
        EnvironmentPatch::new(9_000)
            .status(Provisioning)
            .ipv4("10.0.0.9")
            .clear_error_message()
            .apply_to(&mut env);

        assert_eq!(env.status, Provisioning);
        assert_eq!(env.ipv4.as_deref(), Some("10.0.0.9"));
        assert!(env.error_message.is_none());
        assert_eq!(env.updated_at, 9_000);
    }

    #[test]
    fn test_camel_case_serialization() {
        let value = serde_json::to_value(env()).unwrap();
        assert_eq!(value["ownerId"], "owner-1");
        assert_eq!(value["status"], "pending");
        assert!(value["providerInstanceId"].is_null());
    }
}
