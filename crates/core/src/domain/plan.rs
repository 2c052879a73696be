// Plan Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Product id every plan resolves to unless configured otherwise
pub const DEFAULT_PRODUCT_ID: &str = "V91";

/// Subscription plan of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Solo,
    Team,
    Enterprise,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Solo, Plan::Team, Plan::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Solo => "solo",
            Plan::Team => "team",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Plan::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| DomainError::UnknownPlan(s.to_string()))
    }
}

/// Plan -> provider product lookup table
///
/// Whether tiers are meant to map to distinct products is unresolved, so the
/// table is external configuration rather than code.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCatalog {
    products: HashMap<Plan, String>,
    default_product: String,
}

impl PlanCatalog {
    /// Every plan maps to the same product
    pub fn collapsed(product_id: impl Into<String>) -> Self {
        let product_id = product_id.into();
        Self {
            products: Plan::ALL
                .into_iter()
                .map(|plan| (plan, product_id.clone()))
                .collect(),
            default_product: product_id,
        }
    }

    /// Override a single plan's product
    pub fn with_product(mut self, plan: Plan, product_id: impl Into<String>) -> Self {
        self.products.insert(plan, product_id.into());
        self
    }

    /// Parse `solo=V45,team=V46` on top of a collapsed default
    pub fn parse(mapping: &str, default_product: &str) -> Result<Self> {
        let mut catalog = Self::collapsed(default_product);
        for entry in mapping.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (plan, product) = entry.split_once('=').ok_or_else(|| {
                DomainError::ValidationError(format!(
                    "Plan mapping '{}' must look like plan=PRODUCT",
                    entry
                ))
            })?;
            let product = product.trim();
            if product.is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "Plan mapping '{}' has an empty product id",
                    entry
                )));
            }
            catalog = catalog.with_product(plan.trim().parse()?, product);
        }
        Ok(catalog)
    }

    /// Resolve a plan name; unknown names fall back to the default product
    pub fn product_for(&self, plan: &str) -> &str {
        plan.parse::<Plan>()
            .ok()
            .and_then(|plan| self.products.get(&plan))
            .map(String::as_str)
            .unwrap_or(&self.default_product)
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::collapsed(DEFAULT_PRODUCT_ID)
    }
}
