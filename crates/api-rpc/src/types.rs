//! RPC Request/Response Types
//!
//! Method parameters and results; field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// env.create.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentParams {
    pub owner_id: String,
    pub plan: String,
}

/// env.get.v1 / env.delete.v1 / env.live_status.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentIdParams {
    pub id: String,
}

/// env.list.v1 - every field optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvironmentsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStatusResponse {
    pub id: String,
    pub status: String,
}
