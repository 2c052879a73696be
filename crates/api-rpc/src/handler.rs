//! RPC Method Handlers
//!
//! Thin translation between wire types and the environment service.

use crate::error::to_rpc_error;
use crate::types::{
    CreateEnvironmentParams, EnvironmentIdParams, ListEnvironmentsParams, LiveStatusResponse,
};
use envprov_core::application::environment::{
    CreateEnvironmentRequest, EnvironmentPage, EnvironmentService, EnvironmentStats,
};
use envprov_core::domain::{Environment, EnvironmentStatus};
use envprov_core::error::AppError;
use envprov_core::port::environment_repository::DEFAULT_PAGE_SIZE;
use envprov_core::port::{EnvironmentFilter, Pagination};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::debug;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<EnvironmentService>,
}

impl RpcHandler {
    pub fn new(service: Arc<EnvironmentService>) -> Self {
        Self { service }
    }

    /// env.create.v1
    pub async fn create(&self, params: CreateEnvironmentParams) -> RpcResult<Environment> {
        self.service
            .create(CreateEnvironmentRequest {
                owner_id: params.owner_id,
                plan: params.plan,
            })
            .await
            .map_err(to_rpc_error)
    }

    /// env.delete.v1
    pub async fn delete(&self, params: EnvironmentIdParams) -> RpcResult<Environment> {
        self.service.delete(&params.id).await.map_err(to_rpc_error)
    }

    /// env.get.v1
    pub async fn get(&self, params: EnvironmentIdParams) -> RpcResult<Environment> {
        self.service.get(&params.id).await.map_err(to_rpc_error)
    }

    /// env.list.v1
    pub async fn list(&self, params: ListEnvironmentsParams) -> RpcResult<EnvironmentPage> {
        let status = params
            .status
            .as_deref()
            .map(str::parse::<EnvironmentStatus>)
            .transpose()
            .map_err(|e| to_rpc_error(AppError::Validation(e.to_string())))?;

        let filter = EnvironmentFilter {
            owner_id: params.owner_id,
            status,
            search: params.search.filter(|s| !s.trim().is_empty()),
        };
        let pagination = Pagination::new(
            params.skip.unwrap_or(0),
            params.take.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        debug!(?filter, ?pagination, "Listing environments");

        self.service
            .list(&filter, pagination)
            .await
            .map_err(to_rpc_error)
    }

    /// env.stats.v1
    pub async fn stats(&self) -> RpcResult<EnvironmentStats> {
        self.service.stats().await.map_err(to_rpc_error)
    }

    /// env.live_status.v1
    pub async fn live_status(&self, params: EnvironmentIdParams) -> RpcResult<LiveStatusResponse> {
        let status = self
            .service
            .live_status(&params.id)
            .await
            .map_err(to_rpc_error)?;
        Ok(LiveStatusResponse {
            id: params.id,
            status,
        })
    }
}
