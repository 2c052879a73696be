//! JSON-RPC Server
//!
//! Serves the `env.*.v1` methods over HTTP on a local TCP port.

use crate::handler::RpcHandler;
use crate::types::{CreateEnvironmentParams, EnvironmentIdParams, ListEnvironmentsParams};
use envprov_core::application::environment::EnvironmentService;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: Arc<EnvironmentService>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("env.create.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CreateEnvironmentParams = params.parse()?;
                    handler.create(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("env.delete.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnvironmentIdParams = params.parse()?;
                    handler.delete(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("env.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnvironmentIdParams = params.parse()?;
                    handler.get(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("env.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: Option<ListEnvironmentsParams> = params.parse()?;
                    handler.list(req.unwrap_or_default()).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("env.stats.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.stats().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("env.live_status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnvironmentIdParams = params.parse()?;
                    handler.live_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (port 0 picks a free one) and the handle
    /// used to stop it.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, handle))
    }
}
