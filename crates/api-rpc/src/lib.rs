//! JSON-RPC API Layer
//!
//! Exposes the environment service over JSON-RPC 2.0 (`env.*.v1` methods).

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
