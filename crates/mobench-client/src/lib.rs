//! Agent-side client for the environment server.
//!
//! [`EnvClient`] speaks the HTTP operation surface; [`McpEnvClient`] layers
//! a tool client on top so `mcp` actions resolve against an external tool
//! server instead of the device.

pub mod env;
pub mod error;
pub mod mcp;
pub mod tools;

pub use env::{Env, EnvClient};
pub use error::ClientError;
pub use mcp::McpEnvClient;
pub use tools::{HttpToolBackend, ToolBackend, ToolClient, ToolError, ToolSpec};
