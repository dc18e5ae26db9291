//! Model Context Protocol tool surface.
//!
//! Speaks JSON-RPC 2.0 over newline-delimited stdio: `initialize`, `ping`,
//! `tools/list` and `tools/call`. Each tool call maps onto one
//! [`SessionManager`](crate::session::SessionManager) operation. Operation
//! failures are reported as tool results with `isError` set, protocol
//! failures as JSON-RPC errors.

pub mod protocol;
mod server;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, Tool};
pub use server::{McpServer, render_error, serve};
