//! # Sandbox Server
//!
//! An MCP server that lets an external agent provision, use, snapshot and tear
//! down isolated Docker containers. Each container is a *session* with a host
//! workspace bound at `/workspace`.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: Runtime client adapter over Docker/Podman (bollard)
//! - **[`session`]**: Session registry, workspace provisioning, downloads,
//!   Dockerfile synthesis and the lifecycle manager tying them together
//! - **[`mcp`]**: JSON-RPC/MCP tool surface over stdio
//! - **[`cli`]**: Argument parsing and configuration discovery
//! - **[`env`]**: Fixed paths, names and labels
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sandbox_server::container::ContainerOrchestrator;
//! use sandbox_server::session::{
//!     CreateOptions, Persistence, ResourceFetcher, SessionManager, SessionManagerConfig,
//!     SessionRegistry, WorkspaceProvisioner,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = SessionManager::new(
//!         Arc::new(ContainerOrchestrator::new().await?),
//!         Arc::new(SessionRegistry::new()),
//!         WorkspaceProvisioner::new(std::env::temp_dir()),
//!         ResourceFetcher::new(Duration::from_secs(60), "sandbox-server")?,
//!         SessionManagerConfig::default(),
//!     );
//!
//!     let handle = manager
//!         .create(CreateOptions::new("alpine:latest", Persistence::Transient))
//!         .await?;
//!     let output = manager.execute(&handle, "echo hi").await?;
//!     println!("{}", output.stdout);
//!
//!     manager.exit(&handle, false).await?;
//!     Ok(())
//! }
//! ```

/// Command line parsing and configuration discovery.
pub mod cli;

/// Container runtime adapter.
///
/// Wraps Docker/Podman through bollard behind the
/// [`ContainerRuntime`](container::ContainerRuntime) trait.
pub mod container;

pub mod env;

/// MCP tool surface.
pub mod mcp;

/// Session lifecycle management.
///
/// Tracks which containers exist, what they were created with, and sequences
/// create/write/execute/save/export/exit against the runtime.
pub mod session;

pub use cli::ServerConfig;
pub use container::{ContainerOrchestrator, ContainerRuntime};
pub use mcp::McpServer;
pub use session::{SessionError, SessionHandle, SessionManager};
