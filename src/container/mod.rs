//! Container runtime adapter.
//!
//! This module is the only place that talks to the container daemon. It wraps
//! Docker/Podman via the bollard API behind the [`ContainerRuntime`] trait so
//! the session layer can be driven by any implementation of the contract.
//!
//! ## Architecture
//!
//! - [`client`]: Docker/Podman API client wrapper with connection management
//! - [`orchestrator`]: bollard-backed implementation of [`ContainerRuntime`]
//! - [`config`]: Container configuration builders for programmatic setup
//! - [`executor`]: Command execution within running containers
//! - [`archive`]: Tar archives used to upload files into containers
//! - [`reference`]: Image reference parsing and validation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sandbox_server::container::{
//!     ContainerConfig, ContainerOrchestrator, ContainerRuntime, ExecConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = ContainerOrchestrator::new().await?;
//!
//!     let config = ContainerConfig::builder()
//!         .image("alpine:latest")
//!         .cmd(vec!["tail", "-f", "/dev/null"])
//!         .working_dir("/workspace")
//!         .build()?;
//!
//!     orchestrator.ensure_image("alpine:latest").await?;
//!     let container_id = orchestrator.create_container(&config, None).await?;
//!     orchestrator.start_container(&container_id).await?;
//!
//!     let exec = ExecConfig::builder().cmd(vec!["echo", "hello"]).build();
//!     let output = orchestrator.exec(&container_id, &exec).await?;
//!     println!("{}", output.stdout);
//!
//!     orchestrator.remove_container(&container_id, true).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
mod client;
mod config;
mod executor;
mod orchestrator;
pub mod reference;

pub use client::{ContainerClient, ContainerClientConfig, RuntimeType};
pub use config::{ContainerConfig, ContainerConfigBuilder};
pub use executor::{ExecConfig, ExecConfigBuilder, ExecOutput};
pub use orchestrator::{ContainerOrchestrator, ContainerOrchestratorConfig};
pub use reference::ImageReference;

use async_trait::async_trait;
use std::time::Duration;

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    /// Container not found
    #[error("Container not found: {0}")]
    NotFound(String),

    /// Image could not be resolved locally or pulled
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Image reference rejected by validation or by the daemon
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    /// Daemon could not be reached
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    /// Container configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Container execution error
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ContainerError {
    /// Whether the daemon reported the addressed object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound(_))
            || matches!(
                self,
                ContainerError::ApiError(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                })
            )
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Primitives the session layer needs from a container runtime.
///
/// Every call is addressed by the runtime's container identifier. Implementations
/// hold no per-container state and must be safe to call concurrently for
/// distinct containers. Missing containers are reported as
/// [`ContainerError::NotFound`], missing images as
/// [`ContainerError::ImageNotFound`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Make sure `image` is available locally, pulling it if needed.
    async fn ensure_image(&self, image: &str) -> Result<()>;

    /// Create a container and return its identifier.
    async fn create_container(&self, config: &ContainerConfig, name: Option<&str>)
    -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Run a command inside a running container and collect its output.
    async fn exec(&self, container_id: &str, config: &ExecConfig) -> Result<ExecOutput>;

    /// Write `content` to `relative_path` below `target_dir` in the container.
    async fn upload_file(
        &self,
        container_id: &str,
        target_dir: &str,
        relative_path: &str,
        content: &[u8],
    ) -> Result<()>;

    /// Commit the container filesystem to `reference` and return the image id.
    async fn commit_container(&self, container_id: &str, reference: &ImageReference)
    -> Result<String>;

    /// Stop a container, waiting at most `timeout` before the daemon kills it.
    async fn stop_container(&self, container_id: &str, timeout: Duration) -> Result<()>;

    /// Remove a container.
    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()>;
}
