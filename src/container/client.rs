//! Docker/Podman client wrapper.
//!
//! Provides a simplified interface to the bollard Docker API with automatic
//! connection handling, Podman fallback, and health checking.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use std::sync::Arc;
use tracing::{debug, info};

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Request timeout in seconds for socket connections
    pub timeout: u64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self { timeout: 120 }
    }
}

/// Docker/Podman API client wrapper.
///
/// Cheap to clone; all clones share one daemon connection.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
}

impl ContainerClient {
    /// Create a new container client with default configuration.
    ///
    /// Attempts to connect to Docker first, then falls back to Podman if available.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Unavailable`] if neither Docker nor Podman answer.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerClientConfig::default()).await
    }

    /// Create a new container client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn with_config(config: ContainerClientConfig) -> Result<Self> {
        let docker = Self::connect(&config)?;

        let client = Self {
            docker: Arc::new(docker),
        };

        // Verify connection works
        client.ping().await?;

        Ok(client)
    }

    /// Connect to Docker or Podman daemon.
    ///
    /// Tries multiple connection strategies in order:
    /// 1. Local defaults (DOCKER_HOST, Unix socket or Windows named pipe)
    /// 2. Rootless Podman socket
    /// 3. System Podman socket
    fn connect(config: &ContainerClientConfig) -> Result<Docker> {
        debug!("Attempting to connect to container runtime...");

        match Docker::connect_with_local_defaults() {
            Ok(docker) => {
                info!("Connected to container runtime via local defaults");
                return Ok(docker);
            }
            Err(e) => {
                debug!("Local defaults failed: {}", e);
            }
        }

        #[cfg(unix)]
        {
            let mut sockets = Vec::new();
            if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
                sockets.push(format!("unix://{}/podman/podman.sock", runtime_dir));
            }
            sockets.push("unix:///run/podman/podman.sock".to_string());

            for socket in sockets {
                debug!("Trying Podman socket: {}", socket);
                match Docker::connect_with_socket(
                    &socket,
                    config.timeout,
                    bollard::API_DEFAULT_VERSION,
                ) {
                    Ok(docker) => {
                        info!("Connected to Podman via {}", socket);
                        return Ok(docker);
                    }
                    Err(e) => {
                        debug!("Podman socket {} failed: {}", socket, e);
                    }
                }
            }
        }

        #[cfg(not(unix))]
        let _ = config;

        Err(ContainerError::Unavailable(
            "failed to connect to Docker or Podman; ensure a container runtime is installed and running"
                .to_string(),
        ))
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Unavailable`] if the daemon does not answer.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::Unavailable(format!("failed to ping container runtime: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }

    /// Get version information from the container runtime.
    ///
    /// # Errors
    ///
    /// Returns error if version query fails.
    pub async fn version(&self) -> Result<bollard::models::SystemVersion> {
        self.docker
            .version()
            .await
            .map_err(|e| ContainerError::Unavailable(format!("failed to get version: {}", e)))
    }

    /// Get the underlying Docker client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Check if the runtime is Docker or Podman.
    ///
    /// # Errors
    ///
    /// Returns error if runtime detection fails.
    pub async fn runtime_type(&self) -> Result<RuntimeType> {
        let version = self.version().await?;

        let is_podman = version
            .components
            .unwrap_or_default()
            .iter()
            .any(|c| c.name.to_lowercase().contains("podman"));

        if is_podman {
            Ok(RuntimeType::Podman)
        } else {
            Ok(RuntimeType::Docker)
        }
    }

    /// Check if an image exists locally.
    ///
    /// # Errors
    ///
    /// Returns error if image inspection fails for reasons other than not found.
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ContainerError::ApiError(e)),
        }
    }
}

/// Type of container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "Docker"),
            RuntimeType::Podman => write!(f, "Podman"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_type_display() {
        assert_eq!(RuntimeType::Docker.to_string(), "Docker");
        assert_eq!(RuntimeType::Podman.to_string(), "Podman");
    }
}
