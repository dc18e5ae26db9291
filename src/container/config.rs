//! Container configuration builders.
//!
//! Provides a fluent API for building session container configurations.

use crate::container::{ContainerError, Result};
use bollard::service::HostConfig;
use std::collections::HashMap;

/// Container configuration builder.
pub struct ContainerConfigBuilder {
    image: Option<String>,
    cmd: Option<Vec<String>>,
    working_dir: Option<String>,
    env: Vec<String>,
    labels: HashMap<String, String>,
    binds: Vec<String>,
    auto_remove: bool,
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerConfigBuilder {
    /// Create a new container configuration builder.
    pub fn new() -> Self {
        Self {
            image: None,
            cmd: None,
            working_dir: None,
            env: Vec::new(),
            labels: HashMap::new(),
            binds: Vec::new(),
            auto_remove: false,
        }
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the command to run in the container.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Set the working directory in the container.
    pub fn working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Add a label to the container.
    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a volume bind mount (host_path:container_path[:mode]).
    pub fn bind<S: Into<String>>(mut self, bind: S) -> Self {
        self.binds.push(bind.into());
        self
    }

    /// Let the runtime delete the container as soon as it stops.
    pub fn auto_remove(mut self, enable: bool) -> Self {
        self.auto_remove = enable;
        self
    }

    /// Build the container configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the image is missing or empty.
    pub fn build(self) -> Result<ContainerConfig> {
        let image = self
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| ContainerError::ConfigError("Image is required".to_string()))?;

        let host_config = HostConfig {
            binds: if self.binds.is_empty() {
                None
            } else {
                Some(self.binds)
            },
            auto_remove: Some(self.auto_remove),
            ..Default::default()
        };

        Ok(ContainerConfig {
            image,
            cmd: self.cmd,
            working_dir: self.working_dir,
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env)
            },
            labels: if self.labels.is_empty() {
                None
            } else {
                Some(self.labels)
            },
            host_config,
        })
    }
}

/// Container configuration.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Image name
    pub image: String,
    /// Command to run
    pub cmd: Option<Vec<String>>,
    /// Working directory
    pub working_dir: Option<String>,
    /// Environment variables
    pub env: Option<Vec<String>>,
    /// Labels
    pub labels: Option<HashMap<String, String>>,
    /// Host configuration
    pub host_config: HostConfig,
}

impl ContainerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::new()
    }

    /// Get the image name.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&str> {
        self.working_dir.as_deref()
    }

    /// Get the bind mounts.
    pub fn binds(&self) -> &[String] {
        self.host_config.binds.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_config() {
        let config = ContainerConfig::builder()
            .image("alpine:latest")
            .cmd(vec!["tail", "-f", "/dev/null"])
            .working_dir("/workspace")
            .build()
            .unwrap();

        assert_eq!(config.image(), "alpine:latest");
        assert_eq!(config.working_dir(), Some("/workspace"));
        assert_eq!(config.host_config.auto_remove, Some(false));
    }

    #[test]
    fn test_labels_and_env() {
        let config = ContainerConfig::builder()
            .image("alpine:latest")
            .env("FOO", "bar")
            .label("sandbox-server.managed", "true")
            .build()
            .unwrap();

        assert_eq!(config.env.unwrap(), vec!["FOO=bar".to_string()]);
        assert_eq!(
            config.labels.unwrap().get("sandbox-server.managed"),
            Some(&"true".to_string())
        );
    }

    #[test]
    fn test_volume_binds() {
        let config = ContainerConfig::builder()
            .image("alpine:latest")
            .bind("/host/path:/workspace:rw")
            .auto_remove(true)
            .build()
            .unwrap();

        assert_eq!(config.binds(), &["/host/path:/workspace:rw".to_string()]);
        assert_eq!(config.host_config.auto_remove, Some(true));
    }

    #[test]
    fn test_missing_image_error() {
        let result = ContainerConfig::builder().cmd(vec!["echo"]).build();
        assert!(matches!(result, Err(ContainerError::ConfigError(_))));

        let result = ContainerConfig::builder().image("  ").build();
        assert!(matches!(result, Err(ContainerError::ConfigError(_))));
    }
}
