//! Container lifecycle orchestration.
//!
//! bollard-backed implementation of [`ContainerRuntime`]: image pulls,
//! container creation and startup, exec, file upload, commit and cleanup.

use crate::container::{
    ContainerClient, ContainerConfig, ContainerError, ContainerRuntime, ExecConfig, ExecOutput,
    ImageReference, Result, archive, executor, reference,
};
use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info};

/// Container orchestrator configuration.
#[derive(Debug, Clone)]
pub struct ContainerOrchestratorConfig {
    /// Automatically pull images if not present
    pub auto_pull: bool,
    /// Container name prefix
    pub name_prefix: String,
}

impl Default for ContainerOrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_pull: true,
            name_prefix: "sandbox".to_string(),
        }
    }
}

/// High-level container orchestrator.
///
/// Holds no per-container state; every call is addressed by container id.
pub struct ContainerOrchestrator {
    client: ContainerClient,
    config: ContainerOrchestratorConfig,
}

impl ContainerOrchestrator {
    /// Create a new orchestrator with default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerOrchestratorConfig::default()).await
    }

    /// Create a new orchestrator with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn with_config(config: ContainerOrchestratorConfig) -> Result<Self> {
        let client = ContainerClient::new().await?;
        Ok(Self { client, config })
    }

    /// Pull a container image from registry.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::ImageNotFound`] if the registry does not have
    /// the image.
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        let (from_image, tag) = reference::pull_target(image);

        let mut stream = self.client.docker().create_image(
            Some(bollard::image::CreateImageOptions {
                from_image,
                tag,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                    if let Some(progress) = info.progress {
                        debug!("Pull progress: {}", progress);
                    }
                }
                Err(BollardError::DockerResponseServerError {
                    status_code,
                    message,
                }) if status_code == 404 || is_missing_image_message(&message) => {
                    return Err(ContainerError::ImageNotFound(format!("{}: {}", image, message)));
                }
                Err(BollardError::DockerStreamError { error }) => {
                    return Err(ContainerError::ImageNotFound(format!("{}: {}", image, error)));
                }
                Err(e) => {
                    return Err(ContainerError::ApiError(e));
                }
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    /// Get the underlying client.
    pub fn client(&self) -> &ContainerClient {
        &self.client
    }
}

/// Registries report unknown repositories with a variety of statuses.
fn is_missing_image_message(message: &str) -> bool {
    let message = message.to_lowercase();
    ["not found", "does not exist", "manifest unknown", "pull access denied"]
        .iter()
        .any(|needle| message.contains(needle))
}

fn not_found(container_id: &str) -> impl FnOnce(BollardError) -> ContainerError + '_ {
    move |e| match e {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => ContainerError::NotFound(container_id.to_string()),
        e => ContainerError::ApiError(e),
    }
}

#[async_trait]
impl ContainerRuntime for ContainerOrchestrator {
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.client.image_exists(image).await? {
            debug!("Image {} already exists locally", image);
            return Ok(());
        }

        if !self.config.auto_pull {
            return Err(ContainerError::ImageNotFound(format!(
                "{} is not available locally and pulling is disabled",
                image
            )));
        }

        info!("Pulling image: {}", image);
        self.pull_image(image).await
    }

    async fn create_container(
        &self,
        config: &ContainerConfig,
        name: Option<&str>,
    ) -> Result<String> {
        let container_name = name
            .map(String::from)
            .unwrap_or_else(|| format!("{}-{}", self.config.name_prefix, uuid::Uuid::new_v4()));

        let options = bollard::container::CreateContainerOptions {
            name: container_name.as_str(),
            ..Default::default()
        };

        debug!("Creating container: {}", container_name);

        use bollard::container::Config as BollardConfig;

        let bollard_config = BollardConfig {
            image: Some(config.image.clone()),
            cmd: config.cmd.clone(),
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            labels: config.labels.clone(),
            host_config: Some(config.host_config.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .docker()
            .create_container(Some(options), bollard_config)
            .await
            .map_err(|e| match e {
                BollardError::DockerResponseServerError {
                    status_code: 404,
                    message,
                } => ContainerError::ImageNotFound(format!("{}: {}", config.image, message)),
                e => ContainerError::ApiError(e),
            })?;

        info!("Created container: {} ({})", container_name, response.id);

        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        debug!("Starting container: {}", container_id);

        self.client
            .docker()
            .start_container(
                container_id,
                None::<bollard::container::StartContainerOptions<String>>,
            )
            .await
            .map_err(not_found(container_id))?;

        info!("Started container: {}", container_id);
        Ok(())
    }

    async fn exec(&self, container_id: &str, config: &ExecConfig) -> Result<ExecOutput> {
        executor::execute(self.client.docker(), container_id, config).await
    }

    async fn upload_file(
        &self,
        container_id: &str,
        target_dir: &str,
        relative_path: &str,
        content: &[u8],
    ) -> Result<()> {
        debug!(
            "Uploading {} ({} bytes) to {}:{}",
            relative_path,
            content.len(),
            container_id,
            target_dir
        );

        let tarball = archive::single_file(relative_path, content)?;
        let options = bollard::query_parameters::UploadToContainerOptionsBuilder::default()
            .path(target_dir)
            .build();

        self.client
            .docker()
            .upload_to_container(container_id, Some(options), bollard::body_full(tarball.into()))
            .await
            .map_err(not_found(container_id))?;

        Ok(())
    }

    async fn commit_container(
        &self,
        container_id: &str,
        reference: &ImageReference,
    ) -> Result<String> {
        debug!("Committing container {} as {}", container_id, reference);

        let options = bollard::query_parameters::CommitContainerOptionsBuilder::default()
            .container(container_id)
            .repo(reference.repository())
            .tag(reference.tag())
            .pause(true)
            .build();

        let response = self
            .client
            .docker()
            .commit_container(options, bollard::models::ContainerConfig::default())
            .await
            .map_err(|e| match e {
                BollardError::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::NotFound(container_id.to_string()),
                BollardError::DockerResponseServerError {
                    status_code: 400,
                    message,
                } => ContainerError::InvalidReference(format!("{}: {}", reference, message)),
                e => ContainerError::ApiError(e),
            })?;

        info!("Committed container {} as {} ({})", container_id, reference, response.id);
        Ok(response.id)
    }

    async fn stop_container(&self, container_id: &str, timeout: Duration) -> Result<()> {
        debug!("Stopping container: {}", container_id);

        let result = self
            .client
            .docker()
            .stop_container(
                container_id,
                Some(bollard::container::StopContainerOptions {
                    t: timeout.as_secs() as i64,
                }),
            )
            .await;

        match result {
            Ok(()) => {}
            // Already stopped
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {}
            Err(e) => return Err(not_found(container_id)(e)),
        }

        info!("Stopped container: {}", container_id);
        Ok(())
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        debug!("Removing container: {}", container_id);

        let result = self
            .client
            .docker()
            .remove_container(
                container_id,
                Some(bollard::container::RemoveContainerOptions {
                    force,
                    v: true, // Remove associated volumes
                    ..Default::default()
                }),
            )
            .await;

        match result {
            Ok(()) => {}
            // Auto-removal already claimed the container
            Err(BollardError::DockerResponseServerError {
                status_code: 409,
                message,
            }) if message.contains("in progress") => {
                debug!("Removal of {} already in progress", container_id);
            }
            Err(e) => return Err(not_found(container_id)(e)),
        }

        info!("Removed container: {}", container_id);
        Ok(())
    }
}
