use crate::container::{
    ContainerConfig, ContainerError, ContainerRuntime, ExecConfig, ExecOutput, ImageReference,
};
use crate::env::{self, container::WORKSPACE_ROOT};
use crate::session::dockerfile;
use crate::session::error::{Result, SessionError};
use crate::session::fetcher::ResourceFetcher;
use crate::session::registry::SessionRegistry;
use crate::session::types::{DownloadedResource, Persistence, Session, SessionHandle, Workspace};
use crate::session::workspace::{WorkspaceProvisioner, normalize_relative_path};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the session manager
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Graceful stop bound used by `exit` without `force`
    pub stop_timeout: Duration,
    /// Tear down transient sessions when the server stops
    pub cleanup_on_shutdown: bool,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(10),
            cleanup_on_shutdown: false,
        }
    }
}

/// Parameters of [`SessionManager::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub image: String,
    pub persistence: Persistence,
    pub host_workspace_path: Option<PathBuf>,
    pub download_url: Option<String>,
}

impl CreateOptions {
    pub fn new(image: impl Into<String>, persistence: Persistence) -> Self {
        Self {
            image: image.into(),
            persistence,
            host_workspace_path: None,
            download_url: None,
        }
    }

    pub fn with_workspace(mut self, host_path: impl Into<PathBuf>) -> Self {
        self.host_workspace_path = Some(host_path.into());
        self
    }

    pub fn with_download(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }
}

/// Session lifecycle manager.
///
/// Sequences workspace provisioning, downloads and runtime calls for each tool
/// operation and keeps the registry consistent with the outcome. Failed
/// operations surface immediately; nothing is retried.
pub struct SessionManager {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<SessionRegistry>,
    provisioner: WorkspaceProvisioner,
    fetcher: ResourceFetcher,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<SessionRegistry>,
        provisioner: WorkspaceProvisioner,
        fetcher: ResourceFetcher,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            runtime,
            registry,
            provisioner,
            fetcher,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Provision a workspace, optionally download into it, then create and
    /// start a container bound to it.
    ///
    /// Any failure releases what was already acquired; no registry entry is
    /// created for a failed call.
    pub async fn create(&self, options: CreateOptions) -> Result<SessionHandle> {
        if options.image.trim().is_empty() {
            return Err(SessionError::ImageNotFound("image name is empty".to_string()));
        }

        info!(
            "Creating {} session from {}",
            options.persistence, options.image
        );

        let workspace = match &options.host_workspace_path {
            Some(host_path) => self.provisioner.mounted(host_path).await?,
            None => self.provisioner.ephemeral().await?,
        };

        match self.provision(&options, &workspace).await {
            Ok(handle) => {
                info!("Session {} ready ({})", handle, workspace);
                Ok(handle)
            }
            Err(e) => {
                warn!("Creating session from {} failed: {}", options.image, e);
                if let Err(release) = self.provisioner.release(&workspace).await {
                    warn!("Rollback could not release workspace: {}", release);
                }
                Err(e)
            }
        }
    }

    async fn provision(
        &self,
        options: &CreateOptions,
        workspace: &Workspace,
    ) -> Result<SessionHandle> {
        let download = match &options.download_url {
            Some(url) => {
                let fetched = self.fetcher.fetch_into(url, workspace.host_path()).await?;
                Some(DownloadedResource {
                    url: fetched.url.to_string(),
                    file_name: fetched.file_name,
                    bytes: fetched.bytes_written,
                })
            }
            None => None,
        };

        let handle = match self.launch(options, workspace).await {
            Ok(handle) => handle,
            Err(e) => {
                // Ephemeral directories go away wholesale. In a caller-owned
                // directory the fetcher never replaces an existing file, so
                // the downloaded path is one this call created.
                if let (Workspace::Mounted(dir), Some(download)) = (workspace, &download) {
                    let path = dir.join(&download.file_name);
                    if let Err(remove) = tokio::fs::remove_file(&path).await {
                        warn!("Could not remove {}: {}", path.display(), remove);
                    }
                }
                return Err(e);
            }
        };

        let mut session = Session::new(
            handle.clone(),
            options.image.clone(),
            options.persistence,
            workspace.clone(),
        );
        session.download = download;

        if let Err(e) = self.registry.put(session).await {
            self.discard_container(handle.as_str()).await;
            return Err(e.into());
        }

        Ok(handle)
    }

    async fn launch(&self, options: &CreateOptions, workspace: &Workspace) -> Result<SessionHandle> {
        self.runtime
            .ensure_image(&options.image)
            .await
            .map_err(creation_error)?;

        let config = ContainerConfig::builder()
            .image(options.image.as_str())
            .cmd(env::container::KEEP_ALIVE_CMD)
            .working_dir(WORKSPACE_ROOT)
            .bind(env::workspace_bind(workspace.host_path()))
            .label(env::container::MANAGED_LABEL, "true")
            .label(
                env::container::PERSIST_LABEL,
                options.persistence.is_persistent().to_string(),
            )
            .auto_remove(options.persistence.auto_remove())
            .build()
            .map_err(creation_error)?;

        let container_id = self
            .runtime
            .create_container(&config, None)
            .await
            .map_err(creation_error)?;

        if let Err(e) = self.runtime.start_container(&container_id).await {
            self.discard_container(&container_id).await;
            return Err(creation_error(e));
        }

        Ok(SessionHandle::new(container_id))
    }

    async fn discard_container(&self, container_id: &str) {
        if let Err(e) = self.runtime.remove_container(container_id, true).await {
            warn!("Rollback could not remove container {}: {}", container_id, e);
        }
    }

    /// Write `content` to `relative_path` below the workspace root and record
    /// the path. Returns the normalized path.
    pub async fn write_file(
        &self,
        handle: &SessionHandle,
        relative_path: &str,
        content: &str,
    ) -> Result<String> {
        self.registry.get(handle).await?;
        let path = normalize_relative_path(relative_path)?;

        self.runtime
            .upload_file(handle.as_str(), WORKSPACE_ROOT, &path, content.as_bytes())
            .await?;

        self.registry
            .update(handle, |session| session.created_files.record(path.clone()))
            .await?;

        info!("Wrote {} in session {}", env::workspace_path(&path), handle);
        Ok(path)
    }

    /// Run `command` through `sh -c` in the workspace root.
    ///
    /// A non-zero exit code is part of the output, not an error. There is no
    /// timeout: a command that never exits blocks this call.
    pub async fn execute(&self, handle: &SessionHandle, command: &str) -> Result<ExecOutput> {
        self.registry.get(handle).await?;

        let [shell, flag] = env::container::SHELL;
        let mut builder = ExecConfig::builder()
            .cmd([shell, flag, command])
            .working_dir(WORKSPACE_ROOT)
            .attach_stdin(false)
            .tty(false);
        for (key, value) in env::container::EXEC_ENV {
            builder = builder.env(key, value);
        }

        let output = self.runtime.exec(handle.as_str(), &builder.build()).await?;

        if output.success() {
            info!("Command in session {} succeeded", handle);
        } else {
            info!(
                "Command in session {} exited with {:?}",
                handle, output.exit_code
            );
        }
        Ok(output)
    }

    /// Commit the container filesystem to a new image named `image_name`.
    pub async fn save_state(
        &self,
        handle: &SessionHandle,
        image_name: &str,
    ) -> Result<ImageReference> {
        self.registry.get(handle).await?;
        let reference = ImageReference::parse(image_name)?;

        let image_id = self
            .runtime
            .commit_container(handle.as_str(), &reference)
            .await?;

        info!("Saved session {} as {} ({})", handle, reference, image_id);
        Ok(reference)
    }

    /// Dockerfile approximating the session environment.
    pub async fn export_dockerfile(&self, handle: &SessionHandle) -> Result<String> {
        let session = self.registry.get(handle).await?;
        Ok(dockerfile::synthesize(&session))
    }

    /// Stop and remove the container, release an ephemeral workspace and
    /// evict the session.
    ///
    /// The session is evicted before any runtime call, so it is gone even if
    /// the daemon reports an error; those errors are returned as
    /// `RuntimeUnavailable` after cleanup finished.
    pub async fn exit(&self, handle: &SessionHandle, force: bool) -> Result<()> {
        let session = self.registry.remove(handle).await?;
        let container_id = handle.as_str();
        let mut failures = Vec::new();

        if !force {
            match self
                .runtime
                .stop_container(container_id, self.config.stop_timeout)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!("Container {} already gone", container_id),
                Err(e) => {
                    warn!("Failed to stop container {}: {}", container_id, e);
                    failures.push(format!("stop failed: {e}"));
                }
            }
        }

        match self.runtime.remove_container(container_id, true).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Container {} already removed", container_id),
            Err(e) => {
                warn!("Failed to remove container {}: {}", container_id, e);
                failures.push(format!("remove failed: {e}"));
            }
        }

        if let Err(e) = self.provisioner.release(&session.workspace).await {
            warn!("Session {}: {}", handle, e);
        }

        if failures.is_empty() {
            info!("Session {} removed", handle);
            Ok(())
        } else {
            Err(SessionError::RuntimeUnavailable(failures.join("; ")))
        }
    }

    /// Active sessions, oldest first.
    pub async fn list(&self) -> Vec<Session> {
        let mut sessions = self.registry.list().await;
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        sessions
    }

    /// Called once when the server stops.
    pub async fn shutdown(&self) {
        let sessions = self.list().await;
        if sessions.is_empty() {
            return;
        }

        if !self.config.cleanup_on_shutdown {
            info!("Leaving {} session(s) running", sessions.len());
            return;
        }

        for session in sessions
            .iter()
            .filter(|s| s.persistence == Persistence::Transient)
        {
            info!("Tearing down transient session {}", session.handle);
            if let Err(e) = self.exit(&session.handle, true).await {
                warn!("Teardown of {} failed: {}", session.handle, e);
            }
        }
    }
}

/// Creation has no session yet, so a missing container is a runtime fault.
fn creation_error(err: ContainerError) -> SessionError {
    match err {
        ContainerError::ImageNotFound(cause) | ContainerError::InvalidReference(cause) => {
            SessionError::ImageNotFound(cause)
        }
        other => SessionError::RuntimeUnavailable(other.to_string()),
    }
}
