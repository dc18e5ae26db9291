//! Workspace provisioning.
//!
//! Ephemeral sessions get a fresh staging directory under the configured
//! staging root; mounted sessions bind a caller-owned directory that is
//! validated but never created or deleted here.

use crate::env;
use crate::session::types::Workspace;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("failed to create staging directory under {root}: {source}")]
    Staging {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove staging directory {path}: {source}")]
    Release {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        WorkspaceError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Creates and releases session workspaces on the host.
#[derive(Debug, Clone)]
pub struct WorkspaceProvisioner {
    staging_root: PathBuf,
}

impl WorkspaceProvisioner {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Create a uniquely named staging directory owned by the server.
    pub async fn ephemeral(&self) -> Result<Workspace, WorkspaceError> {
        let staging = |source| WorkspaceError::Staging {
            root: self.staging_root.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.staging_root)
            .await
            .map_err(staging)?;

        let path = tempfile::Builder::new()
            .prefix(env::staging::DIR_PREFIX)
            .tempdir_in(&self.staging_root)
            .map_err(staging)?
            .keep();

        info!("Created staging directory {}", path.display());
        Ok(Workspace::Ephemeral(path))
    }

    /// Validate a caller-supplied directory for binding.
    pub async fn mounted(&self, host_path: &Path) -> Result<Workspace, WorkspaceError> {
        let display = host_path.display().to_string();

        let canonical = tokio::fs::canonicalize(host_path)
            .await
            .map_err(|e| WorkspaceError::invalid(&display, format!("cannot be resolved: {e}")))?;

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(|e| WorkspaceError::invalid(&display, e.to_string()))?;

        if !metadata.is_dir() {
            return Err(WorkspaceError::invalid(display, "not a directory"));
        }

        debug!("Using mounted workspace {}", canonical.display());
        Ok(Workspace::Mounted(canonical))
    }

    /// Remove an ephemeral staging directory. Mounted workspaces are left
    /// untouched; an already-absent directory is not an error.
    pub async fn release(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        let Workspace::Ephemeral(path) = workspace else {
            return Ok(());
        };

        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                info!("Removed staging directory {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Staging directory {} already gone", path.display());
                Ok(())
            }
            Err(source) => {
                warn!("Failed to remove staging directory {}: {}", path.display(), source);
                Err(WorkspaceError::Release {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Normalize a workspace-relative path, rejecting anything that would
/// resolve outside the workspace root.
pub fn normalize_relative_path(path: &str) -> Result<String, WorkspaceError> {
    if path.trim().is_empty() {
        return Err(WorkspaceError::invalid(path, "path is empty"));
    }
    if path.contains('\0') {
        return Err(WorkspaceError::invalid(path, "path contains a NUL byte"));
    }

    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| WorkspaceError::invalid(path, "path is not valid UTF-8"))?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(WorkspaceError::invalid(
                    path,
                    "parent directory references are not allowed",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(WorkspaceError::invalid(
                    path,
                    "path must be relative to the workspace root",
                ));
            }
        }
    }

    if parts.is_empty() {
        return Err(WorkspaceError::invalid(path, "path does not name a file"));
    }
    if path.ends_with('/') {
        return Err(WorkspaceError::invalid(path, "path names a directory"));
    }

    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ephemeral_creates_unique_directories() {
        let root = TempDir::new().unwrap();
        let provisioner = WorkspaceProvisioner::new(root.path().join("staging"));

        let first = provisioner.ephemeral().await.unwrap();
        let second = provisioner.ephemeral().await.unwrap();

        assert!(first.is_ephemeral());
        assert_ne!(first.host_path(), second.host_path());
        assert!(first.host_path().is_dir());
        assert!(
            first
                .host_path()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with(env::staging::DIR_PREFIX)
        );
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let root = TempDir::new().unwrap();
        let provisioner = WorkspaceProvisioner::new(root.path());

        let workspace = provisioner.ephemeral().await.unwrap();
        std::fs::write(workspace.host_path().join("file.txt"), "data").unwrap();

        provisioner.release(&workspace).await.unwrap();
        assert!(!workspace.host_path().exists());

        provisioner.release(&workspace).await.unwrap();
    }

    #[tokio::test]
    async fn test_mounted_validates_directory() {
        let root = TempDir::new().unwrap();
        let provisioner = WorkspaceProvisioner::new(root.path());

        let workspace = provisioner.mounted(root.path()).await.unwrap();
        assert!(!workspace.is_ephemeral());
        assert_eq!(
            workspace.host_path(),
            std::fs::canonicalize(root.path()).unwrap()
        );

        let file = root.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            provisioner.mounted(&file).await,
            Err(WorkspaceError::InvalidPath { .. })
        ));
        assert!(matches!(
            provisioner.mounted(&root.path().join("missing")).await,
            Err(WorkspaceError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_leaves_mounted_untouched() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("keep.txt"), "keep").unwrap();
        let provisioner = WorkspaceProvisioner::new(root.path());

        let workspace = provisioner.mounted(root.path()).await.unwrap();
        provisioner.release(&workspace).await.unwrap();

        assert!(root.path().join("keep.txt").exists());
    }

    #[test]
    fn test_normalize_relative_path() {
        assert_eq!(normalize_relative_path("main.py").unwrap(), "main.py");
        assert_eq!(normalize_relative_path("./src//app.py").unwrap(), "src/app.py");
        assert_eq!(normalize_relative_path("a/./b/c.txt").unwrap(), "a/b/c.txt");
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        for path in ["", "  ", "../etc/passwd", "a/../../b", "/etc/passwd", ".", "dir/"] {
            assert!(
                matches!(
                    normalize_relative_path(path),
                    Err(WorkspaceError::InvalidPath { .. })
                ),
                "expected {path:?} to be rejected"
            );
        }
    }
}
