//! Session records.
//!
//! A [`Session`] is everything the server knows about one tracked container.
//! Records are owned by the [`SessionRegistry`](super::SessionRegistry); other
//! components only ever see clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque session identifier; the runtime's container id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// What should happen to a container once it stops.
///
/// `Transient` containers are created with the runtime's auto-remove flag.
/// Neither variant makes the server delete a running session on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    Persistent,
    Transient,
}

impl Persistence {
    pub fn is_persistent(self) -> bool {
        matches!(self, Persistence::Persistent)
    }

    /// Value of the runtime auto-remove flag for this policy.
    pub fn auto_remove(self) -> bool {
        !self.is_persistent()
    }
}

impl From<bool> for Persistence {
    fn from(persist: bool) -> Self {
        if persist {
            Persistence::Persistent
        } else {
            Persistence::Transient
        }
    }
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persistence::Persistent => f.write_str("persistent"),
            Persistence::Transient => f.write_str("transient"),
        }
    }
}

/// Host directory bound at the workspace root. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Workspace {
    /// Staging directory created and deleted by the server
    Ephemeral(PathBuf),
    /// Caller-owned directory, never deleted by the server
    Mounted(PathBuf),
}

impl Workspace {
    pub fn host_path(&self) -> &Path {
        match self {
            Workspace::Ephemeral(path) | Workspace::Mounted(path) => path,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Workspace::Ephemeral(_))
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workspace::Ephemeral(path) => write!(f, "ephemeral ({})", path.display()),
            Workspace::Mounted(path) => write!(f, "mounted ({})", path.display()),
        }
    }
}

/// Workspace-relative paths written through the server, in order of last write.
///
/// A path appears at most once; writing it again moves it to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CreatedFiles(Vec<String>);

impl CreatedFiles {
    pub fn record(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.0.retain(|existing| *existing != path);
        self.0.push(path);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|existing| existing == path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resource fetched into the workspace before the container started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedResource {
    pub url: String,
    /// File name relative to the workspace root
    pub file_name: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Removed,
}

/// One tracked container plus its workspace and write history.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub handle: SessionHandle,
    pub image: String,
    pub persistence: Persistence,
    pub workspace: Workspace,
    pub created_files: CreatedFiles,
    pub download: Option<DownloadedResource>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        handle: SessionHandle,
        image: impl Into<String>,
        persistence: Persistence,
        workspace: Workspace,
    ) -> Self {
        Self {
            handle,
            image: image.into(),
            persistence,
            workspace,
            created_files: CreatedFiles::default(),
            download: None,
            status: SessionStatus::Active,
            created_at: Utc::now(),
        }
    }
}
