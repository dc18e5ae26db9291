//! Normalized session errors.
//!
//! Every lifecycle operation fails with one of a small set of kinds, each
//! carrying a human-readable cause. Collaborator errors are folded into these
//! kinds here.

use crate::container::ContainerError;
use crate::session::fetcher::FetchError;
use crate::session::registry::RegistryError;
use crate::session::workspace::WorkspaceError;
use serde::Serialize;
use std::fmt;

/// Error kinds visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    SessionNotFound,
    ImageNotFound,
    DownloadFailed,
    InvalidPath,
    InvalidImageName,
    RuntimeUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SessionNotFound => "SessionNotFound",
            ErrorKind::ImageNotFound => "ImageNotFound",
            ErrorKind::DownloadFailed => "DownloadFailed",
            ErrorKind::InvalidPath => "InvalidPath",
            ErrorKind::InvalidImageName => "InvalidImageName",
            ErrorKind::RuntimeUnavailable => "RuntimeUnavailable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error(transparent)]
    DownloadFailed(#[from] FetchError),

    #[error("{0}")]
    InvalidPath(String),

    #[error("{0}")]
    InvalidImageName(String),

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            SessionError::ImageNotFound(_) => ErrorKind::ImageNotFound,
            SessionError::DownloadFailed(_) => ErrorKind::DownloadFailed,
            SessionError::InvalidPath(_) => ErrorKind::InvalidPath,
            SessionError::InvalidImageName(_) => ErrorKind::InvalidImageName,
            SessionError::RuntimeUnavailable(_) => ErrorKind::RuntimeUnavailable,
        }
    }
}

impl From<ContainerError> for SessionError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound(id) => SessionError::SessionNotFound(id),
            ContainerError::ImageNotFound(cause) => SessionError::ImageNotFound(cause),
            ContainerError::InvalidReference(cause) => SessionError::InvalidImageName(cause),
            other if other.is_not_found() => SessionError::SessionNotFound(other.to_string()),
            other => SessionError::RuntimeUnavailable(other.to_string()),
        }
    }
}

impl From<RegistryError> for SessionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(handle) => SessionError::SessionNotFound(handle.to_string()),
            // Handles come from the runtime; a clash means its bookkeeping
            // disagrees with ours.
            other => SessionError::RuntimeUnavailable(other.to_string()),
        }
    }
}

impl From<WorkspaceError> for SessionError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::InvalidPath { .. } => SessionError::InvalidPath(err.to_string()),
            other => SessionError::RuntimeUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::SessionHandle;

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::SessionNotFound.to_string(), "SessionNotFound");
        assert_eq!(ErrorKind::InvalidImageName.to_string(), "InvalidImageName");
    }

    #[test]
    fn test_container_error_mapping() {
        let err: SessionError = ContainerError::NotFound("abc".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);

        let err: SessionError = ContainerError::ImageNotFound("x:y".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::ImageNotFound);

        let err: SessionError = ContainerError::InvalidReference("BAD".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidImageName);

        let err: SessionError = ContainerError::Unavailable("socket".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::RuntimeUnavailable);
        assert!(err.to_string().contains("socket"));
    }

    #[test]
    fn test_registry_error_mapping() {
        let err: SessionError = RegistryError::NotFound(SessionHandle::new("gone")).into();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
        assert_eq!(err.to_string(), "session gone not found");
    }
}
