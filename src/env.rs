//! Environment constants and path utilities for the sandbox server.
//!
//! This module centralizes the fixed paths, names and labels used throughout
//! the server so the container layout stays consistent between components.

use std::path::{Path, PathBuf};

/// Server name reported during the MCP handshake
pub const SERVER_NAME: &str = "sandbox-server";

/// Hidden directory holding local and per-user configuration
pub const CONFIG_DIR_NAME: &str = ".sandbox-server";

/// Configuration file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Standalone configuration file name in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "sandbox-server.toml";

/// Container-side layout shared by every session.
pub mod container {
    /// Fixed in-container mount point of the session workspace
    pub const WORKSPACE_ROOT: &str = "/workspace";

    /// Command that keeps a session container alive between exec calls
    pub const KEEP_ALIVE_CMD: [&str; 3] = ["tail", "-f", "/dev/null"];

    /// Shell used to run caller-supplied commands
    pub const SHELL: [&str; 2] = ["sh", "-c"];

    /// Environment applied to every exec so package managers never prompt
    pub const EXEC_ENV: [(&str, &str); 1] = [("DEBIAN_FRONTEND", "noninteractive")];

    /// Label marking containers created by this server
    pub const MANAGED_LABEL: &str = "sandbox-server.managed";

    /// Label recording the persistence policy of a container
    pub const PERSIST_LABEL: &str = "sandbox-server.persist";
}

/// Host-side staging directories.
pub mod staging {
    /// Prefix of ephemeral workspace directories
    pub const DIR_PREFIX: &str = "sandbox-workspace-";

    /// File name used when a download URL has no usable path segment
    pub const FALLBACK_DOWNLOAD_NAME: &str = "download";

    /// Prefix of in-flight download files, renamed once complete
    pub const PARTIAL_DOWNLOAD_PREFIX: &str = ".sandbox-download-";
}

/// Build the in-container path of a workspace-relative file
pub fn workspace_path(relative: &str) -> String {
    format!("{}/{}", container::WORKSPACE_ROOT, relative)
}

/// Build the bind specification mounting `host_dir` at the workspace root
pub fn workspace_bind(host_dir: &Path) -> String {
    format!("{}:{}:rw", host_dir.display(), container::WORKSPACE_ROOT)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(CONFIG_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}
