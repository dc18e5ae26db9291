//! CLI-specific functionality for the sandbox server
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands, ExecutionMode};
pub use config::{
    ConfigDiscovery, ConfigError, ConfigOverrides, DEFAULT_LOG_FILTER, DownloadSettings,
    RuntimeSettings, ServerConfig, ServerSettings, WorkspaceSettings,
};
