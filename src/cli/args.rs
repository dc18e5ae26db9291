//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `serve`: Run the MCP server on stdin/stdout (the default)
//! - `show-config`: Show configuration discovery information

use super::config::ConfigOverrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Serve,
    ShowConfig,
}

#[derive(Debug, Parser)]
#[command(name = "sandbox-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "MCP server that lets an agent create, use, snapshot and tear down Docker sandbox containers"
)]
#[command(long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory under which ephemeral workspaces are created
    #[arg(long = "staging-root", value_name = "DIR", global = true)]
    pub staging_root: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long = "download-timeout", value_name = "SECS", global = true)]
    pub download_timeout: Option<u64>,

    /// Graceful container stop timeout in seconds
    #[arg(long = "stop-timeout", value_name = "SECS", global = true)]
    pub stop_timeout: Option<u64>,

    /// Log filter directives, e.g. `sandbox_server=debug`
    #[arg(long = "log-filter", value_name = "FILTER", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve MCP over stdin/stdout
    Serve,
    /// Show configuration discovery information and the effective configuration
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.command {
            None | Some(Commands::Serve) => ExecutionMode::Serve,
            Some(Commands::ShowConfig) => ExecutionMode::ShowConfig,
        }
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            staging_root: self.staging_root.clone(),
            download_timeout_secs: self.download_timeout,
            stop_timeout_secs: self.stop_timeout,
            log_filter: self.log_filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let args = Args::try_parse_from(["sandbox-server"]).unwrap();
        assert_eq!(args.mode(), ExecutionMode::Serve);

        let args = Args::try_parse_from(["sandbox-server", "serve"]).unwrap();
        assert_eq!(args.mode(), ExecutionMode::Serve);
    }

    #[test]
    fn test_show_config() {
        let args = Args::try_parse_from(["sandbox-server", "show-config", "-c", "/tmp/x.toml"])
            .unwrap();
        assert_eq!(args.mode(), ExecutionMode::ShowConfig);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "sandbox-server",
            "--staging-root",
            "/scratch",
            "--download-timeout",
            "5",
            "--stop-timeout",
            "2",
            "--log-filter",
            "debug",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.staging_root, Some(PathBuf::from("/scratch")));
        assert_eq!(overrides.download_timeout_secs, Some(5));
        assert_eq!(overrides.stop_timeout_secs, Some(2));
        assert_eq!(overrides.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_rejects_non_numeric_timeout() {
        assert!(Args::try_parse_from(["sandbox-server", "--stop-timeout", "soon"]).is_err());
    }
}
