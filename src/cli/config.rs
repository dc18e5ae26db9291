//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Explicit path given with `--config`
//! 2. Current directory: ./sandbox-server.toml or ./.sandbox-server/config.toml
//! 3. User config: ~/.sandbox-server/config.toml
//! 4. System config: /etc/sandbox-server/config.toml
//! 5. Built-in defaults
//!
//! Command line overrides are applied on top of whichever source won.

use crate::container::ContainerOrchestratorConfig;
use crate::env;
use crate::session::SessionManagerConfig;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Filter used when neither `RUST_LOG` nor the configuration set one
pub const DEFAULT_LOG_FILTER: &str = "sandbox_server=info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Pull images that are not present locally
    pub auto_pull: bool,
    /// Container names are `<name_prefix>-<uuid>`
    pub name_prefix: String,
    /// Graceful stop bound used by `exit_container`
    pub stop_timeout_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            auto_pull: true,
            name_prefix: "sandbox".to_string(),
            stop_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Parent of ephemeral staging directories; the OS temp dir when unset
    pub staging_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: format!("{}/{}", env::SERVER_NAME, env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Tear down transient sessions when the server stops
    pub cleanup_on_shutdown: bool,
    pub log_filter: Option<String>,
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub runtime: RuntimeSettings,
    pub workspace: WorkspaceSettings,
    pub download: DownloadSettings,
    pub server: ServerSettings,
}

/// Values given on the command line, applied over the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub staging_root: Option<PathBuf>,
    pub download_timeout_secs: Option<u64>,
    pub stop_timeout_secs: Option<u64>,
    pub log_filter: Option<String>,
}

impl ServerConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServerConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "runtime.name_prefix must not be empty".to_string(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "download.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(root) = &overrides.staging_root {
            self.workspace.staging_root = Some(root.clone());
        }
        if let Some(secs) = overrides.download_timeout_secs {
            self.download.timeout_secs = secs;
        }
        if let Some(secs) = overrides.stop_timeout_secs {
            self.runtime.stop_timeout_secs = secs;
        }
        if let Some(filter) = &overrides.log_filter {
            self.server.log_filter = Some(filter.clone());
        }
        self.validate()
    }

    pub fn staging_root(&self) -> PathBuf {
        self.workspace
            .staging_root
            .clone()
            .unwrap_or_else(std_env::temp_dir)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download.timeout_secs)
    }

    pub fn log_filter(&self) -> &str {
        self.server.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn orchestrator_config(&self) -> ContainerOrchestratorConfig {
        ContainerOrchestratorConfig {
            auto_pull: self.runtime.auto_pull,
            name_prefix: self.runtime.name_prefix.clone(),
        }
    }

    pub fn session_manager_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            stop_timeout: Duration::from_secs(self.runtime.stop_timeout_secs),
            cleanup_on_shutdown: self.server.cleanup_on_shutdown,
        }
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the explicit file if given, else the first file found in the
    /// hierarchy, else the defaults.
    pub fn discover_config(explicit: Option<&Path>) -> Result<ServerConfig, ConfigError> {
        if let Some(path) = explicit {
            info!("Loading configuration override from: {:?}", path);
            return ServerConfig::from_toml_file(path);
        }

        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ServerConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(ServerConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::candidates(current_dir.as_deref(), home_dir.as_deref())
    }

    /// Configuration file candidates in priority order
    fn candidates(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc").join(env::SERVER_NAME).join(env::CONFIG_FILE_NAME));

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info(explicit: Option<&Path>, effective: &ServerConfig) {
        println!("Configuration Discovery Hierarchy:");
        println!();

        if let Some(path) = explicit {
            println!("  0. {:?} - --config", path);
        }

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "EXISTS"
                } else {
                    "NOT A FILE"
                }
            } else {
                "NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match explicit
            .map(Path::to_path_buf)
            .or_else(Self::find_config_file)
        {
            Some(path) => println!("Active configuration: {:?}", path),
            None => println!("Active configuration: Built-in defaults"),
        }

        println!();
        match effective.to_toml_string() {
            Ok(toml) => println!("{toml}"),
            Err(e) => println!("(could not render configuration: {e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.runtime.auto_pull);
        assert_eq!(config.runtime.name_prefix, "sandbox");
        assert_eq!(config.session_manager_config().stop_timeout, Duration::from_secs(10));
        assert!(!config.session_manager_config().cleanup_on_shutdown);
        assert_eq!(config.download_timeout(), Duration::from_secs(60));
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.staging_root(), std_env::temp_dir());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [runtime]
            stop_timeout_secs = 3

            [workspace]
            staging_root = "/var/lib/sandbox"
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.stop_timeout_secs, 3);
        assert!(config.runtime.auto_pull);
        assert_eq!(config.staging_root(), PathBuf::from("/var/lib/sandbox"));
        assert_eq!(config.download, DownloadSettings::default());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sandbox-server.toml");

        let mut original = ServerConfig::default();
        original.server.cleanup_on_shutdown = true;
        original.to_toml_file(&config_path).unwrap();

        let loaded = ServerConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_invalid_files_are_reported() {
        let temp_dir = TempDir::new().unwrap();

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "[runtime\nauto_pull = ").unwrap();
        assert!(matches!(
            ServerConfig::from_toml_file(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let zero = temp_dir.path().join("zero.toml");
        fs::write(&zero, "[download]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(
            ServerConfig::from_toml_file(&zero),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            ConfigDiscovery::discover_config(Some(&temp_dir.path().join("missing.toml"))),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = ServerConfig::default();
        config
            .apply_overrides(&ConfigOverrides {
                staging_root: Some(PathBuf::from("/scratch")),
                download_timeout_secs: Some(5),
                stop_timeout_secs: Some(1),
                log_filter: Some("debug".to_string()),
            })
            .unwrap();

        assert_eq!(config.staging_root(), PathBuf::from("/scratch"));
        assert_eq!(config.download_timeout(), Duration::from_secs(5));
        assert_eq!(config.session_manager_config().stop_timeout, Duration::from_secs(1));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::candidates(
            Some(Path::new("/project")),
            Some(Path::new("/home/user")),
        );

        assert_eq!(candidates[0], PathBuf::from("/project/sandbox-server.toml"));
        assert_eq!(
            candidates[1],
            PathBuf::from("/project/.sandbox-server/config.toml")
        );
        assert_eq!(
            candidates[2],
            PathBuf::from("/home/user/.sandbox-server/config.toml")
        );
    }
}
