use sandbox_server::cli::{ConfigDiscovery, ConfigOverrides, ServerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_serialization_roundtrip() {
    let original_config = ServerConfig::default();

    let toml_str = original_config
        .to_toml_string()
        .expect("Should be able to serialize config to TOML");

    assert!(toml_str.contains("[runtime]"), "Should contain runtime section");
    assert!(toml_str.contains("stop_timeout_secs"));

    let deserialized_config: ServerConfig =
        toml::from_str(&toml_str).expect("Should be able to deserialize TOML string");
    assert_eq!(original_config, deserialized_config);
}

#[test]
fn test_explicit_config_file() {
    let temp_file = NamedTempFile::new().expect("Should be able to create temporary file");
    std::fs::write(
        temp_file.path(),
        r#"
[runtime]
auto_pull = false
name_prefix = "agent-box"

[workspace]
staging_root = "/srv/sandbox/staging"

[download]
timeout_secs = 15

[server]
cleanup_on_shutdown = true
log_filter = "sandbox_server=debug"
"#,
    )
    .unwrap();

    let config = ConfigDiscovery::discover_config(Some(temp_file.path()))
        .expect("Should load explicit config file");

    let orchestrator = config.orchestrator_config();
    assert!(!orchestrator.auto_pull);
    assert_eq!(orchestrator.name_prefix, "agent-box");
    assert_eq!(config.staging_root(), PathBuf::from("/srv/sandbox/staging"));
    assert_eq!(config.download_timeout(), Duration::from_secs(15));
    assert!(config.session_manager_config().cleanup_on_shutdown);
    assert_eq!(config.log_filter(), "sandbox_server=debug");
}

#[test]
fn test_overrides_win_over_file() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[runtime]\nstop_timeout_secs = 30\n").unwrap();

    let mut config = ConfigDiscovery::discover_config(Some(temp_file.path())).unwrap();
    config
        .apply_overrides(&ConfigOverrides {
            stop_timeout_secs: Some(1),
            ..ConfigOverrides::default()
        })
        .unwrap();

    assert_eq!(
        config.session_manager_config().stop_timeout,
        Duration::from_secs(1)
    );
}

#[test]
fn test_zero_download_timeout_rejected() {
    let mut config = ServerConfig::default();
    let result = config.apply_overrides(&ConfigOverrides {
        download_timeout_secs: Some(0),
        ..ConfigOverrides::default()
    });
    assert!(result.is_err());
}
