//! End-to-end session tests against a real Docker/Podman daemon.
//!
//! Tests are skipped if Docker/Podman is not available or SKIP_CONTAINER_TESTS=1.

use sandbox_server::container::{ContainerClient, ContainerOrchestrator, RuntimeType};
use sandbox_server::session::{
    CreateOptions, ErrorKind, Persistence, ResourceFetcher, SessionManager, SessionManagerConfig,
    SessionRegistry, WorkspaceProvisioner,
};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_tag::tag;

/// Check if container tests should run.
fn should_run_container_tests() -> bool {
    if let Ok(value) = std::env::var("SKIP_CONTAINER_TESTS") {
        if value == "1" || value.eq_ignore_ascii_case("true") {
            return false;
        }
    }

    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
        || std::process::Command::new("podman")
            .arg("info")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

async fn manager(staging: &TempDir) -> SessionManager {
    let orchestrator = ContainerOrchestrator::new()
        .await
        .expect("Failed to connect to container runtime");
    SessionManager::new(
        Arc::new(orchestrator),
        Arc::new(SessionRegistry::new()),
        WorkspaceProvisioner::new(staging.path()),
        ResourceFetcher::new(Duration::from_secs(30), "sandbox-server-tests").unwrap(),
        SessionManagerConfig {
            stop_timeout: Duration::from_secs(2),
            ..SessionManagerConfig::default()
        },
    )
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_runtime_connection() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests (Docker/Podman not available or SKIP_CONTAINER_TESTS=1)");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let runtime = client.runtime_type().await.expect("Failed to get runtime type");
    assert!(
        matches!(runtime, RuntimeType::Docker | RuntimeType::Podman),
        "Expected docker or podman, got: {}",
        runtime
    );
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_alpine_session_lifecycle() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let staging = TempDir::new().unwrap();
    let manager = manager(&staging).await;

    let handle = manager
        .create(CreateOptions::new("alpine:latest", Persistence::Transient))
        .await
        .expect("Failed to create session");

    let output = manager.execute(&handle, "echo hi").await.unwrap();
    assert_eq!(output.stdout, "hi\n");
    assert_eq!(output.exit_code, Some(0));

    let output = manager.execute(&handle, "pwd").await.unwrap();
    assert_eq!(output.stdout.trim(), "/workspace");

    let output = manager.execute(&handle, "exit 4").await.unwrap();
    assert_eq!(output.exit_code, Some(4));

    manager
        .write_file(&handle, "hello.sh", "echo from file\n")
        .await
        .unwrap();
    let output = manager.execute(&handle, "sh hello.sh").await.unwrap();
    assert_eq!(output.stdout, "from file\n");

    let dockerfile = manager.export_dockerfile(&handle).await.unwrap();
    assert!(dockerfile.contains("FROM alpine:latest"));
    assert!(dockerfile.contains("COPY hello.sh /workspace/hello.sh"));

    let staging_dir = manager
        .registry()
        .get(&handle)
        .await
        .unwrap()
        .workspace
        .host_path()
        .to_path_buf();
    assert!(staging_dir.is_dir());

    manager.exit(&handle, false).await.expect("Failed to exit");
    assert!(!staging_dir.exists());

    let err = manager.execute(&handle, "echo hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    let err = manager.exit(&handle, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionNotFound);
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_mounted_workspace_is_shared() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let staging = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    std::fs::write(project.path().join("input.txt"), "from host").unwrap();
    let manager = manager(&staging).await;

    let handle = manager
        .create(
            CreateOptions::new("alpine:latest", Persistence::Persistent)
                .with_workspace(project.path()),
        )
        .await
        .expect("Failed to create session");

    let output = manager.execute(&handle, "cat input.txt").await.unwrap();
    assert_eq!(output.stdout, "from host");

    manager.exit(&handle, true).await.unwrap();
    assert!(project.path().join("input.txt").exists());
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_missing_image() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let staging = TempDir::new().unwrap();
    let manager = manager(&staging).await;

    let err = manager
        .create(CreateOptions::new(
            "missing:doesnotexist",
            Persistence::Transient,
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ImageNotFound);
    assert!(manager.list().await.is_empty());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
#[serial]
#[tag(integration, container, slow)]
async fn test_save_state_produces_image() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let staging = TempDir::new().unwrap();
    let manager = manager(&staging).await;
    let image = format!("sandbox-server-test:{}", std::process::id());

    let handle = manager
        .create(CreateOptions::new("alpine:latest", Persistence::Transient))
        .await
        .unwrap();
    manager
        .execute(&handle, "echo saved > /marker.txt")
        .await
        .unwrap();
    manager.save_state(&handle, &image).await.unwrap();
    manager.exit(&handle, true).await.unwrap();

    let restored = manager
        .create(CreateOptions::new(image.as_str(), Persistence::Transient))
        .await
        .expect("Saved image should be usable");
    let output = manager.execute(&restored, "cat /marker.txt").await.unwrap();
    assert_eq!(output.stdout, "saved\n");
    manager.exit(&restored, true).await.unwrap();

    let _ = std::process::Command::new("docker")
        .args(["rmi", "-f", &image])
        .output();
}
