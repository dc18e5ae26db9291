use anyhow::{Context, Result};
use sandbox_server::cli::{Args, ConfigDiscovery, ExecutionMode, ServerConfig};
use sandbox_server::container::ContainerOrchestrator;
use sandbox_server::mcp::{self, McpServer};
use sandbox_server::session::{
    ResourceFetcher, SessionManager, SessionRegistry, WorkspaceProvisioner,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigDiscovery::discover_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    config
        .apply_overrides(&args.overrides())
        .context("Invalid command line overrides")?;

    match args.mode() {
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info(args.config.as_deref(), &config);
            Ok(())
        }
        ExecutionMode::Serve => {
            init_logging(&config);
            run_server(config).await
        }
    }
}

/// Logs go to stderr; stdout carries the protocol stream.
fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Starting sandbox server {}", env!("CARGO_PKG_VERSION"));

    let orchestrator = ContainerOrchestrator::with_config(config.orchestrator_config())
        .await
        .context("Failed to connect to the container runtime")?;
    match orchestrator.client().runtime_type().await {
        Ok(runtime) => info!("Container runtime: {}", runtime),
        Err(e) => warn!("Could not detect container runtime type: {}", e),
    }

    let staging_root = config.staging_root();
    info!("Ephemeral workspaces under {:?}", staging_root);

    let fetcher = ResourceFetcher::new(config.download_timeout(), &config.download.user_agent)
        .context("Failed to initialize HTTP client")?;

    let manager = Arc::new(SessionManager::new(
        Arc::new(orchestrator),
        Arc::new(SessionRegistry::new()),
        WorkspaceProvisioner::new(staging_root),
        fetcher,
        config.session_manager_config(),
    ));
    let server = McpServer::new(manager.clone());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = mcp::serve(&server, stdin, tokio::io::stdout()).await;

    manager.shutdown().await;
    result.context("MCP transport failed")
}
