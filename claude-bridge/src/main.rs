use std::net::SocketAddr;

use claude_bridge::{create_app, AppState, BridgeConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("claude_bridge=info,tower_http=info")),
        )
        .init();

    let config = BridgeConfig::load()?;
    if !config.workspace.is_dir() {
        tracing::warn!(
            "Workspace {} does not exist, invocations will fail to spawn",
            config.workspace.display()
        );
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        "Server configuration: claude={}, workspace={}, pipe_mode={:?}, timeout={}s",
        config.claude_bin,
        config.workspace.display(),
        config.pipe_mode,
        config.invocation_timeout_secs
    );

    let app = create_app(AppState::new(config));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Claude API server running on port {}", addr.port());
    axum::serve(listener, app).await?;

    Ok(())
}
