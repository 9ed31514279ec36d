use anyhow::{Context, Result};
use deepterm_core::{ChatRelay, ClientConfig, WasmPowSolver};
use deepterm_relay_server::config::ServerConfig;
use deepterm_relay_server::{app, logging, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let server_config = ServerConfig::from_env()?;
    let client_config = ClientConfig::from_env()?;
    info!(
        "Starting DeepTerm relay server v{}: upstream={}, wasm_path={}",
        deepterm_core::VERSION,
        client_config.base_url,
        server_config.wasm_path.display()
    );

    let solver = Arc::new(WasmPowSolver::from_path(&server_config.wasm_path));
    let relay = ChatRelay::new(client_config, solver)?;

    let addr = server_config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("DeepTerm relay server listening on http://{}", addr);

    axum::serve(listener, app(AppState { relay })).await?;
    Ok(())
}
