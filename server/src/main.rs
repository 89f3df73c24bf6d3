//! Entry point: loads configuration, binds the HTTP/WebSocket listener,
//! and serves requests until the process is terminated.

use clap::Parser;
use log::info;
use server::config::{Args, Config};
use server::error::ServerError;
use server::registry::Registry;
use server::transport::{build_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let mut config = Config::from_env();
    config.apply_cli_override(&args);

    info!(
        "starting room server: mode={:?} tick_rate={} disconnect_grace_ms={}",
        config.mode, config.tick_rate, config.disconnect_grace_ms
    );

    let registry = Registry::new(config.clone());
    let state = Arc::new(AppState { registry, started_at: Instant::now() });
    let app = build_router(state);

    let addr = SocketAddr::new(args.host.parse().unwrap_or_else(|_| [0, 0, 0, 0].into()), config.port);
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(ServerError::Transport)?;
    axum::serve(listener, app).await.map_err(ServerError::Transport)?;

    Ok(())
}
