//! trade-arena server binary: tracing, arena task, websocket routes.

use trade_arena::{create_app, spawn_arena, ArenaConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ArenaConfig::default();
    let arena = spawn_arena(cfg);

    let addr = std::env::var("TRADE_ARENA_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "trade-arena listening");

    axum::serve(listener, create_app(arena)).await?;
    Ok(())
}
