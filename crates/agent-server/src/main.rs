//! search-bot HTTP Server
//!
//! Axum-based server providing the session REST API, the WebSocket agent
//! stream, and the WASM chat UI.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::MemorySessionStore;
use agent_runtime::GeminiProviderFactory;
use lookup_tools::{default_registry, LookupConfig};

use crate::config::ServerConfig;
use crate::state::AppState;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Model clients are built per turn from the session's key
    let providers = GeminiProviderFactory::from_env()?;

    // The chat is useless without its tools; fail startup instead
    let tools = default_registry(&LookupConfig::from_env())?;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let sessions = Arc::new(MemorySessionStore::new());
    spawn_pruner(sessions.clone(), config.session_idle_minutes);

    let state = AppState {
        sessions,
        tools: Arc::new(tools),
        providers: Arc::new(providers),
        config: Arc::new(config.clone()),
    };
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 search-bot server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  GET  /api/models                      - Model options");
    tracing::info!("  POST /api/sessions                    - New chat session");
    tracing::info!("  PUT  /api/sessions/{{id}}/api-key       - Save or update API key");
    tracing::info!("  PUT  /api/sessions/{{id}}/settings      - Model and temperature");
    tracing::info!("  POST /api/sessions/{{id}}/chat          - Send message");
    tracing::info!("  GET  /api/sessions/{{id}}/chat/stream   - WebSocket agent stream");
    tracing::info!("  Static UI from {}", config.static_dir.display());
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Drop sessions nobody has touched for `idle_minutes`
fn spawn_pruner(sessions: Arc<MemorySessionStore>, idle_minutes: i64) {
    let max_idle = chrono::Duration::minutes(idle_minutes);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            match sessions.prune_idle(max_idle) {
                Ok(0) => {}
                Ok(pruned) => tracing::info!(pruned, "Pruned idle sessions"),
                Err(e) => tracing::warn!(error = %e, "Session pruning failed"),
            }
        }
    });
}
