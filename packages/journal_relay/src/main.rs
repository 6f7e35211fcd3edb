use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod handlers;
mod history;
mod metrics;
mod store;
mod ws;

#[cfg(test)]
mod test_helpers;

use config::{FileConfig, HistoryConfig, ServerConfig};
use history::HistoryClient;
use metrics::ServerMetrics;
use store::ConversationStore;
use ws::RoomRegistry;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "journal-relay")]
#[command(about = "Realtime journaling backend for voice conversations")]
struct Cli {
    /// TOML config file (optional; missing file means defaults)
    #[arg(short, long, default_value = "journal-relay.toml")]
    config: PathBuf,

    /// Host to bind to (overrides config and environment)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the web server (overrides config and `PORT`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub store: Arc<ConversationStore>,
    pub rooms: Arc<RoomRegistry>,
    pub metrics: Arc<ServerMetrics>,
    pub history: Arc<HistoryClient>,
}

/// All routes, middleware included.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/ws", get(handlers::journal_websocket_handler))
        .route("/api/process", post(handlers::process_input))
        .route(
            "/api/journal/{conversation_id}",
            get(handlers::get_journal).post(handlers::update_journal),
        )
        .route(
            "/api/transcript/{conversation_id}",
            post(handlers::append_transcript),
        )
        .route(
            "/api/conversation-history/{conversation_id}",
            get(handlers::get_conversation_history),
        )
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "journal_relay=debug,tower_http=debug,info"
    } else {
        "journal_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let file_config: FileConfig = config::load_config(&cli.config)
        .extract()
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let mut server_config = ServerConfig::from_file(&file_config.server);
    if let Some(host) = cli.host {
        server_config.host = host;
    }
    if let Some(port) = cli.port {
        server_config.port = port;
    }

    let history_config = HistoryConfig::from_file(&file_config.history);
    let history =
        HistoryClient::new(history_config).context("Failed to build history HTTP client")?;
    if !history.is_configured() {
        info!("ELEVENLABS_API_KEY not set; conversation history lookups will report an error");
    }

    let state = AppState {
        store: Arc::new(ConversationStore::new()),
        rooms: Arc::new(RoomRegistry::new()),
        metrics: Arc::new(ServerMetrics::new()),
        history: Arc::new(history),
    };
    let app = build_router(state);

    let addr = server_config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Journal relay listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET    /ws                                - Realtime journal channel");
    info!("  GET    /api/journal/:id                   - Read journal");
    info!("  POST   /api/journal/:id                   - Replace journal text");
    info!("  POST   /api/transcript/:id                - Append transcript entry");
    info!("  GET    /api/conversation-history/:id      - Upstream conversation history");

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; run until the process is killed
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Journal relay stopped");
    Ok(())
}
