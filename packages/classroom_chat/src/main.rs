use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod cli;
mod client;
mod config;
mod handlers;
mod metrics;
mod router;
#[cfg(test)]
mod test_helpers;

use crate::config::{ClientConfig, ServerConfig};
use crate::metrics::ServerMetrics;
use crate::router::ChannelRegistry;

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
#[command(name = "chat")]
#[command(about = "Real-time chat for the student management portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/classroom-chat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat router in the foreground
    Server(ServerArgs),

    /// Open an interactive chat session
    Connect(ConnectArgs),
}

#[derive(Parser)]
struct ServerArgs {
    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the chat server
    #[arg(short, long)]
    port: Option<u16>,

    /// Echo routed messages back to their sender
    #[arg(long)]
    echo: bool,
}

#[derive(Parser)]
struct ConnectArgs {
    /// Identity to chat as
    #[arg(long = "as", value_name = "ID")]
    identity: String,

    /// Identity to send messages to
    #[arg(long, value_name = "ID")]
    to: Option<String>,

    /// Channel base address, e.g. ws://127.0.0.1:10000/ws/chat
    #[arg(long)]
    url: Option<String>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// Identity → open channel
    pub registry: Arc<ChannelRegistry>,
    /// Router runtime configuration
    pub server_config: Arc<ServerConfig>,
    /// Router metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::resolve(cli.config)?;

    match cli.command {
        Commands::Server(args) => {
            init_tracing(
                cli.debug,
                "chat=debug,tower_http=debug,info",
                "chat=info,tower_http=info,warn",
            );
            let mut server_config = ServerConfig::from_file(&file_config.server);
            if let Some(host) = args.host {
                server_config.host = host;
            }
            if let Some(port) = args.port {
                server_config.port = port;
            }
            server_config.echo_to_sender |= args.echo;
            run_server(server_config).await
        }
        Commands::Connect(args) => {
            // Logs go to stderr so they never interleave with the chat on stdout
            init_tracing(cli.debug, "chat=debug,warn", "chat=warn,error");
            let mut client_config = ClientConfig::from_file(&file_config.client);
            if let Some(url) = args.url {
                client_config.server_url = url;
            }
            cli::connect_command(client_config, args.identity, args.to).await
        }
    }
}

fn init_tracing(debug: bool, debug_directive: &str, default_directive: &str) {
    let directive = if debug {
        debug_directive
    } else {
        default_directive
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// Build the HTTP surface: the chat channel upgrade plus health and metrics.
pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/ws/chat/{user_id}", get(handlers::chat_websocket_handler))
        .route("/api/online", get(handlers::online_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run_server(server_config: ServerConfig) -> Result<()> {
    info!("Starting chat router");

    let addr = server_config.bind_addr()?;
    info!(
        "Router config: send_channel_capacity={}, echo_to_sender={}",
        server_config.send_channel_capacity, server_config.echo_to_sender
    );

    let app_state = AppState {
        registry: Arc::new(ChannelRegistry::new()),
        server_config: Arc::new(server_config),
        metrics: Arc::new(ServerMetrics::new()),
    };
    let app = build_app(app_state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Chat router listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET /ws/chat/:user_id - Chat channel for user_id");
    info!("  GET /api/online       - Identities with an open channel");
    info!("  GET /health           - Router health");
    info!("  GET /metrics          - Router metrics");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
