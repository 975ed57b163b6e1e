//! Agent HTTP server: chat-style planning endpoint plus a static page.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use agent::io::config::{DEFAULT_CONFIG_PATH, load_config};
use agent::io::deepseek::DeepSeekGateway;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "agent-server")]
#[command(about = "HTTP front end for the planning agent")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Agent config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory containing the static page
    #[arg(long, default_value = "static")]
    ui_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agent_server=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    let state = AppState::new(Arc::new(DeepSeekGateway::new(config.llm)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = routes::router().layer(cors).with_state(state);

    if args.ui_dir.exists() {
        info!(ui_dir = %args.ui_dir.display(), "serving static files");
        app = app.fallback_service(
            ServeDir::new(&args.ui_dir).append_index_html_on_directories(true),
        );
    } else {
        info!(ui_dir = %args.ui_dir.display(), "static directory not found, API-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
