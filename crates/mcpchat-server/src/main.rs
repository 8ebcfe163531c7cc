use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mcpchat_core::{ChatService, ConfigProvider, FileConfigProvider, Logger, TracingLogger};
use mcpchat_server::http::{self, AppState};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mcpchat-server", version, about = "Streaming chat turns over MCP tool providers")]
struct Args {
    /// YAML config file; defaults to the user config
    #[arg(long, env = "MCPCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address; overrides `server.bind`
    #[arg(long, env = "MCPCHAT_BIND")]
    bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "MCPCHAT_LOG_JSON")]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let provider = FileConfigProvider::discover(args.config);
    let config = provider
        .engine_config()
        .await
        .with_context(|| format!("failed to load config from {}", provider.path().display()))?;
    tracing::info!(path = %provider.path().display(), exists = provider.exists(), "config loaded");

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::for_component("mcpchat"));
    let service = Arc::new(ChatService::from_config(&config, logger));
    let app = http::router(AppState { service });

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(%bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("http server crashed")?;
    Ok(())
}
