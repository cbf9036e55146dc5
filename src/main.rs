//! Blackhole Proxy - Main entry point

use anyhow::Result;
use blackhole_proxy::{GatewayConfig, ProxyServer};
use clap::Parser;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Blackhole Proxy - forwards fixed routes to namespaced backend services
#[derive(Parser, Debug)]
#[command(name = "blackhole-proxy")]
#[command(author = "Blackhole Contributors")]
#[command(version = "1.0.0")]
#[command(about = "Static-route HTTP reverse proxy front door")]
struct Args {
    /// Namespace appended to backend service host names
    #[arg(long, env = "NAMESPACE")]
    namespace: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = GatewayConfig::new(args.namespace);
    let server = Arc::new(ProxyServer::new(config));

    // Bind before serving so a busy port fails the process
    let listener = server.bind().await?;

    server
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
