//! Connect Four match server
//!
//! Usage: cargo run -p connect4_web --bin connect4-server -- --port 8080

use clap::Parser;
use connect4_web::settings::CONFIG_PATH_VAR;
use connect4_web::{GatewaySettings, ServerConfig, WebServer};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "connect4-server", version, about = "Connect Four match server")]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind to
    #[arg(long, short, default_value_t = 8080)]
    port: u16,
    /// TOML settings file (overrides CONNECT4_CONFIG)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args
        .config
        .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));
    let settings = GatewaySettings::resolve(config_path.as_deref(), |name| std::env::var(name).ok())?;

    connect4_web::init_logging(settings.log_format).map_err(|err| err as Box<dyn std::error::Error>)?;

    tracing::info!(
        host = %args.host,
        port = args.port,
        queue_wait_ms = settings.queue_wait_ms,
        reconnect_grace_ms = settings.reconnect_grace_ms,
        bot_think_delay_ms = settings.bot_think_delay_ms,
        bot_strategy = %settings.bot_strategy,
        "starting connect four server"
    );

    let server = WebServer::new(ServerConfig::new(args.host, args.port), settings)?;
    let handle = server.start().await?;
    tracing::info!(address = %handle.address(), "server running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.context().metrics().log_metrics();
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
