// Hearth server entry point.
//
// Startup sequence:
// 1. Parse CLI, initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Open the world store and load the snapshot
// 4. Bind the TCP and (optionally) WebSocket listeners
// 5. Serve until Ctrl+C

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hearth_core::WorldStore;
use hearth_server::config::{self, Config};
use hearth_server::server::Server;
use hearth_server::{listener, ws_server};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hearth-server", about = "Hearth multi-user world server")]
struct Cli {
    /// Config file to load instead of config/server.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;
    info!("Hearth server starting up");

    let config = load(&cli).context("failed to load configuration")?;
    info!(
        "Config loaded: tcp={}:{}, ws_port={}, world={}",
        config.server.bind, config.server.tcp_port, config.server.ws_port, config.world.db_path
    );

    let store = WorldStore::open(&config.world.db_path).context("failed to open world store")?;
    let world = store
        .load()
        .with_context(|| format!("failed to load world from {}", config.world.db_path))?;
    info!("Loaded {} rooms, {} exits", world.len(), world.exit_count());
    for (room, exit) in world.dangling_exits() {
        warn!(
            "Exit {} of room {room} leads to missing room {}",
            exit.direction, exit.target_room
        );
    }

    let server = Arc::new(Server::new(world, config.server_settings()));

    let tcp = TcpListener::bind((config.server.bind.as_str(), config.server.tcp_port))
        .await
        .with_context(|| format!("failed to bind TCP port {}", config.server.tcp_port))?;
    let tcp_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = listener::run(tcp, server).await {
                error!("TCP listener error: {e}");
            }
        })
    };

    let ws_handle = if config.server.ws_port != 0 {
        let ws = TcpListener::bind((config.server.bind.as_str(), config.server.ws_port))
            .await
            .with_context(|| format!("failed to bind WebSocket port {}", config.server.ws_port))?;
        let server = Arc::clone(&server);
        Some(tokio::spawn(async move {
            if let Err(e) = ws_server::run(ws, server).await {
                error!("WebSocket listener error: {e}");
            }
        }))
    } else {
        info!("WebSocket listener disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!(
        "Shutdown requested, {} players connected",
        server.registry().len()
    );

    tcp_handle.abort();
    if let Some(handle) = ws_handle {
        handle.abort();
    }

    info!("Hearth server shut down");
    Ok(())
}

fn load(cli: &Cli) -> Result<Config, config::ConfigError> {
    match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hearth_server=info,hearth_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
