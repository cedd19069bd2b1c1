//! Thin HTTP/SSE adapter over `partyhub_core`: no game logic lives here,
//! only request parsing, shared-state wiring, and the server loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use ctrlc::set_handler;
use partyhub_core::{EventBus, GameContext, MemoryStore, RoomRegistry, Scheduler};
use pico_args::Arguments;
use tracing::info;

use partyhub_server::config::ServerConfig;
use partyhub_server::{api, logging};

const HELP: &str = "\
Run the party-hub real-time game backend

USAGE:
  partyhub_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  ROOM_TTL_SECS            Ephemeral-state TTL applied to every room key
  QUIZ_ROUND_TIME_SECS     Default Quiz round duration in seconds
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    let bind_override: Option<SocketAddr> = pargs.value_from_str("--bind").ok();

    logging::init();

    let config = ServerConfig::from_env(bind_override)?;
    config.validate()?;
    let config = Arc::new(config);

    set_handler(|| std::process::exit(0))?;

    let store = MemoryStore::new();
    store.spawn_sweeper(std::time::Duration::from_secs(60));
    let bus = EventBus::new();
    bus.spawn_reaper(std::time::Duration::from_secs(300));
    let scheduler = Scheduler::new();
    let registry = RoomRegistry::new(store.clone());
    let ctx = GameContext::new(store, bus, scheduler, registry);

    let app_state = api::AppState { ctx, config: config.clone() };
    let app = api::create_router(app_state);

    info!(bind = %config.bind, "starting party-hub server");
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!("server is running at http://{}. Press Ctrl+C to stop.", config.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("shutting down server");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}
