//! Ping Pong Game Server
//!
//! Authoritative WebSocket server for ping pong matches.

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pingpong::{
    TICK_RATE, AI_TICK_RATE, VERSION,
    network::server::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::from_env()?;

    info!("Ping Pong Server v{}", VERSION);
    info!("Tick Rate: {} Hz, AI Rate: {} Hz", TICK_RATE, AI_TICK_RATE);
    info!(
        "Mode: {:?}, balls: {}, set score: {}",
        config.session.mode,
        config.session.game.ball_count,
        config.session.game.set_score,
    );

    let server = std::sync::Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
