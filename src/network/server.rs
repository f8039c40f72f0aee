//! WebSocket Game Server
//!
//! Async WebSocket server for ping pong matches.
//! Places each connection into a match, routes key input to it, and drives
//! every match with its own tick loop (plus an AI loop in solo mode).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::config::GameConfig;
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::session::{
    ClientId, MatchMode, MatchSession, SessionConfig, SessionError, SessionManager,
};
use crate::{AI_TICK_RATE, TICK_RATE};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Highest accepted ball count.
pub const MAX_BALLS: usize = 8;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Tick rate for game simulation (Hz).
    pub tick_rate: u32,
    /// AI decision rate (Hz).
    pub ai_tick_rate: u32,
    /// Outbound queue length per client.
    pub outbound_buffer: usize,
    /// Settings for every match.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            tick_rate: TICK_RATE,
            ai_tick_rate: AI_TICK_RATE,
            outbound_buffer: 256,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from process environment variables.
    ///
    /// Reads `PORT`, `PONG_MODE`, `PONG_BALLS`, `PONG_AI_RATE` and
    /// `PONG_SET_SCORE`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &raw)?;
            config.bind_addr.set_port(port);
        }

        if let Some(raw) = lookup("PONG_MODE") {
            config.session.mode = raw.parse::<MatchMode>()
                .map_err(|reason| ConfigError::invalid("PONG_MODE", &raw, reason))?;
        }

        if let Some(raw) = lookup("PONG_BALLS") {
            let balls: usize = parse_var("PONG_BALLS", &raw)?;
            if !(1..=MAX_BALLS).contains(&balls) {
                return Err(ConfigError::invalid(
                    "PONG_BALLS",
                    &raw,
                    format!("must be between 1 and {}", MAX_BALLS),
                ));
            }
            config.session.game.ball_count = balls;
        }

        if let Some(raw) = lookup("PONG_AI_RATE") {
            let rate: f64 = parse_var("PONG_AI_RATE", &raw)?;
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::invalid("PONG_AI_RATE", &raw, "must be between 0 and 1"));
            }
            config.session.game.ai_rate = rate;
        }

        if let Some(raw) = lookup("PONG_SET_SCORE") {
            config.session.game.set_score = parse_var("PONG_SET_SCORE", &raw)?;
        }

        Ok(config)
    }

    /// Simulation settings shared by every match.
    pub fn game(&self) -> &GameConfig {
        &self.session.game
    }
}

fn parse_var<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>()
        .map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be used.
    #[error("Invalid {key}={value:?}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// What was wrong.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Connected client state.
struct ConnectedClient {
    /// Remote address.
    addr: SocketAddr,
    /// Connection time.
    connected_at: Instant,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<ClientId, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            sessions: Arc::new(SessionManager::new(config.session.clone())),
            config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Game server listening on {} ({:?}, {} ball(s))",
            listener.local_addr()?,
            self.config.session.mode,
            self.config.session.game.ball_count,
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
        let config = self.config.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let client_id = ClientId::new_v4();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(client_id, ConnectedClient {
                    addr,
                    connected_at: Instant::now(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Place into a match
            let placement = match sessions.connect(client_id, msg_tx, None).await {
                Ok(placement) => placement,
                Err(e) => {
                    error!("Could not place {}: {}", client_id, e);
                    sender_task.abort();
                    clients.write().await.remove(&client_id);
                    return;
                }
            };
            info!(
                "Client {} ({}) joined match {} as {:?}",
                client_id,
                addr,
                hex::encode(&placement.session_id[..4]),
                placement.role,
            );

            if placement.created {
                Self::spawn_match_loops(placement.session.clone(), &config, &shutdown_tx).await;
            }
            let session = placement.session;

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Ignoring malformed message from {}: {}", client_id, e);
                                        continue;
                                    }
                                };
                                Self::handle_client_message(client_id, client_msg, &session).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                debug!("Ignoring binary frame from {}", client_id);
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", client_id);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", client_id, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();

            if let Some((session_id, role)) = sessions.disconnect(&client_id).await {
                debug!(
                    "Client {} left match {} ({:?})",
                    client_id,
                    hex::encode(&session_id[..4]),
                    role,
                );
            }

            let mut clients = clients.write().await;
            if let Some(client) = clients.remove(&client_id) {
                info!(
                    "Client {} ({}) cleaned up after {:.1}s",
                    client_id,
                    client.addr,
                    client.connected_at.elapsed().as_secs_f64(),
                );
            }
        });
    }

    /// Route a client message into its match.
    async fn handle_client_message(
        client_id: ClientId,
        msg: ClientMessage,
        session: &Arc<RwLock<MatchSession>>,
    ) {
        match msg {
            ClientMessage::KeyPress(input) => {
                let mut s = session.write().await;
                s.apply_input(&client_id, input);
            }
            ClientMessage::SetName { name } => {
                let mut s = session.write().await;
                if !s.set_name(&client_id, &name) {
                    debug!("Rejected name from {}", client_id);
                }
            }
        }
    }

    /// Start the tick loop, and the AI loop for solo matches.
    async fn spawn_match_loops(
        session: Arc<RwLock<MatchSession>>,
        config: &ServerConfig,
        shutdown_tx: &broadcast::Sender<()>,
    ) {
        let has_ai = session.read().await.has_ai();

        let tick_session = session.clone();
        let tick_rate = config.tick_rate;
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            Self::run_match_loop(tick_session, tick_rate, shutdown_rx).await;
        });

        if has_ai {
            let ai_rate = config.ai_tick_rate;
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                Self::run_ai_loop(session, ai_rate, shutdown_rx).await;
            });
        }
    }

    /// Fixed-rate physics loop for one match. Exits when the match closes.
    async fn run_match_loop(
        session: Arc<RwLock<MatchSession>>,
        tick_rate: u32,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let session_id = session.read().await.id;
        let tick_duration = Duration::from_micros(1_000_000 / tick_rate.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                _ = shutdown_rx.recv() => break,
            }

            let mut s = session.write().await;
            if s.is_closed() {
                break;
            }

            let result = s.run_tick();

            #[cfg(feature = "debug-tracing")]
            {
                tracing::trace!(
                    "Match {} tick {}: {} event(s)",
                    hex::encode(&session_id[..4]),
                    s.game().tick,
                    result.events.len(),
                );
            }

            if result.points > 0 {
                debug!(
                    "Match {} score {}-{}",
                    hex::encode(&session_id[..4]),
                    s.game().score.player_one,
                    s.game().score.player_two,
                );
            }
        }

        debug!("Match {} loop stopped", hex::encode(&session_id[..4]));
    }

    /// AI decision loop for a solo match.
    async fn run_ai_loop(
        session: Arc<RwLock<MatchSession>>,
        ai_rate: u32,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut beat = interval(Duration::from_micros(1_000_000 / ai_rate.max(1) as u64));
        beat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = beat.tick() => {}
                _ = shutdown_rx.recv() => break,
            }

            let mut s = session.write().await;
            if s.is_closed() {
                break;
            }
            s.run_ai();
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
