//! Match Session Management
//!
//! Seats connections into matches, assigns roles, and turns simulation
//! events into broadcasts. Each match is its own `MatchSession`; the
//! `SessionManager` keys them by match id so many can run at once.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use serde::{Serialize, Deserialize};
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::core::rng::derive_match_seed;
use crate::game::ai::{AiController, AI_NAME};
use crate::game::config::GameConfig;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::KeyInput;
use crate::game::state::{MatchPhase, MatchState, Side, DEFAULT_ONE_NAME, DEFAULT_TWO_NAME};
use crate::game::tick::{tick, TickResult};
use crate::network::protocol::{sanitize_name, ServerMessage};

/// Unique session (match) identifier.
pub type SessionId = [u8; 16];

/// Unique connection identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub [u8; 16]);

impl ClientId {
    /// Generate a fresh random id.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

/// Role bound to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Not yet placed
    Unassigned,
    /// Controls the `+z` paddle
    PlayerOne,
    /// Controls the `-z` paddle
    PlayerTwo,
    /// Watches without a paddle
    Spectator,
}

impl Role {
    /// Paddle side controlled by this role.
    pub fn side(self) -> Option<Side> {
        match self {
            Role::PlayerOne => Some(Side::One),
            Role::PlayerTwo => Some(Side::Two),
            Role::Unassigned | Role::Spectator => None,
        }
    }

    /// Role that controls a side.
    pub fn for_side(side: Side) -> Role {
        match side {
            Side::One => Role::PlayerOne,
            Side::Two => Role::PlayerTwo,
        }
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nobody seated.
    Empty,
    /// One seat filled.
    WaitingForOpponent,
    /// Match in progress.
    Playing,
    /// A side passed the set score.
    Ended,
}

/// How the second seat is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Two human players.
    Versus,
    /// One human against the AI.
    Solo,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "versus" => Ok(MatchMode::Versus),
            "solo" => Ok(MatchMode::Solo),
            other => Err(format!("unknown match mode {:?}", other)),
        }
    }
}

/// Configuration for a match session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Match mode.
    pub mode: MatchMode,
    /// Spectators allowed per match.
    pub max_spectators: usize,
    /// Simulation configuration.
    pub game: GameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Versus,
            max_spectators: 8,
            game: GameConfig::default(),
        }
    }
}

/// A connection attached to a session.
#[derive(Debug)]
pub struct SessionClient {
    /// Connection identifier.
    pub id: ClientId,
    /// Current role.
    pub role: Role,
    /// Chosen display name, if any.
    pub name: Option<String>,
    /// Join order within the session.
    pub joined_seq: u64,
    /// Message channel to this client.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// A match session.
pub struct MatchSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Creation order among sessions.
    pub seq: u64,
    /// Session configuration.
    pub config: SessionConfig,
    /// Connected clients.
    clients: BTreeMap<ClientId, SessionClient>,
    /// Simulation state.
    game: MatchState,
    /// AI opponent (solo mode).
    ai: Option<AiController>,
    /// Next join sequence number.
    next_join_seq: u64,
    /// Set once the session has been dropped by the manager.
    closed: bool,
}

impl MatchSession {
    /// Create a new session.
    pub fn new(id: SessionId, seq: u64, config: SessionConfig, rng_seed: u64) -> Self {
        let game = MatchState::new(config.game.clone(), rng_seed);
        let ai = match config.mode {
            MatchMode::Solo => Some(AiController::new(
                Side::Two,
                config.game.ai_rate,
                rng_seed.rotate_left(32),
            )),
            MatchMode::Versus => None,
        };

        let mut session = Self {
            id,
            seq,
            config,
            clients: BTreeMap::new(),
            game,
            ai,
            next_join_seq: 0,
            closed: false,
        };
        session.apply_names();
        session
    }

    /// Add a client, seating it if a paddle is free.
    ///
    /// The joiner always receives the current `gameState`. Taking the
    /// first seat sends `gameWait`; completing the pair sends
    /// `secondPlayer` to the joiner and `gameStart` to everyone.
    pub fn join(
        &mut self,
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
        name: Option<String>,
    ) -> Result<Role, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        if self.clients.contains_key(&client_id) {
            return Err(SessionError::AlreadyInSession);
        }

        let role = if let Some(side) = self.vacant_side() {
            Role::for_side(side)
        } else if self.spectator_count() < self.config.max_spectators {
            Role::Spectator
        } else {
            return Err(SessionError::SessionFull);
        };

        let joined_seq = self.next_join_seq;
        self.next_join_seq += 1;
        self.clients.insert(client_id, SessionClient {
            id: client_id,
            role,
            name: name.as_deref().and_then(sanitize_name),
            joined_seq,
            sender,
        });
        self.apply_names();

        self.send_to(&client_id, ServerMessage::GameState(self.game.snapshot()));

        if role.side().is_some() {
            if self.vacant_side().is_none() {
                self.game.start();
                if role == Role::PlayerTwo && self.ai.is_none() {
                    self.send_to(&client_id, ServerMessage::SecondPlayer);
                }
                self.broadcast(ServerMessage::GameStart(self.game.snapshot()));
            } else {
                self.send_to(&client_id, ServerMessage::GameWait);
            }
        }

        Ok(role)
    }

    /// Remove a client.
    ///
    /// A departing player resets the match: score back to zero, fresh
    /// balls. The remaining player moves to the player one seat and a
    /// waiting spectator, if any, fills the free seat.
    pub fn leave(&mut self, client_id: &ClientId) -> Option<Role> {
        let client = self.clients.remove(client_id)?;
        if client.role.side().is_none() {
            return Some(client.role);
        }

        self.game.reset();

        // Remaining human player takes seat one
        let remaining = self.clients.values_mut()
            .find(|c| c.role.side().is_some());
        if let Some(remaining) = remaining {
            remaining.role = Role::PlayerOne;
        }

        // Promote the longest-waiting spectator into the free seat
        if let Some(side) = self.vacant_side() {
            let promoted = self.clients.values_mut()
                .filter(|c| c.role == Role::Spectator)
                .min_by_key(|c| c.joined_seq);
            if let Some(promoted) = promoted {
                promoted.role = Role::for_side(side);
                debug!("Promoted spectator {} to {:?}", promoted.id, promoted.role);
            }
        }

        self.apply_names();
        self.broadcast(ServerMessage::GameState(self.game.snapshot()));

        if self.seated_humans() > 0 {
            if self.vacant_side().is_none() {
                self.game.start();
                if self.ai.is_none() {
                    let second = self.clients.values()
                        .find(|c| c.role == Role::PlayerTwo)
                        .map(|c| c.id);
                    if let Some(second) = second {
                        self.send_to(&second, ServerMessage::SecondPlayer);
                    }
                }
                self.broadcast(ServerMessage::GameStart(self.game.snapshot()));
            } else {
                let waiting = self.clients.values()
                    .find(|c| c.role == Role::PlayerOne)
                    .map(|c| c.id);
                if let Some(waiting) = waiting {
                    self.send_to(&waiting, ServerMessage::GameWait);
                }
            }
        }

        Some(client.role)
    }

    /// Apply a key transition from a client. Spectators are ignored.
    /// Returns true if the input reached a paddle.
    pub fn apply_input(&mut self, client_id: &ClientId, input: KeyInput) -> bool {
        let side = match self.role_of(client_id).and_then(Role::side) {
            Some(side) => side,
            None => return false,
        };

        if let Some(event) = self.game.apply_paddle_input(side, input) {
            self.broadcast_event(&event);
        }
        true
    }

    /// Set a client's display name. Returns false if the name was rejected.
    pub fn set_name(&mut self, client_id: &ClientId, name: &str) -> bool {
        let name = match sanitize_name(name) {
            Some(name) => name,
            None => return false,
        };
        match self.clients.get_mut(client_id) {
            Some(client) => client.name = Some(name),
            None => return false,
        }
        self.apply_names();
        true
    }

    /// Run a single physics tick and broadcast its results.
    ///
    /// Events go out first, then the resulting `gameState` if the match is
    /// still playing.
    pub fn run_tick(&mut self) -> TickResult {
        let result = tick(&mut self.game);

        for event in &result.events {
            self.broadcast_event(event);
        }

        if let Some(winner) = result.winner {
            info!(
                "Match {} ended: {} won {}-{}",
                hex::encode(&self.id[..4]),
                self.game.name(winner),
                self.game.score.player_one,
                self.game.score.player_two,
            );
        }

        if result.advanced && self.game.is_playing() {
            self.broadcast(ServerMessage::GameState(self.game.snapshot()));
        }

        result
    }

    /// Let the AI take one decision through the shared input path.
    pub fn run_ai(&mut self) -> Option<KeyInput> {
        let ai = self.ai.as_mut()?;
        let input = ai.decide(&self.game)?;
        let side = ai.side;

        if let Some(event) = self.game.apply_paddle_input(side, input) {
            self.broadcast_event(&event);
        }
        Some(input)
    }

    /// Session state derived from seats and match phase.
    pub fn state(&self) -> SessionState {
        match self.game.phase {
            MatchPhase::Playing => SessionState::Playing,
            MatchPhase::Ended => SessionState::Ended,
            MatchPhase::Waiting if self.seated_humans() > 0 => SessionState::WaitingForOpponent,
            MatchPhase::Waiting => SessionState::Empty,
        }
    }

    /// Role of a client in this session.
    pub fn role_of(&self, client_id: &ClientId) -> Option<Role> {
        self.clients.get(client_id).map(|c| c.role)
    }

    /// Simulation state (read only).
    pub fn game(&self) -> &MatchState {
        &self.game
    }

    /// Simulation state, for tests and tooling.
    pub fn game_mut(&mut self) -> &mut MatchState {
        &mut self.game
    }

    /// Whether an AI holds a seat.
    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of spectators.
    pub fn spectator_count(&self) -> usize {
        self.clients.values().filter(|c| c.role == Role::Spectator).count()
    }

    /// Whether a new client could join.
    pub fn has_room(&self) -> bool {
        !self.closed
            && (self.vacant_side().is_some() || self.spectator_count() < self.config.max_spectators)
    }

    /// Whether a paddle seat is free.
    pub fn has_vacant_seat(&self) -> bool {
        !self.closed && self.vacant_side().is_some()
    }

    /// Mark closed; loops driving this session stop.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Check if closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Broadcast a message to all clients.
    ///
    /// Never waits: a client whose queue is full misses the message.
    pub fn broadcast(&self, message: ServerMessage) {
        for client in self.clients.values() {
            Self::deliver(client, message.clone());
        }
    }

    /// Send a message to one client.
    pub fn send_to(&self, client_id: &ClientId, message: ServerMessage) {
        if let Some(client) = self.clients.get(client_id) {
            Self::deliver(client, message);
        }
    }

    fn deliver(client: &SessionClient, message: ServerMessage) {
        match client.sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!("Outbound queue full for {}, dropped {}", client.id, message.kind());
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Client {} channel closed", client.id);
            }
        }
    }

    fn broadcast_event(&self, event: &GameEvent) {
        self.broadcast(event_to_message(event));
    }

    fn seat_taken(&self, side: Side) -> bool {
        if side == Side::Two && self.ai.is_some() {
            return true;
        }
        let role = Role::for_side(side);
        self.clients.values().any(|c| c.role == role)
    }

    fn vacant_side(&self) -> Option<Side> {
        [Side::One, Side::Two].into_iter().find(|side| !self.seat_taken(*side))
    }

    fn seated_humans(&self) -> usize {
        self.clients.values().filter(|c| c.role.side().is_some()).count()
    }

    /// Sync seat names into the match state.
    fn apply_names(&mut self) {
        let mut one = DEFAULT_ONE_NAME.to_string();
        let mut two = if self.ai.is_some() {
            AI_NAME.to_string()
        } else {
            DEFAULT_TWO_NAME.to_string()
        };

        for client in self.clients.values() {
            match (client.role, &client.name) {
                (Role::PlayerOne, Some(name)) => one = name.clone(),
                (Role::PlayerTwo, Some(name)) => two = name.clone(),
                _ => {}
            }
        }

        self.game.set_name(Side::One, one);
        self.game.set_name(Side::Two, two);
    }
}

/// Convert a simulation event to its broadcast message.
pub fn event_to_message(event: &GameEvent) -> ServerMessage {
    match &event.data {
        GameEventData::Sound(sound) => ServerMessage::Sound { sound: *sound },
        GameEventData::PowerHit { position, .. } => ServerMessage::Effect { op: *position },
        GameEventData::Scored { snapshot, .. } => ServerMessage::Score(snapshot.clone()),
        GameEventData::MatchEnded { .. } => ServerMessage::GameEnd {
            txt: event.winner_text().unwrap_or_default(),
        },
    }
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No seat and no spectator room.
    #[error("Session is full")]
    SessionFull,

    /// Client already in session.
    #[error("Already in session")]
    AlreadyInSession,

    /// Session was closed.
    #[error("Session closed")]
    Closed,
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Result of placing a connection.
#[derive(Clone)]
pub struct Placement {
    /// Session joined.
    pub session_id: SessionId,
    /// Session handle.
    pub session: Arc<RwLock<MatchSession>>,
    /// Role given.
    pub role: Role,
    /// True if the session was created for this connection.
    pub created: bool,
}

/// Manages all active sessions.
pub struct SessionManager {
    /// Configuration for new sessions.
    config: SessionConfig,
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<MatchSession>>>>,
    /// Client to session mapping.
    client_sessions: RwLock<BTreeMap<ClientId, SessionId>>,
    /// Sessions created so far.
    created: RwLock<u64>,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(BTreeMap::new()),
            client_sessions: RwLock::new(BTreeMap::new()),
            created: RwLock::new(0),
        }
    }

    /// Place a new connection.
    ///
    /// Prefers the oldest session with a free seat, then the oldest with
    /// spectator room, and otherwise opens a new session.
    pub async fn connect(
        &self,
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
        name: Option<String>,
    ) -> Result<Placement, SessionError> {
        let mut sessions = self.sessions.write().await;

        let mut seat_candidates = Vec::new();
        let mut watch_candidates = Vec::new();
        for (id, session) in sessions.iter() {
            let s = session.read().await;
            if s.has_vacant_seat() {
                seat_candidates.push((s.seq, *id));
            } else if s.has_room() {
                watch_candidates.push((s.seq, *id));
            }
        }
        seat_candidates.sort();
        watch_candidates.sort();

        let mut placement = None;
        for (_, id) in seat_candidates.into_iter().chain(watch_candidates) {
            let Some(session) = sessions.get(&id).cloned() else { continue };
            let joined = session.write().await.join(client_id, sender.clone(), name.clone());
            if let Ok(role) = joined {
                placement = Some(Placement { session_id: id, session, role, created: false });
                break;
            }
        }

        let placement = match placement {
            Some(p) => p,
            None => {
                let (id, session) = self.new_session().await;
                let (role, seed) = {
                    let mut s = session.write().await;
                    (s.join(client_id, sender, name)?, s.game().rng_seed)
                };
                sessions.insert(id, session.clone());
                info!(
                    "Created match {} ({:?}, seed {:#018x})",
                    hex::encode(&id[..4]),
                    self.config.mode,
                    seed,
                );
                Placement { session_id: id, session, role, created: true }
            }
        };

        self.client_sessions.write().await.insert(client_id, placement.session_id);
        Ok(placement)
    }

    async fn new_session(&self) -> (SessionId, Arc<RwLock<MatchSession>>) {
        let id = uuid::Uuid::new_v4().into_bytes();
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let seed = derive_match_seed(&id, nonce);

        let seq = {
            let mut created = self.created.write().await;
            *created += 1;
            *created
        };

        let session = MatchSession::new(id, seq, self.config.clone(), seed);
        (id, Arc::new(RwLock::new(session)))
    }

    /// Remove a connection from its session.
    ///
    /// A session left without clients is closed and dropped.
    pub async fn disconnect(&self, client_id: &ClientId) -> Option<(SessionId, Role)> {
        let session_id = self.client_sessions.write().await.remove(client_id)?;

        let mut sessions = self.sessions.write().await;
        let session = sessions.get(&session_id)?.clone();
        let mut s = session.write().await;
        let role = s.leave(client_id)?;

        if s.client_count() == 0 {
            s.close();
            sessions.remove(&session_id);
            info!("Closed match {}", hex::encode(&session_id[..4]));
        }

        Some((session_id, role))
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<MatchSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Get the session a client is in.
    pub async fn session_for(&self, client_id: &ClientId) -> Option<Arc<RwLock<MatchSession>>> {
        let session_id = {
            let client_sessions = self.client_sessions.read().await;
            *client_sessions.get(client_id)?
        };
        self.get_session(&session_id).await
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec3::Vec3;
    use crate::game::input::Key;
    use crate::game::state::Score;

    type Inbox = mpsc::Receiver<ServerMessage>;

    fn create_test_session() -> MatchSession {
        MatchSession::new([0; 16], 1, SessionConfig::default(), 42)
    }

    fn solo_session() -> MatchSession {
        let config = SessionConfig { mode: MatchMode::Solo, ..Default::default() };
        MatchSession::new([0; 16], 1, config, 42)
    }

    fn join(session: &mut MatchSession, n: u8) -> (ClientId, Role, Inbox) {
        let id = ClientId([n; 16]);
        let (tx, rx) = mpsc::channel(1024);
        let role = session.join(id, tx, None).unwrap();
        (id, role, rx)
    }

    fn drain(rx: &mut Inbox) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn kinds(messages: &[ServerMessage]) -> Vec<&'static str> {
        messages.iter().map(|m| m.kind()).collect()
    }

    #[test]
    fn test_first_player_waits() {
        let mut session = create_test_session();
        assert_eq!(session.state(), SessionState::Empty);

        let (_, role, mut rx) = join(&mut session, 1);
        assert_eq!(role, Role::PlayerOne);
        assert_eq!(session.state(), SessionState::WaitingForOpponent);
        assert_eq!(kinds(&drain(&mut rx)), vec!["gameState", "gameWait"]);
    }

    #[test]
    fn test_second_player_starts_match() {
        let mut session = create_test_session();
        let (_, _, mut rx1) = join(&mut session, 1);
        drain(&mut rx1);

        let (_, role, mut rx2) = join(&mut session, 2);
        assert_eq!(role, Role::PlayerTwo);
        assert_eq!(session.state(), SessionState::Playing);

        let one = drain(&mut rx1);
        let two = drain(&mut rx2);
        assert_eq!(kinds(&one), vec!["gameStart"]);
        assert_eq!(kinds(&two), vec!["gameState", "secondPlayer", "gameStart"]);

        for msg in [&one[0], &two[2]] {
            match msg {
                ServerMessage::GameStart(snapshot) => assert_eq!(snapshot.score, Score::default()),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_third_connection_spectates() {
        let mut session = create_test_session();
        join(&mut session, 1);
        join(&mut session, 2);
        let (id, role, mut rx) = join(&mut session, 3);
        assert_eq!(role, Role::Spectator);
        assert_eq!(kinds(&drain(&mut rx)), vec!["gameState"]);

        // Spectator input is ignored
        let before = session.game().snapshot();
        assert!(!session.apply_input(&id, KeyInput::press(Key::Left)));
        assert_eq!(session.game().snapshot(), before);
    }

    #[test]
    fn test_session_full() {
        let config = SessionConfig { max_spectators: 1, ..Default::default() };
        let mut session = MatchSession::new([0; 16], 1, config, 1);
        join(&mut session, 1);
        join(&mut session, 2);
        join(&mut session, 3);

        let (tx, _rx) = mpsc::channel(8);
        let result = session.join(ClientId([4; 16]), tx, None);
        assert!(matches!(result, Err(SessionError::SessionFull)));
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut session = create_test_session();
        join(&mut session, 1);
        let (tx, _rx) = mpsc::channel(8);
        let result = session.join(ClientId([1; 16]), tx, None);
        assert!(matches!(result, Err(SessionError::AlreadyInSession)));
    }

    #[test]
    fn test_input_moves_own_paddle() {
        let mut session = create_test_session();
        let (one, _, _rx1) = join(&mut session, 1);
        let (two, _, _rx2) = join(&mut session, 2);

        assert!(session.apply_input(&one, KeyInput::press(Key::Right)));
        assert!(session.apply_input(&two, KeyInput::press(Key::Left)));
        assert_eq!(session.game().player_one.position.x, 2.0);
        assert_eq!(session.game().player_two.position.x, -2.0);
    }

    #[test]
    fn test_tick_broadcasts_state() {
        let mut session = create_test_session();
        let (_, _, mut rx1) = join(&mut session, 1);
        let (_, _, mut rx2) = join(&mut session, 2);
        drain(&mut rx1);
        drain(&mut rx2);

        let result = session.run_tick();
        assert!(result.advanced);
        assert_eq!(kinds(&drain(&mut rx1)), vec!["gameState"]);
        assert_eq!(kinds(&drain(&mut rx2)), vec!["gameState"]);
    }

    #[test]
    fn test_waiting_tick_is_silent() {
        let mut session = create_test_session();
        let (_, _, mut rx1) = join(&mut session, 1);
        drain(&mut rx1);

        let result = session.run_tick();
        assert!(!result.advanced);
        assert!(drain(&mut rx1).is_empty());
    }

    #[test]
    fn test_match_end_broadcasts_once() {
        let mut session = create_test_session();
        let (one, _, mut rx1) = join(&mut session, 1);
        let (_, _, mut rx2) = join(&mut session, 2);
        session.set_name(&one, "Alice");

        let set_score = session.game().config.set_score;
        for _ in 0..=set_score {
            let game = session.game_mut();
            game.balls[0].position = Vec3::new(0.0, 6.0, -124.5);
            game.balls[0].velocity = Vec3::new(0.0, 0.0, -80.0);
            session.run_tick();
        }
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.game().score.player_one, set_score + 1);

        for _ in 0..60 {
            session.run_tick();
        }

        for rx in [&mut rx1, &mut rx2] {
            let messages = drain(rx);
            let ends: Vec<_> = messages.iter()
                .filter_map(|m| match m {
                    ServerMessage::GameEnd { txt } => Some(txt.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(ends.len(), 1);
            assert!(ends[0].contains("Alice"));

            // Nothing after the end
            let last = messages.iter().rposition(|m| m.kind() == "gameEnd").unwrap();
            assert_eq!(last, messages.len() - 1);
            let scores = messages.iter().filter(|m| m.kind() == "score").count();
            assert_eq!(scores, set_score as usize);
        }
    }

    #[test]
    fn test_power_hit_broadcasts_effect() {
        let mut session = create_test_session();
        let (one, _, mut rx1) = join(&mut session, 1);
        let (_, _, mut rx2) = join(&mut session, 2);
        drain(&mut rx1);
        drain(&mut rx2);

        let game = session.game_mut();
        game.balls[0].position = Vec3::new(0.0, 6.0, 92.0);
        game.balls[0].velocity = Vec3::new(0.0, 0.0, 80.0);

        session.apply_input(&one, KeyInput::press(Key::Power));
        for rx in [&mut rx1, &mut rx2] {
            let messages = drain(rx);
            assert_eq!(kinds(&messages), vec!["effect"]);
            assert_eq!(messages[0], ServerMessage::Effect { op: Vec3::new(0.0, 6.0, 92.0) });
        }
        assert!((session.game().balls[0].velocity.length() - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_player_two_leaving_resets_match() {
        let mut session = create_test_session();
        let (_, _, mut rx1) = join(&mut session, 1);
        let (two, _, _rx2) = join(&mut session, 2);
        session.game_mut().score.award(Side::One);
        drain(&mut rx1);

        assert_eq!(session.leave(&two), Some(Role::PlayerTwo));
        assert_eq!(session.state(), SessionState::WaitingForOpponent);
        assert_eq!(session.game().score, Score::default());
        assert_eq!(kinds(&drain(&mut rx1)), vec!["gameState", "gameWait"]);
    }

    #[test]
    fn test_player_one_leaving_promotes_player_two() {
        let mut session = create_test_session();
        let (one, _, _rx1) = join(&mut session, 1);
        let (two, _, mut rx2) = join(&mut session, 2);
        drain(&mut rx2);

        session.leave(&one);
        assert_eq!(session.role_of(&two), Some(Role::PlayerOne));
        assert_eq!(kinds(&drain(&mut rx2)), vec!["gameState", "gameWait"]);

        // A new arrival takes seat two
        let (_, role, _rx3) = join(&mut session, 3);
        assert_eq!(role, Role::PlayerTwo);
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[test]
    fn test_spectator_fills_vacated_seat() {
        let mut session = create_test_session();
        let (_, _, mut rx1) = join(&mut session, 1);
        let (two, _, _rx2) = join(&mut session, 2);
        let (watcher, _, mut rx3) = join(&mut session, 3);
        let (late, _, _rx4) = join(&mut session, 4);
        drain(&mut rx1);
        drain(&mut rx3);

        session.leave(&two);
        assert_eq!(session.role_of(&watcher), Some(Role::PlayerTwo));
        assert_eq!(session.role_of(&late), Some(Role::Spectator));
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(kinds(&drain(&mut rx1)), vec!["gameState", "gameStart"]);
        assert_eq!(kinds(&drain(&mut rx3)), vec!["gameState", "secondPlayer", "gameStart"]);
    }

    #[test]
    fn test_spectator_leaving_changes_nothing() {
        let mut session = create_test_session();
        join(&mut session, 1);
        join(&mut session, 2);
        let (watcher, _, _rx) = join(&mut session, 3);
        session.game_mut().score.award(Side::Two);

        assert_eq!(session.leave(&watcher), Some(Role::Spectator));
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.game().score.player_two, 1);
    }

    #[test]
    fn test_solo_starts_immediately() {
        let mut session = solo_session();
        assert!(session.has_ai());
        let (_, role, mut rx) = join(&mut session, 1);
        assert_eq!(role, Role::PlayerOne);
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.game().two_name, AI_NAME);
        assert_eq!(kinds(&drain(&mut rx)), vec!["gameState", "gameStart"]);

        // Next connection spectates
        let (_, role, _rx2) = join(&mut session, 2);
        assert_eq!(role, Role::Spectator);
    }

    #[test]
    fn test_solo_ai_moves_through_input_path() {
        let config = SessionConfig {
            mode: MatchMode::Solo,
            game: GameConfig { ai_rate: 0.0, ..Default::default() },
            ..Default::default()
        };
        let mut session = MatchSession::new([0; 16], 1, config, 42);
        join(&mut session, 1);

        let game = session.game_mut();
        game.balls[0].position = Vec3::new(20.0, 6.0, -40.0);
        game.balls[0].velocity = Vec3::new(0.0, 0.0, -80.0);

        assert_eq!(session.run_ai(), Some(KeyInput::press(Key::Right)));
        assert_eq!(session.game().player_two.position.x, 2.0);
    }

    #[test]
    fn test_versus_has_no_ai() {
        let mut session = create_test_session();
        join(&mut session, 1);
        join(&mut session, 2);
        assert_eq!(session.run_ai(), None);
    }

    #[test]
    fn test_names_follow_seats() {
        let mut session = create_test_session();
        let (one, _, _rx1) = join(&mut session, 1);
        let (tx, _rx2) = mpsc::channel(8);
        session.join(ClientId([2; 16]), tx, Some("  Bob ".to_string())).unwrap();

        assert!(session.set_name(&one, "Alice"));
        assert!(!session.set_name(&one, "   "));
        assert_eq!(session.game().one_name, "Alice");
        assert_eq!(session.game().two_name, "Bob");

        session.leave(&one);
        assert_eq!(session.game().one_name, "Bob");
        assert_eq!(session.game().two_name, DEFAULT_TWO_NAME);
    }

    #[test]
    fn test_full_queue_does_not_block() {
        let mut session = create_test_session();
        let (tx, _rx) = mpsc::channel(1);
        session.join(ClientId([1; 16]), tx, None).unwrap();
        join(&mut session, 2);
        for _ in 0..10 {
            session.run_tick();
        }
    }

    #[tokio::test]
    async fn test_manager_pairs_connections() {
        let manager = SessionManager::default();
        let (tx1, _rx1) = mpsc::channel(64);
        let (tx2, _rx2) = mpsc::channel(64);
        let (tx3, _rx3) = mpsc::channel(64);

        let p1 = manager.connect(ClientId([1; 16]), tx1, None).await.unwrap();
        assert!(p1.created);
        assert_eq!(p1.role, Role::PlayerOne);

        let p2 = manager.connect(ClientId([2; 16]), tx2, None).await.unwrap();
        assert!(!p2.created);
        assert_eq!(p2.session_id, p1.session_id);
        assert_eq!(p2.role, Role::PlayerTwo);

        let p3 = manager.connect(ClientId([3; 16]), tx3, None).await.unwrap();
        assert_eq!(p3.session_id, p1.session_id);
        assert_eq!(p3.role, Role::Spectator);
        assert_eq!(manager.session_count().await, 1);

        let found = manager.session_for(&ClientId([2; 16])).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_manager_opens_new_match_when_full() {
        let config = SessionConfig { max_spectators: 0, ..Default::default() };
        let manager = SessionManager::new(config);
        let mut inboxes = Vec::new();
        let mut placements = Vec::new();
        for n in 1..=3u8 {
            let (tx, rx) = mpsc::channel(64);
            inboxes.push(rx);
            placements.push(manager.connect(ClientId([n; 16]), tx, None).await.unwrap());
        }

        assert_eq!(manager.session_count().await, 2);
        assert_ne!(placements[2].session_id, placements[0].session_id);
        assert_eq!(placements[2].role, Role::PlayerOne);
        assert!(placements[2].created);
    }

    #[tokio::test]
    async fn test_manager_disconnect_closes_empty_match() {
        let manager = SessionManager::default();
        let (tx1, _rx1) = mpsc::channel(64);
        let (tx2, _rx2) = mpsc::channel(64);
        let p1 = manager.connect(ClientId([1; 16]), tx1, None).await.unwrap();
        manager.connect(ClientId([2; 16]), tx2, None).await.unwrap();

        let (_, role) = manager.disconnect(&ClientId([2; 16])).await.unwrap();
        assert_eq!(role, Role::PlayerTwo);
        assert_eq!(p1.session.read().await.state(), SessionState::WaitingForOpponent);

        manager.disconnect(&ClientId([1; 16])).await.unwrap();
        assert_eq!(manager.session_count().await, 0);
        assert!(p1.session.read().await.is_closed());
        assert!(manager.session_for(&ClientId([1; 16])).await.is_none());
        assert!(manager.disconnect(&ClientId([1; 16])).await.is_none());
    }
}
