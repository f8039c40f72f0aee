//! Network Layer
//!
//! WebSocket server for real-time matches.
//! Game logic lives in `game/`; this layer seats clients, runs the match
//! loops and turns simulation events into messages.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage};
pub use session::{
    ClientId, MatchMode, MatchSession, Role, SessionConfig, SessionError, SessionId,
    SessionManager, SessionState,
};
pub use server::{ConfigError, GameServer, GameServerError, ServerConfig};
