//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by its `type` field, in both
//! directions, over the one connection per client.

use serde::{Serialize, Deserialize};

use crate::core::vec3::Vec3;
use crate::game::events::SoundKind;
use crate::game::input::KeyInput;
use crate::game::state::MatchSnapshot;

/// Longest display name kept, in characters.
pub const MAX_NAME_LEN: usize = 16;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Key transition for `A`, `D` or space.
    KeyPress(KeyInput),

    /// Choose a display name.
    SetName {
        /// Requested name, sanitized on arrival
        name: String,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full match state (every tick, and to a client on join).
    GameState(MatchSnapshot),

    /// A point was scored.
    Score(MatchSnapshot),

    /// Both seats are filled and play begins.
    GameStart(MatchSnapshot),

    /// The match is over.
    GameEnd {
        /// Winner announcement
        txt: String,
    },

    /// Sent to a lone player waiting for an opponent.
    GameWait,

    /// Sent to the client that just took the second seat.
    SecondPlayer,

    /// Sound cue.
    Sound {
        /// Which cue to play
        sound: SoundKind,
    },

    /// Visual effect at a position (power hit).
    Effect {
        /// Effect origin
        op: Vec3,
    },
}

impl ServerMessage {
    /// Wire name of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::GameState(_) => "gameState",
            ServerMessage::Score(_) => "score",
            ServerMessage::GameStart(_) => "gameStart",
            ServerMessage::GameEnd { .. } => "gameEnd",
            ServerMessage::GameWait => "gameWait",
            ServerMessage::SecondPlayer => "secondPlayer",
            ServerMessage::Sound { .. } => "sound",
            ServerMessage::Effect { .. } => "effect",
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Trim a requested display name and cap its length.
/// Returns `None` if nothing printable is left.
pub fn sanitize_name(name: &str) -> Option<String> {
    let cleaned: String = name.trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_end().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
