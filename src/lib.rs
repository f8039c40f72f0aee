//! # Ping Pong Game Server
//!
//! Authoritative simulation for a two-player 3D ping pong game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PING PONG SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Math and randomness primitives            │
//! │  ├── vec3.rs     - 3D vector (f64)                           │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - Game logic (no I/O)                       │
//! │  ├── config.rs   - Table, ball, paddle and AI tunables       │
//! │  ├── state.rs    - Balls, paddles, score, match state        │
//! │  ├── tick.rs     - Fixed-step physics and scoring            │
//! │  ├── collision.rs- Wall and paddle collision                 │
//! │  ├── input.rs    - Paddle input and power hits               │
//! │  ├── ai.rs       - Computer opponent                         │
//! │  └── events.rs   - Simulation events                         │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server and match loops          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Roles and match sessions                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timing
//!
//! Physics advances by a fixed `1/60` s step per tick regardless of wall
//! clock jitter, so a match replayed from the same seed and the same
//! inputs ends in the same state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec3::Vec3;
pub use core::rng::DeterministicRng;
pub use game::config::GameConfig;
pub use game::input::{Key, KeyInput};
pub use game::state::{MatchState, MatchPhase, MatchSnapshot, Side};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Physics tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// AI decision rate (Hz)
pub const AI_TICK_RATE: u32 = 10;

/// Fixed physics step in seconds.
pub const TICK_DT: f64 = 1.0 / TICK_RATE as f64;
