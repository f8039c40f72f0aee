//! Game Logic Module
//!
//! All game simulation code. No I/O and no wall-clock reads.
//!
//! ## Module Structure
//!
//! - `config`: Table, ball, paddle and AI tunables
//! - `state`: Balls, paddles, score, match state and snapshots
//! - `tick`: Fixed-step physics, scoring and the serve algorithm
//! - `collision`: Wall reflection and paddle bounce
//! - `input`: Key input, paddle movement and power hits
//! - `ai`: Computer opponent
//! - `events`: Events produced for the broadcast layer

pub mod config;
pub mod state;
pub mod tick;
pub mod collision;
pub mod input;
pub mod ai;
pub mod events;

// Re-export key types
pub use config::GameConfig;
pub use state::{Ball, Paddle, Score, MatchState, MatchPhase, MatchSnapshot, Side};
pub use input::{Key, KeyInput};
pub use tick::TickResult;
pub use events::{GameEvent, SoundKind};
