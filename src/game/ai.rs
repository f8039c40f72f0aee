//! Computer Opponent
//!
//! Runs on its own slower timer and produces the same `KeyInput` a human
//! client would send. It never moves a paddle directly.

use crate::core::rng::DeterministicRng;
use crate::game::input::{Key, KeyInput};
use crate::game::state::{Ball, MatchState, Side};

/// Display name used for the AI seat.
pub const AI_NAME: &str = "Computer";

/// AI controller for one paddle.
#[derive(Clone, Debug)]
pub struct AiController {
    /// Side the AI plays
    pub side: Side,
    /// Probability of skipping a decision
    pub miss_rate: f64,
    rng: DeterministicRng,
}

impl AiController {
    /// Create a controller with its own random stream.
    pub fn new(side: Side, miss_rate: f64, seed: u64) -> Self {
        Self {
            side,
            miss_rate,
            rng: DeterministicRng::new(seed),
        }
    }

    /// Decide this beat's input, if any.
    ///
    /// Tracks the ball furthest advanced towards the AI's end. Does nothing
    /// while that ball moves away, when it is already lined up with the
    /// paddle, or when the miss roll says to skip the beat.
    pub fn decide(&mut self, state: &MatchState) -> Option<KeyInput> {
        if !state.is_playing() {
            return None;
        }

        let paddle = state.paddle(self.side).position;
        let target = target_ball(state, self.side)?;

        if target.velocity.z * self.side.z_sign() <= 0.0 {
            return None;
        }

        let dx = target.position.x - paddle.x;
        if dx.abs() < state.config.paddle_step / 2.0 {
            return None;
        }

        if self.rng.chance(self.miss_rate) {
            return None;
        }

        let key = if dx < 0.0 { Key::Left } else { Key::Right };
        Some(KeyInput::press(key))
    }
}

/// The ball furthest along towards `side`'s end of the table.
pub fn target_ball(state: &MatchState, side: Side) -> Option<&Ball> {
    let sign = side.z_sign();
    state.balls.iter()
        .max_by(|a, b| (a.position.z * sign).total_cmp(&(b.position.z * sign)))
}
