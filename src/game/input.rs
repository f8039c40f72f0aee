//! Paddle Input
//!
//! `MatchState::apply_paddle_input` is the one path through which paddles
//! move and power hits fire. Human clients and the AI both go through it.

use serde::{Serialize, Deserialize};

use crate::game::events::GameEvent;
use crate::game::state::{MatchState, Side, POWER_ACTIVE};

/// Keys a client may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Move towards `-x`
    #[serde(rename = "A", alias = "a")]
    Left,
    /// Move towards `+x`
    #[serde(rename = "D", alias = "d")]
    Right,
    /// Power hit
    #[serde(rename = " ")]
    Power,
}

/// A key transition: `{key, pressed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    /// Which key
    pub key: Key,
    /// Pressed (true) or released (false)
    pub pressed: bool,
}

impl KeyInput {
    /// A key press.
    pub const fn press(key: Key) -> Self {
        Self { key, pressed: true }
    }

    /// A key release.
    pub const fn release(key: Key) -> Self {
        Self { key, pressed: false }
    }
}

impl MatchState {
    /// Apply a key transition to a side's paddle.
    ///
    /// Ignored unless the match is playing. Releases have no effect; a
    /// press of `A`/`D` moves the paddle one step (clamped to the table)
    /// and a press of space attempts a power hit. Returns the power hit
    /// event when one fires.
    pub fn apply_paddle_input(&mut self, side: Side, input: KeyInput) -> Option<GameEvent> {
        if !self.is_playing() || !input.pressed {
            return None;
        }

        let step = self.config.paddle_step;
        match input.key {
            Key::Left => {
                self.shift_paddle(side, -step);
                None
            }
            Key::Right => {
                self.shift_paddle(side, step);
                None
            }
            Key::Power => self.power_hit(side),
        }
    }

    fn shift_paddle(&mut self, side: Side, dx: f64) {
        let paddle = match side {
            Side::One => &mut self.player_one,
            Side::Two => &mut self.player_two,
        };
        paddle.shift_x(dx, &self.config);
    }

    /// Power up the single unpowered ball near a side's paddle.
    ///
    /// Fires only if exactly one candidate is within `power_hit_range`.
    fn power_hit(&mut self, side: Side) -> Option<GameEvent> {
        let paddle = self.paddle(side).position;
        let range = self.config.power_hit_range;

        let mut candidates = self.balls.iter()
            .enumerate()
            .filter(|(_, b)| b.power_counter != POWER_ACTIVE)
            .filter(|(_, b)| b.position.distance(paddle) <= range)
            .map(|(i, _)| i);

        let index = match (candidates.next(), candidates.next()) {
            (Some(index), None) => index,
            _ => return None,
        };

        let ball = &mut self.balls[index];
        ball.power_counter = POWER_ACTIVE;
        ball.velocity = ball.velocity.with_length(ball.target_speed(&self.config));

        Some(GameEvent::power_hit(self.tick, side, ball.id, ball.position))
    }
}
