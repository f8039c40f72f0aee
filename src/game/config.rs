//! Game Configuration
//!
//! Dimensions and tunables for the table, balls, paddles and the AI.
//! Units are world units (the client renders them 1:1).

use std::f64::consts::PI;

/// Default set-point threshold. A match ends once a score exceeds it.
pub const GAME_SET_SCORE: u32 = 10;

/// Default AI miss probability per decision.
pub const AI_RATE: f64 = 0.3;

/// Configuration for match simulation.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Table width (x axis).
    pub game_width: f64,
    /// Table length (z axis).
    pub game_length: f64,
    /// Ball speed renormalized every tick.
    pub ball_speed: f64,
    /// Ball radius.
    pub ball_radius: f64,
    /// Height at which balls are served.
    pub reset_y: f64,
    /// Balls below this height have escaped.
    pub min_ball_y: f64,
    /// Balls above this height have escaped.
    pub max_ball_y: f64,
    /// Number of balls per match.
    pub ball_count: usize,
    /// Paddle half extents (x, y, z).
    pub paddle_half_extents: (f64, f64, f64),
    /// Paddle height.
    pub paddle_y: f64,
    /// Distance of each paddle from the net (player one at +z).
    pub paddle_z: f64,
    /// Paddle x change per `pressed` key event.
    pub paddle_step: f64,
    /// Largest bounce angle off a paddle edge (radians).
    pub max_bounce_angle: f64,
    /// Largest serve angle from the z axis (radians).
    pub max_serve_angle: f64,
    /// Speed multiplier applied by a power hit.
    pub power_multiplier: f64,
    /// Max distance between ball and paddle centers for a power hit.
    pub power_hit_range: f64,
    /// Score above which the match ends.
    pub set_score: u32,
    /// AI miss probability per decision.
    pub ai_rate: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_width: 100.0,
            game_length: 250.0,
            ball_speed: 80.0,
            ball_radius: 2.0,
            reset_y: 6.0,
            min_ball_y: -20.0,
            max_ball_y: 60.0,
            ball_count: 1,
            paddle_half_extents: (10.0, 2.5, 2.5),
            paddle_y: 6.0,
            paddle_z: 100.0,
            paddle_step: 2.0,
            max_bounce_angle: PI / 3.0,
            max_serve_angle: PI / 6.0,
            power_multiplier: 2.0,
            power_hit_range: 15.0,
            set_score: GAME_SET_SCORE,
            ai_rate: AI_RATE,
        }
    }
}

impl GameConfig {
    /// Paddle half width along x.
    #[inline]
    pub fn paddle_half_width(&self) -> f64 {
        self.paddle_half_extents.0
    }

    /// Paddle x bounds `(min, max)`.
    #[inline]
    pub fn paddle_x_bounds(&self) -> (f64, f64) {
        let limit = self.game_width / 2.0 - self.paddle_half_width();
        (-limit, limit)
    }

    /// Largest |x| the ball center may reach before reflecting.
    #[inline]
    pub fn ball_x_limit(&self) -> f64 {
        self.game_width / 2.0 - self.ball_radius
    }

    /// |z| beyond which a ball has left the table.
    #[inline]
    pub fn half_length(&self) -> f64 {
        self.game_length / 2.0
    }
}
