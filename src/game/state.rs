//! Game State Definitions
//!
//! All state types for match simulation: balls, paddles, score and the
//! aggregate `MatchState` that is broadcast to clients as a `MatchSnapshot`.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::game::config::GameConfig;
use crate::game::events::GameEvent;

/// Default display name for the player one seat.
pub const DEFAULT_ONE_NAME: &str = "Player 1";

/// Default display name for the player two seat.
pub const DEFAULT_TWO_NAME: &str = "Player 2";

// =============================================================================
// SIDE
// =============================================================================

/// One end of the table.
///
/// Player one defends `+z`, player two defends `-z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    /// Paddle at `+z`.
    One,
    /// Paddle at `-z`.
    Two,
}

impl Side {
    /// The other side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    /// Sign of the z coordinate this side defends.
    #[inline]
    pub fn z_sign(self) -> f64 {
        match self {
            Side::One => 1.0,
            Side::Two => -1.0,
        }
    }

    /// Side whose half of the table contains `z` (the net counts as one).
    #[inline]
    pub fn defending(z: f64) -> Side {
        if z >= 0.0 { Side::One } else { Side::Two }
    }
}

// =============================================================================
// BALL
// =============================================================================

/// Ball is in its normal state.
pub const POWER_NONE: u8 = 0;
/// Ball was powered and reverts on its next serve.
pub const POWER_DECAYING: u8 = 1;
/// Ball is currently powered.
pub const POWER_ACTIVE: u8 = 2;

/// A simulated ball.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ball {
    /// Index within the match
    pub id: u32,
    /// Center position
    pub position: Vec3,
    /// Velocity in units per second
    pub velocity: Vec3,
    /// Next serve heads towards `+z` when true
    pub serve_direction: bool,
    /// Power state: `POWER_NONE`, `POWER_DECAYING` or `POWER_ACTIVE`
    pub power_counter: u8,
    /// Collision radius
    pub radius: f64,
}

impl Ball {
    /// Create a ball resting at the serve point.
    pub fn new(id: u32, serve_direction: bool, config: &GameConfig) -> Self {
        Self {
            id,
            position: Vec3::new(0.0, config.reset_y, 0.0),
            velocity: Vec3::ZERO,
            serve_direction,
            power_counter: POWER_NONE,
            radius: config.ball_radius,
        }
    }

    /// True while a power hit keeps this ball above normal speed.
    #[inline]
    pub fn is_powered(&self) -> bool {
        self.power_counter != POWER_NONE
    }

    /// Speed this ball is renormalized to every tick.
    #[inline]
    pub fn target_speed(&self, config: &GameConfig) -> f64 {
        if self.is_powered() {
            config.ball_speed * config.power_multiplier
        } else {
            config.ball_speed
        }
    }

    /// Serve from the center of the table.
    ///
    /// Picks a uniform angle in `[-max_serve_angle, max_serve_angle]` from
    /// the z axis and heads along `serve_direction`. A ball powered during
    /// the previous rally is served at the power multiplier once, then
    /// decays back to normal on the serve after that.
    pub fn serve(&mut self, rng: &mut DeterministicRng, config: &GameConfig) {
        let multiplier = if self.power_counter == POWER_ACTIVE {
            self.power_counter = POWER_DECAYING;
            config.power_multiplier
        } else {
            self.power_counter = POWER_NONE;
            1.0
        };

        let angle = rng.next_f64_range(-config.max_serve_angle, config.max_serve_angle);
        let direction = if self.serve_direction { 1.0 } else { -1.0 };
        let speed = config.ball_speed * multiplier;

        self.position = Vec3::new(0.0, config.reset_y, 0.0);
        self.velocity = Vec3::new(
            angle.sin() * speed,
            0.0,
            angle.cos() * speed * direction,
        );
    }
}

// =============================================================================
// PADDLE
// =============================================================================

/// A paddle. Only its position is authoritative on the server.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    /// Center position
    pub position: Vec3,
}

impl Paddle {
    /// Create the paddle for a side, centered across the table.
    pub fn for_side(side: Side, config: &GameConfig) -> Self {
        Self {
            position: Vec3::new(0.0, config.paddle_y, config.paddle_z * side.z_sign()),
        }
    }

    /// Move along x, clamped to the table.
    pub fn shift_x(&mut self, dx: f64, config: &GameConfig) {
        let (min, max) = config.paddle_x_bounds();
        self.position.x = (self.position.x + dx).clamp(min, max);
    }
}

// =============================================================================
// SCORE
// =============================================================================

/// Points per side. Never decreases within a match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Points won by player one
    pub player_one: u32,
    /// Points won by player two
    pub player_two: u32,
}

impl Score {
    /// Points for a side.
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::One => self.player_one,
            Side::Two => self.player_two,
        }
    }

    /// Award one point.
    pub fn award(&mut self, side: Side) {
        match side {
            Side::One => self.player_one += 1,
            Side::Two => self.player_two += 1,
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Coarse phase of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum MatchPhase {
    /// Waiting for an opponent; physics paused
    #[default]
    Waiting,
    /// Active gameplay
    Playing,
    /// A side passed the set score
    Ended,
}

/// Complete match state.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Player one display name
    pub one_name: String,
    /// Player two display name
    pub two_name: String,
    /// Paddle at `+z`
    pub player_one: Paddle,
    /// Paddle at `-z`
    pub player_two: Paddle,
    /// All balls, ordered by id
    pub balls: Vec<Ball>,
    /// Current score
    pub score: Score,
    /// Current phase
    pub phase: MatchPhase,
    /// Ticks simulated while playing
    pub tick: u64,
    /// Seed the RNG started from (logged so a match can be replayed)
    pub rng_seed: u64,
    /// Serve and AI randomness
    pub rng: DeterministicRng,
    /// Simulation tunables
    pub config: GameConfig,
    /// Events generated since last drain
    pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match with balls served and play not yet started.
    pub fn new(config: GameConfig, rng_seed: u64) -> Self {
        let mut state = Self {
            one_name: DEFAULT_ONE_NAME.to_string(),
            two_name: DEFAULT_TWO_NAME.to_string(),
            player_one: Paddle::for_side(Side::One, &config),
            player_two: Paddle::for_side(Side::Two, &config),
            balls: Vec::new(),
            score: Score::default(),
            phase: MatchPhase::Waiting,
            tick: 0,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            config,
            pending_events: Vec::new(),
        };
        state.spawn_balls();
        state
    }

    fn spawn_balls(&mut self) {
        let count = self.config.ball_count.max(1);
        self.balls = (0..count)
            .map(|i| Ball::new(i as u32, i % 2 == 0, &self.config))
            .collect();
        for ball in &mut self.balls {
            ball.serve(&mut self.rng, &self.config);
        }
    }

    /// Begin play.
    pub fn start(&mut self) {
        self.phase = MatchPhase::Playing;
    }

    /// Replace this match with a fresh instance: new balls, zero score,
    /// default names, waiting phase. The RNG stream continues.
    pub fn reset(&mut self) {
        self.one_name = DEFAULT_ONE_NAME.to_string();
        self.two_name = DEFAULT_TWO_NAME.to_string();
        self.player_one = Paddle::for_side(Side::One, &self.config);
        self.player_two = Paddle::for_side(Side::Two, &self.config);
        self.score = Score::default();
        self.phase = MatchPhase::Waiting;
        self.tick = 0;
        self.pending_events.clear();
        self.spawn_balls();
    }

    /// Get a side's paddle.
    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::One => &self.player_one,
            Side::Two => &self.player_two,
        }
    }

    /// Get a side's paddle mutably.
    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::One => &mut self.player_one,
            Side::Two => &mut self.player_two,
        }
    }

    /// Display name for a side.
    pub fn name(&self, side: Side) -> &str {
        match side {
            Side::One => &self.one_name,
            Side::Two => &self.two_name,
        }
    }

    /// Set the display name for a side.
    pub fn set_name(&mut self, side: Side, name: impl Into<String>) {
        match side {
            Side::One => self.one_name = name.into(),
            Side::Two => self.two_name = name.into(),
        }
    }

    /// Check if play is running.
    pub fn is_playing(&self) -> bool {
        matches!(self.phase, MatchPhase::Playing)
    }

    /// Check if match is over.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended)
    }

    /// Build the broadcast view of this match.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            one_name: self.one_name.clone(),
            two_name: self.two_name.clone(),
            player_one: self.player_one.position,
            player_two: self.player_two.position,
            balls: self.balls.iter()
                .map(|b| BallSnapshot {
                    id: b.id,
                    position: b.position,
                    velocity: b.velocity,
                    power_counter: b.power_counter,
                })
                .collect(),
            score: self.score,
            phase: self.phase,
        }
    }

    /// Take all pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push an event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Broadcast view of a ball.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallSnapshot {
    /// Ball id
    pub id: u32,
    /// Center position
    pub position: Vec3,
    /// Velocity
    pub velocity: Vec3,
    /// Power state
    pub power_counter: u8,
}

/// The unit of broadcast: everything a client needs to draw the table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    /// Player one display name
    pub one_name: String,
    /// Player two display name
    pub two_name: String,
    /// Player one paddle position
    pub player_one: Vec3,
    /// Player two paddle position
    pub player_two: Vec3,
    /// All balls
    pub balls: Vec<BallSnapshot>,
    /// Current score
    pub score: Score,
    /// Current phase
    pub phase: MatchPhase,
}
