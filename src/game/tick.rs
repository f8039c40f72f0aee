//! Authoritative Simulation Tick
//!
//! One fixed step of ball physics, collision and scoring.
//! Advances by `TICK_DT` regardless of how late the timer fired.

use crate::TICK_DT;
use crate::core::rng::DeterministicRng;
use crate::game::collision::{ball_hits_paddle, bounce_off_paddle, reflect_off_walls};
use crate::game::config::GameConfig;
use crate::game::events::{GameEvent, SoundKind};
use crate::game::state::{Ball, MatchPhase, MatchState, Paddle, Side};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether physics advanced (false while waiting or ended)
    pub advanced: bool,
    /// Points scored this tick
    pub points: u32,
    /// Whether match ended this tick
    pub match_ended: bool,
    /// Winner (if match ended this tick)
    pub winner: Option<Side>,
}

/// What happened to one ball during a step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BallStep {
    wall: bool,
    paddle: Option<Side>,
    recovered: bool,
    /// Side whose end the ball left through
    escaped: Option<Side>,
}

/// Run one simulation tick.
///
/// Physics only runs while the match is `Playing`; in any other phase this
/// is a no-op and `advanced` is false.
pub fn tick(state: &mut MatchState) -> TickResult {
    let mut result = TickResult::default();

    match state.phase {
        MatchPhase::Waiting | MatchPhase::Ended => return result,
        MatchPhase::Playing => {}
    }

    result.advanced = true;
    state.tick += 1;

    for index in 0..state.balls.len() {
        let step = step_ball(
            &mut state.balls[index],
            &state.player_one,
            &state.player_two,
            &state.config,
            &mut state.rng,
        );

        if step.wall {
            state.push_event(GameEvent::sound(state.tick, SoundKind::Wall));
        }
        if step.paddle.is_some() {
            state.push_event(GameEvent::sound(state.tick, SoundKind::Paddle));
        }

        if let Some(defender) = step.escaped {
            let scorer = defender.opponent();
            result.points += 1;
            if score_point(state, index, scorer) {
                result.match_ended = true;
                result.winner = Some(scorer);
                break;
            }
        }
    }

    result.events = state.take_events();
    result
}

/// Integrate, collide and renormalize one ball.
fn step_ball(
    ball: &mut Ball,
    player_one: &Paddle,
    player_two: &Paddle,
    config: &GameConfig,
    rng: &mut DeterministicRng,
) -> BallStep {
    let mut step = BallStep::default();

    // Integration: position += velocity * dt
    ball.position = ball.position + ball.velocity * TICK_DT;

    step.wall = reflect_off_walls(ball, config);

    if ball_hits_paddle(ball, player_one, config) {
        bounce_off_paddle(ball, player_one, config);
        step.paddle = Some(Side::One);
    } else if ball_hits_paddle(ball, player_two, config) {
        bounce_off_paddle(ball, player_two, config);
        step.paddle = Some(Side::Two);
    }

    // Constant speed; a degenerate velocity gets a fresh serve instead
    let speed = ball.velocity.length();
    if speed > 0.0 && speed.is_finite() && ball.position.is_finite() {
        ball.velocity = ball.velocity.with_length(ball.target_speed(config));
    } else {
        ball.serve(rng, config);
        step.recovered = true;
        return step;
    }

    let off_end = ball.position.z.abs() > config.half_length();
    let off_height = ball.position.y < config.min_ball_y || ball.position.y > config.max_ball_y;
    if off_end || off_height {
        step.escaped = Some(Side::defending(ball.position.z));
    }

    step
}

/// Award a point for the ball at `index`, re-serve it and emit the score
/// or end-of-match event. Returns true if the match ended.
fn score_point(state: &mut MatchState, index: usize, scorer: Side) -> bool {
    state.score.award(scorer);

    let ball = &mut state.balls[index];
    ball.serve_direction = !ball.serve_direction;
    let ball_id = ball.id;
    ball.serve(&mut state.rng, &state.config);

    if state.score.get(scorer) > state.config.set_score {
        state.phase = MatchPhase::Ended;
        let event = GameEvent::match_ended(
            state.tick,
            scorer,
            state.name(scorer).to_string(),
            state.score,
        );
        state.push_event(event);
        true
    } else {
        let event = GameEvent::scored(state.tick, scorer, ball_id, state.snapshot());
        state.push_event(event);
        false
    }
}

/// Run a match forward for up to `ticks` ticks, stopping early if it ends.
/// Returns every event produced.
pub fn run_ticks(state: &mut MatchState, ticks: u32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        let result = tick(state);
        events.extend(result.events);
        if result.match_ended {
            break;
        }
    }
    events
}
