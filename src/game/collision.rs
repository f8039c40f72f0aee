//! Collision Detection
//!
//! Ball-vs-wall reflection and ball-vs-paddle bounce.
//! Paddles are axis-aligned boxes; balls are spheres.

use crate::core::vec3::Vec3;
use crate::game::config::GameConfig;
use crate::game::state::{Ball, Paddle};

/// Reflect a ball off the side walls.
///
/// Returns true if the ball touched a wall this tick. The ball is put back
/// inside the table with its x velocity pointing inward.
pub fn reflect_off_walls(ball: &mut Ball, config: &GameConfig) -> bool {
    let limit = config.ball_x_limit();
    if ball.position.x.abs() <= limit {
        return false;
    }

    let inward = -ball.position.x.signum();
    ball.position.x = -inward * limit;
    ball.velocity.x = ball.velocity.x.abs() * inward;
    true
}

/// Closest point on an axis-aligned box to `point`.
#[inline]
pub fn closest_point_on_box(point: Vec3, center: Vec3, half_extents: (f64, f64, f64)) -> Vec3 {
    let (hx, hy, hz) = half_extents;
    Vec3::new(
        point.x.clamp(center.x - hx, center.x + hx),
        point.y.clamp(center.y - hy, center.y + hy),
        point.z.clamp(center.z - hz, center.z + hz),
    )
}

/// Check if a ball overlaps a paddle box while moving towards it.
///
/// A ball already heading away is not hit again, so one contact gives
/// one bounce even if the ball still overlaps on the next tick.
pub fn ball_hits_paddle(ball: &Ball, paddle: &Paddle, config: &GameConfig) -> bool {
    if ball.velocity.z * (paddle.position.z - ball.position.z) <= 0.0 {
        return false;
    }
    let closest = closest_point_on_box(ball.position, paddle.position, config.paddle_half_extents);
    ball.position.distance(closest) <= ball.radius
}

/// Bounce a ball off a paddle.
///
/// The further from the paddle center the ball hits, the steeper the
/// outgoing angle, up to `max_bounce_angle` at the edges. Speed is kept;
/// vertical velocity can only point down afterwards.
pub fn bounce_off_paddle(ball: &mut Ball, paddle: &Paddle, config: &GameConfig) {
    let speed = ball.velocity.length();

    let hit_offset = ball.position.x - paddle.position.x;
    let ratio = (hit_offset / config.paddle_half_width()).clamp(-1.0, 1.0);
    let bounce_angle = ratio * config.max_bounce_angle;

    // Ball on the near side of the paddle (towards the net when z < paddle z)
    let side_sign = if ball.position.z < paddle.position.z { -1.0 } else { 1.0 };

    let direction = Vec3::new(
        bounce_angle.sin(),
        ball.velocity.y.min(0.0),
        bounce_angle.cos() * side_sign,
    );
    ball.velocity = direction.normalize().scale(speed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Side;

    fn setup() -> (GameConfig, Ball, Paddle) {
        let config = GameConfig::default();
        let ball = Ball::new(0, true, &config);
        let paddle = Paddle::for_side(Side::One, &config);
        (config, ball, paddle)
    }

    #[test]
    fn test_no_wall_contact_inside() {
        let (config, mut ball, _) = setup();
        ball.position.x = 47.9;
        ball.velocity = Vec3::new(10.0, 0.0, 0.0);
        assert!(!reflect_off_walls(&mut ball, &config));
        assert_eq!(ball.velocity.x, 10.0);
    }

    #[test]
    fn test_wall_reflection_right() {
        let (config, mut ball, _) = setup();
        ball.position.x = 49.0;
        ball.velocity = Vec3::new(30.0, 0.0, 70.0);
        assert!(reflect_off_walls(&mut ball, &config));
        assert_eq!(ball.velocity.x, -30.0);
        assert_eq!(ball.position.x, 48.0);
        assert_eq!(ball.velocity.z, 70.0);
    }

    #[test]
    fn test_wall_reflection_left() {
        let (config, mut ball, _) = setup();
        ball.position.x = -50.0;
        ball.velocity = Vec3::new(-30.0, 0.0, 70.0);
        assert!(reflect_off_walls(&mut ball, &config));
        assert_eq!(ball.velocity.x, 30.0);
        assert_eq!(ball.position.x, -48.0);
    }

    #[test]
    fn test_closest_point_on_box() {
        let center = Vec3::new(0.0, 6.0, 100.0);
        let half = (10.0, 2.5, 2.5);

        // Inside: the point itself
        let inside = Vec3::new(1.0, 6.0, 100.0);
        assert_eq!(closest_point_on_box(inside, center, half), inside);

        // In front of the face
        let front = Vec3::new(3.0, 6.0, 90.0);
        assert_eq!(closest_point_on_box(front, center, half), Vec3::new(3.0, 6.0, 97.5));

        // Past a corner
        let corner = Vec3::new(20.0, 6.0, 90.0);
        assert_eq!(closest_point_on_box(corner, center, half), Vec3::new(10.0, 6.0, 97.5));
    }

    #[test]
    fn test_ball_hits_paddle_face() {
        let (config, mut ball, paddle) = setup();
        ball.velocity = Vec3::new(0.0, 0.0, 80.0);
        ball.position = Vec3::new(0.0, 6.0, 95.5);
        assert!(ball_hits_paddle(&ball, &paddle, &config));

        ball.position = Vec3::new(0.0, 6.0, 95.4);
        assert!(!ball_hits_paddle(&ball, &paddle, &config));

        // Beside the paddle
        ball.position = Vec3::new(13.0, 6.0, 100.0);
        assert!(!ball_hits_paddle(&ball, &paddle, &config));
    }

    #[test]
    fn test_receding_ball_is_not_hit() {
        let (config, mut ball, paddle) = setup();
        ball.position = Vec3::new(9.0, 6.0, 96.0);
        ball.velocity = Vec3::new(40.0, 0.0, -60.0);
        assert!(!ball_hits_paddle(&ball, &paddle, &config));

        ball.velocity.z = 60.0;
        assert!(ball_hits_paddle(&ball, &paddle, &config));
    }

    #[test]
    fn test_head_on_bounce_is_straight() {
        let (config, mut ball, paddle) = setup();
        ball.position = Vec3::new(0.0, 6.0, 96.0);
        ball.velocity = Vec3::new(0.0, 0.0, 80.0);

        bounce_off_paddle(&mut ball, &paddle, &config);
        assert!(ball.velocity.x.abs() < 1e-12);
        assert!((ball.velocity.z + 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_edge_bounce_is_max_angle() {
        let (config, mut ball, paddle) = setup();
        ball.position = Vec3::new(12.0, 6.0, 96.0);
        ball.velocity = Vec3::new(20.0, 0.0, 60.0);
        let speed = ball.velocity.length();

        bounce_off_paddle(&mut ball, &paddle, &config);

        let angle = ball.velocity.x.atan2(-ball.velocity.z);
        assert!((angle - config.max_bounce_angle).abs() < 1e-9);
        assert!((ball.velocity.length() - speed).abs() < 1e-9);
    }

    #[test]
    fn test_bounce_from_far_side_heads_out() {
        let config = GameConfig::default();
        let mut ball = Ball::new(0, false, &config);
        let paddle = Paddle::for_side(Side::Two, &config);
        ball.position = Vec3::new(-5.0, 6.0, -96.0);
        ball.velocity = Vec3::new(0.0, 0.0, -80.0);

        bounce_off_paddle(&mut ball, &paddle, &config);
        assert!(ball.velocity.z > 0.0);
        assert!(ball.velocity.x < 0.0);
    }

    #[test]
    fn test_bounce_never_points_up() {
        let (config, mut ball, paddle) = setup();
        ball.position = Vec3::new(0.0, 6.0, 96.0);
        ball.velocity = Vec3::new(0.0, 15.0, 78.0);
        bounce_off_paddle(&mut ball, &paddle, &config);
        assert_eq!(ball.velocity.y, 0.0);
    }
}
