//! Game Events
//!
//! Events generated during simulation. The session layer turns each one
//! into a broadcast message.

use serde::{Serialize, Deserialize};

use crate::core::vec3::Vec3;
use crate::game::state::{MatchSnapshot, Score, Side};

/// Sound cue names sent to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    /// Ball reflected off a side wall
    Wall,
    /// Ball bounced off a paddle
    Paddle,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEventData {
    /// A sound cue
    Sound(SoundKind),

    /// A ball was powered up by a player
    PowerHit {
        /// Side that fired the hit
        side: Side,
        /// Ball that was powered
        ball_id: u32,
        /// Ball position at the hit
        position: Vec3,
    },

    /// A point was scored; the snapshot is taken right after the award
    Scored {
        /// Side awarded the point
        scorer: Side,
        /// Ball that left the table
        ball_id: u32,
        /// Match state after the award
        snapshot: MatchSnapshot,
    },

    /// A side passed the set score
    MatchEnded {
        /// Winning side
        winner: Side,
        /// Winner's display name
        winner_name: String,
        /// Final score
        score: Score,
    },
}

/// A game event with timing.
#[derive(Clone, Debug, PartialEq)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create sound event.
    pub fn sound(tick: u64, sound: SoundKind) -> Self {
        Self::new(tick, GameEventData::Sound(sound))
    }

    /// Create power hit event.
    pub fn power_hit(tick: u64, side: Side, ball_id: u32, position: Vec3) -> Self {
        Self::new(tick, GameEventData::PowerHit { side, ball_id, position })
    }

    /// Create scored event.
    pub fn scored(tick: u64, scorer: Side, ball_id: u32, snapshot: MatchSnapshot) -> Self {
        Self::new(tick, GameEventData::Scored { scorer, ball_id, snapshot })
    }

    /// Create match ended event.
    pub fn match_ended(tick: u64, winner: Side, winner_name: String, score: Score) -> Self {
        Self::new(tick, GameEventData::MatchEnded { winner, winner_name, score })
    }

    /// Text announced to clients when a match ends.
    pub fn winner_text(&self) -> Option<String> {
        match &self.data {
            GameEventData::MatchEnded { winner_name, score, .. } => Some(format!(
                "{} wins! ({} - {})",
                winner_name, score.player_one, score.player_two
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_text() {
        let score = Score { player_one: 11, player_two: 4 };
        let event = GameEvent::match_ended(900, Side::One, "Alice".to_string(), score);
        assert_eq!(event.winner_text().as_deref(), Some("Alice wins! (11 - 4)"));

        let sound = GameEvent::sound(1, SoundKind::Wall);
        assert_eq!(sound.winner_text(), None);
    }

    #[test]
    fn test_sound_names() {
        assert_eq!(serde_json::to_string(&SoundKind::Wall).unwrap(), "\"wall\"");
        assert_eq!(serde_json::to_string(&SoundKind::Paddle).unwrap(), "\"paddle\"");
    }
}
