//! Core primitives.
//!
//! Vector math and seeded randomness shared by the simulation and the AI.

pub mod vec3;
pub mod rng;

// Re-export core types
pub use vec3::Vec3;
pub use rng::{DeterministicRng, derive_match_seed};
