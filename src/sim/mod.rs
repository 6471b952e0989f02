//! Deterministic obstacle game simulation
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Frame deltas are clamped, never rejected
//! - Seeded RNG only (passed in by the caller)
//! - No rendering or platform dependencies (the session only touches storage
//!   through the `KeyValueStore` trait)

pub mod collision;
pub mod obstacles;
pub mod physics;
pub mod session;
pub mod state;
pub mod tick;

pub use collision::detect_collision;
pub use obstacles::{advance_obstacles, generate_obstacle, speed_for_score};
pub use physics::{apply_impulse, step};
pub use session::{FrameOutcome, GameSession, run_shared_frame};
pub use state::{DifficultyPhase, GameState, Obstacle, RunStatus};
pub use tick::{TickOutcome, autopilot_wants_jump, tick};
