//! Game state and core simulation types
//!
//! A `GameState` is created on start/restart, mutated once per frame by
//! [`tick`](super::tick::tick), and replaced wholesale on restart.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::obstacles::generate_obstacle;
use crate::consts::*;

/// Run lifecycle: `Idle -> Running -> Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    /// Waiting for the first jump
    #[default]
    Idle,
    /// Active gameplay
    Running,
    /// Collided; only a reset leaves this state
    Terminated,
}

/// Difficulty phase, derived from score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum DifficultyPhase {
    #[default]
    Tutorial,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DifficultyPhase {
    /// All phases with the score at which each begins
    pub const THRESHOLDS: [(u32, DifficultyPhase); 5] = [
        (0, DifficultyPhase::Tutorial),
        (3, DifficultyPhase::Beginner),
        (7, DifficultyPhase::Intermediate),
        (13, DifficultyPhase::Advanced),
        (21, DifficultyPhase::Expert),
    ];

    pub fn for_score(score: u32) -> Self {
        Self::THRESHOLDS
            .iter()
            .rev()
            .find(|(min, _)| score >= *min)
            .map(|(_, phase)| *phase)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyPhase::Tutorial => "tutorial",
            DifficultyPhase::Beginner => "beginner",
            DifficultyPhase::Intermediate => "intermediate",
            DifficultyPhase::Advanced => "advanced",
            DifficultyPhase::Expert => "expert",
        }
    }
}

/// A pair of pipes with a gap between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Left edge
    pub x: f32,
    /// Bottom of the top pipe
    pub gap_top: f32,
    pub gap_height: f32,
    /// Set once the player has cleared this obstacle
    pub passed: bool,
    /// Phase whose pattern table produced this obstacle
    pub phase: DifficultyPhase,
}

impl Obstacle {
    #[inline]
    pub fn gap_center(&self) -> f32 {
        self.gap_top + self.gap_height / 2.0
    }

    #[inline]
    pub fn gap_bottom(&self) -> f32 {
        self.gap_top + self.gap_height
    }

    /// Right edge
    #[inline]
    pub fn trailing_edge(&self) -> f32 {
        self.x + OBSTACLE_WIDTH
    }
}

/// Complete per-run game state (read-only snapshot for renderers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Top edge of the player box
    pub player_y: f32,
    /// Vertical speed (negative is up)
    pub velocity: f32,
    /// Ordered by ascending x
    pub obstacles: Vec<Obstacle>,
    pub score: u32,
    pub phase: DifficultyPhase,
    pub status: RunStatus,
    /// Frames ticked while running
    pub frames: u64,
}

impl GameState {
    /// Fresh run with exactly one starting obstacle
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut state = Self {
            player_y: (PLAYFIELD_HEIGHT - PLAYER_SIZE) / 2.0,
            velocity: 0.0,
            obstacles: Vec::new(),
            score: 0,
            phase: DifficultyPhase::Tutorial,
            status: RunStatus::Idle,
            frames: 0,
        };
        state.obstacles.push(generate_obstacle(0, None, rng));
        state
    }

    /// Reinitialize every field for a new run
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        *self = Self::new(rng);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.status == RunStatus::Terminated
    }

    /// Lowest valid `player_y`
    #[inline]
    pub fn floor_y() -> f32 {
        PLAYFIELD_HEIGHT - PLAYER_SIZE
    }
}
