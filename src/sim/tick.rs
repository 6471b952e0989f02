//! Per-frame simulation tick
//!
//! Core game loop step: physics, obstacle scroll/spawn, pass-through
//! scoring, then collision.

use rand::Rng;

use super::collision::detect_collision;
use super::obstacles::{advance_obstacles, speed_for_score};
use super::physics::{clamp_delta, step};
use super::state::{DifficultyPhase, GameState, RunStatus};
use crate::consts::*;

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Obstacles cleared this tick
    pub scored: u32,
    pub collided: bool,
}

/// Advance the game state by one (possibly fractional) frame.
///
/// Only a running game advances. On collision the frame's movement and
/// score are kept and the run terminates.
pub fn tick<R: Rng + ?Sized>(state: &mut GameState, delta_frames: f32, rng: &mut R) -> TickOutcome {
    if !state.is_running() {
        return TickOutcome::default();
    }
    let dt = clamp_delta(delta_frames);

    step(state, dt);
    advance_obstacles(state, dt, speed_for_score(state.score), rng);
    let scored = award_passes(state);

    state.frames += 1;
    state.phase = DifficultyPhase::for_score(state.score);

    let collided = detect_collision(state);
    if collided {
        state.status = RunStatus::Terminated;
        log::info!("Game over: score {} after {} frames", state.score, state.frames);
    }

    TickOutcome { scored, collided }
}

/// Mark obstacles whose right edge has moved left of the player
fn award_passes(state: &mut GameState) -> u32 {
    let mut scored = 0;
    for obstacle in &mut state.obstacles {
        if !obstacle.passed && obstacle.trailing_edge() < PLAYER_X {
            obstacle.passed = true;
            scored += 1;
        }
    }
    state.score += scored;
    scored
}

/// Autopilot for demos and non-interactive previews: jump when the player
/// has sunk below the centre of the next gap and is not already rising.
pub fn autopilot_wants_jump(state: &GameState) -> bool {
    let target = state
        .obstacles
        .iter()
        .find(|o| o.trailing_edge() >= PLAYER_X)
        .map(|o| o.gap_center() + 10.0)
        .unwrap_or(PLAYFIELD_HEIGHT / 2.0);
    let player_center = state.player_y + PLAYER_SIZE / 2.0;
    player_center > target && state.velocity >= 0.0
}
