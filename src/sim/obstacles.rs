//! Procedural obstacle generation and scrolling
//!
//! Each difficulty phase has a small table of hand-tuned gap presets. A
//! preset is drawn uniformly, nudged away from repeating (or wildly
//! jumping from) the previous gap, jittered, and clamped to the playfield.

use rand::Rng;

use super::state::{DifficultyPhase, GameState, Obstacle};
use crate::clamp_lenient;
use crate::consts::*;

/// A gap layout preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapPreset {
    pub gap_center: f32,
    pub gap_height: f32,
    /// Horizontal distance from the previous obstacle
    pub spacing: f32,
}

const fn preset(gap_center: f32, gap_height: f32, spacing: f32) -> GapPreset {
    GapPreset {
        gap_center,
        gap_height,
        spacing,
    }
}

const TUTORIAL: &[GapPreset] = &[
    preset(300.0, 190.0, 300.0),
    preset(270.0, 185.0, 300.0),
    preset(330.0, 185.0, 300.0),
];

const BEGINNER: &[GapPreset] = &[
    preset(250.0, 170.0, 280.0),
    preset(300.0, 170.0, 280.0),
    preset(350.0, 170.0, 280.0),
    preset(280.0, 165.0, 270.0),
];

const INTERMEDIATE: &[GapPreset] = &[
    preset(200.0, 155.0, 260.0),
    preset(300.0, 150.0, 260.0),
    preset(400.0, 155.0, 260.0),
    preset(250.0, 150.0, 250.0),
    preset(350.0, 150.0, 250.0),
];

const ADVANCED: &[GapPreset] = &[
    preset(160.0, 140.0, 245.0),
    preset(240.0, 140.0, 240.0),
    preset(320.0, 135.0, 240.0),
    preset(400.0, 140.0, 240.0),
    preset(460.0, 140.0, 245.0),
];

const EXPERT: &[GapPreset] = &[
    preset(130.0, 130.0, 230.0),
    preset(210.0, 125.0, 225.0),
    preset(300.0, 120.0, 220.0),
    preset(390.0, 125.0, 225.0),
    preset(470.0, 130.0, 230.0),
];

/// Pattern table for a phase
pub fn patterns(phase: DifficultyPhase) -> &'static [GapPreset] {
    match phase {
        DifficultyPhase::Tutorial => TUTORIAL,
        DifficultyPhase::Beginner => BEGINNER,
        DifficultyPhase::Intermediate => INTERMEDIATE,
        DifficultyPhase::Advanced => ADVANCED,
        DifficultyPhase::Expert => EXPERT,
    }
}

/// Gap centres closer than this to the previous one are re-rolled
pub const TOO_SIMILAR: f32 = 50.0;
/// Gap centres further than this from the previous one are re-rolled
pub const TOO_EXTREME: f32 = 200.0;
/// Re-roll window when too similar: difference in (min, max)
pub const SIMILAR_REROLL: (f32, f32) = (70.0, 180.0);
/// Re-roll ceiling when too extreme: difference below this
pub const EXTREME_REROLL_MAX: f32 = 150.0;

pub const CENTER_JITTER: f32 = 6.0;
pub const HEIGHT_JITTER: f32 = 4.0;
pub const SPACING_JITTER: f32 = 12.5;

/// Pick a preset for the phase, steering away from the previous gap centre.
///
/// The initial draw is checked once. At most one re-roll happens, and the
/// re-rolled preset is not checked again. If no preset satisfies the
/// re-roll window the initial draw stands.
pub fn pick_preset<R: Rng + ?Sized>(
    phase: DifficultyPhase,
    last_center: Option<f32>,
    rng: &mut R,
) -> GapPreset {
    let table = patterns(phase);
    let first = table[rng.random_range(0..table.len())];

    let Some(last) = last_center else {
        return first;
    };

    let diff = (first.gap_center - last).abs();
    let window: Option<(f32, f32)> = if diff < TOO_SIMILAR {
        Some(SIMILAR_REROLL)
    } else if diff > TOO_EXTREME {
        Some((f32::NEG_INFINITY, EXTREME_REROLL_MAX))
    } else {
        None
    };

    let Some((lo, hi)) = window else {
        return first;
    };

    let candidates: Vec<&GapPreset> = table
        .iter()
        .filter(|p| {
            let d = (p.gap_center - last).abs();
            d > lo && d < hi
        })
        .collect();

    if candidates.is_empty() {
        first
    } else {
        *candidates[rng.random_range(0..candidates.len())]
    }
}

/// Build the next obstacle for `score`, placed `spacing` after `last` (or at
/// the right edge of the playfield for the first obstacle of a run)
pub fn generate_obstacle<R: Rng + ?Sized>(
    score: u32,
    last: Option<&Obstacle>,
    rng: &mut R,
) -> Obstacle {
    let phase = DifficultyPhase::for_score(score);
    let base = pick_preset(phase, last.map(Obstacle::gap_center), rng);

    let center = base.gap_center + rng.random_range(-CENTER_JITTER..=CENTER_JITTER);
    let height = base.gap_height + rng.random_range(-HEIGHT_JITTER..=HEIGHT_JITTER);
    let spacing = base.spacing + rng.random_range(-SPACING_JITTER..=SPACING_JITTER);

    let gap_height = clamp_lenient(
        height,
        MIN_GAP_HEIGHT,
        PLAYFIELD_HEIGHT - 2.0 * GAP_MARGIN,
    );
    let gap_top = clamp_lenient(
        center - gap_height / 2.0,
        GAP_MARGIN,
        PLAYFIELD_HEIGHT - GAP_MARGIN - gap_height,
    );
    let spacing = spacing.max(MIN_SPACING);

    let x = match last {
        Some(prev) => prev.x + spacing,
        None => PLAYFIELD_WIDTH,
    };

    Obstacle {
        x,
        gap_top,
        gap_height,
        passed: false,
        phase,
    }
}

/// Scroll speed for a score: +0.3 every 3 points, capped per score band
pub fn speed_for_score(score: u32) -> f32 {
    let cap = match score {
        0..10 => 4.5,
        10..20 => 5.5,
        _ => 6.8,
    };
    (BASE_SPEED + (score / 3) as f32 * SPEED_STEP).min(cap)
}

/// Scroll obstacles left, drop the ones fully off-screen, and spawn the
/// next one once the rearmost crosses the spawn threshold
pub fn advance_obstacles<R: Rng + ?Sized>(
    state: &mut GameState,
    delta_frames: f32,
    speed: f32,
    rng: &mut R,
) {
    let shift = speed * delta_frames;
    for obstacle in &mut state.obstacles {
        obstacle.x -= shift;
    }

    state.obstacles.retain(|o| o.x >= -OBSTACLE_WIDTH);

    match state.obstacles.last() {
        Some(rear) if rear.x < SPAWN_THRESHOLD => {
            let next = generate_obstacle(state.score, Some(rear), rng);
            state.obstacles.push(next);
        }
        Some(_) => {}
        None => {
            let next = generate_obstacle(state.score, None, rng);
            state.obstacles.push(next);
        }
    }
}
