//! Waitlist Arcade - client-side logic for the marketplace waitlist page
//!
//! Core modules:
//! - `sim`: Deterministic obstacle game (physics, obstacle generation, scoring)
//! - `relay`: Reconnecting waitlist notification relay
//! - `platform`: Browser/native platform abstraction (storage, frame loop, timers)
//! - `best_score`: Best score persisted across runs
//! - `settings`: Relay configuration

pub mod best_score;
pub mod platform;
pub mod relay;
pub mod settings;
pub mod sim;

pub use best_score::BestScore;
pub use relay::{NotificationRelay, RelayEvent, RelayStatus};
pub use settings::RelayConfig;
pub use sim::{GameSession, GameState};

/// Game configuration constants
pub mod consts {
    /// Milliseconds per frame unit (60 Hz display cadence)
    pub const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Largest frame delta applied in one step (prevents tunneling on tab resume)
    pub const MAX_DELTA_FRAMES: f32 = 1.5;

    /// Playfield dimensions
    pub const PLAYFIELD_WIDTH: f32 = 400.0;
    pub const PLAYFIELD_HEIGHT: f32 = 600.0;

    /// Player box (square) and its fixed horizontal position
    pub const PLAYER_SIZE: f32 = 30.0;
    pub const PLAYER_X: f32 = 80.0;
    /// Hitbox radius as a fraction of player size (forgiving circle inside the box)
    pub const HITBOX_RATIO: f32 = 0.35;

    /// Gravity (units/frame²) before the rise/fall multiplier
    pub const GRAVITY: f32 = 0.45;
    pub const RISE_GRAVITY_MULT: f32 = 0.9;
    pub const FALL_GRAVITY_MULT: f32 = 1.1;
    /// Terminal fall speed (units/frame)
    pub const MAX_FALL_SPEED: f32 = 9.0;
    /// Jump impulse (negative is up)
    pub const JUMP_BASE: f32 = -7.2;
    /// Velocity kept after touching the floor or ceiling
    pub const BOUNDARY_DAMPING: f32 = 0.2;
    /// Floor/ceiling contact tolerance for collisions
    pub const BOUNDARY_TOLERANCE: f32 = 2.0;

    /// Obstacles
    pub const OBSTACLE_WIDTH: f32 = 60.0;
    /// Minimum distance between a gap and the playfield edge
    pub const GAP_MARGIN: f32 = 30.0;
    pub const MIN_GAP_HEIGHT: f32 = 90.0;
    pub const MIN_SPACING: f32 = 150.0;
    /// A new obstacle is spawned once the rearmost one drops below this x
    pub const SPAWN_THRESHOLD: f32 = PLAYFIELD_WIDTH;

    /// Scroll speed (units/frame)
    pub const BASE_SPEED: f32 = 3.0;
    pub const SPEED_STEP: f32 = 0.3;
}

/// Clamp that tolerates an inverted range by collapsing onto `min`
#[inline]
pub fn clamp_lenient(value: f32, min: f32, max: f32) -> f32 {
    if max < min {
        return min;
    }
    value.clamp(min, max)
}
