//! Vertical player physics
//!
//! Asymmetric gravity gives a floaty rise and a snappy fall. Frame deltas
//! are in frame units (1.0 = one 60 Hz frame) and always clamped.

use super::state::{GameState, RunStatus};
use crate::consts::*;

/// Clamp a raw frame delta to `[0, MAX_DELTA_FRAMES]` (NaN becomes 0)
#[inline]
pub fn clamp_delta(delta_frames: f32) -> f32 {
    if delta_frames.is_nan() {
        return 0.0;
    }
    delta_frames.clamp(0.0, MAX_DELTA_FRAMES)
}

/// Gravity multiplier for the current vertical speed
#[inline]
pub fn gravity_mult(velocity: f32) -> f32 {
    if velocity > 0.0 {
        FALL_GRAVITY_MULT
    } else {
        RISE_GRAVITY_MULT
    }
}

/// Integrate gravity and position for one (possibly fractional) frame
pub fn step(state: &mut GameState, delta_frames: f32) {
    if state.is_terminated() {
        return;
    }
    let dt = clamp_delta(delta_frames);

    let accel = GRAVITY * gravity_mult(state.velocity);
    state.velocity = (state.velocity + accel * dt).min(MAX_FALL_SPEED);
    state.player_y += state.velocity * dt;

    // Soft bounce: pin to the boundary and keep 20% of the speed, never
    // pushing further into it
    let floor = GameState::floor_y();
    if state.player_y <= 0.0 {
        state.player_y = 0.0;
        state.velocity = (state.velocity * BOUNDARY_DAMPING).max(0.0);
    } else if state.player_y >= floor {
        state.player_y = floor;
        state.velocity = (state.velocity * BOUNDARY_DAMPING).min(0.0);
    }
}

/// Jump scale for the current speed: stronger out of a fast fall, weaker
/// when already rising
#[inline]
pub fn impulse_scale(velocity: f32) -> f32 {
    if velocity > 4.0 {
        1.1
    } else if velocity < -1.0 {
        0.8
    } else {
        1.0
    }
}

/// Jump. The first jump of a run starts it; ignored once terminated.
pub fn apply_impulse(state: &mut GameState) {
    match state.status {
        RunStatus::Terminated => return,
        RunStatus::Idle => state.status = RunStatus::Running,
        RunStatus::Running => {}
    }
    state.velocity = JUMP_BASE * impulse_scale(state.velocity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn running_state() -> GameState {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut state = GameState::new(&mut rng);
        state.status = RunStatus::Running;
        state
    }

    #[test]
    fn test_step_ceiling_clamps_and_floors_velocity() {
        let mut state = running_state();
        state.player_y = 0.0;
        state.velocity = -5.0;

        step(&mut state, 1.0);
        assert_eq!(state.player_y, 0.0);
        assert_eq!(state.velocity, 0.0);
    }

    #[test]
    fn test_step_floor_clamps() {
        let mut state = running_state();
        state.player_y = GameState::floor_y() - 1.0;
        state.velocity = 8.0;

        step(&mut state, 1.0);
        assert_eq!(state.player_y, GameState::floor_y());
        assert!(state.velocity <= 0.0);
    }

    #[test]
    fn test_step_asymmetric_gravity() {
        let mut falling = running_state();
        falling.velocity = 1.0;
        step(&mut falling, 1.0);
        assert!((falling.velocity - (1.0 + GRAVITY * 1.1)).abs() < 1e-5);

        let mut rising = running_state();
        rising.velocity = -1.0;
        step(&mut rising, 1.0);
        assert!((rising.velocity - (-1.0 + GRAVITY * 0.9)).abs() < 1e-5);
    }

    #[test]
    fn test_step_caps_fall_speed() {
        let mut state = running_state();
        state.velocity = MAX_FALL_SPEED;
        state.player_y = 10.0;
        step(&mut state, 1.0);
        assert_eq!(state.velocity, MAX_FALL_SPEED);
    }

    #[test]
    fn test_step_clamps_large_delta() {
        let mut a = running_state();
        let mut b = running_state();
        step(&mut a, 30.0);
        step(&mut b, MAX_DELTA_FRAMES);
        assert_eq!(a.player_y, b.player_y);
        assert_eq!(a.velocity, b.velocity);
    }

    #[test]
    fn test_step_noop_when_terminated() {
        let mut state = running_state();
        state.status = RunStatus::Terminated;
        let before = (state.player_y, state.velocity);
        step(&mut state, 1.0);
        assert_eq!((state.player_y, state.velocity), before);
    }

    #[test]
    fn test_impulse_scaling() {
        let mut state = running_state();
        state.velocity = 5.0;
        apply_impulse(&mut state);
        assert!((state.velocity - JUMP_BASE * 1.1).abs() < 1e-5);

        state.velocity = -3.0;
        apply_impulse(&mut state);
        assert!((state.velocity - JUMP_BASE * 0.8).abs() < 1e-5);

        state.velocity = 0.0;
        apply_impulse(&mut state);
        assert_eq!(state.velocity, JUMP_BASE);
    }

    #[test]
    fn test_impulse_starts_run_and_ignored_after_termination() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut state = GameState::new(&mut rng);
        assert_eq!(state.status, RunStatus::Idle);
        apply_impulse(&mut state);
        assert_eq!(state.status, RunStatus::Running);

        state.status = RunStatus::Terminated;
        state.velocity = 2.0;
        apply_impulse(&mut state);
        assert_eq!(state.velocity, 2.0);
    }

    proptest! {
        #[test]
        fn prop_step_keeps_player_in_bounds(
            y in 0.0f32..=570.0,
            v in -40.0f32..40.0,
            dt in 0.0f32..=1.5,
        ) {
            let mut state = running_state();
            state.player_y = y;
            state.velocity = v;
            step(&mut state, dt);
            prop_assert!(state.player_y >= 0.0);
            prop_assert!(state.player_y <= GameState::floor_y());
            prop_assert!(state.velocity <= MAX_FALL_SPEED);
        }
    }
}
