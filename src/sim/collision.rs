//! Collision detection between the player hitbox and the playfield
//!
//! The player box is drawn square, but collides as a circle of radius
//! `0.35 * size` around its centre so near misses feel fair.

use glam::Vec2;

use super::state::{GameState, Obstacle};
use crate::consts::*;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min: Vec2::new(x0, y0),
            max: Vec2::new(x1, y1),
        }
    }

    /// Whether a circle overlaps this rectangle
    #[inline]
    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        if self.max.y <= self.min.y || self.max.x <= self.min.x {
            return false;
        }
        let closest = center.clamp(self.min, self.max);
        center.distance_squared(closest) < radius * radius
    }
}

/// Centre of the player hitbox
#[inline]
pub fn hitbox_center(player_y: f32) -> Vec2 {
    Vec2::new(PLAYER_X + PLAYER_SIZE / 2.0, player_y + PLAYER_SIZE / 2.0)
}

#[inline]
pub fn hitbox_radius() -> f32 {
    PLAYER_SIZE * HITBOX_RATIO
}

/// Top and bottom pipe rectangles of an obstacle
pub fn obstacle_rects(obstacle: &Obstacle) -> [Rect; 2] {
    let x0 = obstacle.x;
    let x1 = obstacle.trailing_edge();
    [
        Rect::new(x0, 0.0, x1, obstacle.gap_top),
        Rect::new(x0, obstacle.gap_bottom(), x1, PLAYFIELD_HEIGHT),
    ]
}

/// Floor or ceiling contact, within tolerance
#[inline]
pub fn touches_boundary(player_y: f32) -> bool {
    player_y <= BOUNDARY_TOLERANCE || player_y >= GameState::floor_y() - BOUNDARY_TOLERANCE
}

/// Whether the player currently collides with anything
pub fn detect_collision(state: &GameState) -> bool {
    if touches_boundary(state.player_y) {
        return true;
    }

    let center = hitbox_center(state.player_y);
    let radius = hitbox_radius();
    state
        .obstacles
        .iter()
        .flat_map(obstacle_rects)
        .any(|rect| rect.overlaps_circle(center, radius))
}
