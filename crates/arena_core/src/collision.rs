//! Collision and knockback resolution.
//!
//! All overlap tests are axis-aligned rectangle (AABB) checks in
//! fixed-point math. Movement is resolved independently per axis so an
//! actor blocked on one axis can still slide along the other. Knockback
//! is all-or-nothing: if the displaced position overlaps any obstacle
//! the whole displacement is reverted.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};

/// Axis-aligned rectangle in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum corner (top-left in screen terms).
    pub min: Vec2Fixed,
    /// Maximum corner (bottom-right in screen terms).
    pub max: Vec2Fixed,
}

impl Rect {
    /// Create a rectangle from its corners.
    #[must_use]
    pub const fn new(min: Vec2Fixed, max: Vec2Fixed) -> Self {
        Self { min, max }
    }

    /// Create a rectangle from a center point and half-extent (square).
    #[must_use]
    pub fn from_center(center: Vec2Fixed, half_extent: Fixed) -> Self {
        let half = Vec2Fixed::new(half_extent, half_extent);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Rectangle width.
    #[must_use]
    pub fn width(&self) -> Fixed {
        self.max.x - self.min.x
    }

    /// Rectangle height.
    #[must_use]
    pub fn height(&self) -> Fixed {
        self.max.y - self.min.y
    }

    /// Center point of the rectangle.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        Vec2Fixed::new(
            (self.min.x + self.max.x) / Fixed::from_num(2),
            (self.min.y + self.max.y) / Fixed::from_num(2),
        )
    }

    /// Test overlap with another rectangle.
    ///
    /// Touching edges do not count as overlap, so actors can stand
    /// flush against walls.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Test whether a point lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Clamp a point to lie within the rectangle.
    #[must_use]
    pub fn clamp_point(&self, point: Vec2Fixed) -> Vec2Fixed {
        Vec2Fixed::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
        )
    }

    /// Shrink the rectangle inward by `margin` on every side.
    ///
    /// Used to keep actor centers inside arena bounds by their
    /// collision half-extent.
    #[must_use]
    pub fn shrink(&self, margin: Fixed) -> Self {
        let m = Vec2Fixed::new(margin, margin);
        Self {
            min: self.min + m,
            max: self.max - m,
        }
    }
}

/// Obstacle classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// Solid wall: blocks movement and projectiles.
    #[default]
    Wall,
    /// Low cover: blocks movement but projectiles pass freely.
    Cover,
}

/// Static obstacle in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Footprint rectangle.
    pub rect: Rect,
    /// Wall or cover.
    pub kind: ObstacleKind,
}

impl Obstacle {
    /// Create a wall obstacle.
    #[must_use]
    pub const fn wall(rect: Rect) -> Self {
        Self {
            rect,
            kind: ObstacleKind::Wall,
        }
    }

    /// Create a cover obstacle.
    #[must_use]
    pub const fn cover(rect: Rect) -> Self {
        Self {
            rect,
            kind: ObstacleKind::Cover,
        }
    }

    /// Whether this obstacle stops projectiles.
    #[must_use]
    pub const fn blocks_projectiles(&self) -> bool {
        matches!(self.kind, ObstacleKind::Wall)
    }
}

/// Test whether an actor AABB at `center` overlaps any obstacle.
#[must_use]
pub fn position_blocked(center: Vec2Fixed, half_extent: Fixed, obstacles: &[Obstacle]) -> bool {
    let actor = Rect::from_center(center, half_extent);
    obstacles.iter().any(|o| actor.overlaps(&o.rect))
}

/// Resolve a movement attempt against obstacles and arena bounds.
///
/// Each axis is tested independently: the actor first tries the full
/// displacement, then X-only, then Y-only. This lets units slide along
/// walls instead of sticking to them. The returned position is always
/// clamped to the arena bounds (by collision half-extent) and never
/// overlaps an obstacle.
#[must_use]
pub fn resolve_movement(
    position: Vec2Fixed,
    delta: Vec2Fixed,
    half_extent: Fixed,
    obstacles: &[Obstacle],
    bounds: &Rect,
) -> Vec2Fixed {
    let inner = bounds.shrink(half_extent);
    let desired = inner.clamp_point(position + delta);

    if !position_blocked(desired, half_extent, obstacles) {
        return desired;
    }

    // X-only slide
    let x_only = inner.clamp_point(Vec2Fixed::new(position.x + delta.x, position.y));
    if !position_blocked(x_only, half_extent, obstacles) {
        return x_only;
    }

    // Y-only slide
    let y_only = inner.clamp_point(Vec2Fixed::new(position.x, position.y + delta.y));
    if !position_blocked(y_only, half_extent, obstacles) {
        return y_only;
    }

    position
}

/// Apply knockback away from a damage source.
///
/// The displacement is `magnitude` units along the normalized vector
/// from `source` to `position`, clamped to arena bounds. If the result
/// overlaps any obstacle the knockback is reverted entirely; partial
/// application would let actors tunnel into corners.
#[must_use]
pub fn apply_knockback(
    position: Vec2Fixed,
    source: Vec2Fixed,
    magnitude: Fixed,
    half_extent: Fixed,
    obstacles: &[Obstacle],
    bounds: &Rect,
) -> Vec2Fixed {
    let away = source.direction_to(position);
    if away == Vec2Fixed::ZERO {
        return position;
    }

    let inner = bounds.shrink(half_extent);
    let displaced = inner.clamp_point(position + away.scale(magnitude));

    if position_blocked(displaced, half_extent, obstacles) {
        position
    } else {
        displaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_int(x, y)
    }

    fn arena() -> Rect {
        Rect::new(vec2(0, 0), vec2(100, 100))
    }

    #[test]
    fn test_rect_overlap() {
        let a = Rect::new(vec2(0, 0), vec2(10, 10));
        let b = Rect::new(vec2(5, 5), vec2(15, 15));
        let c = Rect::new(vec2(10, 0), vec2(20, 10));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // Touching edges are not overlap
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_rect_from_center() {
        let r = Rect::from_center(vec2(5, 5), fixed(2));
        assert_eq!(r.min, vec2(3, 3));
        assert_eq!(r.max, vec2(7, 7));
        assert_eq!(r.center(), vec2(5, 5));
    }

    #[test]
    fn test_free_movement() {
        let pos = resolve_movement(vec2(10, 10), vec2(5, 0), fixed(1), &[], &arena());
        assert_eq!(pos, vec2(15, 10));
    }

    #[test]
    fn test_movement_blocked_slides_along_wall() {
        // Wall directly to the right of the actor
        let wall = Obstacle::wall(Rect::new(vec2(15, 0), vec2(20, 100)));

        // Diagonal move into the wall: X is blocked, Y should slide
        let pos = resolve_movement(vec2(12, 10), vec2(5, 5), fixed(2), &[wall], &arena());
        assert_eq!(pos, vec2(12, 15));
    }

    #[test]
    fn test_movement_fully_blocked() {
        let walls = [
            Obstacle::wall(Rect::new(vec2(15, 0), vec2(20, 100))),
            Obstacle::wall(Rect::new(vec2(0, 15), vec2(100, 20))),
        ];

        let pos = resolve_movement(vec2(12, 12), vec2(5, 5), fixed(2), &walls, &arena());
        assert_eq!(pos, vec2(12, 12));
    }

    #[test]
    fn test_movement_clamped_to_bounds() {
        let pos = resolve_movement(vec2(98, 50), vec2(10, 0), fixed(2), &[], &arena());
        assert_eq!(pos, vec2(98, 50));

        let pos = resolve_movement(vec2(90, 50), vec2(20, 0), fixed(2), &[], &arena());
        assert_eq!(pos, vec2(98, 50));
    }

    #[test]
    fn test_cover_blocks_movement() {
        let cover = Obstacle::cover(Rect::new(vec2(15, 0), vec2(20, 100)));
        assert!(!cover.blocks_projectiles());

        // Cover still blocks movement
        let pos = resolve_movement(vec2(12, 10), vec2(5, 0), fixed(2), &[cover], &arena());
        assert_eq!(pos, vec2(12, 10));
    }

    #[test]
    fn test_knockback_moves_away_from_source() {
        let pos = apply_knockback(vec2(50, 50), vec2(40, 50), fixed(10), fixed(2), &[], &arena());
        assert_eq!(pos, vec2(60, 50));
    }

    #[test]
    fn test_knockback_reverted_on_obstacle() {
        let wall = Obstacle::wall(Rect::new(vec2(55, 40), vec2(65, 60)));

        // Knockback would push the actor into the wall: revert entirely
        let pos = apply_knockback(
            vec2(50, 50),
            vec2(40, 50),
            fixed(10),
            fixed(2),
            &[wall],
            &arena(),
        );
        assert_eq!(pos, vec2(50, 50));
    }

    #[test]
    fn test_knockback_all_or_nothing_diagonal() {
        // Wall blocks only the X component of a diagonal knockback.
        // The contract is all-or-nothing: no per-axis slide here.
        let wall = Obstacle::wall(Rect::new(vec2(55, 0), vec2(65, 100)));

        let pos = apply_knockback(
            vec2(50, 50),
            vec2(43, 43),
            fixed(10),
            fixed(2),
            &[wall],
            &arena(),
        );
        assert_eq!(pos, vec2(50, 50));
    }

    #[test]
    fn test_knockback_clamped_to_bounds() {
        let pos = apply_knockback(vec2(97, 50), vec2(40, 50), fixed(10), fixed(2), &[], &arena());
        assert_eq!(pos, vec2(98, 50));
    }

    #[test]
    fn test_knockback_coincident_source_is_noop() {
        let pos = apply_knockback(vec2(50, 50), vec2(50, 50), fixed(10), fixed(2), &[], &arena());
        assert_eq!(pos, vec2(50, 50));
    }
}
