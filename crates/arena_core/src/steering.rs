//! Direct-steering obstacle avoidance.
//!
//! Fallback for actors that do not use grid pathfinding (or whose path
//! came back empty). The steering probe tests the desired next position
//! against the obstacle set and, when blocked, searches a fixed fan of
//! candidate directions. A chosen avoidance direction is remembered for
//! a short window so actors commit to going around an obstacle instead
//! of oscillating at its corner.

use serde::{Deserialize, Serialize};

use crate::collision::{position_blocked, Obstacle, Rect};
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::TICK_RATE;

/// Ticks a chosen avoidance direction stays active (0.8 s).
pub const AVOIDANCE_MEMORY_TICKS: u32 = TICK_RATE * 4 / 5;

/// Ticks between stuck-detection position samples (0.1 s).
pub const STUCK_SAMPLE_TICKS: u32 = TICK_RATE / 10;

/// Accumulated stuck ticks that force a candidate re-evaluation (1.0 s).
pub const STUCK_THRESHOLD_TICKS: u32 = TICK_RATE;

/// Minimum displacement per sample window to count as progress.
fn stuck_min_progress() -> Fixed {
    Fixed::from_num(5)
}

/// Per-actor steering memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvoidanceState {
    /// Active avoidance direction, if committed to one.
    avoidance_direction: Option<Vec2Fixed>,
    /// Remaining ticks the avoidance direction stays active.
    avoidance_timer: u32,
    /// Ticks accumulated without meaningful positional progress.
    stuck_timer: u32,
    /// Ticks until the next progress sample.
    sample_timer: u32,
    /// Position at the last progress sample.
    last_sample_position: Vec2Fixed,
}

impl AvoidanceState {
    /// Fresh steering state anchored at the actor's spawn position.
    #[must_use]
    pub fn new(position: Vec2Fixed) -> Self {
        Self {
            last_sample_position: position,
            sample_timer: STUCK_SAMPLE_TICKS,
            ..Self::default()
        }
    }

    /// Whether the actor is currently committed to an avoidance direction.
    #[must_use]
    pub const fn is_avoiding(&self) -> bool {
        self.avoidance_direction.is_some()
    }

    fn drop_avoidance(&mut self) {
        self.avoidance_direction = None;
        self.avoidance_timer = 0;
    }

    /// Sample positional progress and accumulate the stuck timer.
    ///
    /// Returns `true` when the stuck threshold was crossed this tick,
    /// which forces re-evaluation of avoidance candidates.
    fn update_stuck(&mut self, position: Vec2Fixed) -> bool {
        if self.sample_timer > 1 {
            self.sample_timer -= 1;
            return false;
        }
        self.sample_timer = STUCK_SAMPLE_TICKS;

        let progress = position.distance(self.last_sample_position);
        self.last_sample_position = position;

        if progress < stuck_min_progress() {
            self.stuck_timer += STUCK_SAMPLE_TICKS;
            if self.stuck_timer >= STUCK_THRESHOLD_TICKS {
                self.stuck_timer = 0;
                return true;
            }
        } else {
            self.stuck_timer = 0;
        }

        false
    }
}

/// Candidate fan around a blocked desired direction.
///
/// Ordered from hard turns to shallow ones: both perpendiculars, the
/// two diagonal blends, then two shallower blends that mostly keep the
/// desired heading.
fn candidate_directions(desired: Vec2Fixed) -> [Vec2Fixed; 6] {
    let perp = desired.perpendicular();
    let half = Fixed::from_num(1) / Fixed::from_num(2);
    let quarter = Fixed::from_num(1) / Fixed::from_num(4);

    [
        perp,
        -perp,
        desired.lerp(perp, half).normalize(),
        desired.lerp(-perp, half).normalize(),
        desired.lerp(perp, quarter).normalize(),
        desired.lerp(-perp, quarter).normalize(),
    ]
}

/// Probe whether a step along `direction` lands clear of obstacles.
fn step_clear(
    position: Vec2Fixed,
    direction: Vec2Fixed,
    step: Fixed,
    half_extent: Fixed,
    obstacles: &[Obstacle],
    bounds: &Rect,
) -> bool {
    let next = bounds
        .shrink(half_extent)
        .clamp_point(position + direction.scale(step));
    !position_blocked(next, half_extent, obstacles)
}

/// Choose a movement direction toward `desired`, steering around obstacles.
///
/// Returns a unit direction (possibly axis-only) or the zero vector when
/// every option is blocked. `step` is the distance the actor will cover
/// this tick, used as the probe length.
pub fn apply_obstacle_avoidance(
    state: &mut AvoidanceState,
    position: Vec2Fixed,
    desired: Vec2Fixed,
    step: Fixed,
    half_extent: Fixed,
    obstacles: &[Obstacle],
    bounds: &Rect,
) -> Vec2Fixed {
    if desired == Vec2Fixed::ZERO {
        return Vec2Fixed::ZERO;
    }

    let force_reevaluate = state.update_stuck(position);
    if force_reevaluate {
        state.drop_avoidance();
    }

    // Stay committed to an active avoidance direction while it works.
    if let Some(direction) = state.avoidance_direction {
        if state.avoidance_timer > 0
            && step_clear(position, direction, step, half_extent, obstacles, bounds)
        {
            state.avoidance_timer -= 1;
            return direction;
        }
        state.drop_avoidance();
    }

    if step_clear(position, desired, step, half_extent, obstacles, bounds) {
        return desired;
    }

    for candidate in candidate_directions(desired) {
        if candidate == Vec2Fixed::ZERO {
            continue;
        }
        if step_clear(position, candidate, step, half_extent, obstacles, bounds) {
            state.avoidance_direction = Some(candidate);
            state.avoidance_timer = AVOIDANCE_MEMORY_TICKS;
            return candidate;
        }
    }

    // All candidates blocked: degrade to axis-only movement.
    let x_only = Vec2Fixed::new(desired.x, Fixed::ZERO).normalize();
    if x_only != Vec2Fixed::ZERO
        && step_clear(position, x_only, step, half_extent, obstacles, bounds)
    {
        return x_only;
    }

    let y_only = Vec2Fixed::new(Fixed::ZERO, desired.y).normalize();
    if y_only != Vec2Fixed::ZERO
        && step_clear(position, y_only, step, half_extent, obstacles, bounds)
    {
        return y_only;
    }

    Vec2Fixed::ZERO
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

    fn east() -> Vec2Fixed {
        vec2(1, 0)
    }

    #[test]
    fn test_clear_path_keeps_desired_direction() {
        let mut state = AvoidanceState::new(vec2(50, 50));
        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &[],
            &arena(),
        );
        assert_eq!(dir, east());
        assert!(!state.is_avoiding());
    }

    #[test]
    fn test_blocked_path_picks_candidate() {
        // Wall directly east of the actor
        let wall = Obstacle::wall(Rect::new(vec2(54, 40), vec2(60, 60)));
        let mut state = AvoidanceState::new(vec2(50, 50));

        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );

        // First clear candidate is the counter-clockwise perpendicular
        assert_eq!(dir, vec2(0, 1));
        assert!(state.is_avoiding());
    }

    #[test]
    fn test_avoidance_direction_is_remembered() {
        let wall = Obstacle::wall(Rect::new(vec2(54, 40), vec2(60, 60)));
        let mut state = AvoidanceState::new(vec2(50, 50));

        let first = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );

        // Next tick, even from a spot where the desired direction is
        // clear, the remembered avoidance direction wins.
        let second = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 55),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_avoidance_memory_expires() {
        let wall = Obstacle::wall(Rect::new(vec2(54, 40), vec2(60, 60)));
        let mut state = AvoidanceState::new(vec2(50, 50));

        apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );

        // Burn through the memory window from a clear position
        for _ in 0..AVOIDANCE_MEMORY_TICKS {
            apply_obstacle_avoidance(
                &mut state,
                vec2(50, 70),
                east(),
                fixed(5),
                fixed(2),
                &[wall],
                &arena(),
            );
        }

        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 70),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );
        assert_eq!(dir, east());
        assert!(!state.is_avoiding());
    }

    #[test]
    fn test_axis_only_degradation() {
        // Channel open only straight east: walls pinch from above and
        // below so every blended candidate clips one of them.
        let walls = [
            Obstacle::wall(Rect::new(vec2(40, 30), vec2(70, 47))),
            Obstacle::wall(Rect::new(vec2(40, 53), vec2(70, 70))),
        ];
        let mut state = AvoidanceState::new(vec2(50, 50));

        // Desired direction is diagonal; only X-only movement is clear.
        let desired = vec2(1, 1).normalize();
        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            desired,
            fixed(5),
            fixed(2),
            &walls,
            &arena(),
        );
        assert_eq!(dir, east());
    }

    #[test]
    fn test_fully_boxed_in_yields_zero() {
        let walls = [
            Obstacle::wall(Rect::new(vec2(40, 40), vec2(60, 47))),
            Obstacle::wall(Rect::new(vec2(40, 53), vec2(60, 60))),
            Obstacle::wall(Rect::new(vec2(40, 40), vec2(47, 60))),
            Obstacle::wall(Rect::new(vec2(53, 40), vec2(60, 60))),
        ];
        let mut state = AvoidanceState::new(vec2(50, 50));

        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &walls,
            &arena(),
        );
        assert_eq!(dir, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_stuck_detection_forces_reevaluation() {
        let wall = Obstacle::wall(Rect::new(vec2(54, 40), vec2(60, 60)));
        let mut state = AvoidanceState::new(vec2(50, 50));

        // Commit to an avoidance direction
        apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );
        assert!(state.is_avoiding());

        // Actor makes no progress for a full stuck threshold
        for _ in 0..STUCK_THRESHOLD_TICKS {
            apply_obstacle_avoidance(
                &mut state,
                vec2(50, 50),
                east(),
                fixed(5),
                fixed(2),
                &[wall],
                &arena(),
            );
        }

        // The stuck trigger dropped the committed direction at least once;
        // steering keeps producing a clear candidate rather than freezing.
        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            east(),
            fixed(5),
            fixed(2),
            &[wall],
            &arena(),
        );
        assert_ne!(dir, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_zero_desired_is_noop() {
        let mut state = AvoidanceState::new(vec2(50, 50));
        let dir = apply_obstacle_avoidance(
            &mut state,
            vec2(50, 50),
            Vec2Fixed::ZERO,
            fixed(5),
            fixed(2),
            &[],
            &arena(),
        );
        assert_eq!(dir, Vec2Fixed::ZERO);
    }
}
