//! Projectile mechanics.
//!
//! Projectiles are advanced once per tick: movement, bounds and range
//! checks, obstacle contact, then target contact. Special modes layer
//! on top of the standard travel rules: chain projectiles hop between
//! targets, explosives trade piercing for area damage, boomerangs
//! reverse at max range and fly back to their owner.
//!
//! All hit tracking uses plain entity-ID membership sets rather than
//! hashing: the sets stay tiny (a handful of IDs) and scanning a short
//! vector is both faster and deterministic.

use serde::{Deserialize, Serialize};

use crate::collision::{Obstacle, Rect};
use crate::components::{ActorRef, EntityId};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Distance from the owner at which a returning boomerang despawns.
fn return_radius() -> Fixed {
    Fixed::from_num(10)
}

/// Floor for the chain-hop damage multiplier.
fn chain_damage_floor() -> Fixed {
    Fixed::ONE / Fixed::from_num(10)
}

/// Small membership set of entity IDs.
///
/// Linear scan over a short vector; no hashing of transient entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitSet {
    ids: Vec<EntityId>,
}

impl HitSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: Vec::with_capacity(4),
        }
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Insert an ID; returns `false` if it was already present.
    pub fn insert(&mut self, id: EntityId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Number of recorded hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove every recorded hit.
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Mode-specific projectile state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileMode {
    /// Plain linear travel with piercing budgets.
    Standard,
    /// Jumps to the nearest unhit target after each hit.
    Chain {
        /// Search radius for the next hop.
        #[serde(with = "fixed_serde")]
        chain_range: Fixed,
        /// Hops allowed beyond the first hit.
        max_jumps: u32,
        /// Per-hop damage falloff fraction.
        #[serde(with = "fixed_serde")]
        damage_reduction: Fixed,
    },
    /// Detonates on any contact, damaging everything in a radius.
    Explosive {
        /// Blast radius.
        #[serde(with = "fixed_serde")]
        radius: Fixed,
    },
    /// Reverses at max range and returns to its owner.
    Boomerang {
        /// Owner to return to; a weak reference resolved each tick.
        owner: EntityId,
        /// Speed multiplier on the return leg.
        #[serde(with = "fixed_serde")]
        return_speed_multiplier: Fixed,
        /// Whether the return leg has begun.
        returning: bool,
    },
}

/// Per-projectile simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileState {
    /// Spawn position.
    pub origin: Vec2Fixed,
    /// Unit travel direction.
    pub direction: Vec2Fixed,
    /// Travel speed in units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Base damage per hit.
    pub damage: u32,
    /// Enemy hits allowed beyond the first.
    pub piercing: u32,
    /// Wall hits allowed beyond the first.
    pub obstacle_piercing: u32,
    /// Distance traveled so far.
    #[serde(with = "fixed_serde")]
    pub traveled: Fixed,
    /// Maximum travel distance.
    #[serde(with = "fixed_serde")]
    pub max_range: Fixed,
    /// Whether hits are critical.
    pub is_crit: bool,
    /// Mode-specific state.
    pub mode: ProjectileMode,
    /// Targets already damaged; cleared when a boomerang reverses.
    pub hits: HitSet,
    /// Walls already pierced, by obstacle index.
    pub obstacle_hits: HitSet,
}

impl ProjectileState {
    /// Create a standard projectile.
    #[must_use]
    pub fn new(
        origin: Vec2Fixed,
        direction: Vec2Fixed,
        speed: Fixed,
        damage: u32,
        max_range: Fixed,
    ) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            speed,
            damage,
            piercing: 0,
            obstacle_piercing: 0,
            traveled: Fixed::ZERO,
            max_range,
            is_crit: false,
            mode: ProjectileMode::Standard,
            hits: HitSet::new(),
            obstacle_hits: HitSet::new(),
        }
    }

    /// Set the piercing budgets.
    #[must_use]
    pub fn with_piercing(mut self, enemies: u32, obstacles: u32) -> Self {
        self.piercing = enemies;
        self.obstacle_piercing = obstacles;
        self
    }

    /// Mark hits as critical.
    #[must_use]
    pub fn with_crit(mut self, is_crit: bool) -> Self {
        self.is_crit = is_crit;
        self
    }

    /// Set a special mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ProjectileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether this projectile is a boomerang on its return leg.
    #[must_use]
    pub fn is_returning(&self) -> bool {
        matches!(
            self.mode,
            ProjectileMode::Boomerang {
                returning: true,
                ..
            }
        )
    }
}

/// One damage application produced by a projectile this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileHit {
    /// Damaged entity.
    pub target: EntityId,
    /// Damage to route through the defense layers.
    pub damage: u32,
    /// Whether the hit is critical.
    pub is_crit: bool,
    /// Position of the hit.
    pub position: Vec2Fixed,
}

/// Result of advancing a projectile one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectileTickResult {
    /// Hits to apply, in order.
    pub hits: Vec<ProjectileHit>,
    /// Whether the projectile is destroyed after this tick.
    pub destroyed: bool,
}

/// Advance a projectile one tick against read-only snapshots.
///
/// `targets` must be sorted by entity ID by the caller so contact
/// resolution is deterministic. `owner_position` carries the boomerang
/// owner's current position, or `None` when the owner is gone.
pub fn advance_projectile(
    state: &mut ProjectileState,
    position: &mut Vec2Fixed,
    targets: &[ActorRef],
    obstacles: &[Obstacle],
    bounds: &Rect,
    owner_position: Option<Vec2Fixed>,
) -> ProjectileTickResult {
    let mut result = ProjectileTickResult::default();

    // Return-leg setup: retarget the owner every tick, despawn if gone.
    let mut step_speed = state.speed;
    if state.is_returning() {
        let Some(owner_pos) = owner_position else {
            result.destroyed = true;
            return result;
        };
        if position.distance_squared(owner_pos) <= return_radius() * return_radius() {
            result.destroyed = true;
            return result;
        }
        if let ProjectileMode::Boomerang {
            return_speed_multiplier,
            ..
        } = state.mode
        {
            step_speed = state.speed * return_speed_multiplier;
        }
        state.direction = position.direction_to(owner_pos);
    }

    *position = *position + state.direction.scale(step_speed);
    state.traveled += step_speed;

    if !bounds.contains(*position) {
        result.destroyed = true;
        return result;
    }

    // Range exhaustion: boomerangs reverse exactly once, everyone else
    // despawns.
    if state.traveled >= state.max_range {
        match &mut state.mode {
            ProjectileMode::Boomerang { returning, .. } if !*returning => {
                *returning = true;
                // Outbound victims become valid again on the way back.
                state.hits.clear();
            }
            ProjectileMode::Boomerang { .. } => {}
            _ => {
                result.destroyed = true;
                return result;
            }
        }
    }

    if resolve_obstacle_contact(state, *position, targets, obstacles, &mut result) {
        return result;
    }

    resolve_target_contact(state, position, targets, &mut result);
    result
}

/// Handle wall contact; returns `true` when the projectile is done.
fn resolve_obstacle_contact(
    state: &mut ProjectileState,
    position: Vec2Fixed,
    targets: &[ActorRef],
    obstacles: &[Obstacle],
    result: &mut ProjectileTickResult,
) -> bool {
    for (index, obstacle) in obstacles.iter().enumerate() {
        // Cover never stops projectiles and never consumes budget.
        if !obstacle.blocks_projectiles() || !obstacle.rect.contains(position) {
            continue;
        }

        if let ProjectileMode::Explosive { radius } = state.mode {
            explode(state, position, radius, targets, result);
            result.destroyed = true;
            return true;
        }

        if state.obstacle_hits.insert(index as EntityId)
            && state.obstacle_hits.len() as u32 > state.obstacle_piercing
        {
            result.destroyed = true;
            return true;
        }
    }
    false
}

/// Handle enemy/boss contact at the projectile's position.
fn resolve_target_contact(
    state: &mut ProjectileState,
    position: &mut Vec2Fixed,
    targets: &[ActorRef],
    result: &mut ProjectileTickResult,
) {
    let Some(contact) = targets.iter().find(|t| {
        !state.hits.contains(t.id)
            && Rect::from_center(t.position, t.half_extent).contains(*position)
    }) else {
        return;
    };

    match state.mode.clone() {
        ProjectileMode::Explosive { radius } => {
            explode(state, *position, radius, targets, result);
            result.destroyed = true;
        }
        ProjectileMode::Chain {
            chain_range,
            max_jumps,
            damage_reduction,
        } => {
            resolve_chain(
                state,
                position,
                *contact,
                targets,
                chain_range,
                max_jumps,
                damage_reduction,
                result,
            );
        }
        ProjectileMode::Standard | ProjectileMode::Boomerang { .. } => {
            state.hits.insert(contact.id);
            result.hits.push(ProjectileHit {
                target: contact.id,
                damage: state.damage,
                is_crit: state.is_crit,
                position: *position,
            });
            if state.hits.len() as u32 > state.piercing {
                result.destroyed = true;
            }
        }
    }
}

/// Resolve a full chain starting at `first`, hopping until the jump
/// budget or the target supply runs out.
#[allow(clippy::too_many_arguments)]
fn resolve_chain(
    state: &mut ProjectileState,
    position: &mut Vec2Fixed,
    first: ActorRef,
    targets: &[ActorRef],
    chain_range: Fixed,
    max_jumps: u32,
    damage_reduction: Fixed,
    result: &mut ProjectileTickResult,
) {
    let mut current = first;
    let mut hop: u32 = 0;

    loop {
        let multiplier =
            (Fixed::ONE - damage_reduction * Fixed::from_num(hop)).max(chain_damage_floor());
        let hop_damage = (Fixed::from_num(state.damage) * multiplier).to_num::<u32>();

        state.hits.insert(current.id);
        *position = current.position;
        result.hits.push(ProjectileHit {
            target: current.id,
            damage: hop_damage,
            is_crit: state.is_crit,
            position: current.position,
        });

        if hop >= max_jumps {
            result.destroyed = true;
            return;
        }

        // Nearest unhit living target within chain range; ties resolve
        // to the lower entity ID through the caller's sort order.
        let range_sq = chain_range * chain_range;
        let next = targets
            .iter()
            .filter(|t| !state.hits.contains(t.id))
            .map(|t| (t, current.position.distance_squared(t.position)))
            .filter(|(_, d)| *d <= range_sq)
            .min_by_key(|(_, d)| *d)
            .map(|(t, _)| *t);

        match next {
            Some(target) => {
                current = target;
                hop += 1;
            }
            None => {
                result.destroyed = true;
                return;
            }
        }
    }
}

/// Area damage to every living target within the blast radius.
fn explode(
    state: &ProjectileState,
    center: Vec2Fixed,
    radius: Fixed,
    targets: &[ActorRef],
    result: &mut ProjectileTickResult,
) {
    let radius_sq = radius * radius;
    for target in targets {
        if center.distance_squared(target.position) <= radius_sq {
            result.hits.push(ProjectileHit {
                target: target.id,
                damage: state.damage,
                is_crit: state.is_crit,
                position: target.position,
            });
        }
    }
}
