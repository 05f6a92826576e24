//! Component definitions.
//!
//! Components are pure data with no behavior. All simulation entities
//! are composed of these components; behavior lives in the systems.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Faction an actor fights for.
///
/// Projectiles and behaviors only ever target the opposing faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Faction {
    /// Player-controlled actors.
    Player,
    /// AI-controlled enemies and bosses.
    #[default]
    Enemy,
}

impl Faction {
    /// The opposing faction.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }

    /// Check whether two factions are hostile to each other.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        !matches!(
            (self, other),
            (Self::Player, Self::Player) | (Self::Enemy, Self::Enemy)
        )
    }
}

/// Position component in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// World position.
    pub value: Vec2Fixed,
}

impl Position {
    /// Create a new position at the given coordinates.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self { value }
    }

    /// Create a position at the origin.
    pub const ORIGIN: Self = Self {
        value: Vec2Fixed::ZERO,
    };
}

/// Intended-move component.
///
/// Behaviors write the displacement they want this tick; the collision
/// resolver decides how much of it actually happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Velocity {
    /// Intended displacement (units per tick).
    pub value: Vec2Fixed,
}

impl Velocity {
    /// Create a new velocity.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self { value }
    }

    /// Zero velocity (stationary).
    pub const ZERO: Self = Self {
        value: Vec2Fixed::ZERO,
    };

    /// Check if the entity is stationary.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        self.value.x == Fixed::ZERO && self.value.y == Fixed::ZERO
    }
}

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Check if entity is at full health.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }

    /// Heal the entity, returning actual amount healed.
    /// Uses saturating addition to prevent overflow past max.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let headroom = self.max.saturating_sub(self.current);
        let actual = amount.min(headroom);
        self.current = self.current.saturating_add(actual);
        actual
    }

    /// Health as a fraction of max in fixed-point (0..=1).
    #[must_use]
    pub fn fraction(&self) -> Fixed {
        if self.max == 0 {
            Fixed::ZERO
        } else {
            Fixed::from_num(self.current) / Fixed::from_num(self.max)
        }
    }
}

/// Movement capability for mobile actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Base movement speed in units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
}

impl Movement {
    /// Create a movement component.
    #[must_use]
    pub const fn new(speed: Fixed) -> Self {
        Self { speed }
    }
}

/// Collision footprint, a square AABB around the actor's center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionSize {
    /// Half the side length of the collision square.
    #[serde(with = "fixed_serde")]
    pub half_extent: Fixed,
}

impl CollisionSize {
    /// Create a collision size from a half-extent.
    #[must_use]
    pub const fn new(half_extent: Fixed) -> Self {
        Self { half_extent }
    }
}

/// Temporary stat modifiers applied by buffer and freeze behaviors.
///
/// Multipliers default to 1. Each modifier remembers its source entity
/// so it can be removed when the source dies or the target leaves the
/// effect radius; the source is a weak reference resolved by ID lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Speed multiplier from an active buff.
    #[serde(with = "fixed_serde")]
    pub buff_speed: Fixed,
    /// Damage multiplier from an active buff.
    #[serde(with = "fixed_serde")]
    pub buff_damage: Fixed,
    /// Entity that applied the current buff, if any.
    pub buff_source: Option<EntityId>,
    /// Speed multiplier from an active slow debuff.
    #[serde(with = "fixed_serde")]
    pub slow_factor: Fixed,
    /// Entity that applied the current slow, if any.
    pub slow_source: Option<EntityId>,
}

impl Modifiers {
    /// Neutral modifiers (all multipliers 1, no sources).
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            buff_speed: Fixed::ONE,
            buff_damage: Fixed::ONE,
            buff_source: None,
            slow_factor: Fixed::ONE,
            slow_source: None,
        }
    }

    /// Apply a buff from `source`.
    pub fn apply_buff(&mut self, source: EntityId, speed: Fixed, damage: Fixed) {
        self.buff_speed = speed;
        self.buff_damage = damage;
        self.buff_source = Some(source);
    }

    /// Remove the buff if it came from `source`.
    pub fn clear_buff_from(&mut self, source: EntityId) {
        if self.buff_source == Some(source) {
            self.buff_speed = Fixed::ONE;
            self.buff_damage = Fixed::ONE;
            self.buff_source = None;
        }
    }

    /// Apply a slow debuff from `source`.
    pub fn apply_slow(&mut self, source: EntityId, factor: Fixed) {
        self.slow_factor = factor;
        self.slow_source = Some(source);
    }

    /// Remove the slow if it came from `source`.
    pub fn clear_slow_from(&mut self, source: EntityId) {
        if self.slow_source == Some(source) {
            self.slow_factor = Fixed::ONE;
            self.slow_source = None;
        }
    }

    /// Combined speed multiplier.
    #[must_use]
    pub fn speed_multiplier(&self) -> Fixed {
        self.buff_speed * self.slow_factor
    }

    /// Combined damage multiplier.
    #[must_use]
    pub fn damage_multiplier(&self) -> Fixed {
        self.buff_damage
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Read-only snapshot of one living actor, taken once per tick.
///
/// Consumers (projectile contact, behavior target scans) iterate these
/// in ascending entity-ID order for determinism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorRef {
    /// Entity ID.
    pub id: EntityId,
    /// Current position.
    pub position: Vec2Fixed,
    /// Collision half-extent.
    pub half_extent: Fixed,
}

/// Experience points dropped on death, reported in the death event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XpReward {
    /// XP granted to the killer's side.
    pub amount: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_hostility() {
        assert!(Faction::Player.is_hostile_to(Faction::Enemy));
        assert!(Faction::Enemy.is_hostile_to(Faction::Player));
        assert!(!Faction::Enemy.is_hostile_to(Faction::Enemy));
        assert_eq!(Faction::Player.opponent(), Faction::Enemy);
    }

    #[test]
    fn test_health_damage_and_heal() {
        let mut health = Health::new(100);
        assert_eq!(health.apply_damage(30), 30);
        assert_eq!(health.current, 70);

        // Overkill is capped
        assert_eq!(health.apply_damage(1000), 70);
        assert!(health.is_dead());

        // Healing never exceeds max
        health.current = 90;
        assert_eq!(health.heal(50), 10);
        assert!(health.is_full());
    }

    #[test]
    fn test_health_fraction() {
        let health = Health {
            current: 25,
            max: 100,
        };
        assert_eq!(health.fraction(), Fixed::from_num(0.25));

        let broken = Health { current: 5, max: 0 };
        assert_eq!(broken.fraction(), Fixed::ZERO);
    }

    #[test]
    fn test_modifiers_buff_lifecycle() {
        let mut mods = Modifiers::neutral();
        mods.apply_buff(7, Fixed::from_num(1.5), Fixed::from_num(1.25));
        assert_eq!(mods.speed_multiplier(), Fixed::from_num(1.5));
        assert_eq!(mods.damage_multiplier(), Fixed::from_num(1.25));

        // Clearing from a different source is a no-op
        mods.clear_buff_from(9);
        assert_eq!(mods.buff_source, Some(7));

        mods.clear_buff_from(7);
        assert_eq!(mods, Modifiers::neutral());
    }

    #[test]
    fn test_modifiers_slow_stacks_with_buff() {
        let mut mods = Modifiers::neutral();
        mods.apply_buff(1, Fixed::from_num(2), Fixed::ONE);
        mods.apply_slow(2, Fixed::from_num(0.5));
        assert_eq!(mods.speed_multiplier(), Fixed::ONE);

        mods.clear_slow_from(2);
        assert_eq!(mods.speed_multiplier(), Fixed::from_num(2));
    }
}
