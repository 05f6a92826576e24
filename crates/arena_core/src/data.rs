//! Data-driven stat templates for enemies and bosses.
//!
//! Templates are loaded from RON documents into a registry keyed by
//! kind. Every field carries a zero/neutral default so a template may
//! specify only what it needs; missing fields never fail the load.
//! Malformed numeric input (negative radii, ranges, speeds) is clamped
//! to zero with a warning rather than rejected, so bad data degrades to
//! a no-effect stat instead of blocking the simulation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorKind;
use crate::boss::BossKind;
use crate::error::{ArenaError, Result};
use crate::math::{fixed_serde, Fixed};

/// Numeric identifier for an enemy kind.
///
/// Assigned from sorted load order, so the same data files produce the
/// same IDs on every machine. Used everywhere at runtime instead of the
/// template's string ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EnemyKindId(u16);

impl EnemyKindId {
    /// Sentinel value indicating no enemy kind.
    pub const NONE: Self = Self(u16::MAX);

    /// Create a new enemy kind ID.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Check if this is a valid ID (not NONE).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u16::MAX
    }
}

/// How an enemy navigates toward its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PathingMode {
    /// Direct steering with obstacle avoidance only.
    #[default]
    Direct,
    /// Grid A* with steering fallback.
    Smart,
    /// Corner-to-corner patrol, ignores the target's position.
    Perimeter,
}

/// Projectile stats attached to a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileStats {
    /// Travel speed in units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Base damage per hit.
    pub damage: u32,
    /// Maximum travel distance in units.
    #[serde(with = "fixed_serde")]
    pub max_range: Fixed,
    /// Enemy hits allowed beyond the first.
    #[serde(default)]
    pub piercing: u32,
    /// Wall hits allowed beyond the first.
    #[serde(default)]
    pub obstacle_piercing: u32,
}

impl Default for ProjectileStats {
    fn default() -> Self {
        Self {
            speed: Fixed::from_num(8),
            damage: 10,
            max_range: Fixed::from_num(400),
            piercing: 0,
            obstacle_piercing: 0,
        }
    }
}

/// Data-driven enemy definition.
///
/// # Example RON
///
/// ```ron
/// EnemyTemplate(
///     id: "warden_turret",
///     behavior: "turret",
///     health: 60,
///     armor: 20,
///     damage_reduction: 858993459,  // Fixed-point for 0.2
///     attack_interval: 30,
///     projectile: Some(ProjectileStats(
///         speed: 34359738368,       // Fixed-point for 8.0
///         damage: 12,
///         max_range: 1288490188800, // Fixed-point for 300.0
///     )),
///     xp_reward: 15,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyTemplate {
    /// Unique string identifier for this enemy kind.
    pub id: String,

    /// Behavior tag; unknown tags fall back to rush.
    pub behavior: String,

    /// Maximum health points.
    pub health: u32,

    /// Maximum armor points.
    pub armor: u32,

    /// Armor damage-reduction fraction in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub damage_reduction: Fixed,

    /// Maximum shield points.
    pub shield: u32,

    /// Shield points restored per regen interval.
    pub shield_regen_rate: u32,

    /// Movement speed in units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,

    /// Collision half-extent in units.
    #[serde(with = "fixed_serde")]
    pub collision_half_extent: Fixed,

    /// Damage dealt on body contact with a hostile actor.
    pub contact_damage: u32,

    /// XP dropped on death.
    pub xp_reward: u32,

    /// Navigation mode.
    pub pathing: PathingMode,

    /// Ticks between attacks (turret, shoot, ranged bosses).
    pub attack_interval: u32,

    /// Ticks between charge attempts.
    pub charge_cooldown: u32,

    /// Ticks between self-teleports or player-teleports.
    pub teleport_cooldown: u32,

    /// Self/player teleport distance in units.
    #[serde(with = "fixed_serde")]
    pub teleport_range: Fixed,

    /// Ticks between child spawns (spawner behavior).
    pub spawn_interval: u32,

    /// Ticks between heal pulses.
    pub heal_interval: u32,

    /// Heal pulse radius in units.
    #[serde(with = "fixed_serde")]
    pub heal_radius: Fixed,

    /// Health restored per heal pulse.
    pub heal_amount: u32,

    /// Buff scan radius in units.
    #[serde(with = "fixed_serde")]
    pub buff_radius: Fixed,

    /// Speed multiplier granted by a buffer.
    #[serde(with = "fixed_serde")]
    pub buff_speed_multiplier: Fixed,

    /// Damage multiplier granted by a buffer.
    #[serde(with = "fixed_serde")]
    pub buff_damage_multiplier: Fixed,

    /// Slow aura radius in units (freeze behavior).
    #[serde(with = "fixed_serde")]
    pub slow_radius: Fixed,

    /// Speed multiplier applied to a slowed target.
    #[serde(with = "fixed_serde")]
    pub slow_factor: Fixed,

    /// Projectile stats for ranged behaviors.
    pub projectile: Option<ProjectileStats>,

    /// Number of children spawned on death (0 = no split).
    pub splits: u32,

    /// Child kind spawned by splits and the spawner behavior.
    pub child_kind: Option<String>,

    /// Explosion radius on death (0 = no explosion).
    #[serde(with = "fixed_serde")]
    pub explode_radius: Fixed,

    /// Explosion damage on death.
    pub explode_damage: u32,

    /// Radial projectiles released on death (0 = none).
    pub shrapnel_count: u32,
}

impl Default for EnemyTemplate {
    fn default() -> Self {
        Self {
            id: String::new(),
            behavior: String::new(),
            health: 1,
            armor: 0,
            damage_reduction: Fixed::ZERO,
            shield: 0,
            shield_regen_rate: 0,
            speed: Fixed::ZERO,
            collision_half_extent: Fixed::from_num(8),
            contact_damage: 0,
            xp_reward: 0,
            pathing: PathingMode::Direct,
            attack_interval: 0,
            charge_cooldown: 0,
            teleport_cooldown: 0,
            teleport_range: Fixed::ZERO,
            spawn_interval: 0,
            heal_interval: 0,
            heal_radius: Fixed::ZERO,
            heal_amount: 0,
            buff_radius: Fixed::ZERO,
            buff_speed_multiplier: Fixed::ONE,
            buff_damage_multiplier: Fixed::ONE,
            slow_radius: Fixed::ZERO,
            slow_factor: Fixed::ONE,
            projectile: None,
            splits: 0,
            child_kind: None,
            explode_radius: Fixed::ZERO,
            explode_damage: 0,
            shrapnel_count: 0,
        }
    }
}

impl EnemyTemplate {
    /// Resolve the behavior tag to a kind; unknown tags become `Rush`.
    #[must_use]
    pub fn behavior_kind(&self) -> BehaviorKind {
        BehaviorKind::from_tag(&self.behavior)
    }

    /// Clamp malformed numeric fields to zero-effect values.
    ///
    /// Negative radii, ranges, and speeds become zero; reduction
    /// fractions and multipliers are clamped to sane ranges. Logged
    /// once per template at load time.
    pub fn sanitize(&mut self) {
        for (label, value) in [
            ("speed", &mut self.speed),
            ("collision_half_extent", &mut self.collision_half_extent),
            ("teleport_range", &mut self.teleport_range),
            ("heal_radius", &mut self.heal_radius),
            ("buff_radius", &mut self.buff_radius),
            ("slow_radius", &mut self.slow_radius),
            ("explode_radius", &mut self.explode_radius),
        ] {
            if *value < Fixed::ZERO {
                tracing::warn!(template = %self.id, field = label, "negative value clamped to zero");
                *value = Fixed::ZERO;
            }
        }

        if self.damage_reduction < Fixed::ZERO || self.damage_reduction > Fixed::ONE {
            tracing::warn!(template = %self.id, "damage_reduction clamped to [0, 1]");
            self.damage_reduction = self.damage_reduction.clamp(Fixed::ZERO, Fixed::ONE);
        }

        if self.slow_factor < Fixed::ZERO {
            tracing::warn!(template = %self.id, "negative slow_factor clamped to zero");
            self.slow_factor = Fixed::ZERO;
        }

        if let Some(stats) = &mut self.projectile {
            if stats.speed < Fixed::ZERO {
                tracing::warn!(template = %self.id, "negative projectile speed clamped to zero");
                stats.speed = Fixed::ZERO;
            }
            if stats.max_range < Fixed::ZERO {
                tracing::warn!(template = %self.id, "negative projectile range clamped to zero");
                stats.max_range = Fixed::ZERO;
            }
        }
    }

    /// Scale base stats for dungeon depth.
    ///
    /// Health, contact damage, projectile damage, and XP grow with the
    /// floor multiplier; timings and radii are unaffected.
    #[must_use]
    pub fn scaled_for_floor(&self, floor: u32) -> Self {
        let multiplier = floor_multiplier(floor);
        let scale = |base: u32| (Fixed::from_num(base) * multiplier).to_num::<u32>();

        let mut scaled = self.clone();
        scaled.health = scale(self.health).max(1);
        scaled.armor = scale(self.armor);
        scaled.shield = scale(self.shield);
        scaled.contact_damage = scale(self.contact_damage);
        scaled.explode_damage = scale(self.explode_damage);
        scaled.xp_reward = scale(self.xp_reward);
        if let Some(stats) = &mut scaled.projectile {
            stats.damage = scale(stats.damage);
        }
        scaled
    }
}

/// Data-driven boss definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossTemplate {
    /// Unique string identifier for this boss kind.
    pub id: String,

    /// Boss machine tag: "gatekeeper", "twin_melee", "twin_ranged", "swarm_queen".
    pub kind: String,

    /// Maximum health points.
    pub health: u32,

    /// Maximum armor points.
    pub armor: u32,

    /// Armor damage-reduction fraction in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub damage_reduction: Fixed,

    /// Maximum shield points.
    pub shield: u32,

    /// Shield points restored per regen interval.
    pub shield_regen_rate: u32,

    /// Movement speed in units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,

    /// Collision half-extent in units.
    #[serde(with = "fixed_serde")]
    pub collision_half_extent: Fixed,

    /// Damage dealt on body contact.
    pub contact_damage: u32,

    /// XP dropped on death.
    pub xp_reward: u32,

    /// Enemy kind spawned as minions.
    pub minion_kind: Option<String>,

    /// Projectile stats for ranged attacks and radial bursts.
    pub projectile: Option<ProjectileStats>,
}

impl Default for BossTemplate {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: String::new(),
            health: 1,
            armor: 0,
            damage_reduction: Fixed::ZERO,
            shield: 0,
            shield_regen_rate: 0,
            speed: Fixed::ZERO,
            collision_half_extent: Fixed::from_num(16),
            contact_damage: 0,
            xp_reward: 0,
            minion_kind: None,
            projectile: None,
        }
    }
}

impl BossTemplate {
    /// Resolve the kind tag.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnknownKind`] for an unrecognized tag. A
    /// boss with a bad tag cannot sensibly fall back the way enemy
    /// behaviors do.
    pub fn boss_kind(&self) -> Result<BossKind> {
        BossKind::from_tag(&self.kind).ok_or_else(|| ArenaError::UnknownKind(self.kind.clone()))
    }

    /// Scale base stats for dungeon depth.
    #[must_use]
    pub fn scaled_for_floor(&self, floor: u32) -> Self {
        let multiplier = floor_multiplier(floor);
        let scale = |base: u32| (Fixed::from_num(base) * multiplier).to_num::<u32>();

        let mut scaled = self.clone();
        scaled.health = scale(self.health).max(1);
        scaled.armor = scale(self.armor);
        scaled.shield = scale(self.shield);
        scaled.contact_damage = scale(self.contact_damage);
        scaled.xp_reward = scale(self.xp_reward);
        if let Some(stats) = &mut scaled.projectile {
            stats.damage = scale(stats.damage);
        }
        scaled
    }
}

/// Stat multiplier for dungeon depth: +10% per floor past the first.
#[must_use]
pub fn floor_multiplier(floor: u32) -> Fixed {
    let depth = floor.saturating_sub(1).min(1000);
    Fixed::ONE + Fixed::from_num(depth) / Fixed::from_num(10)
}

/// Top-level RON document holding all templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateFile {
    /// Enemy definitions.
    #[serde(default)]
    pub enemies: Vec<EnemyTemplate>,
    /// Boss definitions.
    #[serde(default)]
    pub bosses: Vec<BossTemplate>,
}

/// Registry of loaded templates.
///
/// Enemy kinds get numeric IDs from sorted load order so spawn
/// requests replicate cheaply across the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateRegistry {
    enemies: Vec<EnemyTemplate>,
    enemy_ids: HashMap<String, EnemyKindId>,
    bosses: HashMap<String, BossTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load templates from a RON document.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::TemplateParseError`] if the document does
    /// not parse. Individual malformed *values* inside a parseable
    /// document are clamped, not rejected.
    pub fn from_ron(label: &str, source: &str) -> Result<Self> {
        let file: TemplateFile =
            ron::from_str(source).map_err(|e| ArenaError::TemplateParseError {
                path: label.to_string(),
                message: e.to_string(),
            })?;

        let mut registry = Self::new();
        for template in file.enemies {
            registry.register_enemy(template);
        }
        for template in file.bosses {
            registry.register_boss(template);
        }
        Ok(registry)
    }

    /// Register an enemy template, assigning its numeric ID.
    ///
    /// Re-registering an existing ID replaces the template but keeps
    /// the numeric ID stable.
    pub fn register_enemy(&mut self, mut template: EnemyTemplate) -> EnemyKindId {
        template.sanitize();

        if let Some(&existing) = self.enemy_ids.get(&template.id) {
            self.enemies[existing.as_u16() as usize] = template;
            return existing;
        }

        let id = EnemyKindId::new(self.enemies.len() as u16);
        self.enemy_ids.insert(template.id.clone(), id);
        self.enemies.push(template);
        id
    }

    /// Register a boss template.
    pub fn register_boss(&mut self, template: BossTemplate) {
        self.bosses.insert(template.id.clone(), template);
    }

    /// Get an enemy template by numeric ID.
    #[must_use]
    pub fn enemy(&self, id: EnemyKindId) -> Option<&EnemyTemplate> {
        if !id.is_valid() {
            return None;
        }
        self.enemies.get(id.as_u16() as usize)
    }

    /// Find an enemy's numeric ID by string ID.
    #[must_use]
    pub fn find_enemy(&self, string_id: &str) -> Option<EnemyKindId> {
        self.enemy_ids.get(string_id).copied()
    }

    /// Get a boss template by string ID.
    #[must_use]
    pub fn boss(&self, string_id: &str) -> Option<&BossTemplate> {
        self.bosses.get(string_id)
    }

    /// Number of registered enemy kinds.
    #[must_use]
    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turret_template() -> EnemyTemplate {
        EnemyTemplate {
            id: "warden_turret".to_string(),
            behavior: "turret".to_string(),
            health: 60,
            armor: 20,
            damage_reduction: Fixed::from_num(0.2),
            attack_interval: 30,
            projectile: Some(ProjectileStats {
                damage: 12,
                ..ProjectileStats::default()
            }),
            xp_reward: 15,
            ..EnemyTemplate::default()
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TemplateRegistry::new();
        let id = registry.register_enemy(turret_template());

        assert_eq!(id.as_u16(), 0);
        assert_eq!(registry.find_enemy("warden_turret"), Some(id));
        assert_eq!(registry.enemy(id).unwrap().health, 60);
        assert_eq!(registry.enemy(EnemyKindId::NONE), None);
    }

    #[test]
    fn test_reregister_keeps_id() {
        let mut registry = TemplateRegistry::new();
        let first = registry.register_enemy(turret_template());

        let mut updated = turret_template();
        updated.health = 90;
        let second = registry.register_enemy(updated);

        assert_eq!(first, second);
        assert_eq!(registry.enemy_count(), 1);
        assert_eq!(registry.enemy(first).unwrap().health, 90);
    }

    #[test]
    fn test_unknown_behavior_falls_back_to_rush() {
        let mut template = turret_template();
        template.behavior = "does_not_exist".to_string();
        assert_eq!(template.behavior_kind(), BehaviorKind::Rush);
    }

    #[test]
    fn test_sanitize_clamps_negative_values() {
        let mut template = turret_template();
        template.heal_radius = Fixed::from_num(-50);
        template.damage_reduction = Fixed::from_num(1.5);
        template.sanitize();

        assert_eq!(template.heal_radius, Fixed::ZERO);
        assert_eq!(template.damage_reduction, Fixed::ONE);
    }

    #[test]
    fn test_floor_scaling() {
        let template = turret_template();

        let base = template.scaled_for_floor(1);
        assert_eq!(base.health, 60);

        // Floor 3 = 1.2x
        let deep = template.scaled_for_floor(3);
        assert_eq!(deep.health, 72);
        assert_eq!(deep.xp_reward, 18);
        assert_eq!(deep.projectile.unwrap().damage, 14);
        // Timings are never scaled
        assert_eq!(deep.attack_interval, 30);
    }

    #[test]
    fn test_ron_roundtrip_with_defaults() {
        let source = r#"(
            enemies: [
                (
                    id: "slime",
                    behavior: "rush",
                    health: 30,
                ),
            ],
            bosses: [
                (
                    id: "gatekeeper",
                    kind: "gatekeeper",
                    health: 500,
                ),
            ],
        )"#;

        let registry = TemplateRegistry::from_ron("test", source).unwrap();
        let id = registry.find_enemy("slime").unwrap();
        let slime = registry.enemy(id).unwrap();

        // Missing fields default to zero/neutral
        assert_eq!(slime.health, 30);
        assert_eq!(slime.armor, 0);
        assert_eq!(slime.buff_speed_multiplier, Fixed::ONE);
        assert!(slime.projectile.is_none());

        assert_eq!(registry.boss("gatekeeper").unwrap().health, 500);
    }

    #[test]
    fn test_bad_ron_is_a_parse_error() {
        let err = TemplateRegistry::from_ron("broken", "(enemies: [oops").unwrap_err();
        assert!(matches!(err, ArenaError::TemplateParseError { .. }));
    }
}
