//! Multiplayer authority gating and replication events.
//!
//! Exactly one process may apply damage, spawns, regen, and death side
//! effects; everyone else mirrors visuals from the broadcast event
//! stream. The role is injected into the simulation rather than read
//! from a global, so the same core runs single-player, host, and
//! client without hidden state.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::data::EnemyKindId;
use crate::math::Vec2Fixed;

/// Network role of the local process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetRole {
    /// No networking; the local process owns everything.
    #[default]
    SinglePlayer,
    /// Multiplayer authority: applies all state mutations and
    /// broadcasts events.
    Host,
    /// Multiplayer mirror: renders broadcast events, never mutates
    /// authoritative state. Motion is still simulated locally as a
    /// render-side prediction; only combat outcomes are mirrored.
    Client,
}

impl NetRole {
    /// Whether this process may apply damage, spawns, and regen.
    #[must_use]
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::SinglePlayer | Self::Host)
    }

    /// Whether a networked session is active.
    #[must_use]
    pub const fn is_multiplayer(self) -> bool {
        !matches!(self, Self::SinglePlayer)
    }
}

/// An actor died; carries everything the mirror needs for effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    /// Entity that died.
    pub entity_id: EntityId,
    /// Kind of enemy, or `NONE` for players and projectiles.
    pub kind: EnemyKindId,
    /// World position at death.
    pub position: Vec2Fixed,
    /// XP dropped for the killer's side.
    pub xp_dropped: u32,
}

/// Damage was applied to an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Entity that took the hit.
    pub target: EntityId,
    /// Total damage routed through the defense layers.
    pub damage: u32,
    /// Whether the hit was a critical.
    pub is_crit: bool,
    /// World position of the hit, for floating numbers.
    pub position: Vec2Fixed,
}

/// Shield or armor changed; the visual layer recomputes overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseChangedEvent {
    /// Entity whose defenses changed.
    pub entity_id: EntityId,
    /// Shield points remaining.
    pub shield: u32,
    /// Armor points remaining.
    pub armor: u32,
}

/// An enemy split into children on death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySplitEvent {
    /// Parent that split.
    pub entity_id: EntityId,
    /// Number of children spawned.
    pub count: u32,
}

/// A twin guardian enraged after its partner's death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossEnrageEvent {
    /// The surviving, now-enraged boss.
    pub entity_id: EntityId,
}

/// An authoritative spawn the mirror must create locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnEvent {
    /// Entity assigned by the authority.
    pub entity_id: EntityId,
    /// Kind of enemy spawned.
    pub kind: EnemyKindId,
    /// Spawn position.
    pub position: Vec2Fixed,
    /// Dungeon floor used for stat scaling.
    pub floor: u32,
}

/// Everything broadcast-worthy that happened during one tick.
///
/// The replication layer drains this after each tick; on clients the
/// same struct carries incoming remote events into `apply_remote_*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Actor deaths.
    pub deaths: Vec<DeathEvent>,
    /// Damage applications.
    pub damage: Vec<DamageEvent>,
    /// Shield/armor visual updates.
    pub defense_changes: Vec<DefenseChangedEvent>,
    /// On-death splits.
    pub splits: Vec<EnemySplitEvent>,
    /// Twin enrages.
    pub enrages: Vec<BossEnrageEvent>,
    /// Authoritative spawns.
    pub spawns: Vec<SpawnEvent>,
}

impl TickEvents {
    /// Create an empty event set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether any event was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deaths.is_empty()
            && self.damage.is_empty()
            && self.defense_changes.is_empty()
            && self.splits.is_empty()
            && self.enrages.is_empty()
            && self.spawns.is_empty()
    }

    /// Drop all recorded events.
    pub fn clear(&mut self) {
        self.deaths.clear();
        self.damage.clear();
        self.defense_changes.clear();
        self.splits.clear();
        self.enrages.clear();
        self.spawns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_authority() {
        assert!(NetRole::SinglePlayer.is_authoritative());
        assert!(NetRole::Host.is_authoritative());
        assert!(!NetRole::Client.is_authoritative());

        assert!(!NetRole::SinglePlayer.is_multiplayer());
        assert!(NetRole::Host.is_multiplayer());
        assert!(NetRole::Client.is_multiplayer());
    }

    #[test]
    fn test_tick_events_clear() {
        let mut events = TickEvents::new();
        assert!(events.is_empty());

        events.damage.push(DamageEvent {
            target: 1,
            damage: 10,
            is_crit: false,
            position: Vec2Fixed::ZERO,
        });
        assert!(!events.is_empty());

        events.clear();
        assert!(events.is_empty());
    }
}
