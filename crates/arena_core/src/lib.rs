//! # Arena Core
//!
//! Deterministic combat simulation core for a top-down arena action
//! game: layered damage resolution, data-driven enemy behaviors, boss
//! fights, pathfinding, and projectile mechanics.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Host-authoritative multiplayer with mirroring clients
//! - Headless server builds
//! - Desync detection via state hashing
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`components`] - Component definitions shared by all entities
//! - [`defense`] - Shield, armor, health damage routing
//! - [`behavior`] - Enemy behavior state machines
//! - [`boss`] - Boss fight machines
//! - [`projectile`] - Projectile advancement and contact resolution
//! - [`pathfinding`] - Grid A* navigation
//! - [`steering`] - Direct-steering obstacle avoidance
//! - [`collision`] - AABB collision, movement resolution, knockback
//! - [`data`] - RON stat templates and the kind registry
//! - [`authority`] - Network roles and replication events
//! - [`schedule`] - Deferred task queue
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod authority;
pub mod behavior;
pub mod boss;
pub mod collision;
pub mod components;
pub mod data;
pub mod defense;
pub mod error;
pub mod math;
pub mod pathfinding;
pub mod projectile;
pub mod schedule;
pub mod simulation;
pub mod steering;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::authority::{NetRole, TickEvents};
    pub use crate::behavior::{BehaviorKind, BehaviorState};
    pub use crate::boss::{BossKind, BossState};
    pub use crate::collision::{Obstacle, ObstacleKind, Rect};
    pub use crate::components::*;
    pub use crate::data::{
        BossTemplate, EnemyKindId, EnemyTemplate, ProjectileStats, TemplateRegistry,
    };
    pub use crate::defense::{resolve_damage, Armor, DamageBreakdown, Shield};
    pub use crate::error::{ArenaError, Result};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::projectile::{ProjectileMode, ProjectileState};
    pub use crate::simulation::{SimConfig, Simulation, TICK_RATE};
}
