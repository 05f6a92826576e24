//! Fixture registries and scenario builders.
//!
//! Integration tests and benchmarks share these so a "standard arena"
//! means the same thing everywhere: same roster, same obstacle layout,
//! same bounds. Scenarios take a seed so determinism tests can rebuild
//! identical worlds.

use arena_core::collision::{Obstacle, Rect};
use arena_core::data::{BossTemplate, EnemyTemplate, ProjectileStats, TemplateRegistry};
use arena_core::math::{Fixed, Vec2Fixed};
use arena_core::simulation::{SimConfig, Simulation};

fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Standard arena bounds used by all fixture scenarios.
#[must_use]
pub fn arena_bounds() -> Rect {
    Rect::new(Vec2Fixed::ZERO, Vec2Fixed::from_int(800, 600))
}

/// A wall through the middle and two cover strips.
#[must_use]
pub fn arena_obstacles() -> Vec<Obstacle> {
    vec![
        Obstacle::wall(Rect::new(
            Vec2Fixed::from_int(380, 150),
            Vec2Fixed::from_int(420, 450),
        )),
        Obstacle::cover(Rect::new(
            Vec2Fixed::from_int(150, 280),
            Vec2Fixed::from_int(250, 320),
        )),
        Obstacle::cover(Rect::new(
            Vec2Fixed::from_int(550, 280),
            Vec2Fixed::from_int(650, 320),
        )),
    ]
}

/// A registry covering every behavior and boss kind.
#[must_use]
pub fn full_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();

    registry.register_enemy(EnemyTemplate {
        id: "rusher".to_string(),
        behavior: "rush".to_string(),
        health: 30,
        speed: fixed(4),
        contact_damage: 10,
        xp_reward: 5,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "turret".to_string(),
        behavior: "turret".to_string(),
        health: 60,
        armor: 20,
        damage_reduction: Fixed::from_num(0.2),
        attack_interval: 30,
        projectile: Some(ProjectileStats {
            speed: fixed(8),
            damage: 12,
            max_range: fixed(300),
            ..ProjectileStats::default()
        }),
        xp_reward: 15,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "gunner".to_string(),
        behavior: "shoot".to_string(),
        health: 40,
        speed: fixed(3),
        attack_interval: 24,
        projectile: Some(ProjectileStats {
            speed: fixed(7),
            damage: 8,
            max_range: fixed(280),
            ..ProjectileStats::default()
        }),
        xp_reward: 12,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "charger".to_string(),
        behavior: "charge".to_string(),
        health: 80,
        speed: fixed(3),
        contact_damage: 20,
        charge_cooldown: 60,
        xp_reward: 20,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "slime_small".to_string(),
        behavior: "rush".to_string(),
        health: 15,
        speed: fixed(5),
        contact_damage: 5,
        xp_reward: 3,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "slime".to_string(),
        behavior: "rush".to_string(),
        health: 45,
        speed: fixed(3),
        contact_damage: 8,
        splits: 2,
        child_kind: Some("slime_small".to_string()),
        xp_reward: 10,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "bomber".to_string(),
        behavior: "rush".to_string(),
        health: 25,
        speed: fixed(5),
        explode_radius: fixed(60),
        explode_damage: 30,
        xp_reward: 12,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "warden".to_string(),
        behavior: "shield".to_string(),
        health: 100,
        armor: 40,
        damage_reduction: Fixed::from_num(0.3),
        shield: 50,
        shield_regen_rate: 5,
        speed: fixed(2),
        contact_damage: 12,
        xp_reward: 30,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "healer".to_string(),
        behavior: "healer".to_string(),
        health: 35,
        speed: fixed(3),
        heal_interval: 40,
        heal_radius: fixed(120),
        heal_amount: 10,
        xp_reward: 18,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "buffer".to_string(),
        behavior: "buffer".to_string(),
        health: 35,
        speed: fixed(3),
        buff_radius: fixed(140),
        buff_speed_multiplier: Fixed::from_num(1.5),
        buff_damage_multiplier: Fixed::from_num(1.25),
        xp_reward: 18,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "spawner".to_string(),
        behavior: "spawner".to_string(),
        health: 70,
        speed: fixed(1),
        spawn_interval: 80,
        child_kind: Some("slime_small".to_string()),
        xp_reward: 25,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "blinker".to_string(),
        behavior: "teleport".to_string(),
        health: 30,
        speed: fixed(3),
        contact_damage: 8,
        teleport_cooldown: 60,
        teleport_range: fixed(150),
        xp_reward: 15,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "drifter".to_string(),
        behavior: "erratic".to_string(),
        health: 20,
        speed: fixed(4),
        contact_damage: 6,
        xp_reward: 8,
        ..EnemyTemplate::default()
    });

    registry.register_enemy(EnemyTemplate {
        id: "freezer".to_string(),
        behavior: "freeze".to_string(),
        health: 40,
        speed: fixed(2),
        slow_radius: fixed(100),
        slow_factor: Fixed::from_num(0.5),
        xp_reward: 16,
        ..EnemyTemplate::default()
    });

    registry.register_boss(BossTemplate {
        id: "gatekeeper".to_string(),
        kind: "gatekeeper".to_string(),
        health: 800,
        armor: 60,
        damage_reduction: Fixed::from_num(0.25),
        speed: fixed(3),
        collision_half_extent: fixed(20),
        contact_damage: 25,
        xp_reward: 200,
        minion_kind: Some("rusher".to_string()),
        projectile: Some(ProjectileStats {
            speed: fixed(6),
            damage: 15,
            max_range: fixed(350),
            ..ProjectileStats::default()
        }),
        ..BossTemplate::default()
    });

    registry.register_boss(BossTemplate {
        id: "twin_blade".to_string(),
        kind: "twin_melee".to_string(),
        health: 500,
        speed: fixed(4),
        collision_half_extent: fixed(16),
        contact_damage: 20,
        xp_reward: 150,
        ..BossTemplate::default()
    });

    registry.register_boss(BossTemplate {
        id: "twin_bow".to_string(),
        kind: "twin_ranged".to_string(),
        health: 400,
        speed: fixed(3),
        collision_half_extent: fixed(16),
        xp_reward: 150,
        projectile: Some(ProjectileStats {
            speed: fixed(7),
            damage: 12,
            max_range: fixed(400),
            ..ProjectileStats::default()
        }),
        ..BossTemplate::default()
    });

    registry.register_boss(BossTemplate {
        id: "swarm_queen".to_string(),
        kind: "swarm_queen".to_string(),
        health: 600,
        speed: fixed(2),
        collision_half_extent: fixed(24),
        xp_reward: 250,
        minion_kind: Some("slime_small".to_string()),
        ..BossTemplate::default()
    });

    registry
}

/// Config for the standard arena with the given seed.
#[must_use]
pub fn arena_config(seed: u64) -> SimConfig {
    SimConfig {
        seed,
        bounds: arena_bounds(),
        obstacles: arena_obstacles(),
        ..SimConfig::default()
    }
}

/// A player plus a mixed wave of regular enemies.
///
/// # Panics
///
/// Panics if the fixture registry is missing a kind; that is a bug in
/// the fixtures, not the caller.
#[must_use]
pub fn combat_scenario(seed: u64) -> Simulation {
    let mut sim = Simulation::new(full_registry(), arena_config(seed));
    sim.spawn_player(Vec2Fixed::from_int(400, 500), 100, fixed(5), fixed(6));

    for (kind, x, y) in [
        ("rusher", 100, 100),
        ("rusher", 700, 100),
        ("turret", 200, 80),
        ("gunner", 600, 120),
        ("charger", 400, 60),
        ("slime", 120, 400),
        ("healer", 150, 150),
        ("buffer", 650, 150),
        ("drifter", 400, 150),
    ] {
        sim.spawn_enemy(kind, Vec2Fixed::from_int(x, y))
            .expect("fixture kind must be registered");
    }
    sim
}

/// A player facing the twin guardians.
///
/// # Panics
///
/// Panics if the fixture boss templates are missing.
#[must_use]
pub fn twin_boss_scenario(seed: u64) -> Simulation {
    let mut sim = Simulation::new(full_registry(), arena_config(seed));
    sim.spawn_player(Vec2Fixed::from_int(400, 500), 150, fixed(5), fixed(6));
    sim.spawn_twin_pair(
        "twin_blade",
        "twin_bow",
        Vec2Fixed::from_int(250, 100),
        Vec2Fixed::from_int(550, 100),
    )
    .expect("fixture boss kinds must be registered");
    sim
}

/// A player swarmed by `count` rushers, for benchmarks.
///
/// # Panics
///
/// Panics if the fixture registry is missing the rusher kind.
#[must_use]
pub fn horde_scenario(seed: u64, count: u32) -> Simulation {
    let mut sim = Simulation::new(full_registry(), arena_config(seed));
    sim.spawn_player(Vec2Fixed::from_int(400, 300), 1000, fixed(5), fixed(6));

    // Ring the player around the arena edge.
    for i in 0..count {
        let x = 40 + (i * 37 % 720) as i32;
        let y = if i % 2 == 0 { 40 } else { 560 };
        sim.spawn_enemy("rusher", Vec2Fixed::from_int(x, y))
            .expect("fixture kind must be registered");
    }
    sim
}
