//! Core simulation state and tick loop.
//!
//! The simulation advances in fixed ticks and is fully deterministic:
//! same seed, same inputs, same state on every machine. Entities are
//! processed in sorted-ID order and all math is fixed-point, so a host
//! and its clients can compare state hashes to detect desyncs.
//!
//! # System Execution Order
//!
//! Each tick, systems run in this order:
//! 1. **Scheduled tasks** - deferred continuations whose owners are
//!    still alive
//! 2. **Behavior** - enemies and bosses plan movement and actions
//! 3. **Movement** - intended moves resolve against obstacles/bounds
//! 4. **Contact** - body-contact damage and knockback
//! 5. **Projectiles** - advance, detect hits, route damage
//! 6. **Regen** - shield regeneration (authority only)
//! 7. **Deaths** - side effects (splits, explosions, enrage) and
//!    removal, cascading within the tick

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::authority::{
    BossEnrageEvent, DamageEvent, DeathEvent, DefenseChangedEvent, EnemySplitEvent, NetRole,
    SpawnEvent, TickEvents,
};
use crate::behavior::{run_behavior, BehaviorAction, BehaviorContext, BehaviorState};
use crate::boss::{
    run_boss, BossAction, BossContext, BossKind, BossState, RADIAL_BURST_COUNT,
    SWARM_QUEEN_DEATH_BURST,
};
use crate::collision::{apply_knockback, resolve_movement, Obstacle, Rect};
use crate::components::{
    ActorRef, CollisionSize, EntityId, Faction, Health, Modifiers, Movement, Position, Velocity,
    XpReward,
};
use crate::data::{
    BossTemplate, EnemyKindId, EnemyTemplate, ProjectileStats, TemplateRegistry,
};
use crate::defense::{resolve_damage, Armor, Shield};
use crate::error::{ArenaError, Result};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::NavGrid;
use crate::projectile::{advance_projectile, ProjectileMode, ProjectileState};
use crate::schedule::{Scheduler, TaskKind};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Navigation grid cell size in world units.
pub const NAV_CELL_SIZE: i32 = 20;

/// Minimum ticks between body-contact damage applications (0.5 s).
pub const CONTACT_DAMAGE_INTERVAL_TICKS: u32 = TICK_RATE / 2;

/// Windup before a spawner's child actually appears (0.2 s).
pub const SPAWN_WINDUP_TICKS: u32 = TICK_RATE / 5;

/// Damage-flash tint duration (0.2 s).
pub const TINT_TICKS: u32 = TICK_RATE / 5;

/// Knockback displacement per hit, in world units.
fn knockback_distance() -> Fixed {
    Fixed::from_num(16)
}

/// An entity with optional components.
///
/// Entities are composed of optional components; only the `Some` ones
/// are active. This keeps composition flexible without an ECS
/// framework, and one storage covers players, enemies, bosses, and
/// projectiles alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Which side this entity fights for.
    pub faction: Faction,
    /// World position.
    pub position: Position,
    /// Intended displacement this tick.
    pub velocity: Velocity,
    /// Health for damageable entities.
    pub health: Option<Health>,
    /// Armor layer.
    pub armor: Option<Armor>,
    /// Shield layer.
    pub shield: Option<Shield>,
    /// Movement capability.
    pub movement: Option<Movement>,
    /// Collision footprint.
    pub collision: Option<CollisionSize>,
    /// Buff/slow modifiers.
    pub modifiers: Modifiers,
    /// XP dropped on death.
    pub xp: Option<XpReward>,
    /// Enemy kind, `NONE` for players and projectiles.
    pub kind: EnemyKindId,
    /// Floor-scaled stat template for enemies.
    pub template: Option<EnemyTemplate>,
    /// Floor-scaled stat template for bosses.
    pub boss_template: Option<BossTemplate>,
    /// Enemy behavior machine.
    pub behavior: Option<BehaviorState>,
    /// Boss machine.
    pub boss: Option<BossState>,
    /// Projectile state for projectile entities.
    pub projectile: Option<ProjectileState>,
    /// Displacement achieved last tick; feeds charge aborts.
    pub last_move_distance: Fixed,
    /// Ticks until this entity may deal contact damage again.
    pub contact_timer: u32,
}

impl Entity {
    /// Create a new entity with the given ID and no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            faction: Faction::Enemy,
            position: Position::ORIGIN,
            velocity: Velocity::ZERO,
            health: None,
            armor: None,
            shield: None,
            movement: None,
            collision: None,
            modifiers: Modifiers::neutral(),
            xp: None,
            kind: EnemyKindId::NONE,
            template: None,
            boss_template: None,
            behavior: None,
            boss: None,
            projectile: None,
            last_move_distance: Fixed::ZERO,
            contact_timer: 0,
        }
    }

    /// Whether this entity is a living actor.
    #[must_use]
    pub fn is_living(&self) -> bool {
        self.health.is_some_and(|h| !h.is_dead())
    }

    /// Collision half-extent, zero if the entity has no footprint.
    #[must_use]
    pub fn half_extent(&self) -> Fixed {
        self.collision.map_or(Fixed::ZERO, |c| c.half_extent)
    }
}

/// Storage for all entities in the simulation.
///
/// `HashMap` for O(1) lookup, deterministic iteration via sorted keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStorage {
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its assigned ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Insert an entity under an ID chosen by the authority.
    ///
    /// Used when mirroring remote spawns so IDs line up across the
    /// network.
    pub fn insert_with_id(&mut self, id: EntityId, mut entity: Entity) {
        entity.id = id;
        self.next_id = self.next_id.max(id + 1);
        self.entities.insert(id, entity);
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }
}

/// Static configuration for a simulation instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// RNG seed shared by all peers.
    pub seed: u64,
    /// Arena bounds.
    pub bounds: Rect,
    /// Static obstacle layout.
    pub obstacles: Vec<Obstacle>,
    /// Network role of this process.
    pub role: NetRole,
    /// Dungeon floor for stat scaling.
    pub floor: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            bounds: Rect::new(Vec2Fixed::ZERO, Vec2Fixed::from_int(800, 600)),
            obstacles: Vec::new(),
            role: NetRole::SinglePlayer,
            floor: 1,
        }
    }
}

/// The combat simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Current simulation tick.
    tick: u64,
    /// Network role; gates every state mutation.
    role: NetRole,
    /// Dungeon floor for stat scaling.
    floor: u32,
    /// Arena bounds.
    bounds: Rect,
    /// Static obstacles.
    obstacles: Vec<Obstacle>,
    /// All entities.
    entities: EntityStorage,
    /// Loaded stat templates.
    registry: TemplateRegistry,
    /// Deferred task queue.
    scheduler: Scheduler,
    /// Seeded RNG; part of replicated state.
    rng: ChaCha8Rng,
    /// Cached navigation grid, rebuilt when obstacles change.
    #[serde(skip)]
    nav_cache: Option<NavGrid>,
}

impl Simulation {
    /// Create a simulation from config and loaded templates.
    #[must_use]
    pub fn new(registry: TemplateRegistry, config: SimConfig) -> Self {
        Self {
            tick: 0,
            role: config.role,
            floor: config.floor,
            bounds: config.bounds,
            obstacles: config.obstacles,
            entities: EntityStorage::new(),
            registry,
            scheduler: Scheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            nav_cache: None,
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Get the network role.
    #[must_use]
    pub const fn role(&self) -> NetRole {
        self.role
    }

    /// Get a reference to the entity storage.
    #[must_use]
    pub fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Get the arena bounds.
    #[must_use]
    pub const fn bounds(&self) -> &Rect {
        &self.bounds
    }

    /// Take the cached nav grid, building it if needed.
    ///
    /// A config with degenerate bounds cannot produce a grid; enemies
    /// then steer directly without pathfinding.
    fn take_nav(&mut self) -> NavGrid {
        self.nav_cache.take().unwrap_or_else(|| {
            NavGrid::from_obstacles(&self.bounds, Fixed::from_num(NAV_CELL_SIZE), &self.obstacles)
                .unwrap_or_else(|err| {
                    tracing::warn!("nav grid unavailable, steering directly: {err}");
                    NavGrid::empty()
                })
        })
    }

    /// Spawn a player actor.
    pub fn spawn_player(
        &mut self,
        position: Vec2Fixed,
        max_health: u32,
        speed: Fixed,
        half_extent: Fixed,
    ) -> EntityId {
        let mut entity = Entity::new(0);
        entity.faction = Faction::Player;
        entity.position = Position::new(position);
        entity.health = Some(Health::new(max_health));
        entity.movement = Some(Movement::new(speed));
        entity.collision = Some(CollisionSize::new(half_extent));
        self.entities.insert(entity)
    }

    /// Set a player's intended displacement for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::EntityNotFound`] for an unknown ID.
    pub fn set_player_velocity(&mut self, id: EntityId, velocity: Vec2Fixed) -> Result<()> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(ArenaError::EntityNotFound(id))?;
        entity.velocity = Velocity::new(velocity);
        Ok(())
    }

    /// Spawn an enemy of the given kind, scaled for the current floor.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnknownKind`] if the kind is not
    /// registered.
    pub fn spawn_enemy(&mut self, kind: &str, position: Vec2Fixed) -> Result<EntityId> {
        let kind_id = self
            .registry
            .find_enemy(kind)
            .ok_or_else(|| ArenaError::UnknownKind(kind.to_string()))?;
        Ok(self.spawn_enemy_by_id(kind_id, position))
    }

    fn spawn_enemy_by_id(&mut self, kind_id: EnemyKindId, position: Vec2Fixed) -> EntityId {
        let template = self
            .registry
            .enemy(kind_id)
            .cloned()
            .unwrap_or_default()
            .scaled_for_floor(self.floor);

        let mut entity = Entity::new(0);
        entity.faction = Faction::Enemy;
        entity.position = Position::new(position);
        entity.health = Some(Health::new(template.health));
        if template.armor > 0 {
            entity.armor = Some(Armor::new(template.armor, template.damage_reduction));
        }
        if template.shield > 0 {
            entity.shield = Some(Shield::new(template.shield, template.shield_regen_rate));
        }
        entity.movement = Some(Movement::new(template.speed));
        entity.collision = Some(CollisionSize::new(template.collision_half_extent));
        entity.xp = Some(XpReward {
            amount: template.xp_reward,
        });
        entity.kind = kind_id;
        entity.behavior = Some(BehaviorState::from_template(&template, position));
        entity.template = Some(template);

        self.entities.insert(entity)
    }

    /// Spawn a boss of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnknownKind`] for an unregistered or
    /// malformed boss template.
    pub fn spawn_boss(&mut self, kind: &str, position: Vec2Fixed) -> Result<EntityId> {
        let template = self
            .registry
            .boss(kind)
            .ok_or_else(|| ArenaError::UnknownKind(kind.to_string()))?
            .clone()
            .scaled_for_floor(self.floor);
        let boss_kind = template.boss_kind()?;

        let mut entity = Entity::new(0);
        entity.faction = Faction::Enemy;
        entity.position = Position::new(position);
        entity.health = Some(Health::new(template.health));
        if template.armor > 0 {
            entity.armor = Some(Armor::new(template.armor, template.damage_reduction));
        }
        if template.shield > 0 {
            entity.shield = Some(Shield::new(template.shield, template.shield_regen_rate));
        }
        entity.movement = Some(Movement::new(template.speed));
        entity.collision = Some(CollisionSize::new(template.collision_half_extent));
        entity.xp = Some(XpReward {
            amount: template.xp_reward,
        });
        entity.boss = Some(BossState::new(boss_kind, position));
        entity.boss_template = Some(template);

        Ok(self.entities.insert(entity))
    }

    /// Spawn a linked twin-guardian pair.
    ///
    /// # Errors
    ///
    /// Propagates template lookup failures; on error neither twin is
    /// left behind.
    pub fn spawn_twin_pair(
        &mut self,
        melee_kind: &str,
        ranged_kind: &str,
        melee_position: Vec2Fixed,
        ranged_position: Vec2Fixed,
    ) -> Result<(EntityId, EntityId)> {
        let melee = self.spawn_boss(melee_kind, melee_position)?;
        let ranged = match self.spawn_boss(ranged_kind, ranged_position) {
            Ok(id) => id,
            Err(e) => {
                self.entities.remove(melee);
                return Err(e);
            }
        };

        if let Some(boss) = self.entities.get_mut(melee).and_then(|e| e.boss.as_mut()) {
            boss.partner = Some(ranged);
        }
        if let Some(boss) = self.entities.get_mut(ranged).and_then(|e| e.boss.as_mut()) {
            boss.partner = Some(melee);
        }
        Ok((melee, ranged))
    }

    /// Spawn a projectile.
    pub fn spawn_projectile(
        &mut self,
        faction: Faction,
        origin: Vec2Fixed,
        direction: Vec2Fixed,
        stats: &ProjectileStats,
        damage: u32,
        is_crit: bool,
        mode: ProjectileMode,
    ) -> EntityId {
        let state = ProjectileState::new(origin, direction, stats.speed, damage, stats.max_range)
            .with_piercing(stats.piercing, stats.obstacle_piercing)
            .with_crit(is_crit)
            .with_mode(mode);

        let mut entity = Entity::new(0);
        entity.faction = faction;
        entity.position = Position::new(origin);
        entity.projectile = Some(state);
        self.entities.insert(entity)
    }

    /// Advance the simulation by one tick.
    ///
    /// On a client this is a prediction step: enemies and projectiles
    /// move locally so there is something to render between broadcasts,
    /// but damage, spawns, regen, and death side effects are skipped.
    /// Authoritative outcomes arrive through the `apply_remote_*`
    /// calls; predicted positions are never corrected and may drift
    /// from the host until the next authoritative event.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::new();
        let ids = self.entities.sorted_ids();

        self.run_scheduled_tasks(&mut events);
        self.run_behavior_system(&ids, &mut events);
        self.run_movement_system(&ids);
        self.run_contact_system(&ids, &mut events);
        self.run_projectile_system(&ids, &mut events);
        self.run_regen_system(&ids, &mut events);
        self.run_death_system(&mut events);

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "simulation state hash");
        }

        events
    }

    /// Execute deferred tasks whose owners are still alive.
    fn run_scheduled_tasks(&mut self, events: &mut TickEvents) {
        for task in self.scheduler.drain_due(self.tick) {
            // Cancellation is a liveness check, never a token.
            let owner_alive = self.entities.get(task.owner).is_some_and(Entity::is_living);
            if !owner_alive {
                continue;
            }

            match task.kind {
                TaskKind::SpawnChild { kind, position } => {
                    if self.role.is_authoritative() {
                        let id = self.spawn_enemy_by_id(kind, position);
                        events.spawns.push(SpawnEvent {
                            entity_id: id,
                            kind,
                            position,
                            floor: self.floor,
                        });
                    }
                }
                TaskKind::TelegraphEnd | TaskKind::ClearTint => {
                    // Purely visual; surface as a defense recompute so
                    // the render layer refreshes overlays.
                    if let Some(entity) = self.entities.get(task.owner) {
                        events.defense_changes.push(DefenseChangedEvent {
                            entity_id: task.owner,
                            shield: entity.shield.map_or(0, |s| s.current),
                            armor: entity.armor.map_or(0, |a| a.current),
                        });
                    }
                }
            }
        }
    }

    /// Living-actor snapshot of one faction, sorted by ID.
    fn faction_snapshot(&self, faction: Faction, exclude: Option<EntityId>) -> Vec<ActorRef> {
        let mut refs: Vec<ActorRef> = self
            .entities
            .iter()
            .filter(|(_, e)| e.faction == faction && e.is_living() && Some(e.id) != exclude)
            .map(|(_, e)| ActorRef {
                id: e.id,
                position: e.position.value,
                half_extent: e.half_extent(),
            })
            .collect();
        refs.sort_unstable_by_key(|r| r.id);
        refs
    }

    /// Nearest hostile to `position`, from a sorted snapshot.
    fn nearest(position: Vec2Fixed, snapshot: &[ActorRef]) -> Option<ActorRef> {
        snapshot
            .iter()
            .min_by_key(|a| position.distance_squared(a.position))
            .copied()
    }

    /// Run enemy and boss planning, then apply their actions.
    fn run_behavior_system(&mut self, ids: &[EntityId], events: &mut TickEvents) {
        let nav = self.take_nav();
        let players = self.faction_snapshot(Faction::Player, None);

        for &id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if !entity.is_living() {
                continue;
            }

            if entity.behavior.is_some() {
                self.plan_enemy(id, &nav, &players);
            } else if entity.boss.is_some() {
                self.plan_boss(id, &players, events);
            }
        }

        self.nav_cache = Some(nav);
    }

    fn plan_enemy(&mut self, id: EntityId, nav: &NavGrid, players: &[ActorRef]) {
        let allies = self.faction_snapshot(Faction::Enemy, Some(id));

        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        let (Some(mut state), Some(template)) = (entity.behavior.take(), entity.template.take())
        else {
            return;
        };

        let position = entity.position.value;
        let speed = entity
            .movement
            .map_or(Fixed::ZERO, |m| m.speed * entity.modifiers.speed_multiplier());
        let half_extent = entity.half_extent();
        let last_move_distance = entity.last_move_distance;
        let damage_multiplier = entity.modifiers.damage_multiplier();

        let output = {
            let mut ctx = BehaviorContext {
                position,
                speed,
                half_extent,
                last_move_distance,
                template: &template,
                target: Self::nearest(position, players),
                allies: &allies,
                obstacles: &self.obstacles,
                bounds: &self.bounds,
                nav,
                rng: &mut self.rng,
            };
            run_behavior(&mut state, &mut ctx)
        };

        let move_speed = output.speed_override.unwrap_or(speed);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.velocity = Velocity::new(output.move_direction.scale(move_speed));
            entity.behavior = Some(state);
            entity.template = Some(template.clone());
        }

        for action in output.actions {
            self.apply_behavior_action(id, &template, damage_multiplier, action);
        }
    }

    fn apply_behavior_action(
        &mut self,
        id: EntityId,
        template: &EnemyTemplate,
        damage_multiplier: Fixed,
        action: BehaviorAction,
    ) {
        if !self.role.is_authoritative() {
            return;
        }

        match action {
            BehaviorAction::Fire { direction } => {
                if let Some(stats) = &template.projectile {
                    let damage =
                        (Fixed::from_num(stats.damage) * damage_multiplier).to_num::<u32>();
                    let origin = match self.entities.get(id) {
                        Some(e) => e.position.value,
                        None => return,
                    };
                    self.spawn_projectile(
                        Faction::Enemy,
                        origin,
                        direction,
                        stats,
                        damage,
                        false,
                        ProjectileMode::Standard,
                    );
                }
            }
            BehaviorAction::TeleportSelf { to } => {
                if let Some(entity) = self.entities.get_mut(id) {
                    entity.position = Position::new(to);
                }
            }
            BehaviorAction::TeleportTarget { target, to } => {
                if let Some(entity) = self.entities.get_mut(target) {
                    if entity.is_living() {
                        entity.position = Position::new(to);
                    }
                }
            }
            BehaviorAction::SpawnChild { position } => {
                if let Some(kind) = template
                    .child_kind
                    .as_deref()
                    .and_then(|k| self.registry.find_enemy(k))
                {
                    self.scheduler.schedule(
                        self.tick + u64::from(SPAWN_WINDUP_TICKS),
                        id,
                        TaskKind::SpawnChild { kind, position },
                    );
                }
            }
            BehaviorAction::Heal { targets } => {
                for target in targets {
                    if let Some(entity) = self.entities.get_mut(target) {
                        if let Some(health) = &mut entity.health {
                            if !health.is_dead() {
                                health.heal(template.heal_amount);
                            }
                        }
                    }
                }
            }
            BehaviorAction::ApplyBuff { targets } => {
                for target in targets {
                    if let Some(entity) = self.entities.get_mut(target) {
                        entity.modifiers.apply_buff(
                            id,
                            template.buff_speed_multiplier,
                            template.buff_damage_multiplier,
                        );
                    }
                }
            }
            BehaviorAction::RemoveBuff { targets } => {
                for target in targets {
                    if let Some(entity) = self.entities.get_mut(target) {
                        entity.modifiers.clear_buff_from(id);
                    }
                }
            }
            BehaviorAction::ApplySlow { target } => {
                if let Some(entity) = self.entities.get_mut(target) {
                    entity.modifiers.apply_slow(id, template.slow_factor);
                }
            }
            BehaviorAction::RemoveSlow { target } => {
                if let Some(entity) = self.entities.get_mut(target) {
                    entity.modifiers.clear_slow_from(id);
                }
            }
        }
    }

    fn plan_boss(&mut self, id: EntityId, players: &[ActorRef], events: &mut TickEvents) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        let (Some(mut state), Some(template)) = (entity.boss.take(), entity.boss_template.take())
        else {
            return;
        };

        let position = entity.position.value;
        let speed = entity.movement.map_or(Fixed::ZERO, |m| {
            m.speed * entity.modifiers.speed_multiplier() * state.speed_multiplier()
        });
        let half_extent = entity.half_extent();
        let last_move_distance = entity.last_move_distance;
        let health_fraction = entity.health.map_or(Fixed::ZERO, |h| h.fraction());
        let damage_multiplier = state.damage_multiplier();

        state
            .minions
            .retain(|m| self.entities.get(*m).is_some_and(Entity::is_living));
        let minion_count = state.minions.len() as u32;

        let output = {
            let mut ctx = BossContext {
                position,
                speed,
                half_extent,
                last_move_distance,
                health_fraction,
                template: &template,
                target: Self::nearest(position, players),
                live_minions: minion_count,
                obstacles: &self.obstacles,
                bounds: &self.bounds,
                rng: &mut self.rng,
            };
            run_boss(&mut state, &mut ctx)
        };

        let move_speed = output.speed_override.unwrap_or(speed);
        let mut spawned_minions = Vec::new();

        for action in &output.actions {
            if self.role.is_authoritative() {
                match action {
                    BossAction::Fire { direction } => {
                        if let Some(stats) = &template.projectile {
                            let damage = (Fixed::from_num(stats.damage) * damage_multiplier)
                                .to_num::<u32>();
                            self.spawn_projectile(
                                Faction::Enemy,
                                position,
                                *direction,
                                stats,
                                damage,
                                false,
                                ProjectileMode::Standard,
                            );
                        }
                    }
                    BossAction::RadialBurst => {
                        if let Some(stats) = &template.projectile {
                            let damage = (Fixed::from_num(stats.damage) * damage_multiplier)
                                .to_num::<u32>();
                            for direction in radial_directions() {
                                self.spawn_projectile(
                                    Faction::Enemy,
                                    position,
                                    direction,
                                    stats,
                                    damage,
                                    false,
                                    ProjectileMode::Standard,
                                );
                            }
                        }
                    }
                    BossAction::SpawnMinion { position } => {
                        if let Some(kind) = template
                            .minion_kind
                            .as_deref()
                            .and_then(|k| self.registry.find_enemy(k))
                        {
                            let minion = self.spawn_enemy_by_id(kind, *position);
                            spawned_minions.push(minion);
                            events.spawns.push(SpawnEvent {
                                entity_id: minion,
                                kind,
                                position: *position,
                                floor: self.floor,
                            });
                        }
                    }
                }
            }
        }

        state.minions.extend(spawned_minions);

        if let Some(entity) = self.entities.get_mut(id) {
            entity.velocity = Velocity::new(output.move_direction.scale(move_speed));
            entity.boss = Some(state);
            entity.boss_template = Some(template);
        }
    }

    /// Resolve intended moves against obstacles and bounds.
    fn run_movement_system(&mut self, ids: &[EntityId]) {
        for &id in ids {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            // Projectiles move in their own system.
            if entity.projectile.is_some() || !entity.is_living() {
                continue;
            }
            if entity.velocity.is_stationary() {
                entity.last_move_distance = Fixed::ZERO;
                continue;
            }

            let old = entity.position.value;
            let new = resolve_movement(
                old,
                entity.velocity.value,
                entity.half_extent(),
                &self.obstacles,
                &self.bounds,
            );
            entity.position = Position::new(new);
            entity.last_move_distance = old.distance(new);
        }
    }

    /// Body-contact damage from enemies and bosses to players.
    fn run_contact_system(&mut self, ids: &[EntityId], events: &mut TickEvents) {
        if !self.role.is_authoritative() {
            return;
        }

        let players = self.faction_snapshot(Faction::Player, None);

        for &id in ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if entity.faction != Faction::Enemy || !entity.is_living() {
                continue;
            }

            let contact_damage = entity.template.as_ref().map_or_else(
                || {
                    entity.boss_template.as_ref().map_or(0, |t| {
                        let mult = entity
                            .boss
                            .as_ref()
                            .map_or(Fixed::ONE, BossState::damage_multiplier);
                        (Fixed::from_num(t.contact_damage) * mult).to_num::<u32>()
                    })
                },
                |t| t.contact_damage,
            );
            if contact_damage == 0 {
                continue;
            }

            if entity.contact_timer > 0 {
                if let Some(entity) = self.entities.get_mut(id) {
                    entity.contact_timer -= 1;
                }
                continue;
            }

            let position = entity.position.value;
            let half_extent = entity.half_extent();
            let footprint = Rect::from_center(position, half_extent);

            let victim = players
                .iter()
                .find(|p| footprint.overlaps(&Rect::from_center(p.position, p.half_extent)));

            if let Some(victim) = victim.copied() {
                self.apply_damage(victim.id, contact_damage, false, Some(position), events);
                if let Some(entity) = self.entities.get_mut(id) {
                    entity.contact_timer = CONTACT_DAMAGE_INTERVAL_TICKS;
                }
            }
        }
    }

    /// Advance projectiles, detect hits, route damage.
    fn run_projectile_system(&mut self, ids: &[EntityId], events: &mut TickEvents) {
        let mut destroyed = Vec::new();

        for &id in ids {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let Some(mut state) = entity.projectile.take() else {
                continue;
            };
            let mut position = entity.position.value;
            let faction = entity.faction;

            let owner_position = match state.mode {
                ProjectileMode::Boomerang { owner, .. } => self
                    .entities
                    .get(owner)
                    .filter(|e| e.is_living())
                    .map(|e| e.position.value),
                _ => None,
            };

            let targets = self.faction_snapshot(faction.opponent(), None);
            let result = advance_projectile(
                &mut state,
                &mut position,
                &targets,
                &self.obstacles,
                &self.bounds,
                owner_position,
            );

            if let Some(entity) = self.entities.get_mut(id) {
                entity.position = Position::new(position);
                entity.projectile = Some(state);
            }

            for hit in result.hits {
                self.apply_damage(hit.target, hit.damage, hit.is_crit, Some(hit.position), events);
            }
            if result.destroyed {
                destroyed.push(id);
            }
        }

        for id in destroyed {
            self.entities.remove(id);
        }
    }

    /// Route damage through the defense layers and emit events.
    ///
    /// All damage funnels through here: the authority gate, knockback,
    /// the damage flash, and replication events live in one place.
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        amount: u32,
        is_crit: bool,
        source: Option<Vec2Fixed>,
        events: &mut TickEvents,
    ) {
        if !self.role.is_authoritative() || amount == 0 {
            return;
        }

        let Some(entity) = self.entities.get_mut(target) else {
            return;
        };
        let Some(health) = &mut entity.health else {
            return;
        };
        if health.is_dead() {
            return;
        }

        let breakdown = resolve_damage(
            health,
            entity.armor.as_mut(),
            entity.shield.as_mut(),
            amount,
        );

        let position = entity.position.value;
        events.damage.push(DamageEvent {
            target,
            damage: amount,
            is_crit,
            position,
        });
        if breakdown.defense_changed() {
            events.defense_changes.push(DefenseChangedEvent {
                entity_id: target,
                shield: entity.shield.map_or(0, |s| s.current),
                armor: entity.armor.map_or(0, |a| a.current),
            });
        }

        // Damage flash; cleared by a liveness-checked deferred task.
        self.scheduler.schedule(
            self.tick + u64::from(TINT_TICKS),
            target,
            TaskKind::ClearTint,
        );

        if let Some(source) = source {
            let half_extent = self.entities.get(target).map_or(Fixed::ZERO, Entity::half_extent);
            if let Some(entity) = self.entities.get_mut(target) {
                let displaced = apply_knockback(
                    entity.position.value,
                    source,
                    knockback_distance(),
                    half_extent,
                    &self.obstacles,
                    &self.bounds,
                );
                entity.position = Position::new(displaced);
            }
        }
    }

    /// Shield regeneration; authority-gated like all state mutation.
    fn run_regen_system(&mut self, ids: &[EntityId], events: &mut TickEvents) {
        if !self.role.is_authoritative() {
            return;
        }

        for &id in ids {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            if !entity.is_living() {
                continue;
            }
            let Some(shield) = &mut entity.shield else {
                continue;
            };

            if shield.tick_regen() > 0 {
                let shield_current = shield.current;
                let armor_current = entity.armor.map_or(0, |a| a.current);
                events.defense_changes.push(DefenseChangedEvent {
                    entity_id: id,
                    shield: shield_current,
                    armor: armor_current,
                });
            }
        }
    }

    /// Process deaths and their side effects, cascading within the
    /// tick (an explosion may kill the next victim).
    fn run_death_system(&mut self, events: &mut TickEvents) {
        if !self.role.is_authoritative() {
            return;
        }

        let mut processed: Vec<EntityId> = Vec::new();

        loop {
            let newly_dead: Vec<EntityId> = self
                .entities
                .sorted_ids()
                .into_iter()
                .filter(|id| {
                    !processed.contains(id)
                        && self
                            .entities
                            .get(*id)
                            .is_some_and(|e| e.health.is_some_and(|h| h.is_dead()))
                })
                .collect();

            if newly_dead.is_empty() {
                break;
            }

            for id in newly_dead {
                processed.push(id);
                self.process_death(id, events);
            }
        }

        for id in processed {
            self.entities.remove(id);
        }
    }

    fn process_death(&mut self, id: EntityId, events: &mut TickEvents) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let position = entity.position.value;
        let kind = entity.kind;
        let xp = entity.xp.map_or(0, |x| x.amount);
        let template = entity.template.clone();
        let boss = entity.boss.clone();
        let boss_template = entity.boss_template.clone();

        events.deaths.push(DeathEvent {
            entity_id: id,
            kind,
            position,
            xp_dropped: xp,
        });

        // Buffs and slows sourced from the dead entity dissolve.
        for other_id in self.entities.sorted_ids() {
            if let Some(other) = self.entities.get_mut(other_id) {
                other.modifiers.clear_buff_from(id);
                other.modifiers.clear_slow_from(id);
            }
        }

        if let Some(template) = template {
            self.apply_enemy_death_effects(id, &template, position, events);
        }

        if let (Some(boss), Some(boss_template)) = (boss, boss_template) {
            self.apply_boss_death_effects(id, &boss, &boss_template, position, events);
        }
    }

    fn apply_enemy_death_effects(
        &mut self,
        id: EntityId,
        template: &EnemyTemplate,
        position: Vec2Fixed,
        events: &mut TickEvents,
    ) {
        // Split into children
        if template.splits > 0 {
            if let Some(kind) = template
                .child_kind
                .as_deref()
                .and_then(|k| self.registry.find_enemy(k))
            {
                for _ in 0..template.splits {
                    let offset = Vec2Fixed::new(
                        Fixed::from_num(self.rng.gen_range(-20_i32..=20)),
                        Fixed::from_num(self.rng.gen_range(-20_i32..=20)),
                    );
                    let spawn_pos = self.bounds.clamp_point(position + offset);
                    let child = self.spawn_enemy_by_id(kind, spawn_pos);
                    events.spawns.push(SpawnEvent {
                        entity_id: child,
                        kind,
                        position: spawn_pos,
                        floor: self.floor,
                    });
                }
                events.splits.push(EnemySplitEvent {
                    entity_id: id,
                    count: template.splits,
                });
            }
        }

        // Corpse explosion against players
        if template.explode_damage > 0 && template.explode_radius > Fixed::ZERO {
            let radius_sq = template.explode_radius * template.explode_radius;
            let victims: Vec<EntityId> = self
                .faction_snapshot(Faction::Player, None)
                .into_iter()
                .filter(|p| position.distance_squared(p.position) <= radius_sq)
                .map(|p| p.id)
                .collect();
            for victim in victims {
                self.apply_damage(victim, template.explode_damage, false, Some(position), events);
            }
        }

        // Radial shrapnel
        if template.shrapnel_count > 0 {
            if let Some(stats) = &template.projectile {
                for direction in radial_directions().into_iter().take(template.shrapnel_count as usize)
                {
                    self.spawn_projectile(
                        Faction::Enemy,
                        position,
                        direction,
                        stats,
                        stats.damage,
                        false,
                        ProjectileMode::Standard,
                    );
                }
            }
        }
    }

    fn apply_boss_death_effects(
        &mut self,
        _id: EntityId,
        boss: &BossState,
        boss_template: &BossTemplate,
        position: Vec2Fixed,
        events: &mut TickEvents,
    ) {
        // Twin enrage: triggered only by the partner's death, once.
        if let Some(partner_id) = boss.partner {
            if let Some(partner) = self.entities.get_mut(partner_id) {
                if partner.is_living() {
                    if let Some(partner_boss) = &mut partner.boss {
                        if partner_boss.enrage() {
                            events.enrages.push(BossEnrageEvent {
                                entity_id: partner_id,
                            });
                        }
                    }
                }
            }
        }

        // Swarm queen death burst
        if boss.kind == BossKind::SwarmQueen {
            if let Some(kind) = boss_template
                .minion_kind
                .as_deref()
                .and_then(|k| self.registry.find_enemy(k))
            {
                for _ in 0..SWARM_QUEEN_DEATH_BURST {
                    let offset = Vec2Fixed::new(
                        Fixed::from_num(self.rng.gen_range(-50_i32..=50)),
                        Fixed::from_num(self.rng.gen_range(-50_i32..=50)),
                    );
                    let spawn_pos = self.bounds.clamp_point(position + offset);
                    let minion = self.spawn_enemy_by_id(kind, spawn_pos);
                    events.spawns.push(SpawnEvent {
                        entity_id: minion,
                        kind,
                        position: spawn_pos,
                        floor: self.floor,
                    });
                }
            }
        }

        // Owned minions do not outlive their boss.
        for minion_id in &boss.minions {
            if let Some(minion) = self.entities.get_mut(*minion_id) {
                if let Some(health) = &mut minion.health {
                    health.current = 0;
                }
            }
        }
    }

    /// Mirror an authoritative spawn on a client.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnknownKind`] if the kind is not in the
    /// local registry.
    pub fn apply_remote_spawn(&mut self, event: &SpawnEvent) -> Result<()> {
        let template = self
            .registry
            .enemy(event.kind)
            .cloned()
            .ok_or_else(|| ArenaError::UnknownKind(format!("enemy #{}", event.kind.as_u16())))?
            .scaled_for_floor(event.floor);

        let mut entity = Entity::new(0);
        entity.faction = Faction::Enemy;
        entity.position = Position::new(event.position);
        entity.health = Some(Health::new(template.health));
        if template.armor > 0 {
            entity.armor = Some(Armor::new(template.armor, template.damage_reduction));
        }
        if template.shield > 0 {
            entity.shield = Some(Shield::new(template.shield, template.shield_regen_rate));
        }
        entity.movement = Some(Movement::new(template.speed));
        entity.collision = Some(CollisionSize::new(template.collision_half_extent));
        entity.kind = event.kind;
        entity.behavior = Some(BehaviorState::from_template(&template, event.position));
        entity.template = Some(template);

        self.entities.insert_with_id(event.entity_id, entity);
        Ok(())
    }

    /// Mirror remote damage on a client: apply the defense routing
    /// locally so health bars track the authority.
    pub fn apply_remote_damage(&mut self, event: &DamageEvent) {
        let Some(entity) = self.entities.get_mut(event.target) else {
            return;
        };
        let Some(health) = &mut entity.health else {
            return;
        };
        if health.is_dead() {
            return;
        }
        resolve_damage(
            health,
            entity.armor.as_mut(),
            entity.shield.as_mut(),
            event.damage,
        );
    }

    /// Mirror a remote death on a client.
    pub fn apply_remote_death(&mut self, event: &DeathEvent) {
        self.entities.remove(event.entity_id);
    }

    /// Mirror a remote enrage on a client.
    pub fn apply_remote_enrage(&mut self, event: &BossEnrageEvent) {
        if let Some(boss) = self
            .entities
            .get_mut(event.entity_id)
            .and_then(|e| e.boss.as_mut())
        {
            boss.enrage();
        }
    }

    /// Compare a remote state hash against the local one.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::DesyncDetected`] on mismatch.
    pub fn verify_remote_hash(&self, tick: u64, remote_hash: u64) -> Result<()> {
        let local_hash = self.state_hash();
        if local_hash == remote_hash {
            Ok(())
        } else {
            Err(ArenaError::DesyncDetected {
                tick,
                local_hash,
                remote_hash,
            })
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Identical state produces identical hashes on every machine;
    /// used for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.floor.hash(&mut hasher);

        // The RNG stream is part of the state: a sim that has drawn a
        // different number of values will diverge on its next roll even
        // if no entity differs yet.
        self.rng.get_seed().hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);

        let ids = self.entities.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            if let Some(entity) = self.entities.get(id) {
                id.hash(&mut hasher);
                entity.position.value.x.to_bits().hash(&mut hasher);
                entity.position.value.y.to_bits().hash(&mut hasher);

                if let Some(health) = &entity.health {
                    health.current.hash(&mut hasher);
                    health.max.hash(&mut hasher);
                }
                if let Some(armor) = &entity.armor {
                    armor.current.hash(&mut hasher);
                }
                if let Some(shield) = &entity.shield {
                    shield.current.hash(&mut hasher);
                    shield.cooldown_remaining.hash(&mut hasher);
                }
                if let Some(projectile) = &entity.projectile {
                    projectile.traveled.to_bits().hash(&mut hasher);
                    projectile.damage.hash(&mut hasher);
                    projectile.hits.len().hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }

    /// Serialize the full simulation state for a late-joining client.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidState`] if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ArenaError::InvalidState(e.to_string()))
    }

    /// Restore a simulation from a serialized snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidState`] if decoding fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| ArenaError::InvalidState(e.to_string()))
    }
}

/// The eight compass directions used by radial bursts and shrapnel.
fn radial_directions() -> [Vec2Fixed; RADIAL_BURST_COUNT as usize] {
    let diag = Vec2Fixed::from_int(1, 1).normalize();
    [
        Vec2Fixed::from_int(1, 0),
        Vec2Fixed::new(diag.x, diag.y),
        Vec2Fixed::from_int(0, 1),
        Vec2Fixed::new(-diag.x, diag.y),
        Vec2Fixed::from_int(-1, 0),
        Vec2Fixed::new(-diag.x, -diag.y),
        Vec2Fixed::from_int(0, -1),
        Vec2Fixed::new(diag.x, -diag.y),
    ]
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

    fn registry() -> TemplateRegistry {
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
            id: "slime".to_string(),
            behavior: "rush".to_string(),
            health: 40,
            speed: fixed(2),
            splits: 2,
            child_kind: Some("rusher".to_string()),
            xp_reward: 10,
            ..EnemyTemplate::default()
        });
        registry.register_boss(crate::data::BossTemplate {
            id: "melee_twin".to_string(),
            kind: "twin_melee".to_string(),
            health: 500,
            speed: fixed(3),
            ..crate::data::BossTemplate::default()
        });
        registry.register_boss(crate::data::BossTemplate {
            id: "ranged_twin".to_string(),
            kind: "twin_ranged".to_string(),
            health: 400,
            speed: fixed(3),
            projectile: Some(ProjectileStats::default()),
            ..crate::data::BossTemplate::default()
        });
        registry
    }

    fn sim() -> Simulation {
        Simulation::new(registry(), SimConfig::default())
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = sim();
        assert_eq!(sim.get_tick(), 0);
        sim.tick();
        assert_eq!(sim.get_tick(), 1);
    }

    #[test]
    fn test_spawn_and_lookup() {
        let mut sim = sim();
        let id = sim.spawn_enemy("rusher", vec2(100, 100)).unwrap();

        let entity = sim.entities().get(id).unwrap();
        assert_eq!(entity.health.unwrap().max, 30);
        assert!(entity.behavior.is_some());

        assert!(sim.spawn_enemy("unknown", vec2(0, 0)).is_err());
    }

    #[test]
    fn test_determinism_same_seed_same_hash() {
        let build = || {
            let mut sim = Simulation::new(registry(), SimConfig::default());
            sim.spawn_player(vec2(400, 300), 100, fixed(5), fixed(6));
            sim.spawn_enemy("rusher", vec2(100, 100)).unwrap();
            sim.spawn_enemy("slime", vec2(700, 500)).unwrap();
            for _ in 0..100 {
                sim.tick();
            }
            sim.state_hash()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_enemy_pursues_player() {
        let mut sim = sim();
        sim.spawn_player(vec2(400, 300), 100, fixed(5), fixed(6));
        let enemy = sim.spawn_enemy("rusher", vec2(100, 300)).unwrap();

        let start = sim.entities().get(enemy).unwrap().position.value;
        for _ in 0..10 {
            sim.tick();
        }
        let end = sim.entities().get(enemy).unwrap().position.value;
        assert!(end.x > start.x, "enemy never closed distance");
    }

    #[test]
    fn test_death_emits_event_and_splits() {
        let mut sim = sim();
        sim.spawn_player(vec2(700, 100), 100, fixed(5), fixed(6));
        let slime = sim.spawn_enemy("slime", vec2(100, 100)).unwrap();

        let mut events = TickEvents::new();
        sim.apply_damage(slime, 1000, false, None, &mut events);
        let events = sim.tick();

        assert!(events.deaths.iter().any(|d| d.entity_id == slime));
        let death = events.deaths.iter().find(|d| d.entity_id == slime).unwrap();
        assert_eq!(death.xp_dropped, 10);

        assert_eq!(events.splits.len(), 1);
        assert_eq!(events.splits[0].count, 2);
        // Two children spawned and the parent is gone
        assert!(!sim.entities().contains(slime));
        assert_eq!(events.spawns.len(), 2);
    }

    #[test]
    fn test_client_never_applies_damage() {
        let config = SimConfig {
            role: NetRole::Client,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(registry(), config);
        let enemy = sim.spawn_enemy("rusher", vec2(100, 100)).unwrap();

        let mut events = TickEvents::new();
        sim.apply_damage(enemy, 25, false, None, &mut events);

        assert_eq!(sim.entities().get(enemy).unwrap().health.unwrap().current, 30);
        assert!(events.damage.is_empty());

        // Mirroring the remote event does move local health
        sim.apply_remote_damage(&DamageEvent {
            target: enemy,
            damage: 25,
            is_crit: false,
            position: vec2(100, 100),
        });
        assert_eq!(sim.entities().get(enemy).unwrap().health.unwrap().current, 5);
    }

    #[test]
    fn test_client_predicts_motion_without_combat() {
        let config = SimConfig {
            role: NetRole::Client,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(registry(), config);
        let player = sim.spawn_player(vec2(400, 300), 100, fixed(5), fixed(6));
        let enemy = sim.spawn_enemy("rusher", vec2(440, 300)).unwrap();
        let start = sim.entities().get(enemy).unwrap().position.value;

        for _ in 0..40 {
            sim.tick();
        }

        // Enemy motion is predicted locally for rendering...
        let after = sim.entities().get(enemy).unwrap().position.value;
        assert_ne!(after, start);

        // ...but contact damage never lands; that is the host's call.
        let health = sim.entities().get(player).unwrap().health.unwrap();
        assert_eq!(health.current, 100);
    }

    #[test]
    fn test_twin_enrage_on_partner_death_only() {
        let mut sim = sim();
        sim.spawn_player(vec2(400, 550), 100, fixed(5), fixed(6));
        let (melee, ranged) = sim
            .spawn_twin_pair("melee_twin", "ranged_twin", vec2(100, 100), vec2(700, 100))
            .unwrap();

        // Self-damage never enrages
        let mut events = TickEvents::new();
        sim.apply_damage(melee, 100, false, None, &mut events);
        sim.tick();
        assert!(!sim
            .entities()
            .get(melee)
            .unwrap()
            .boss
            .as_ref()
            .unwrap()
            .enraged);

        // Partner death enrages the survivor exactly once
        let mut events = TickEvents::new();
        sim.apply_damage(ranged, 100_000, false, None, &mut events);
        let events = sim.tick();
        assert_eq!(events.enrages.len(), 1);
        assert_eq!(events.enrages[0].entity_id, melee);
        assert!(sim
            .entities()
            .get(melee)
            .unwrap()
            .boss
            .as_ref()
            .unwrap()
            .enraged);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_hash() {
        let mut sim = sim();
        sim.spawn_player(vec2(400, 300), 100, fixed(5), fixed(6));
        sim.spawn_enemy("rusher", vec2(100, 100)).unwrap();
        for _ in 0..20 {
            sim.tick();
        }

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(sim.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_desync_detection() {
        let sim = sim();
        let hash = sim.state_hash();
        assert!(sim.verify_remote_hash(0, hash).is_ok());
        assert!(matches!(
            sim.verify_remote_hash(0, hash ^ 1),
            Err(ArenaError::DesyncDetected { .. })
        ));
    }

    #[test]
    fn test_state_hash_covers_rng_stream() {
        // Same world, different seeds: the next roll will diverge, so
        // the hashes must already differ.
        let a = Simulation::new(registry(), SimConfig { seed: 1, ..SimConfig::default() });
        let b = Simulation::new(registry(), SimConfig { seed: 2, ..SimConfig::default() });
        assert_eq!(a.get_tick(), b.get_tick());
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_projectile_damages_enemy() {
        let mut sim = sim();
        let enemy = sim.spawn_enemy("rusher", vec2(200, 100)).unwrap();
        sim.spawn_projectile(
            Faction::Player,
            vec2(100, 100),
            vec2(1, 0),
            &ProjectileStats {
                speed: fixed(20),
                max_range: fixed(400),
                ..ProjectileStats::default()
            },
            10,
            false,
            ProjectileMode::Standard,
        );

        let mut total_damage = 0;
        for _ in 0..10 {
            let events = sim.tick();
            total_damage += events.damage.iter().map(|d| d.damage).sum::<u32>();
        }
        assert_eq!(total_damage, 10);
        assert_eq!(sim.entities().get(enemy).unwrap().health.unwrap().current, 20);
    }

    #[test]
    fn test_remote_spawn_mirror() {
        let config = SimConfig {
            role: NetRole::Client,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(registry(), config);

        let kind = sim.registry.find_enemy("rusher").unwrap();
        sim.apply_remote_spawn(&SpawnEvent {
            entity_id: 42,
            kind,
            position: vec2(100, 100),
            floor: 1,
        })
        .unwrap();

        let entity = sim.entities().get(42).unwrap();
        assert_eq!(entity.kind, kind);
        assert_eq!(entity.health.unwrap().max, 30);
    }
}
