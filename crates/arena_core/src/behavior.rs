//! Enemy behavior state machines.
//!
//! Every enemy carries one [`BehaviorKind`]; dispatch is a closed
//! `match`, so adding a behavior is a compile-time-checked change
//! rather than a string comparison. Template data still names
//! behaviors by tag, and unknown tags resolve to [`BehaviorKind::Rush`]
//! at load time.
//!
//! Behaviors are pure planners: each tick they read immutable world
//! snapshots and produce an intended move direction plus a list of
//! [`BehaviorAction`]s. The simulation applies actions and resolves
//! movement against collision afterwards, so damage and teleports stay
//! centralized and authority-gated in one place.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::collision::{position_blocked, Obstacle, Rect};
use crate::components::{ActorRef, EntityId};
use crate::data::{EnemyTemplate, PathingMode};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::{NavGrid, PathFollower};
use crate::simulation::TICK_RATE;
use crate::steering::{apply_obstacle_avoidance, AvoidanceState};

/// Telegraph window before a charge commits (0.2 s).
pub const CHARGE_TELEGRAPH_TICKS: u32 = TICK_RATE / 5;

/// Locked-direction burst duration (1.0 s).
pub const CHARGE_DURATION_TICKS: u32 = TICK_RATE;

/// Recovery pause after a charge or an abort (0.5 s).
pub const CHARGE_PAUSE_TICKS: u32 = TICK_RATE / 2;

/// Buffer aura rescan interval (1.0 s).
pub const BUFF_SCAN_INTERVAL_TICKS: u32 = TICK_RATE;

/// Speed multiplier while charging.
fn charge_speed_multiplier() -> Fixed {
    Fixed::from_num(3)
}

/// A charge aborts when actual movement drops below this fraction of
/// the desired burst distance.
fn charge_abort_fraction() -> Fixed {
    Fixed::from_num(2) / Fixed::from_num(5)
}

/// Distance to the target that arms a charge.
fn charge_trigger_range() -> Fixed {
    Fixed::from_num(250)
}

/// Target proximity that triggers the player-teleport behavior.
fn player_teleport_trigger_range() -> Fixed {
    Fixed::from_num(80)
}

/// Inset of the perimeter patrol path from the arena edge.
fn perimeter_margin() -> Fixed {
    Fixed::from_num(40)
}

/// Corner-arrival threshold for the perimeter patrol.
fn perimeter_threshold() -> Fixed {
    Fixed::from_num(20)
}

/// The closed set of enemy behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Stationary; fires at the nearest target on an interval.
    Turret,
    /// Keeps a preferred distance band and fires while moving.
    Shoot,
    /// Telegraphed burst along a locked direction.
    Charge,
    /// Pursuit with a per-tick random jitter.
    Erratic,
    /// Plain pursuit; the defense layers do the work.
    Shield,
    /// Blinks toward the target on a cooldown.
    Teleport,
    /// Spawns child enemies on an interval.
    Spawner,
    /// Buffs nearby allies' speed and damage.
    Buffer,
    /// Heals nearby allies on an interval.
    Healer,
    /// Relocates the *target* to a random point.
    TeleportPlayer,
    /// Slows targets inside an aura.
    Freeze,
    /// Direct pursuit; the fallback for unknown tags.
    #[default]
    Rush,
    /// Corner-to-corner patrol of the arena edge.
    Perimeter,
}

impl BehaviorKind {
    /// Resolve a template tag; unknown tags fall back to `Rush`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "turret" => Self::Turret,
            "shoot" => Self::Shoot,
            "charge" => Self::Charge,
            "erratic" => Self::Erratic,
            "shield" => Self::Shield,
            "teleport" => Self::Teleport,
            "spawner" => Self::Spawner,
            "buffer" => Self::Buffer,
            "healer" => Self::Healer,
            "teleport_player" => Self::TeleportPlayer,
            "freeze" => Self::Freeze,
            "perimeter" => Self::Perimeter,
            _ => Self::Rush,
        }
    }
}

/// Phase of the charge state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChargePhase {
    /// Pursuing while the cooldown runs down.
    #[default]
    Idle,
    /// Standing still, flashing, direction locked.
    Telegraph,
    /// Bursting along the locked direction.
    Charging,
    /// Recovering before the next cooldown.
    Pause,
}

/// Charge machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChargeState {
    /// Current phase.
    pub phase: ChargePhase,
    /// Ticks remaining in the current phase.
    pub timer: u32,
    /// Direction locked at telegraph start.
    pub direction: Vec2Fixed,
}

/// Per-enemy behavior state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorState {
    /// Which behavior drives this enemy.
    pub kind: BehaviorKind,
    /// Ticks until the next shot (turret, shoot).
    pub attack_timer: u32,
    /// Ticks until the next charge may start.
    pub charge_cooldown_timer: u32,
    /// Charge machine.
    pub charge: ChargeState,
    /// Ticks until the next self- or player-teleport.
    pub teleport_timer: u32,
    /// Ticks until the next child spawn.
    pub spawn_timer: u32,
    /// Ticks until the next heal pulse.
    pub heal_timer: u32,
    /// Ticks until the next buff rescan.
    pub buff_timer: u32,
    /// Allies currently holding this buffer's buff.
    pub buffed: Vec<EntityId>,
    /// Target currently slowed by this freeze aura.
    pub slowed: Option<EntityId>,
    /// Current corner index of the perimeter patrol.
    pub perimeter_corner: u8,
    /// Direct-steering memory.
    pub avoidance: AvoidanceState,
    /// Cached A* path.
    pub path: PathFollower,
}

impl BehaviorState {
    /// Initialize behavior state from a template, timers primed to
    /// their full intervals.
    #[must_use]
    pub fn from_template(template: &EnemyTemplate, position: Vec2Fixed) -> Self {
        Self {
            kind: template.behavior_kind(),
            attack_timer: template.attack_interval,
            charge_cooldown_timer: template.charge_cooldown,
            charge: ChargeState::default(),
            teleport_timer: template.teleport_cooldown,
            spawn_timer: template.spawn_interval,
            heal_timer: template.heal_interval,
            buff_timer: BUFF_SCAN_INTERVAL_TICKS,
            buffed: Vec::new(),
            slowed: None,
            perimeter_corner: 0,
            avoidance: AvoidanceState::new(position),
            path: PathFollower::new(),
        }
    }
}

/// Side effect requested by a behavior this tick.
///
/// The simulation applies these after planning, subject to the
/// authority gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorAction {
    /// Fire the template's projectile along `direction`.
    Fire {
        /// Unit direction of the shot.
        direction: Vec2Fixed,
    },
    /// Blink this enemy to a new position.
    TeleportSelf {
        /// Destination, already validated clear.
        to: Vec2Fixed,
    },
    /// Relocate the target to a new position.
    TeleportTarget {
        /// The relocated entity.
        target: EntityId,
        /// Destination, clamped to arena bounds.
        to: Vec2Fixed,
    },
    /// Spawn one child enemy of the template's child kind.
    SpawnChild {
        /// Spawn position, already validated clear.
        position: Vec2Fixed,
    },
    /// Heal the listed allies by the template's heal amount.
    Heal {
        /// Allies inside the heal radius.
        targets: Vec<EntityId>,
    },
    /// Apply this buffer's speed/damage buff.
    ApplyBuff {
        /// Allies inside the buff radius.
        targets: Vec<EntityId>,
    },
    /// Remove this buffer's buff from allies that left the radius.
    RemoveBuff {
        /// Previously-buffed allies now out of range.
        targets: Vec<EntityId>,
    },
    /// Apply the slow debuff to the target.
    ApplySlow {
        /// The slowed entity.
        target: EntityId,
    },
    /// Remove the slow debuff.
    RemoveSlow {
        /// The previously slowed entity.
        target: EntityId,
    },
}

/// Read-only world snapshot handed to a behavior for one tick.
pub struct BehaviorContext<'a> {
    /// Enemy position.
    pub position: Vec2Fixed,
    /// Effective speed this tick (modifiers applied), units per tick.
    pub speed: Fixed,
    /// Collision half-extent.
    pub half_extent: Fixed,
    /// Displacement actually achieved last tick; feeds charge aborts.
    pub last_move_distance: Fixed,
    /// Stat template for this enemy kind.
    pub template: &'a EnemyTemplate,
    /// Nearest living hostile, if any.
    pub target: Option<ActorRef>,
    /// Living allies sorted by ID, self excluded.
    pub allies: &'a [ActorRef],
    /// Obstacle snapshot.
    pub obstacles: &'a [Obstacle],
    /// Arena bounds.
    pub bounds: &'a Rect,
    /// Navigation grid derived from the obstacle snapshot.
    pub nav: &'a NavGrid,
    /// Seeded simulation RNG.
    pub rng: &'a mut ChaCha8Rng,
}

/// What a behavior wants to happen this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorOutput {
    /// Intended unit move direction (zero to stand still).
    pub move_direction: Vec2Fixed,
    /// Speed override in units per tick (charge burst, slow pursuit).
    pub speed_override: Option<Fixed>,
    /// Requested side effects, in order.
    pub actions: Vec<BehaviorAction>,
}

/// Run one behavior tick.
pub fn run_behavior(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    match state.kind {
        BehaviorKind::Turret => run_turret(state, ctx),
        BehaviorKind::Shoot => run_shoot(state, ctx),
        BehaviorKind::Charge => run_charge(state, ctx),
        BehaviorKind::Erratic => run_erratic(state, ctx),
        BehaviorKind::Shield | BehaviorKind::Rush => pursue_only(state, ctx),
        BehaviorKind::Teleport => run_teleport(state, ctx),
        BehaviorKind::Spawner => run_spawner(state, ctx),
        BehaviorKind::Buffer => run_buffer(state, ctx),
        BehaviorKind::Healer => run_healer(state, ctx),
        BehaviorKind::TeleportPlayer => run_teleport_player(state, ctx),
        BehaviorKind::Freeze => run_freeze(state, ctx),
        BehaviorKind::Perimeter => run_perimeter(state, ctx),
    }
}

/// Pursuit direction honoring the template's pathing mode.
fn pursuit_direction(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> Vec2Fixed {
    let Some(target) = ctx.target else {
        return Vec2Fixed::ZERO;
    };

    let desired = match ctx.template.pathing {
        PathingMode::Smart => {
            state
                .path
                .move_direction(ctx.nav, ctx.position, target.position)
        }
        PathingMode::Direct | PathingMode::Perimeter => ctx.position.direction_to(target.position),
    };

    apply_obstacle_avoidance(
        &mut state.avoidance,
        ctx.position,
        desired,
        ctx.speed,
        ctx.half_extent,
        ctx.obstacles,
        ctx.bounds,
    )
}

fn pursue_only(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    BehaviorOutput {
        move_direction: pursuit_direction(state, ctx),
        ..BehaviorOutput::default()
    }
}

/// Countdown helper: ticks the timer, returns `true` on expiry and
/// reloads it. A zero interval never fires.
fn timer_elapsed(timer: &mut u32, interval: u32) -> bool {
    if interval == 0 {
        return false;
    }
    if *timer > 1 {
        *timer -= 1;
        return false;
    }
    *timer = interval;
    true
}

fn run_turret(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();

    if let Some(target) = ctx.target {
        if timer_elapsed(&mut state.attack_timer, ctx.template.attack_interval) {
            output.actions.push(BehaviorAction::Fire {
                direction: ctx.position.direction_to(target.position),
            });
        }
    }
    output
}

fn run_shoot(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();
    let Some(target) = ctx.target else {
        return output;
    };

    // Preferred engagement distance: half the projectile's reach.
    let preferred = ctx
        .template
        .projectile
        .as_ref()
        .map_or(Fixed::from_num(150), |p| p.max_range / Fixed::from_num(2));
    let near = preferred * Fixed::from_num(4) / Fixed::from_num(5);
    let far = preferred * Fixed::from_num(6) / Fixed::from_num(5);

    let distance = ctx.position.distance(target.position);
    let toward = ctx.position.direction_to(target.position);

    let desired = if distance < near {
        -toward
    } else if distance > far {
        toward
    } else {
        Vec2Fixed::ZERO
    };

    if desired != Vec2Fixed::ZERO {
        output.move_direction = apply_obstacle_avoidance(
            &mut state.avoidance,
            ctx.position,
            desired,
            ctx.speed,
            ctx.half_extent,
            ctx.obstacles,
            ctx.bounds,
        );
    }

    if timer_elapsed(&mut state.attack_timer, ctx.template.attack_interval) {
        output.actions.push(BehaviorAction::Fire { direction: toward });
    }
    output
}

fn run_charge(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();

    match state.charge.phase {
        ChargePhase::Idle => {
            if state.charge_cooldown_timer > 0 {
                state.charge_cooldown_timer -= 1;
            }

            let in_range = ctx.target.is_some_and(|t| {
                ctx.position.distance_squared(t.position)
                    <= charge_trigger_range() * charge_trigger_range()
            });

            if state.charge_cooldown_timer == 0 && in_range {
                if let Some(target) = ctx.target {
                    state.charge.phase = ChargePhase::Telegraph;
                    state.charge.timer = CHARGE_TELEGRAPH_TICKS;
                    state.charge.direction = ctx.position.direction_to(target.position);
                }
            } else {
                output.move_direction = pursuit_direction(state, ctx);
            }
        }
        ChargePhase::Telegraph => {
            // Stand still and flash; the direction stays locked.
            if state.charge.timer > 1 {
                state.charge.timer -= 1;
            } else {
                state.charge.phase = ChargePhase::Charging;
                state.charge.timer = CHARGE_DURATION_TICKS;
            }
        }
        ChargePhase::Charging => {
            let burst_speed = ctx.speed * charge_speed_multiplier();
            let aborted = ctx.last_move_distance < burst_speed * charge_abort_fraction();

            if aborted || state.charge.timer <= 1 {
                state.charge.phase = ChargePhase::Pause;
                state.charge.timer = CHARGE_PAUSE_TICKS;
            } else {
                state.charge.timer -= 1;
                output.move_direction = state.charge.direction;
                output.speed_override = Some(burst_speed);
            }
        }
        ChargePhase::Pause => {
            if state.charge.timer > 1 {
                state.charge.timer -= 1;
            } else {
                state.charge.phase = ChargePhase::Idle;
                state.charge_cooldown_timer = ctx.template.charge_cooldown;
            }
        }
    }
    output
}

/// Random unit vector with no trigonometry: sample a square, reject
/// nothing, normalize. Slight corner bias is acceptable for jitter.
fn random_direction(rng: &mut ChaCha8Rng) -> Vec2Fixed {
    let x = Fixed::from_num(rng.gen_range(-100_i32..=100)) / Fixed::from_num(100);
    let y = Fixed::from_num(rng.gen_range(-100_i32..=100)) / Fixed::from_num(100);
    let v = Vec2Fixed::new(x, y).normalize();
    if v == Vec2Fixed::ZERO {
        Vec2Fixed::from_int(1, 0)
    } else {
        v
    }
}

fn run_erratic(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();
    let Some(target) = ctx.target else {
        return output;
    };

    let toward = ctx.position.direction_to(target.position);
    let jitter = random_direction(ctx.rng).scale(Fixed::from_num(1) / Fixed::from_num(2));
    let desired = (toward + jitter).normalize();

    output.move_direction = apply_obstacle_avoidance(
        &mut state.avoidance,
        ctx.position,
        desired,
        ctx.speed,
        ctx.half_extent,
        ctx.obstacles,
        ctx.bounds,
    );
    output
}

fn run_teleport(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();
    let Some(target) = ctx.target else {
        return output;
    };

    if timer_elapsed(&mut state.teleport_timer, ctx.template.teleport_cooldown) {
        let destination = ctx.position
            + ctx
                .position
                .direction_to(target.position)
                .scale(ctx.template.teleport_range);
        let inner = ctx.bounds.shrink(ctx.half_extent);

        if inner.contains(destination)
            && !position_blocked(destination, ctx.half_extent, ctx.obstacles)
        {
            output
                .actions
                .push(BehaviorAction::TeleportSelf { to: destination });
            return output;
        }
    }

    output.move_direction = pursuit_direction(state, ctx);
    output
}

fn run_spawner(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();

    if timer_elapsed(&mut state.spawn_timer, ctx.template.spawn_interval) {
        let offset = Vec2Fixed::new(
            Fixed::from_num(ctx.rng.gen_range(-40_i32..=40)),
            Fixed::from_num(ctx.rng.gen_range(-40_i32..=40)),
        );
        let position = ctx.bounds.shrink(ctx.half_extent).clamp_point(ctx.position + offset);

        if !position_blocked(position, ctx.half_extent, ctx.obstacles) {
            output.actions.push(BehaviorAction::SpawnChild { position });
            return output;
        }
    }

    // Slow drift toward the target between spawns.
    output.move_direction = pursuit_direction(state, ctx);
    output.speed_override = Some(ctx.speed / Fixed::from_num(2));
    output
}

fn run_buffer(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = pursue_only(state, ctx);

    if !timer_elapsed(&mut state.buff_timer, BUFF_SCAN_INTERVAL_TICKS) {
        return output;
    }

    let radius_sq = ctx.template.buff_radius * ctx.template.buff_radius;
    let in_range: Vec<EntityId> = ctx
        .allies
        .iter()
        .filter(|a| ctx.position.distance_squared(a.position) <= radius_sq)
        .map(|a| a.id)
        .collect();

    let dropped: Vec<EntityId> = state
        .buffed
        .iter()
        .copied()
        .filter(|id| !in_range.contains(id))
        .collect();

    if !dropped.is_empty() {
        output.actions.push(BehaviorAction::RemoveBuff { targets: dropped });
    }
    if !in_range.is_empty() {
        output.actions.push(BehaviorAction::ApplyBuff {
            targets: in_range.clone(),
        });
    }
    state.buffed = in_range;
    output
}

fn run_healer(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = pursue_only(state, ctx);

    if timer_elapsed(&mut state.heal_timer, ctx.template.heal_interval) {
        let radius_sq = ctx.template.heal_radius * ctx.template.heal_radius;
        let targets: Vec<EntityId> = ctx
            .allies
            .iter()
            .filter(|a| ctx.position.distance_squared(a.position) <= radius_sq)
            .map(|a| a.id)
            .collect();

        if !targets.is_empty() {
            output.actions.push(BehaviorAction::Heal { targets });
        }
    }
    output
}

fn run_teleport_player(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = BehaviorOutput::default();
    let Some(target) = ctx.target else {
        return output;
    };

    let trigger_sq = player_teleport_trigger_range() * player_teleport_trigger_range();
    let in_range = ctx.position.distance_squared(target.position) <= trigger_sq;

    if in_range && timer_elapsed(&mut state.teleport_timer, ctx.template.teleport_cooldown) {
        let destination = ctx.bounds.shrink(target.half_extent).clamp_point(
            target.position + random_direction(ctx.rng).scale(ctx.template.teleport_range),
        );
        output.actions.push(BehaviorAction::TeleportTarget {
            target: target.id,
            to: destination,
        });
        return output;
    }

    output.move_direction = pursuit_direction(state, ctx);
    output
}

fn run_freeze(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let mut output = pursue_only(state, ctx);

    let in_aura = ctx.target.is_some_and(|t| {
        ctx.position.distance_squared(t.position)
            <= ctx.template.slow_radius * ctx.template.slow_radius
    });

    match (state.slowed, ctx.target) {
        (None, Some(target)) if in_aura => {
            state.slowed = Some(target.id);
            output
                .actions
                .push(BehaviorAction::ApplySlow { target: target.id });
        }
        (Some(slowed), Some(target)) if in_aura && slowed != target.id => {
            // Aura switched targets; release the old one.
            output.actions.push(BehaviorAction::RemoveSlow { target: slowed });
            state.slowed = Some(target.id);
            output
                .actions
                .push(BehaviorAction::ApplySlow { target: target.id });
        }
        (Some(slowed), _) if !in_aura => {
            state.slowed = None;
            output.actions.push(BehaviorAction::RemoveSlow { target: slowed });
        }
        _ => {}
    }
    output
}

fn run_perimeter(state: &mut BehaviorState, ctx: &mut BehaviorContext) -> BehaviorOutput {
    let inner = ctx.bounds.shrink(perimeter_margin());
    // Top-left → top-right → bottom-right → bottom-left, giving a
    // top → right → bottom → left edge cycle.
    let corners = [
        inner.min,
        Vec2Fixed::new(inner.max.x, inner.min.y),
        inner.max,
        Vec2Fixed::new(inner.min.x, inner.max.y),
    ];

    let mut corner = corners[state.perimeter_corner as usize % 4];
    if ctx.position.distance_squared(corner) <= perimeter_threshold() * perimeter_threshold() {
        state.perimeter_corner = (state.perimeter_corner + 1) % 4;
        corner = corners[state.perimeter_corner as usize];
    }

    let desired = ctx.position.direction_to(corner);
    BehaviorOutput {
        move_direction: apply_obstacle_avoidance(
            &mut state.avoidance,
            ctx.position,
            desired,
            ctx.speed,
            ctx.half_extent,
            ctx.obstacles,
            ctx.bounds,
        ),
        ..BehaviorOutput::default()
    }
}
