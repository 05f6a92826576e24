//! Boss state machines.
//!
//! Bosses derive their phase from remaining health every tick instead
//! of storing it; the thresholds are >75% and >50%. Twin guardians
//! hold a weak partner reference by entity ID and escalate exactly
//! once when the partner dies.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::{ChargePhase, ChargeState};
use crate::collision::{Obstacle, Rect};
use crate::components::{ActorRef, EntityId};
use crate::data::BossTemplate;
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::TICK_RATE;
use crate::steering::{apply_obstacle_avoidance, AvoidanceState};

/// Gatekeeper charge cooldown (10 s).
pub const GATEKEEPER_CHARGE_COOLDOWN_TICKS: u32 = TICK_RATE * 10;

/// Boss charge telegraph (0.3 s).
pub const BOSS_TELEGRAPH_TICKS: u32 = TICK_RATE * 3 / 10;

/// Boss charge duration (1.0 s).
pub const BOSS_CHARGE_DURATION_TICKS: u32 = TICK_RATE;

/// Twin melee charge cooldown (8 s), halved while enraged.
pub const TWIN_CHARGE_COOLDOWN_TICKS: u32 = TICK_RATE * 8;

/// Twin ranged base fire interval (1.5 s).
pub const TWIN_FIRE_INTERVAL_TICKS: u32 = TICK_RATE * 3 / 2;

/// Maximum concurrent swarm queen minions.
pub const SWARM_QUEEN_MINION_CAP: u32 = 8;

/// Minions released when the swarm queen dies.
pub const SWARM_QUEEN_DEATH_BURST: u32 = 6;

/// Directions in the gatekeeper's radial burst.
pub const RADIAL_BURST_COUNT: u32 = 8;

/// The boss roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossKind {
    /// Charges, spawns minions, fires radial bursts; all phase-scaled.
    Gatekeeper,
    /// Melee half of the twin pair.
    TwinMelee,
    /// Ranged half of the twin pair.
    TwinRanged,
    /// Minion fountain that hugs the arena center.
    SwarmQueen,
}

impl BossKind {
    /// Resolve a template tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "gatekeeper" => Some(Self::Gatekeeper),
            "twin_melee" => Some(Self::TwinMelee),
            "twin_ranged" => Some(Self::TwinRanged),
            "swarm_queen" => Some(Self::SwarmQueen),
            _ => None,
        }
    }

    /// Whether this boss is half of a twin pair.
    #[must_use]
    pub const fn is_twin(self) -> bool {
        matches!(self, Self::TwinMelee | Self::TwinRanged)
    }
}

/// Phase derived from health fraction.
#[must_use]
pub fn phase_from_health(fraction: Fixed) -> u8 {
    if fraction > Fixed::from_num(3) / Fixed::from_num(4) {
        1
    } else if fraction > Fixed::ONE / Fixed::from_num(2) {
        2
    } else {
        3
    }
}

/// Phase-scaled interval: 8 s / 6 s / 5 s.
fn phase_interval_ticks(phase: u8) -> u32 {
    match phase {
        1 => TICK_RATE * 8,
        2 => TICK_RATE * 6,
        _ => TICK_RATE * 5,
    }
}

/// Swarm queen spawn cadence: 5 s / 3 s / 2 s.
fn queen_spawn_interval_ticks(phase: u8) -> u32 {
    match phase {
        1 => TICK_RATE * 5,
        2 => TICK_RATE * 3,
        _ => TICK_RATE * 2,
    }
}

/// Gatekeeper burst speed multiplier by phase.
fn gatekeeper_charge_multiplier(phase: u8) -> Fixed {
    match phase {
        1 => Fixed::from_num(2),
        2 => Fixed::from_num(2.5),
        _ => Fixed::from_num(3),
    }
}

/// Twin melee burst speed: 2.5x, or 3.5x while enraged.
fn twin_charge_multiplier(enraged: bool) -> Fixed {
    if enraged {
        Fixed::from_num(3.5)
    } else {
        Fixed::from_num(2.5)
    }
}

/// Charge aborts below this fraction of desired burst movement.
fn charge_abort_fraction() -> Fixed {
    Fixed::from_num(2) / Fixed::from_num(5)
}

/// Distance the twin melee closes to before charging.
fn twin_charge_trigger_range() -> Fixed {
    Fixed::from_num(200)
}

/// Standoff distance the swarm queen keeps from the nearest target.
fn queen_standoff_range() -> Fixed {
    Fixed::from_num(150)
}

/// Per-boss mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossState {
    /// Which machine drives this boss.
    pub kind: BossKind,
    /// Minions this boss spawned, pruned as they die.
    pub minions: Vec<EntityId>,
    /// Twin partner, resolved by lookup; may already be dead.
    pub partner: Option<EntityId>,
    /// One-shot escalation flag.
    pub enraged: bool,
    /// Ticks until the next minion spawn.
    pub minion_spawn_timer: u32,
    /// Ticks until the next charge may start.
    pub charge_cooldown_timer: u32,
    /// Charge machine, shared with enemy charge behavior.
    pub charge: ChargeState,
    /// Ticks until the next radial burst.
    pub radial_timer: u32,
    /// Ticks until the next ranged shot.
    pub attack_timer: u32,
    /// Steering memory.
    pub avoidance: AvoidanceState,
}

impl BossState {
    /// Fresh state for a boss spawned at `position`.
    #[must_use]
    pub fn new(kind: BossKind, position: Vec2Fixed) -> Self {
        Self {
            kind,
            minions: Vec::new(),
            partner: None,
            enraged: false,
            minion_spawn_timer: match kind {
                BossKind::Gatekeeper => phase_interval_ticks(1),
                BossKind::SwarmQueen => queen_spawn_interval_ticks(1),
                _ => 0,
            },
            charge_cooldown_timer: match kind {
                BossKind::Gatekeeper => GATEKEEPER_CHARGE_COOLDOWN_TICKS,
                BossKind::TwinMelee => TWIN_CHARGE_COOLDOWN_TICKS,
                _ => 0,
            },
            charge: ChargeState::default(),
            radial_timer: phase_interval_ticks(1),
            attack_timer: TWIN_FIRE_INTERVAL_TICKS,
            avoidance: AvoidanceState::new(position),
        }
    }

    /// Escalate after the partner's death. Returns `true` only the
    /// first time; self-damage never triggers this.
    pub fn enrage(&mut self) -> bool {
        if self.enraged {
            return false;
        }
        self.enraged = true;
        true
    }

    /// Speed multiplier from enrage state.
    #[must_use]
    pub fn speed_multiplier(&self) -> Fixed {
        if self.enraged {
            Fixed::from_num(1.5)
        } else {
            Fixed::ONE
        }
    }

    /// Damage multiplier from enrage state (melee contact or
    /// projectile damage, depending on the twin).
    #[must_use]
    pub fn damage_multiplier(&self) -> Fixed {
        if self.enraged {
            Fixed::from_num(1.25)
        } else {
            Fixed::ONE
        }
    }

    /// Effective twin melee charge cooldown.
    #[must_use]
    pub fn twin_charge_cooldown(&self) -> u32 {
        if self.enraged {
            TWIN_CHARGE_COOLDOWN_TICKS / 2
        } else {
            TWIN_CHARGE_COOLDOWN_TICKS
        }
    }

    /// Effective twin ranged fire interval (+50% rate while enraged).
    #[must_use]
    pub fn twin_fire_interval(&self) -> u32 {
        if self.enraged {
            TWIN_FIRE_INTERVAL_TICKS * 2 / 3
        } else {
            TWIN_FIRE_INTERVAL_TICKS
        }
    }
}

/// Side effect requested by a boss this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BossAction {
    /// Fire the template projectile along `direction`.
    Fire {
        /// Unit direction of the shot.
        direction: Vec2Fixed,
    },
    /// Fire the template projectile in all eight compass directions.
    RadialBurst,
    /// Spawn one minion of the template's minion kind.
    SpawnMinion {
        /// Spawn position near the boss.
        position: Vec2Fixed,
    },
}

/// Read-only world snapshot for one boss tick.
pub struct BossContext<'a> {
    /// Boss position.
    pub position: Vec2Fixed,
    /// Effective speed this tick, units per tick.
    pub speed: Fixed,
    /// Collision half-extent.
    pub half_extent: Fixed,
    /// Displacement actually achieved last tick.
    pub last_move_distance: Fixed,
    /// Health fraction for phase derivation.
    pub health_fraction: Fixed,
    /// Stat template.
    pub template: &'a BossTemplate,
    /// Nearest living hostile.
    pub target: Option<ActorRef>,
    /// Living minions owned by this boss.
    pub live_minions: u32,
    /// Obstacle snapshot.
    pub obstacles: &'a [Obstacle],
    /// Arena bounds.
    pub bounds: &'a Rect,
    /// Seeded simulation RNG.
    pub rng: &'a mut ChaCha8Rng,
}

/// What a boss wants to happen this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BossOutput {
    /// Intended unit move direction.
    pub move_direction: Vec2Fixed,
    /// Speed override (charge burst).
    pub speed_override: Option<Fixed>,
    /// Requested side effects.
    pub actions: Vec<BossAction>,
}

/// Run one boss tick.
pub fn run_boss(state: &mut BossState, ctx: &mut BossContext) -> BossOutput {
    match state.kind {
        BossKind::Gatekeeper => run_gatekeeper(state, ctx),
        BossKind::TwinMelee => run_twin_melee(state, ctx),
        BossKind::TwinRanged => run_twin_ranged(state, ctx),
        BossKind::SwarmQueen => run_swarm_queen(state, ctx),
    }
}

fn steer(state: &mut BossState, ctx: &mut BossContext, desired: Vec2Fixed) -> Vec2Fixed {
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

fn pursue(state: &mut BossState, ctx: &mut BossContext) -> Vec2Fixed {
    match ctx.target {
        Some(target) => {
            let desired = ctx.position.direction_to(target.position);
            steer(state, ctx, desired)
        }
        None => Vec2Fixed::ZERO,
    }
}

/// Minion spawn offset near the boss, clamped inside the arena.
fn minion_spawn_position(ctx: &mut BossContext) -> Vec2Fixed {
    let offset = Vec2Fixed::new(
        Fixed::from_num(ctx.rng.gen_range(-60_i32..=60)),
        Fixed::from_num(ctx.rng.gen_range(-60_i32..=60)),
    );
    ctx.bounds
        .shrink(ctx.half_extent)
        .clamp_point(ctx.position + offset)
}

/// Drive a boss charge machine; returns movement for this tick.
fn tick_charge(
    state: &mut BossState,
    ctx: &BossContext,
    burst_multiplier: Fixed,
    cooldown_reload: u32,
    trigger_range: Fixed,
) -> Option<(Vec2Fixed, Fixed)> {
    match state.charge.phase {
        ChargePhase::Idle => {
            if state.charge_cooldown_timer > 0 {
                state.charge_cooldown_timer -= 1;
            }
            let in_range = ctx.target.is_some_and(|t| {
                ctx.position.distance_squared(t.position) <= trigger_range * trigger_range
            });
            if state.charge_cooldown_timer == 0 && in_range {
                if let Some(target) = ctx.target {
                    state.charge.phase = ChargePhase::Telegraph;
                    state.charge.timer = BOSS_TELEGRAPH_TICKS;
                    state.charge.direction = ctx.position.direction_to(target.position);
                }
            }
            None
        }
        ChargePhase::Telegraph => {
            if state.charge.timer > 1 {
                state.charge.timer -= 1;
            } else {
                state.charge.phase = ChargePhase::Charging;
                state.charge.timer = BOSS_CHARGE_DURATION_TICKS;
            }
            Some((Vec2Fixed::ZERO, ctx.speed))
        }
        ChargePhase::Charging => {
            let burst_speed = ctx.speed * burst_multiplier;
            let aborted = ctx.last_move_distance < burst_speed * charge_abort_fraction();

            if aborted || state.charge.timer <= 1 {
                state.charge.phase = ChargePhase::Idle;
                state.charge_cooldown_timer = cooldown_reload;
                Some((Vec2Fixed::ZERO, ctx.speed))
            } else {
                state.charge.timer -= 1;
                Some((state.charge.direction, burst_speed))
            }
        }
        // Bosses skip the recovery pause enemies take.
        ChargePhase::Pause => {
            state.charge.phase = ChargePhase::Idle;
            None
        }
    }
}

fn run_gatekeeper(state: &mut BossState, ctx: &mut BossContext) -> BossOutput {
    let mut output = BossOutput::default();
    let phase = phase_from_health(ctx.health_fraction);

    // Phase-scaled minion cadence
    if state.minion_spawn_timer > 1 {
        state.minion_spawn_timer -= 1;
    } else {
        state.minion_spawn_timer = phase_interval_ticks(phase);
        let position = minion_spawn_position(ctx);
        output.actions.push(BossAction::SpawnMinion { position });
    }

    // Phase-scaled radial burst
    if state.radial_timer > 1 {
        state.radial_timer -= 1;
    } else {
        state.radial_timer = phase_interval_ticks(phase);
        output.actions.push(BossAction::RadialBurst);
    }

    let charging = tick_charge(
        state,
        ctx,
        gatekeeper_charge_multiplier(phase),
        GATEKEEPER_CHARGE_COOLDOWN_TICKS,
        Fixed::from_num(400),
    );

    match charging {
        Some((direction, speed)) => {
            output.move_direction = direction;
            output.speed_override = Some(speed);
        }
        None => output.move_direction = pursue(state, ctx),
    }
    output
}

fn run_twin_melee(state: &mut BossState, ctx: &mut BossContext) -> BossOutput {
    let mut output = BossOutput::default();

    let charging = tick_charge(
        state,
        ctx,
        twin_charge_multiplier(state.enraged),
        state.twin_charge_cooldown(),
        twin_charge_trigger_range(),
    );

    match charging {
        Some((direction, speed)) => {
            output.move_direction = direction;
            output.speed_override = Some(speed);
        }
        None => output.move_direction = pursue(state, ctx),
    }
    output
}

fn run_twin_ranged(state: &mut BossState, ctx: &mut BossContext) -> BossOutput {
    let mut output = BossOutput::default();
    let Some(target) = ctx.target else {
        return output;
    };

    // Keep a standoff band like the shoot behavior.
    let preferred = ctx
        .template
        .projectile
        .as_ref()
        .map_or(Fixed::from_num(180), |p| p.max_range / Fixed::from_num(2));
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
        output.move_direction = steer(state, ctx, desired);
    }

    if state.attack_timer > 1 {
        state.attack_timer -= 1;
    } else {
        state.attack_timer = state.twin_fire_interval();
        output.actions.push(BossAction::Fire { direction: toward });
    }
    output
}

fn run_swarm_queen(state: &mut BossState, ctx: &mut BossContext) -> BossOutput {
    let mut output = BossOutput::default();
    let phase = phase_from_health(ctx.health_fraction);

    if state.minion_spawn_timer > 1 {
        state.minion_spawn_timer -= 1;
    } else {
        state.minion_spawn_timer = queen_spawn_interval_ticks(phase);
        if ctx.live_minions < SWARM_QUEEN_MINION_CAP {
            let position = minion_spawn_position(ctx);
            output.actions.push(BossAction::SpawnMinion { position });
        }
    }

    // Drift toward the arena center, but give ground to a close target.
    let center = ctx.bounds.center();
    let desired = match ctx.target {
        Some(target)
            if ctx.position.distance_squared(target.position)
                < queen_standoff_range() * queen_standoff_range() =>
        {
            target.position.direction_to(ctx.position)
        }
        _ => ctx.position.direction_to(center),
    };

    if desired != Vec2Fixed::ZERO {
        output.move_direction = steer(state, ctx, desired);
    }
    output
}
