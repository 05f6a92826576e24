//! Layered defense resolution: shield, then armor, then health.
//!
//! Damage routing rules:
//! - Shields absorb first and take damage at full value (no reduction).
//! - Armor absorbs `floor(amount * (1 - damage_reduction))`; the
//!   remainder reaches health, further reduced by the same factor only
//!   while armor is still standing after the hit.
//! - With no armor left, damage applies to health unreduced.
//!
//! All stores are clamped to `[0, max]` by construction (unsigned
//! fields, saturating arithmetic). Every instance of damage resets the
//! shield regen cooldown, whether or not the shield absorbed anything.

use serde::{Deserialize, Serialize};

use crate::components::Health;
use crate::math::{fixed_serde, Fixed};
use crate::simulation::TICK_RATE;

/// Ticks of regen suspension after any damage (1.0 s).
pub const SHIELD_REGEN_COOLDOWN_TICKS: u32 = TICK_RATE;

/// Ticks between regen pulses once the cooldown has elapsed (1.0 s).
pub const SHIELD_REGEN_INTERVAL_TICKS: u32 = TICK_RATE;

/// Armor layer: flat pool with a percentage damage reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    /// Current armor points.
    pub current: u32,
    /// Maximum armor points.
    pub max: u32,
    /// Fraction of incoming damage absorbed while armor stands (0..=1).
    #[serde(with = "fixed_serde")]
    pub damage_reduction: Fixed,
}

impl Armor {
    /// Create a new armor layer at full strength.
    ///
    /// The reduction fraction is clamped to `[0, 1]`; malformed
    /// negative input becomes zero-effect rather than an error.
    #[must_use]
    pub fn new(max: u32, damage_reduction: Fixed) -> Self {
        Self {
            current: max,
            max,
            damage_reduction: damage_reduction.clamp(Fixed::ZERO, Fixed::ONE),
        }
    }

    /// Check whether the armor layer is depleted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }
}

/// Shield layer: absorbs damage at full value, regenerates over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    /// Current shield points.
    pub current: u32,
    /// Maximum shield points.
    pub max: u32,
    /// Points restored per regen pulse (one pulse per second).
    pub regen_rate: u32,
    /// Ticks remaining before regen may resume.
    pub cooldown_remaining: u32,
    /// Ticks accumulated toward the next regen pulse.
    pub regen_accumulator: u32,
}

impl Shield {
    /// Create a new shield at full strength.
    #[must_use]
    pub const fn new(max: u32, regen_rate: u32) -> Self {
        Self {
            current: max,
            max,
            regen_rate,
            cooldown_remaining: 0,
            regen_accumulator: 0,
        }
    }

    /// Reset the regen cooldown to its fixed duration.
    ///
    /// Called on every instance of damage received, even when the
    /// shield itself absorbed nothing.
    pub fn reset_cooldown(&mut self) {
        self.cooldown_remaining = SHIELD_REGEN_COOLDOWN_TICKS;
        self.regen_accumulator = 0;
    }

    /// Advance shield regeneration by one tick.
    ///
    /// Returns the amount regenerated this tick (usually zero; a pulse
    /// fires once per [`SHIELD_REGEN_INTERVAL_TICKS`]). The caller is
    /// responsible for gating on owner liveness and authority.
    pub fn tick_regen(&mut self) -> u32 {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return 0;
        }

        if self.current >= self.max || self.regen_rate == 0 {
            return 0;
        }

        self.regen_accumulator += 1;
        if self.regen_accumulator < SHIELD_REGEN_INTERVAL_TICKS {
            return 0;
        }
        self.regen_accumulator = 0;

        let headroom = self.max - self.current;
        let restored = self.regen_rate.min(headroom);
        self.current += restored;
        restored
    }
}

/// How a resolved hit was split across the defense layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageBreakdown {
    /// Damage absorbed by the shield.
    pub shield_damage: u32,
    /// Damage absorbed by armor.
    pub armor_damage: u32,
    /// Damage applied to health.
    pub health_damage: u32,
}

impl DamageBreakdown {
    /// Whether shield or armor changed, requiring a visual-state
    /// recompute on the presentation side.
    #[must_use]
    pub const fn defense_changed(&self) -> bool {
        self.shield_damage > 0 || self.armor_damage > 0
    }
}

/// Resolve a damage instance through shield, armor, and health.
///
/// The shield absorbs first at full value; any remainder flows through
/// [`resolve_damage_internal`]. The shield regen cooldown is reset on
/// every call, including hits that bypass an empty shield.
pub fn resolve_damage(
    health: &mut Health,
    armor: Option<&mut Armor>,
    shield: Option<&mut Shield>,
    amount: u32,
) -> DamageBreakdown {
    let mut breakdown = DamageBreakdown::default();
    let mut remaining = amount;

    if let Some(shield) = shield {
        if shield.current > 0 {
            let absorbed = remaining.min(shield.current);
            shield.current -= absorbed;
            breakdown.shield_damage = absorbed;
            remaining -= absorbed;
        }
        shield.reset_cooldown();
    }

    if remaining > 0 {
        let inner = resolve_damage_internal(health, armor, remaining);
        breakdown.armor_damage = inner.armor_damage;
        breakdown.health_damage = inner.health_damage;
    }

    breakdown
}

/// Resolve damage through armor and health only.
///
/// With armor standing: `reduced = floor(amount * (1 - reduction))` is
/// taken from armor (capped at the armor pool); the remainder
/// `amount - reduced` reaches health, scaled by the same `(1 -
/// reduction)` factor iff armor survived the subtraction, else at full
/// value. With no armor, the whole amount applies to health.
pub fn resolve_damage_internal(
    health: &mut Health,
    armor: Option<&mut Armor>,
    amount: u32,
) -> DamageBreakdown {
    let mut breakdown = DamageBreakdown::default();

    let health_damage = match armor {
        Some(armor) if armor.current > 0 => {
            let keep = Fixed::ONE - armor.damage_reduction;
            let reduced: u32 = (Fixed::from_num(amount) * keep).to_num();

            let armor_damage = reduced.min(armor.current);
            armor.current -= armor_damage;
            breakdown.armor_damage = armor_damage;

            let remainder = amount.saturating_sub(reduced);
            if armor.current > 0 {
                (Fixed::from_num(remainder) * keep).to_num()
            } else {
                remainder
            }
        }
        _ => amount,
    };

    breakdown.health_damage = health.apply_damage(health_damage);
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(hp: u32) -> Health {
        Health::new(hp)
    }

    #[test]
    fn test_no_defenses_full_damage() {
        let mut hp = health(100);
        let breakdown = resolve_damage(&mut hp, None, None, 30);
        assert_eq!(breakdown.health_damage, 30);
        assert_eq!(hp.current, 70);
        assert!(!breakdown.defense_changed());
    }

    #[test]
    fn test_armor_breaks_remainder_applies_full() {
        // Spec example: armor=50, reduction=0.2, damage=100.
        // reduced = floor(100 * 0.8) = 80, armor absorbs 50 and breaks,
        // remainder = 20 applies at full value.
        let mut hp = health(100);
        let mut armor = Armor::new(50, Fixed::from_num(0.2));

        let breakdown = resolve_damage(&mut hp, Some(&mut armor), None, 100);

        assert_eq!(breakdown.armor_damage, 50);
        assert_eq!(armor.current, 0);
        assert_eq!(breakdown.health_damage, 20);
        assert_eq!(hp.current, 80);
    }

    #[test]
    fn test_armor_survives_remainder_reduced() {
        // armor=100, reduction=0.2, damage=50:
        // reduced = 40 (armor -> 60), remainder = 10, armor survived so
        // health takes floor(10 * 0.8) = 8.
        let mut hp = health(100);
        let mut armor = Armor::new(100, Fixed::from_num(0.2));

        let breakdown = resolve_damage(&mut hp, Some(&mut armor), None, 50);

        assert_eq!(breakdown.armor_damage, 40);
        assert_eq!(armor.current, 60);
        assert_eq!(breakdown.health_damage, 8);
        assert_eq!(hp.current, 92);
    }

    #[test]
    fn test_depleted_armor_is_transparent() {
        let mut hp = health(100);
        let mut armor = Armor::new(50, Fixed::from_num(0.5));
        armor.current = 0;

        let breakdown = resolve_damage(&mut hp, Some(&mut armor), None, 40);
        assert_eq!(breakdown.armor_damage, 0);
        assert_eq!(breakdown.health_damage, 40);
    }

    #[test]
    fn test_shield_absorbs_unreduced() {
        let mut hp = health(100);
        let mut armor = Armor::new(50, Fixed::from_num(0.5));
        let mut shield = Shield::new(30, 5);

        let breakdown = resolve_damage(&mut hp, Some(&mut armor), Some(&mut shield), 30);

        // Shield soaks the entire hit at full value; armor untouched.
        assert_eq!(breakdown.shield_damage, 30);
        assert_eq!(shield.current, 0);
        assert_eq!(breakdown.armor_damage, 0);
        assert_eq!(hp.current, 100);
        assert!(breakdown.defense_changed());
    }

    #[test]
    fn test_shield_overflow_reaches_armor() {
        let mut hp = health(100);
        let mut armor = Armor::new(100, Fixed::from_num(0.2));
        let mut shield = Shield::new(20, 5);

        let breakdown = resolve_damage(&mut hp, Some(&mut armor), Some(&mut shield), 70);

        assert_eq!(breakdown.shield_damage, 20);
        // Remaining 50: reduced = 40 to armor, remainder 10 * 0.8 = 8.
        assert_eq!(breakdown.armor_damage, 40);
        assert_eq!(breakdown.health_damage, 8);
    }

    #[test]
    fn test_damage_resets_cooldown_even_with_empty_shield() {
        let mut hp = health(100);
        let mut shield = Shield::new(10, 5);
        shield.current = 0;
        shield.cooldown_remaining = 3;

        resolve_damage(&mut hp, None, Some(&mut shield), 10);
        assert_eq!(shield.cooldown_remaining, SHIELD_REGEN_COOLDOWN_TICKS);
    }

    #[test]
    fn test_regen_blocked_while_cooldown() {
        let mut shield = Shield::new(50, 10);
        shield.current = 20;
        shield.reset_cooldown();

        // The entire cooldown window must pass without a single point.
        for _ in 0..SHIELD_REGEN_COOLDOWN_TICKS {
            assert_eq!(shield.tick_regen(), 0);
        }

        // One full interval after cooldown, a pulse fires.
        let mut restored = 0;
        for _ in 0..SHIELD_REGEN_INTERVAL_TICKS {
            restored += shield.tick_regen();
        }
        assert_eq!(restored, 10);
        assert_eq!(shield.current, 30);
    }

    #[test]
    fn test_regen_caps_at_max() {
        let mut shield = Shield::new(50, 10);
        shield.current = 45;

        let mut restored = 0;
        for _ in 0..SHIELD_REGEN_INTERVAL_TICKS {
            restored += shield.tick_regen();
        }
        assert_eq!(restored, 5);
        assert_eq!(shield.current, 50);

        // At max, no further pulses fire.
        for _ in 0..(SHIELD_REGEN_INTERVAL_TICKS * 2) {
            assert_eq!(shield.tick_regen(), 0);
        }
    }

    #[test]
    fn test_negative_reduction_clamped() {
        let armor = Armor::new(50, Fixed::from_num(-3));
        assert_eq!(armor.damage_reduction, Fixed::ZERO);

        let armor = Armor::new(50, Fixed::from_num(2));
        assert_eq!(armor.damage_reduction, Fixed::ONE);
    }

    #[test]
    fn test_never_negative_stores() {
        // Overkill through every layer leaves all pools at exactly zero.
        let mut hp = health(30);
        let mut armor = Armor::new(20, Fixed::from_num(0.1));
        let mut shield = Shield::new(10, 1);

        resolve_damage(&mut hp, Some(&mut armor), Some(&mut shield), 10_000);

        assert_eq!(shield.current, 0);
        assert_eq!(armor.current, 0);
        assert_eq!(hp.current, 0);
    }
}
