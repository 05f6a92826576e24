//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Host-authoritative multiplayer still demands a deterministic core:
//! the host's hash is the ground truth clients compare against, and any
//! divergence is a desync. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different
//!   results. We use fixed-point arithmetic via
//!   [`arena_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **System randomness**: No calls to `rand()` without explicit
//!   seeds. All jitter and spawn offsets use the seeded simulation RNG.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism
//! 2. **Property tests**: Random inputs must still produce
//!    deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use arena_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed
    /// error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for `Simulation`.
///
/// Runs the simulation twice with identical setup and verifies the
/// final state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N simulations in parallel and verify all final hashes match.
///
/// This is useful for catching non-determinism that only manifests
/// under thread scheduling variations or memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn verify_parallel_determinism<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    hashes.windows(2).all(|w| w[0] == w[1])
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they
/// diverge at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    // Check initial state
    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that serialization round-trip preserves simulation state
/// exactly. Critical for late-join snapshots.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        sim.tick();
    }

    let hash_before = sim.state_hash();

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(restored) = Simulation::deserialize(&bytes) else {
        return false;
    };

    hash_before == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism and damage-model testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use arena_core::math::{Fixed, Vec2Fixed};
    use proptest::prelude::*;

    /// Generate a fixed-point coordinate inside the standard arena.
    pub fn arb_fixed_coord() -> impl Strategy<Value = Fixed> {
        (10i32..590i32).prop_map(Fixed::from_num)
    }

    /// Generate a fixed-point number for speeds (units per tick).
    pub fn arb_fixed_speed() -> impl Strategy<Value = Fixed> {
        (1i32..10i32).prop_map(Fixed::from_num)
    }

    /// Generate a position inside the standard arena.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_coord(), arb_fixed_coord()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate health values (1-1000).
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..1000u32
    }

    /// Generate shield values (0-500).
    pub fn arb_shield() -> impl Strategy<Value = u32> {
        0u32..500u32
    }

    /// Generate armor values (0-500).
    pub fn arb_armor() -> impl Strategy<Value = u32> {
        0u32..500u32
    }

    /// Generate damage values (1-200).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        1u32..200u32
    }

    /// Generate a damage-reduction fraction in `[0, 1]`.
    pub fn arb_damage_reduction() -> impl Strategy<Value = Fixed> {
        (0i64..=100i64).prop_map(|pct| Fixed::from_num(pct) / Fixed::from_num(100))
    }

    /// Generate a sequence of damage instances.
    pub fn arb_damage_sequence(max_len: usize) -> impl Strategy<Value = Vec<u32>> {
        proptest::collection::vec(arb_damage(), 0..max_len)
    }

    /// Generate RNG seeds.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_combat_scenario_determinism() {
        assert!(verify_simulation_determinism(
            || fixtures::combat_scenario(42),
            200
        ));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = fixtures::combat_scenario(1);
        let mut b = fixtures::combat_scenario(2);
        for _ in 0..200 {
            a.tick();
            b.tick();
        }
        // Seeded jitter must actually differ between seeds.
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_no_divergence_in_boss_fight() {
        assert_eq!(
            find_first_divergence(|| fixtures::twin_boss_scenario(7), 300),
            None
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        assert!(verify_serialization_determinism(
            || fixtures::combat_scenario(11),
            100
        ));
    }

    #[test]
    fn test_parallel_runs_match() {
        assert!(verify_parallel_determinism(
            || fixtures::combat_scenario(99),
            4,
            100
        ));
    }
}
