//! Deferred task scheduling.
//!
//! Timed effects (telegraph ends, tint clears, delayed child spawns)
//! are explicit tasks keyed by fire tick, not captured closures. The
//! executor must re-check the owning entity's liveness before running
//! a task; a task whose owner died is silently dropped. That liveness
//! check is the only cancellation mechanism.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::components::EntityId;
use crate::data::EnemyKindId;
use crate::math::Vec2Fixed;

/// What a scheduled task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// End a telegraph window; the owner commits to its attack.
    TelegraphEnd,
    /// Clear a temporary visual tint on the owner.
    ClearTint,
    /// Spawn a child enemy at a position chosen when scheduled.
    SpawnChild {
        /// Kind of the child to spawn.
        kind: EnemyKindId,
        /// World position for the spawn.
        position: Vec2Fixed,
    },
}

/// A task scheduled for a future tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Tick at which the task fires.
    pub fire_tick: u64,
    /// Insertion sequence, used for deterministic ordering of
    /// same-tick tasks.
    pub seq: u64,
    /// Entity whose liveness gates execution.
    pub owner: EntityId,
    /// The effect to apply.
    pub kind: TaskKind,
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap behavior: earliest fire tick pops first, then
        // insertion order within a tick.
        match other.fire_tick.cmp(&self.fire_tick) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of deferred tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    queue: BinaryHeap<ScheduledTask>,
    next_seq: u64,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire for `owner` at `fire_tick`.
    pub fn schedule(&mut self, fire_tick: u64, owner: EntityId, kind: TaskKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledTask {
            fire_tick,
            seq,
            owner,
            kind,
        });
    }

    /// Pop every task due at or before `current_tick`, in fire order.
    pub fn drain_due(&mut self, current_tick: u64) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        while let Some(task) = self.queue.peek() {
            if task.fire_tick > current_tick {
                break;
            }
            due.push(self.queue.pop().unwrap_or_else(|| unreachable!()));
        }
        due
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check whether no tasks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_fire_in_tick_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(10, 1, TaskKind::ClearTint);
        scheduler.schedule(5, 2, TaskKind::TelegraphEnd);

        let due = scheduler.drain_due(20);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].owner, 2);
        assert_eq!(due[1].owner, 1);
    }

    #[test]
    fn test_same_tick_tasks_keep_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(5, 1, TaskKind::TelegraphEnd);
        scheduler.schedule(5, 2, TaskKind::TelegraphEnd);
        scheduler.schedule(5, 3, TaskKind::TelegraphEnd);

        let due = scheduler.drain_due(5);
        let owners: Vec<_> = due.iter().map(|t| t.owner).collect();
        assert_eq!(owners, vec![1, 2, 3]);
    }

    #[test]
    fn test_future_tasks_stay_queued() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(100, 1, TaskKind::ClearTint);

        assert!(scheduler.drain_due(99).is_empty());
        assert_eq!(scheduler.len(), 1);

        assert_eq!(scheduler.drain_due(100).len(), 1);
        assert!(scheduler.is_empty());
    }
}
