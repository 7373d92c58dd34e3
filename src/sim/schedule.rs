/// Entity-keyed timed continuations.
///
/// Every task belongs to one entity and is stamped with that entity's epoch
/// at scheduling time. `cancel(id)` bumps the epoch, so everything the entity
/// had pending becomes stale; `forget(id)` does the same for removed
/// entities. Stale tasks are dropped when they come due.
///
/// Due tasks fire in (due time, scheduling order).

use std::collections::{BTreeMap, HashMap};

use crate::domain::entity::EntityId;

/// What to do when a task comes due.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskAction {
    /// Roll the next wander step.
    Walk,
    /// Red dog recovers from a kick.
    ResumeAfterKick,
    /// Red dog finished sinking; despawn it.
    FinishSink,
}

#[derive(Clone, Copy, Debug)]
struct Task {
    entity: EntityId,
    epoch: u32,
    action: TaskAction,
}

/// Ordered by due time (as bit-exact f64 key) then sequence number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct Key {
    due_bits: u64,
    seq: u64,
}

#[derive(Default, Debug)]
pub struct Scheduler {
    queue: BTreeMap<Key, Task>,
    epochs: HashMap<EntityId, u32>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Queue `action` for `entity` at absolute time `due` (seconds).
    pub fn schedule(&mut self, entity: EntityId, due: f64, action: TaskAction) {
        let epoch = *self.epochs.entry(entity).or_insert(0);
        let key = Key { due_bits: order_bits(due), seq: self.next_seq };
        self.next_seq += 1;
        self.queue.insert(key, Task { entity, epoch, action });
    }

    /// Invalidate everything pending for `entity`.
    pub fn cancel(&mut self, entity: EntityId) {
        let epoch = self.epochs.entry(entity).or_insert(0);
        *epoch = epoch.wrapping_add(1);
        self.queue.retain(|_, t| t.entity != entity);
    }

    /// Entity removed from the world: drop its tasks and its epoch.
    pub fn forget(&mut self, entity: EntityId) {
        self.cancel(entity);
        self.epochs.remove(&entity);
    }

    /// Pop every live task due at or before `now`, in firing order.
    pub fn take_due(&mut self, now: f64) -> Vec<(EntityId, TaskAction)> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if f64_from_order_bits(entry.key().due_bits) > now {
                break;
            }
            let task = entry.remove();
            if self.epochs.get(&task.entity) == Some(&task.epoch) {
                due.push((task.entity, task.action));
            }
        }
        due
    }

    #[cfg(test)]
    pub fn pending_for(&self, entity: EntityId) -> usize {
        self.queue.values().filter(|t| t.entity == entity).count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Total order on non-negative and negative finite f64 as u64.
fn order_bits(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits >> 63 == 0 { bits | (1 << 63) } else { !bits }
}

fn f64_from_order_bits(bits: u64) -> f64 {
    if bits >> 63 == 1 { f64::from_bits(bits & !(1 << 63)) } else { f64::from_bits(!bits) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);

    #[test]
    fn fires_in_due_order_then_fifo() {
        let mut s = Scheduler::new();
        s.schedule(A, 2.0, TaskAction::Walk);
        s.schedule(B, 1.0, TaskAction::Walk);
        s.schedule(A, 1.0, TaskAction::ResumeAfterKick);
        assert!(s.take_due(0.5).is_empty());
        assert_eq!(
            s.take_due(1.0),
            vec![(B, TaskAction::Walk), (A, TaskAction::ResumeAfterKick)]
        );
        assert_eq!(s.take_due(5.0), vec![(A, TaskAction::Walk)]);
        assert!(s.is_empty());
    }

    #[test]
    fn cancel_only_affects_one_entity() {
        let mut s = Scheduler::new();
        s.schedule(A, 1.0, TaskAction::Walk);
        s.schedule(B, 1.0, TaskAction::Walk);
        s.cancel(A);
        assert_eq!(s.pending_for(A), 0);
        assert_eq!(s.take_due(1.0), vec![(B, TaskAction::Walk)]);

        // new work after cancel still fires
        s.schedule(A, 2.0, TaskAction::ResumeAfterKick);
        assert_eq!(s.take_due(2.0), vec![(A, TaskAction::ResumeAfterKick)]);
    }

    #[test]
    fn forgotten_entity_never_fires() {
        let mut s = Scheduler::new();
        s.schedule(A, 0.1, TaskAction::Walk);
        s.forget(A);
        assert!(s.take_due(10.0).is_empty());
    }

    #[test]
    fn order_bits_is_monotonic() {
        let vals = [-3.5, -0.0, 0.0, 0.25, 1.0, 1e9];
        for w in vals.windows(2) {
            assert!(order_bits(w[0]) <= order_bits(w[1]), "{} vs {}", w[0], w[1]);
        }
        for v in vals {
            assert_eq!(f64_from_order_bits(order_bits(v)), v);
        }
    }
}
