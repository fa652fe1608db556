//! Entity registry (§3 "Entity", §4.2), grounded on `EFairScheduler::ScheduleEntity`
//! and `create_entity`/`set_entity_priority` in
//! `original_source/efair/scheduler/scheduler.cpp`.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::priority::{weight_for, Priority, Weight};
use crate::profile::MilliWatt;
use crate::task::Task;

pub type EntityId = usize;

/// Mutable per-entity scheduling state, guarded by its own lock (§5). Invariant:
/// present in the virtual-time index iff `fcfs_queue` is non-empty (§3).
pub struct Entity {
    pub id: EntityId,
    pub weight: Weight,
    pub max_power: MilliWatt,
    pub avg_power: MilliWatt,
    pub vruntime: f64,
    pub sched_slice_us: u64,
    pub runtime_us: u64,
    pub fcfs_queue: VecDeque<Arc<Task>>,
}

impl Entity {
    fn new(id: EntityId, weight: Weight) -> Self {
        Self {
            id,
            weight,
            max_power: 0,
            avg_power: 0,
            vruntime: 0.0,
            sched_slice_us: 0,
            runtime_us: 0,
            fcfs_queue: VecDeque::new(),
        }
    }
}

#[derive(Default)]
pub struct Registry {
    next_id: AtomicUsize,
    entities: Mutex<HashMap<EntityId, Arc<Mutex<Entity>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&self, priority: Priority) -> Result<EntityId> {
        let weight = weight_for(priority)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entities
            .lock()
            .insert(id, Arc::new(Mutex::new(Entity::new(id, weight))));
        tracing::info!(entity = id, priority, weight, "entity: created");
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Result<Arc<Mutex<Entity>>> {
        self.entities
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| crate::error::EfairError::NotFound(format!("entity {id} not found")))
    }

    /// Takes effect at the next slice recomputation, per §4.2 — no coordination
    /// with the scheduler thread is required here.
    pub fn set_priority(&self, id: EntityId, priority: Priority) -> Result<()> {
        let weight = weight_for(priority)?;
        let entity = self.get(id)?;
        entity.lock().weight = weight;
        tracing::info!(entity = id, priority, weight, "entity: priority updated");
        Ok(())
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_entity_assigns_dense_ids() {
        let reg = Registry::new();
        let a = reg.create_entity(0).unwrap();
        let b = reg.create_entity(5).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.get(a).unwrap().lock().weight, 1024);
        assert_eq!(reg.get(b).unwrap().lock().weight, 335);
    }

    #[test]
    fn create_entity_rejects_out_of_range_priority() {
        let reg = Registry::new();
        assert!(reg.create_entity(21).is_err());
    }

    #[test]
    fn set_priority_updates_weight_in_place() {
        let reg = Registry::new();
        let eid = reg.create_entity(0).unwrap();
        reg.set_priority(eid, 10).unwrap();
        assert_eq!(reg.get(eid).unwrap().lock().weight, 110);
    }

    #[test]
    fn set_priority_on_unknown_entity_is_not_found() {
        let reg = Registry::new();
        assert!(reg.set_priority(999, 0).is_err());
    }
}
