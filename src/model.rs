//! Model pool (§3 "Model"): a compiled DNN bound to exactly one entity at a fixed
//! target frequency, grounded on `EFairScheduler::Model` in
//! `original_source/efair/scheduler/scheduler.h`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::entity::EntityId;
use crate::error::{EfairError, Result};
use crate::executor::Executor;
use crate::profile::{MilliWatt, Profile};

pub type ModelId = usize;

#[derive(Debug)]
pub struct Model {
    pub id: ModelId,
    pub entity_id: EntityId,
    pub freq: String,
    pub executor: Executor,
    pub num_kernels: usize,
    pub max_power: MilliWatt,
    pub power: MilliWatt,
}

#[derive(Default)]
pub struct ModelPool {
    next_id: AtomicUsize,
    models: Mutex<HashMap<ModelId, Arc<Model>>>,
}

impl ModelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an executor from `(model_path, profile)`, reads `power`, `max_power`,
    /// and `num_kernels` from the profile, and inserts the model. Does not touch
    /// entity accounting — the caller (the scheduler's `load_model`) updates the
    /// owning entity's `max_power`/`avg_power`.
    pub fn insert(
        &self,
        entity_id: EntityId,
        model_path: &Path,
        profile: Profile,
        freq: String,
    ) -> Result<Arc<Model>> {
        let power = profile
            .power_at(&freq)
            .map_err(|_| EfairError::NotFound(format!("no profile entry for freq {freq}")))?;
        let max_power = profile.max_power();
        let num_kernels = profile.num_kernels();

        let executor = Executor::new(model_path, profile).map_err(|e| EfairError::Fail(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let model = Arc::new(Model {
            id,
            entity_id,
            freq,
            executor,
            num_kernels,
            max_power,
            power,
        });

        self.models.lock().insert(id, Arc::clone(&model));
        Ok(model)
    }

    pub fn get(&self, mid: ModelId) -> Result<Arc<Model>> {
        self.models
            .lock()
            .get(&mid)
            .cloned()
            .ok_or_else(|| EfairError::NotFound(format!("model {mid} not found")))
    }

    /// Mean power, over models belonging to `entity_id`, at each model's configured
    /// frequency. Precondition (per §9 open question): only called after a
    /// successful `load_model`, so the entity is guaranteed to own at least one
    /// model.
    pub fn avg_power_for_entity(&self, entity_id: EntityId) -> Result<MilliWatt> {
        let models = self.models.lock();
        let (sum, count) = models
            .values()
            .filter(|m| m.entity_id == entity_id)
            .fold((0u64, 0u64), |(sum, count), m| (sum + m.power, count + 1));

        if count == 0 {
            return Err(EfairError::Fail(format!(
                "entity {entity_id} has no loaded models"
            )));
        }
        Ok(sum / count)
    }
}
