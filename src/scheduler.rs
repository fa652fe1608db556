//! The scheduler core (§4.5): wires the entity registry, model pool, task pool,
//! virtual-time index, slice allocator, and frequency controller into the
//! dispatch loop. Grounded on `EFairScheduler` in
//! `original_source/efair/scheduler/scheduler.cpp` — `new_task`'s
//! seed-vruntime-at-min rule, `loop_body`'s quantum dispatch, and
//! `run`/`shutdown`'s scheduler-thread lifecycle carry over essentially
//! unchanged; only the lock discipline is reshaped to avoid holding more than
//! one entity lock at a time (see `DESIGN.md`).

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::config::SchedulerConfig;
use crate::entity::{EntityId, Registry};
use crate::error::{EfairError, Result};
use crate::freq::{FrequencyController, Governor};
use crate::model::{Model, ModelId, ModelPool};
use crate::priority::Priority;
use crate::profile::Profile;
use crate::slice;
use crate::task::{Task, TaskId, TaskPool};
use crate::vtree::VTree;

pub struct Scheduler {
    config: SchedulerConfig,
    registry: Registry,
    models: ModelPool,
    tasks: TaskPool,
    vtree: Mutex<VTree>,
    freq: Mutex<FrequencyController>,
    shutdown: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, governor: Arc<dyn Governor>) -> Result<Arc<Self>> {
        let freq = FrequencyController::new(governor)?;
        Ok(Arc::new(Self {
            config,
            registry: Registry::new(),
            models: ModelPool::new(),
            tasks: TaskPool::new(),
            vtree: Mutex::new(VTree::new()),
            freq: Mutex::new(freq),
            shutdown: AtomicBool::new(true),
            thread: Mutex::new(None),
        }))
    }

    pub fn create_entity(&self, priority: Priority) -> Result<EntityId> {
        self.registry.create_entity(priority)
    }

    /// Takes effect at the next slice recomputation (§4.2) — no coordination
    /// with the running scheduler thread is required.
    pub fn set_entity_priority(&self, id: EntityId, priority: Priority) -> Result<()> {
        self.registry.set_priority(id, priority)
    }

    pub fn load_model(
        &self,
        model_path: &Path,
        profile: Profile,
        entity_id: EntityId,
        freq: String,
    ) -> Result<ModelId> {
        let entity_arc = self.registry.get(entity_id)?;
        let model = self.models.insert(entity_id, model_path, profile, freq)?;

        {
            let mut entity = entity_arc.lock();
            if model.max_power > entity.max_power {
                entity.max_power = model.max_power;
            }
        }

        let avg_power = self.models.avg_power_for_entity(entity_id)?;
        entity_arc.lock().avg_power = avg_power;

        tracing::info!(
            model = model.id,
            entity = entity_id,
            max_power = model.max_power,
            power = model.power,
            "scheduler: model loaded"
        );
        tracing::info!(entity = entity_id, avg_power, "scheduler: entity average power updated");

        Ok(model.id)
    }

    /// Enqueues a new task on its model's owning entity. If the entity was idle
    /// (an empty FCFS queue), it is seeded into the virtual-time index at the
    /// current minimum vruntime (or zero if the index is empty) and slices are
    /// recomputed for the whole indexed set.
    pub fn new_task(&self, model_id: ModelId) -> Result<Arc<Task>> {
        let model = self.models.get(model_id)?;
        let entity_id = model.entity_id;
        let task = self.tasks.new_task(model_id, entity_id);

        let entity_arc = self.registry.get(entity_id)?;
        let became_runnable = {
            let mut entity = entity_arc.lock();
            entity.fcfs_queue.push_back(Arc::clone(&task));
            entity.fcfs_queue.len() == 1
        };

        if became_runnable {
            let mut vtree = self.vtree.lock();
            let vruntime = vtree.min().map(|(_, v)| v).unwrap_or(0.0);
            entity_arc.lock().vruntime = vruntime;
            vtree.insert(entity_id, vruntime);
            self.recompute_slices(&vtree)?;

            tracing::debug!(entity = entity_id, vruntime, "scheduler: entity became runnable");
        }

        Ok(task)
    }

    pub fn wait_task(&self, tid: TaskId) -> Result<()> {
        self.tasks.get(tid)?.wait()
    }

    pub fn get_task(&self, tid: TaskId) -> Result<Arc<Task>> {
        self.tasks.get(tid)
    }

    /// The frequency controller's last-requested target (§4.1).
    pub fn current_frequency(&self) -> String {
        self.freq.lock().get_frequency()
    }

    /// Recompute `sched_slice_us` for every entity indexed in `vtree`, per §4.4.
    /// Locks at most one entity at a time — never the whole indexed set at once.
    fn recompute_slices(&self, vtree: &VTree) -> Result<()> {
        let ids = vtree.ids();
        if ids.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let entity_arc = self.registry.get(*id)?;
            let entity = entity_arc.lock();
            entries.push((*id, entity.weight, entity.avg_power));
        }

        let slices = slice::compute_slices(
            &entries,
            self.config.total_quantum_size_us,
            self.config.alpha,
            self.config.min_sched_unit_us,
        );

        for (id, sched_slice_us) in slices {
            let entity_arc = self.registry.get(id)?;
            entity_arc.lock().sched_slice_us = sched_slice_us;
        }

        Ok(())
    }

    /// One scheduling quantum: picks the entity with the smallest vruntime,
    /// dispatches its queued tasks' kernels until the slice is exhausted or the
    /// queue drains, then updates vruntime and re-indexes (or recomputes slices
    /// if the entity went idle).
    fn loop_body(&self) {
        let cur_entity_id = match self.vtree.lock().min() {
            Some((id, _)) => id,
            None => return,
        };

        let entity_arc = match self.registry.get(cur_entity_id) {
            Ok(e) => e,
            Err(_) => {
                self.vtree.lock().erase(cur_entity_id);
                return;
            }
        };

        let quantum_size = entity_arc.lock().sched_slice_us;
        let start_t = Instant::now();
        let mut time_meter: u64 = 0;
        let mut last_model: Option<Arc<Model>> = None;

        loop {
            if time_meter >= quantum_size {
                break;
            }
            let task = {
                let entity = entity_arc.lock();
                entity.fcfs_queue.front().cloned()
            };
            let task = match task {
                Some(t) => t,
                None => break,
            };

            task.mark_started();

            let model = match self.models.get(task.model_id) {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!(task = task.id, error = %e, "scheduler: model vanished mid-dispatch");
                    break;
                }
            };

            let cur_freq = self.freq.lock().get_frequency();
            if cur_freq != model.freq {
                self.freq.lock().set_cur_frequency(&model.freq);
            }

            let kernel_idx = task.kernel_idx();
            let (time_used, energy_used) = model
                .executor
                .execute_kernel(kernel_idx, &model.freq)
                .expect("kernel dispatch failed: accounting invariants are now invalid");
            time_meter += time_used;
            task.record_kernel(time_used, energy_used);

            if task.kernel_idx() == model.num_kernels {
                model.executor.sync();
                task.finish();
                entity_arc.lock().fcfs_queue.pop_front();
                tracing::info!(
                    task = task.id,
                    response_time_us = task.response_time_us(),
                    "scheduler: task finished"
                );
            }

            last_model = Some(model);
        }

        if let Some(model) = &last_model {
            model.executor.sync();
        }

        let duration_us = start_t.elapsed().as_micros() as u64;
        {
            let mut vtree = self.vtree.lock();
            vtree.erase(cur_entity_id);

            let still_busy = !entity_arc.lock().fcfs_queue.is_empty();
            if still_busy {
                if quantum_size > 0 {
                    entity_arc.lock().vruntime += time_meter as f64 / quantum_size as f64;
                }
                let vruntime = entity_arc.lock().vruntime;
                vtree.insert(cur_entity_id, vruntime);
            } else {
                let _ = self.recompute_slices(&vtree);
            }
        }

        entity_arc.lock().runtime_us += duration_us;
        tracing::debug!(
            entity = cur_entity_id,
            runtime_us = entity_arc.lock().runtime_us,
            quantum_duration_us = duration_us,
            "scheduler: quantum complete"
        );
    }

    /// Starts the scheduler thread. Fails if already running.
    pub fn run(self: &Arc<Self>) -> Result<()> {
        let mut guard = self.thread.lock();
        if guard.is_some() {
            return Err(EfairError::Fail("the scheduler has already run".to_string()));
        }

        self.shutdown.store(false, Ordering::SeqCst);
        let sched = Arc::clone(self);
        *guard = Some(std::thread::spawn(move || loop {
            sched.loop_body();
            if sched.shutdown.load(Ordering::SeqCst) {
                return;
            }
        }));

        tracing::info!("scheduler: started");
        Ok(())
    }

    /// Stops the scheduler thread and wakes any still-pending waiters with an
    /// error rather than leaving them blocked forever (see `DESIGN.md`).
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.tasks.abandon_pending();

        tracing::info!("scheduler: stopping");
        self.freq.lock().shutdown();

        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }

        tracing::info!("scheduler: stopped");
        Ok(())
    }

    pub fn summary_task_by_model(&self) {
        let mut time_stat: BTreeMap<ModelId, u64> = BTreeMap::new();
        let mut energy_stat: BTreeMap<ModelId, u64> = BTreeMap::new();

        for task in self.tasks.all_finished() {
            *time_stat.entry(task.model_id).or_insert(0) += task.service_time_us();
            *energy_stat.entry(task.model_id).or_insert(0) += task.energy_used_uj();
        }

        for (mid, t) in &time_stat {
            tracing::info!(model = mid, service_time_us = t, "scheduler: time usage summary");
        }
        for (mid, e) in &energy_stat {
            tracing::info!(model = mid, energy_used_uj = e, "scheduler: energy usage summary");
        }
    }

    pub fn export_task_data(&self, path: &Path) -> Result<()> {
        crate::export::write_csv(&self.tasks, path)
    }
}
