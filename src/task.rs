//! Task lifecycle (§3 "Task", §4.6): submit -> start -> finished, with per-task
//! timestamps/accounting and condition-variable-style completion signalling.
//! Grounded on `EFairScheduler::Task` in
//! `original_source/efair/scheduler/scheduler.h` and its `wait_task`/`cv.notify_all`
//! pairing in `scheduler.cpp`.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::entity::EntityId;
use crate::error::{EfairError, Result};
use crate::model::ModelId;

pub type TaskId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    Started,
    Finished,
}

struct TaskInner {
    state: TaskState,
    kernel_idx: usize,
    submit_t: Instant,
    start_t: Option<Instant>,
    end_t: Option<Instant>,
    service_time_us: u64,
    energy_used_uj: u64,
    /// Set at scheduler shutdown for tasks still pending, per the additive safety
    /// decision in `DESIGN.md`: waiters are woken with an error instead of hanging
    /// forever.
    abandoned: bool,
}

pub struct Task {
    pub id: TaskId,
    pub model_id: ModelId,
    pub entity_id: EntityId,
    inner: Mutex<TaskInner>,
    cv: Condvar,
}

impl Task {
    fn new(id: TaskId, model_id: ModelId, entity_id: EntityId) -> Self {
        Self {
            id,
            model_id,
            entity_id,
            inner: Mutex::new(TaskInner {
                state: TaskState::Submitted,
                kernel_idx: 0,
                submit_t: Instant::now(),
                start_t: None,
                end_t: None,
                service_time_us: 0,
                energy_used_uj: 0,
                abandoned: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    pub fn kernel_idx(&self) -> usize {
        self.inner.lock().kernel_idx
    }

    pub fn submit_t(&self) -> Instant {
        self.inner.lock().submit_t
    }

    pub fn start_t(&self) -> Option<Instant> {
        self.inner.lock().start_t
    }

    pub fn end_t(&self) -> Option<Instant> {
        self.inner.lock().end_t
    }

    pub fn service_time_us(&self) -> u64 {
        self.inner.lock().service_time_us
    }

    pub fn energy_used_uj(&self) -> u64 {
        self.inner.lock().energy_used_uj
    }

    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Response time = end_t - start_t, only defined once Finished (§4.6).
    pub fn response_time_us(&self) -> Option<u64> {
        let g = self.inner.lock();
        match (g.start_t, g.end_t) {
            (Some(s), Some(e)) => Some((e - s).as_micros() as u64),
            _ => None,
        }
    }

    /// Scheduler-only: Submitted -> Started the first time one of its kernels is
    /// dispatched.
    pub fn mark_started(&self) {
        let mut g = self.inner.lock();
        if g.state == TaskState::Submitted {
            g.state = TaskState::Started;
            g.start_t = Some(Instant::now());
        }
    }

    /// Scheduler-only: accumulate one kernel's profiled time/energy and advance
    /// `kernel_idx`.
    pub fn record_kernel(&self, time_used_us: u64, energy_used_uj: u64) {
        let mut g = self.inner.lock();
        g.kernel_idx += 1;
        g.service_time_us += time_used_us;
        g.energy_used_uj += energy_used_uj;
    }

    /// Scheduler-only: Started -> Finished, stamps `end_t`, wakes all waiters.
    pub fn finish(&self) {
        {
            let mut g = self.inner.lock();
            g.state = TaskState::Finished;
            g.end_t = Some(Instant::now());
        }
        self.cv.notify_all();
    }

    fn abandon(&self) {
        {
            let mut g = self.inner.lock();
            g.abandoned = true;
        }
        self.cv.notify_all();
    }

    /// Blocks the caller until the task reaches Finished, or returns an error if
    /// the scheduler is shut down with this task still pending.
    pub fn wait(&self) -> Result<()> {
        let mut g = self.inner.lock();
        self.cv
            .wait_while(&mut g, |s| s.state != TaskState::Finished && !s.abandoned);
        if g.state == TaskState::Finished {
            Ok(())
        } else {
            Err(EfairError::Fail("scheduler shut down".to_string()))
        }
    }
}

#[derive(Default)]
pub struct TaskPool {
    next_id: AtomicUsize,
    tasks: Mutex<HashMap<TaskId, Arc<Task>>>,
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_task(&self, model_id: ModelId, entity_id: EntityId) -> Arc<Task> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(Task::new(id, model_id, entity_id));
        self.tasks.lock().insert(id, Arc::clone(&task));
        task
    }

    pub fn get(&self, tid: TaskId) -> Result<Arc<Task>> {
        self.tasks
            .lock()
            .get(&tid)
            .cloned()
            .ok_or_else(|| EfairError::NotFound(format!("task {tid} not found")))
    }

    pub fn all_finished(&self) -> Vec<Arc<Task>> {
        self.tasks
            .lock()
            .values()
            .filter(|t| t.is_finished())
            .cloned()
            .collect()
    }

    /// Wake every still-pending waiter with an error at shutdown (see `DESIGN.md`).
    pub fn abandon_pending(&self) {
        for task in self.tasks.lock().values() {
            if !task.is_finished() {
                task.abandon();
            }
        }
    }
}
