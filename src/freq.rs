//! DVFS frequency controller, grounded on `efair::util::FrequencyController` in
//! `original_source/efair/util/chfreq.cpp`.
//!
//! The governor exposes three sysfs-style endpoints (`min_freq`, `max_freq`,
//! read-only `cur_freq`) plus an enumeration and a power sensor. Writing `min`/`max`
//! in the wrong order can momentarily invert the `[min, max]` interval and be
//! rejected by the kernel; this controller serialises writes on a dedicated worker
//! and always writes the endpoint that widens the interval first.
//!
//! [`Governor`] abstracts the sysfs I/O so the controller can be driven by a real
//! filesystem backend or, for tests and environments without the accelerator, an
//! in-memory [`MockGovernor`] — stubbing the unavailable hardware while keeping
//! the surrounding dispatch logic real.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::GovernorPaths;
use crate::error::{EfairError, Result};

pub trait Governor: Send + Sync {
    fn read_cur_freq(&self) -> Result<String>;
    fn available_frequencies(&self) -> Result<Vec<String>>;
    fn write_min_freq(&self, freq: &str) -> Result<()>;
    fn write_max_freq(&self, freq: &str) -> Result<()>;
    fn read_power_mw(&self) -> Result<u64>;
}

/// Real sysfs-backed governor.
pub struct SysfsGovernor {
    paths: GovernorPaths,
}

impl SysfsGovernor {
    pub fn new(paths: GovernorPaths) -> Self {
        Self { paths }
    }

    fn read_line(path: &str) -> Result<String> {
        std::fs::read_to_string(path)
            .map(|s| s.trim().to_string())
            .map_err(|e| EfairError::Fail(format!("reading {path}: {e}")))
    }

    fn write(path: &str, value: &str) -> Result<()> {
        std::fs::write(path, value)
            .map_err(|e| EfairError::NoPrivilege(format!("writing {path}: {e}")))
    }
}

impl Governor for SysfsGovernor {
    fn read_cur_freq(&self) -> Result<String> {
        Self::read_line(&self.paths.cur_freq)
    }

    fn available_frequencies(&self) -> Result<Vec<String>> {
        let content = Self::read_line(&self.paths.available_frequencies)?;
        Ok(content.split_whitespace().map(|s| s.to_string()).collect())
    }

    fn write_min_freq(&self, freq: &str) -> Result<()> {
        Self::write(&self.paths.min_freq, freq)
    }

    fn write_max_freq(&self, freq: &str) -> Result<()> {
        Self::write(&self.paths.max_freq, freq)
    }

    fn read_power_mw(&self) -> Result<u64> {
        let line = Self::read_line(&self.paths.power_sensor)?;
        line.parse()
            .map_err(|e| EfairError::Fail(format!("parsing power sensor reading: {e}")))
    }
}

/// In-memory governor for tests and hardware-less demos: frequency writes take
/// effect instantly and a fixed power figure is reported.
pub struct MockGovernor {
    available: Vec<String>,
    cur: Mutex<String>,
    power_mw: u64,
}

impl MockGovernor {
    pub fn new(available: Vec<String>, power_mw: u64) -> Self {
        let cur = available.first().cloned().unwrap_or_default();
        Self {
            available,
            cur: Mutex::new(cur),
            power_mw,
        }
    }
}

impl Governor for MockGovernor {
    fn read_cur_freq(&self) -> Result<String> {
        Ok(self.cur.lock().clone())
    }

    fn available_frequencies(&self) -> Result<Vec<String>> {
        Ok(self.available.clone())
    }

    fn write_min_freq(&self, freq: &str) -> Result<()> {
        *self.cur.lock() = freq.to_string();
        Ok(())
    }

    fn write_max_freq(&self, freq: &str) -> Result<()> {
        *self.cur.lock() = freq.to_string();
        Ok(())
    }

    fn read_power_mw(&self) -> Result<u64> {
        Ok(self.power_mw)
    }
}

struct SharedState {
    cur_frequency: String,
    target_frequency: String,
    shutdown: bool,
}

pub struct FrequencyController {
    governor: Arc<dyn Governor>,
    state: Arc<(Mutex<SharedState>, Condvar)>,
    idx_to_freq: Vec<String>,
    freq_to_idx: HashMap<String, usize>,
    worker: Option<JoinHandle<()>>,
}

impl FrequencyController {
    pub fn new(governor: Arc<dyn Governor>) -> Result<Self> {
        let cur_frequency = governor.read_cur_freq()?;
        let available = governor.available_frequencies()?;

        let mut idx_to_freq = Vec::with_capacity(available.len());
        let mut freq_to_idx = HashMap::with_capacity(available.len());
        for (i, f) in available.into_iter().enumerate() {
            freq_to_idx.insert(f.clone(), i);
            idx_to_freq.push(f);
        }

        let state = Arc::new((
            Mutex::new(SharedState {
                cur_frequency: cur_frequency.clone(),
                target_frequency: cur_frequency,
                shutdown: false,
            }),
            Condvar::new(),
        ));

        let worker = {
            let state = Arc::clone(&state);
            let governor = Arc::clone(&governor);
            std::thread::spawn(move || Self::worker_loop(state, governor))
        };

        Ok(Self {
            governor,
            state,
            idx_to_freq,
            freq_to_idx,
            worker: Some(worker),
        })
    }

    fn worker_loop(state: Arc<(Mutex<SharedState>, Condvar)>, governor: Arc<dyn Governor>) {
        let (lock, cv) = &*state;
        loop {
            let target = {
                let mut guard = lock.lock();
                cv.wait_while(&mut guard, |s| {
                    !s.shutdown && s.target_frequency == s.cur_frequency
                });
                if guard.shutdown {
                    return;
                }
                guard.target_frequency.clone()
            };

            let observed = Self::reconcile(&governor, &lock.lock().cur_frequency, &target)
                .expect("frequency controller: DVFS write failed, accounting would be invalid");

            let mut guard = lock.lock();
            guard.cur_frequency = observed;
        }
    }

    /// Writes `min`/`max` in the order that never inverts the interval, then reads
    /// back `cur_freq` and asserts it matches the target.
    fn reconcile(governor: &Arc<dyn Governor>, cur: &str, target: &str) -> Result<String> {
        let cur_num: i64 = cur
            .parse()
            .map_err(|e| EfairError::Fail(format!("parsing current freq {cur}: {e}")))?;
        let target_num: i64 = target
            .parse()
            .map_err(|e| EfairError::Fail(format!("parsing target freq {target}: {e}")))?;

        if target_num > cur_num {
            governor.write_max_freq(target)?;
            governor.write_min_freq(target)?;
        } else if target_num < cur_num {
            governor.write_min_freq(target)?;
            governor.write_max_freq(target)?;
        }

        let observed = governor.read_cur_freq()?;
        if observed != target {
            return Err(EfairError::Fail(format!(
                "frequency did not reconcile: wanted {target}, observed {observed}"
            )));
        }
        Ok(observed)
    }

    /// Returns the last-requested target, not necessarily the hardware value yet.
    pub fn get_frequency(&self) -> String {
        self.state.0.lock().target_frequency.clone()
    }

    /// Sets target and wakes the worker; returns immediately (idempotent).
    pub fn set_cur_frequency(&self, freq: &str) {
        let (lock, cv) = &*self.state;
        {
            let mut guard = lock.lock();
            guard.target_frequency = freq.to_string();
        }
        cv.notify_one();
    }

    pub fn set_cur_frequency_by_index(&self, idx: usize) -> Result<()> {
        let freq = self
            .idx_to_freq
            .get(idx)
            .ok_or_else(|| EfairError::NotFound(format!("frequency index {idx} out of range")))?;
        self.set_cur_frequency(freq);
        Ok(())
    }

    pub fn index_of(&self, freq: &str) -> Result<usize> {
        self.freq_to_idx
            .get(freq)
            .copied()
            .ok_or_else(|| EfairError::NotFound(format!("unknown frequency {freq}")))
    }

    pub fn get_available_frequencies(&self) -> &[String] {
        &self.idx_to_freq
    }

    pub fn get_gpu_power(&self) -> Result<u64> {
        self.governor.read_power_mw()
    }

    pub fn shutdown(&mut self) {
        {
            let (lock, cv) = &*self.state;
            lock.lock().shutdown = true;
            cv.notify_one();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        tracing::info!("frequency controller: shutdown");
    }
}

impl Drop for FrequencyController {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}
