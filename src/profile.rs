//! Static per-model JSON profile, grounded on `boost::property_tree`-based reads in
//! `original_source/efair/executor/executor.cpp` and the record shape produced by
//! `original_source/efair/profiler/profile_dnn.cpp`.
//!
//! Shape: `{ model_name, exec_time: {freq: us}, energy: {freq: uJ}, gpu_power: {freq: mW},
//! kernels: [name, ...], kernel_profile: { name: { exec_time: {freq: us} } } }`.
//!
//! The `kernels` field (an explicit ordered kernel list) is an addition over the
//! distilled JSON shape: the original source gets kernel order from a TVM module
//! function (`get_kernel_name`) that has no Rust-native equivalent here, so the
//! profile itself carries the order for our in-process `Executor` stand-in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EfairError, Result};

pub type MicroSeconds = u64;
pub type MicroJoule = u64;
pub type MilliWatt = u64;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelProfile {
    pub exec_time: BTreeMap<String, MicroSeconds>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub model_name: String,
    #[serde(default)]
    pub exec_time: BTreeMap<String, MicroSeconds>,
    #[serde(default)]
    pub energy: BTreeMap<String, MicroJoule>,
    pub gpu_power: BTreeMap<String, MilliWatt>,
    pub kernels: Vec<String>,
    pub kernel_profile: BTreeMap<String, KernelProfile>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EfairError::Fail(format!("reading profile {path:?}: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| EfairError::Fail(format!("parsing profile {path:?}: {e}")))
    }

    /// `get_gpu_power` of the executor contract: power at a given frequency.
    pub fn power_at(&self, freq: &str) -> Result<MilliWatt> {
        self.gpu_power
            .get(freq)
            .copied()
            .ok_or_else(|| EfairError::NotFound(format!("no gpu_power entry for freq {freq}")))
    }

    /// `get_max_gpu_power`: max over all frequencies in the profile.
    pub fn max_power(&self) -> MilliWatt {
        self.gpu_power.values().copied().max().unwrap_or(0)
    }

    pub fn num_kernels(&self) -> usize {
        self.kernels.len()
    }

    pub fn kernel_name(&self, idx: usize) -> Result<&str> {
        self.kernels
            .get(idx)
            .map(|s| s.as_str())
            .ok_or_else(|| EfairError::Fail(format!("kernel index {idx} out of range")))
    }

    /// `execute_kernel(idx, freq)`'s profiled time lookup.
    pub fn kernel_exec_time(&self, idx: usize, freq: &str) -> Result<MicroSeconds> {
        let name = self.kernel_name(idx)?;
        let kp = self
            .kernel_profile
            .get(name)
            .ok_or_else(|| EfairError::NotFound(format!("no kernel_profile entry for {name}")))?;
        kp.exec_time
            .get(freq)
            .copied()
            .ok_or_else(|| EfairError::NotFound(format!("no exec_time for {name} at {freq}")))
    }

    /// energy = gpu_power[freq] * time * 1e-3, per the executor contract in §6.
    pub fn kernel_energy(&self, idx: usize, freq: &str) -> Result<MicroJoule> {
        let time_used = self.kernel_exec_time(idx, freq)?;
        let power = self.power_at(freq)?;
        Ok(((power as f64) * (time_used as f64) * 1e-3) as MicroJoule)
    }
}
