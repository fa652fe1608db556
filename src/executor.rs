//! Model executor façade, grounded on `efair::executor::Executor` in
//! `original_source/efair/executor/executor.cpp`, using a `thiserror` error enum
//! and `tracing` on the hot path to match the rest of the dispatch stack.
//!
//! The real implementation wraps an opaque model-runtime library (TVM, in the
//! original source) that loads a compiled DNN and dispatches individual kernels on
//! an accelerator. That library is an external collaborator out of this crate's
//! scope (§1); this type is the contract it must satisfy, backed deterministically
//! by the model's [`Profile`] so the scheduling core can be exercised and tested
//! without real hardware or a model runtime.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::profile::{MicroJoule, MicroSeconds, Profile};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("failed to load model {0:?}: {1}")]
    LoadFailed(PathBuf, String),

    #[error(transparent)]
    Profile(#[from] crate::error::EfairError),
}

/// A loaded, runnable model handle. One `Executor` is created per `load_model` call
/// and is permanently bound to the frequency the model was loaded with.
#[derive(Debug)]
pub struct Executor {
    pub model_name: String,
    model_path: PathBuf,
    profile: Profile,
}

impl Executor {
    pub fn new(model_path: &Path, profile: Profile) -> Result<Self, ExecutorError> {
        tracing::info!(
            model = %profile.model_name,
            path = %model_path.display(),
            "executor: loaded model"
        );
        Ok(Self {
            model_name: profile.model_name.clone(),
            model_path: model_path.to_path_buf(),
            profile,
        })
    }

    pub fn get_num_kernels(&self) -> usize {
        self.profile.num_kernels()
    }

    pub fn get_kernel_name(&self, idx: usize) -> Result<&str, ExecutorError> {
        Ok(self.profile.kernel_name(idx)?)
    }

    pub fn get_gpu_power(&self, freq: &str) -> Result<u64, ExecutorError> {
        Ok(self.profile.power_at(freq)?)
    }

    pub fn get_max_gpu_power(&self) -> u64 {
        self.profile.max_power()
    }

    /// Dispatch kernel `idx` at `freq`, returning the profiled `(time_used, energy_used)`
    /// pair. Non-blocking with respect to the device: the accelerator is modeled as
    /// dispatching asynchronously, reconciled by a later `sync()` call, matching the
    /// scheduler loop's contract in §4.5/§5.
    pub fn execute_kernel(
        &self,
        idx: usize,
        freq: &str,
    ) -> Result<(MicroSeconds, MicroJoule), ExecutorError> {
        let time_used = self.profile.kernel_exec_time(idx, freq)?;
        let energy_used = self.profile.kernel_energy(idx, freq)?;

        tracing::trace!(
            model = %self.model_name,
            kernel = idx,
            freq,
            time_used,
            energy_used,
            "executor: dispatched kernel"
        );

        Ok((time_used, energy_used))
    }

    /// Blocks until all previously dispatched kernels on this model have completed.
    pub fn sync(&self) {
        tracing::trace!(model = %self.model_name, "executor: synchronized");
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn profile_with_one_kernel() -> Profile {
        let mut gpu_power = BTreeMap::new();
        gpu_power.insert("1300500000".to_string(), 500);

        let mut k1 = BTreeMap::new();
        k1.insert("1300500000".to_string(), 1000);
        let mut kernel_profile = BTreeMap::new();
        kernel_profile.insert("conv1".to_string(), crate::profile::KernelProfile { exec_time: k1 });

        Profile {
            model_name: "resnet18".to_string(),
            exec_time: BTreeMap::new(),
            energy: BTreeMap::new(),
            gpu_power,
            kernels: vec!["conv1".to_string()],
            kernel_profile,
        }
    }

    #[test]
    fn execute_kernel_reports_profiled_time_and_energy() {
        let exec = Executor::new(Path::new("model.so"), profile_with_one_kernel()).unwrap();
        let (t, e) = exec.execute_kernel(0, "1300500000").unwrap();
        assert_eq!(t, 1000);
        assert_eq!(e, 500); // 500 mW * 1000 us * 1e-3
    }

    #[test]
    fn num_kernels_matches_profile() {
        let exec = Executor::new(Path::new("model.so"), profile_with_one_kernel()).unwrap();
        assert_eq!(exec.get_num_kernels(), 1);
        assert_eq!(exec.get_kernel_name(0).unwrap(), "conv1");
    }

    #[test]
    fn unknown_kernel_index_errors() {
        let exec = Executor::new(Path::new("model.so"), profile_with_one_kernel()).unwrap();
        assert!(exec.execute_kernel(5, "1300500000").is_err());
    }
}
