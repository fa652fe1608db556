//! Slice allocator (§4.4): blends weight-proportional fairness with an
//! energy-aware refinement pass. Grounded on
//! `EFairScheduler::compute_entity_schedule_slices` in
//! `original_source/efair/scheduler/scheduler.cpp`, including its two-pass
//! structure (proportional baseline up to `alpha * Q`, then a min-energy-first
//! refinement of the remainder).

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::entity::EntityId;
use crate::priority::{Weight, WEIGHT_PRIO_0};
use crate::profile::MilliWatt;

#[derive(Clone, Copy, Debug, PartialEq)]
struct EKey(f64);

impl Eq for EKey {}
impl PartialOrd for EKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for EKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Recompute `sched_slice` (microseconds) for every entity in `entries`, within a
/// total quantum of `total_quantum_us`, blend factor `alpha` in `(0, 1]`, and
/// refinement granularity `min_unit_us`. Returns an empty map for an empty input
/// (§4.4: "Slice allocation is re-run whenever the indexed set changes").
pub fn compute_slices(
    entries: &[(EntityId, Weight, MilliWatt)],
    total_quantum_us: u64,
    alpha: f64,
    min_unit_us: u64,
) -> HashMap<EntityId, u64> {
    if entries.is_empty() {
        return HashMap::new();
    }

    let total_weight: u64 = entries.iter().map(|(_, w, _)| *w).sum();
    let weight0 = WEIGHT_PRIO_0 as f64;

    let mut slices: HashMap<EntityId, u64> = HashMap::with_capacity(entries.len());
    let mut power_of: HashMap<EntityId, u64> = HashMap::with_capacity(entries.len());
    let mut weight_of: HashMap<EntityId, u64> = HashMap::with_capacity(entries.len());
    let mut energy_set: BTreeSet<(EKey, EntityId)> = BTreeSet::new();

    let mut remaining: i64 = total_quantum_us as i64;

    for (id, weight, power) in entries {
        let fraction = *weight as f64 / total_weight as f64;
        let base = (fraction * alpha * total_quantum_us as f64) as u64;
        remaining -= base as i64;

        let w_ratio = weight0 / (*weight as f64);
        let energy_e = (*power as f64) * 1e-3 * (base as f64) * w_ratio;

        slices.insert(*id, base);
        power_of.insert(*id, *power);
        weight_of.insert(*id, *weight);
        energy_set.insert((EKey(energy_e), *id));
    }

    while remaining > 0 {
        let amount = remaining.min(min_unit_us.max(1) as i64) as u64;

        let min_entry = *energy_set
            .iter()
            .next()
            .expect("non-empty energy_set while remaining > 0");
        energy_set.remove(&min_entry);
        let (_, min_id) = min_entry;

        let new_slice = slices[&min_id] + amount;
        slices.insert(min_id, new_slice);

        let weight = weight_of[&min_id];
        let power = power_of[&min_id];
        let w_ratio = weight0 / (weight as f64);
        let energy_e = (power as f64) * 1e-3 * (new_slice as f64) * w_ratio;
        energy_set.insert((EKey(energy_e), min_id));

        remaining -= amount as i64;
    }

    slices
}
