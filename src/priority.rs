//! Fixed priority -> weight table, reproducing Linux CFS's `sched_prio_to_weight`.
//! Reference weight (priority 0) is `WEIGHT_PRIO_0` = 1024.

use crate::error::{EfairError, Result};

pub type Priority = i32;
pub type Weight = u64;

pub const WEIGHT_PRIO_0: Weight = 1024;

const TABLE: [(Priority, Weight); 40] = [
    (-20, 88761),
    (-19, 71755),
    (-18, 56483),
    (-17, 46273),
    (-16, 36291),
    (-15, 29154),
    (-14, 23254),
    (-13, 18705),
    (-12, 14949),
    (-11, 11916),
    (-10, 9548),
    (-9, 7620),
    (-8, 6100),
    (-7, 4904),
    (-6, 3906),
    (-5, 3121),
    (-4, 2501),
    (-3, 1991),
    (-2, 1586),
    (-1, 1277),
    (0, 1024),
    (1, 820),
    (2, 655),
    (3, 526),
    (4, 423),
    (5, 335),
    (6, 272),
    (7, 215),
    (8, 172),
    (9, 137),
    (10, 110),
    (11, 87),
    (12, 70),
    (13, 56),
    (14, 45),
    (15, 36),
    (16, 29),
    (17, 23),
    (18, 18),
    (19, 15),
];

/// Look up the weight for a given priority. Fails `NotFound` for priorities
/// outside `[-20, 19]`.
pub fn weight_for(priority: Priority) -> Result<Weight> {
    TABLE
        .iter()
        .find(|(p, _)| *p == priority)
        .map(|(_, w)| *w)
        .ok_or_else(|| EfairError::NotFound(format!("priority {priority} out of range [-20, 19]")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_weight_is_1024() {
        assert_eq!(weight_for(0).unwrap(), WEIGHT_PRIO_0);
    }

    #[test]
    fn table_is_a_bijection_onto_forty_weights() {
        let weights: std::collections::BTreeSet<_> = TABLE.iter().map(|(_, w)| *w).collect();
        assert_eq!(weights.len(), 40);
        let priorities: std::collections::BTreeSet<_> = TABLE.iter().map(|(p, _)| *p).collect();
        assert_eq!(priorities.len(), 40);
    }

    #[test]
    fn out_of_range_is_not_found() {
        assert!(weight_for(-21).is_err());
        assert!(weight_for(20).is_err());
    }

    #[test]
    fn monotone_decreasing_with_priority() {
        let mut prev = Weight::MAX;
        for p in -20..=19 {
            let w = weight_for(p).unwrap();
            assert!(w <= prev, "weight should decrease as priority increases");
            prev = w;
        }
    }
}
