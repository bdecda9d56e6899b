// src/criterion/epoch.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// An accumulated criterion: the summed value and the number of samples it was summed over.
/// The criterion itself is their ratio, see [`EpochCriterion::average`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpochCriterion {
    /// Summed numerator, e.g. the summed negative log-likelihood of the span.
    pub aggregate_value: f64,
    /// Number of samples that contributed to `aggregate_value`.
    pub aggregate_sample_count: u64,
}

impl EpochCriterion {
    pub fn new(aggregate_value: f64, aggregate_sample_count: u64) -> Self {
        Self {
            aggregate_value,
            aggregate_sample_count,
        }
    }

    /// Sentinel that compares worse than any real criterion.
    pub fn infinity() -> Self {
        Self::new(f64::INFINITY, 0)
    }

    /// Per-sample criterion. A criterion without samples averages to 0,
    /// except the infinity sentinel which stays infinite.
    pub fn average(&self) -> f64 {
        if self.aggregate_sample_count > 0 {
            self.aggregate_value / self.aggregate_sample_count as f64
        } else if self.is_infinity() {
            f64::INFINITY
        } else {
            0.0
        }
    }

    pub fn is_nan(&self) -> bool {
        self.aggregate_value.is_nan()
    }

    pub fn is_infinity(&self) -> bool {
        self.aggregate_value == f64::INFINITY
    }
}

// Difference of two cumulative snapshots. Not clamped: subtracting a later snapshot
// from an earlier one wraps the count rather than failing. Counts are modular under
// both `-` and `+=`, so `(a - b) + b == a` always holds for the count.
impl Sub for EpochCriterion {
    type Output = EpochCriterion;

    fn sub(self, other: EpochCriterion) -> EpochCriterion {
        EpochCriterion::new(
            self.aggregate_value - other.aggregate_value,
            self.aggregate_sample_count
                .wrapping_sub(other.aggregate_sample_count),
        )
    }
}

impl AddAssign for EpochCriterion {
    fn add_assign(&mut self, other: EpochCriterion) {
        self.aggregate_value += other.aggregate_value;
        self.aggregate_sample_count = self
            .aggregate_sample_count
            .wrapping_add(other.aggregate_sample_count);
    }
}

impl Add for EpochCriterion {
    type Output = EpochCriterion;

    fn add(mut self, other: EpochCriterion) -> EpochCriterion {
        self += other;
        self
    }
}

impl Sum for EpochCriterion {
    fn sum<I: Iterator<Item = EpochCriterion>>(iter: I) -> Self {
        iter.fold(EpochCriterion::default(), |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a EpochCriterion> for EpochCriterion {
    fn sum<I: Iterator<Item = &'a EpochCriterion>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for EpochCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.8} * {}",
            self.average(),
            self.aggregate_sample_count
        )
    }
}
