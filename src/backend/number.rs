// src/backend/number.rs

use rand_distr::num_traits::Zero;
use std::cmp::{PartialEq, PartialOrd};
use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Sub};

// Import cudarc traits only when cuda feature is enabled
#[cfg(feature = "cuda")]
use cudarc::driver::{DeviceRepr, ValidAsZeroBits};

/// Element type a criterion value can be produced in.
/// Criterion values are floating point; aggregates are always promoted to f64.
pub trait CriterionN:
    Add<Output = Self> + Sub<Output = Self> + AddAssign +
    PartialOrd + PartialEq +
    Clone + Copy + Debug + Display + Default + Zero +
    Send + Sync + 'static
{
    /// Tag used to pick the matching CUDA kernel and in log messages.
    const DTYPE: &'static str;

    /// Lossless for f32 and f64.
    fn to_f64(self) -> f64;

    /// Narrowing conversion. f32 may round.
    fn from_f64(value: f64) -> Self;
}

// ============= GPU TRAIT DEFINITIONS =============

/// CUDA-compatible criterion element.
#[cfg(feature = "cuda")]
pub trait CriterionCudaN: CriterionN + DeviceRepr + ValidAsZeroBits + Unpin {}

/// When CUDA is not available, CriterionCudaN is just an alias for CriterionN
#[cfg(not(feature = "cuda"))]
pub trait CriterionCudaN: CriterionN {}

impl CriterionN for f64 {
    const DTYPE: &'static str = "f64";

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

impl CriterionN for f32 {
    const DTYPE: &'static str = "f32";

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl CriterionCudaN for f64 {}
impl CriterionCudaN for f32 {}
