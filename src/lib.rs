//! # Epoch Criteria
//!
//! Epoch-level criterion accumulation for training loops whose losses may live on a GPU.
//!
//! ## Features
//!
//! - Per-criterion running totals kept on the same device as the criterion values
//! - Sample counts derived from the minibatch layout, with a caller fallback
//! - Accumulate (`add`) and overwrite (`assign`) updates
//! - `EpochCriterion` snapshots with averaging, deltas, merging and NaN / infinity checks
//! - Optional CUDA backend (`cuda` feature)
//!
//! ```
//! use epoch_criteria::{cpu, CriterionAccumulator, ScalarNode};
//!
//! let mut acc = CriterionAccumulator::new(1, cpu()).unwrap();
//! let loss = vec![ScalarNode::new(3.0f32, cpu()).unwrap()];
//! acc.add(&loss, 0, 10).unwrap().add(&loss, 0, 5).unwrap();
//! assert_eq!(acc.get_criterion(0).unwrap().aggregate_sample_count, 15);
//! ```
pub mod backend;
pub mod config;
pub mod criterion;

// Re-export commonly used types for convenience
pub use backend::{CriterionN, Device, cpu, default_device};
#[cfg(feature = "cuda")]
pub use backend::cuda;

pub use config::CriteriaConfig;
pub use criterion::{
    CriterionAccumulator, CriterionSource, EpochCriterion, EpochSummary, MinibatchLayout,
    ScalarNode,
};
