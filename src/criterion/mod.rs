//! Epoch-level criterion accumulation.
//!
//! A training loop produces, per minibatch, one scalar per criterion plus the number of samples
//! it covers. [`CriterionAccumulator`] folds those into per-criterion totals and
//! [`EpochCriterion`] turns a total back into an average.
mod accumulator;
mod epoch;
mod layout;
mod source;
mod summary;

mod tests;

pub use accumulator::CriterionAccumulator;
pub use epoch::EpochCriterion;
pub use layout::{MinibatchLayout, SequenceInfo};
pub use source::{CriterionSource, ScalarNode};
pub use summary::{EpochSummary, NamedCriterion};
