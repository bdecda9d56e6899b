// src/criterion/summary.rs
use super::accumulator::CriterionAccumulator;
use super::epoch::EpochCriterion;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCriterion {
    pub name: String,
    pub criterion: EpochCriterion,
}

/// Criteria of one finished epoch, ready for the logging layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// 1-based epoch number.
    pub epoch: usize,
    pub criteria: Vec<NamedCriterion>,
}

impl EpochSummary {
    /// Pairs every slot of `accumulator` with its name.
    pub fn from_accumulator(
        epoch: usize,
        names: &[String],
        accumulator: &CriterionAccumulator,
    ) -> Result<Self, String> {
        if names.len() != accumulator.num_criteria() {
            return Err(format!(
                "{} criterion names given for {} accumulated criteria",
                names.len(),
                accumulator.num_criteria()
            ));
        }

        let criteria = names
            .iter()
            .zip(accumulator.criteria()?)
            .map(|(name, criterion)| NamedCriterion {
                name: name.clone(),
                criterion,
            })
            .collect::<Vec<_>>();

        let summary = Self { epoch, criteria };
        if summary.any_nan() {
            log::warn!("epoch {} produced a NaN criterion: {}", epoch, summary);
        }
        Ok(summary)
    }

    pub fn get(&self, name: &str) -> Option<&EpochCriterion> {
        self.criteria
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.criterion)
    }

    /// True when training diverged on any criterion.
    pub fn any_nan(&self) -> bool {
        self.criteria.iter().any(|c| c.criterion.is_nan())
    }
}

impl fmt::Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Finished Epoch[{}]:", self.epoch)?;
        for (k, named) in self.criteria.iter().enumerate() {
            let sep = if k == 0 { " " } else { "; " };
            write!(f, "{}{} = {}", sep, named.name, named.criterion)?;
        }
        Ok(())
    }
}
