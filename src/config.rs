// src/config.rs
use crate::backend::Device;
use crate::criterion::CriterionAccumulator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Which criteria a run tracks and where their totals live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaConfig {
    pub criterion_names: Vec<String>,
    #[serde(default)]
    pub device: Device,
}

impl CriteriaConfig {
    pub fn new(criterion_names: Vec<String>, device: Device) -> Self {
        Self {
            criterion_names,
            device,
        }
    }

    /// Training objective plus an error rate
    pub fn training() -> Self {
        Self::new(vec!["ce".to_string(), "err".to_string()], Device::CPU)
    }

    /// Evaluation-only criteria
    pub fn evaluation() -> Self {
        Self::new(vec!["err".to_string()], Device::CPU)
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("Invalid criteria config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.criterion_names.is_empty() {
            return Err("At least one criterion name is required".to_string());
        }

        let mut seen = HashSet::new();
        for name in &self.criterion_names {
            if name.trim().is_empty() {
                return Err("Criterion names must not be blank".to_string());
            }
            if !seen.insert(name.as_str()) {
                return Err(format!("Duplicate criterion name '{}'", name));
            }
        }
        Ok(())
    }

    pub fn num_criteria(&self) -> usize {
        self.criterion_names.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.criterion_names.iter().position(|n| n == name)
    }

    pub fn build_accumulator(&self) -> Result<CriterionAccumulator, String> {
        self.validate()?;
        CriterionAccumulator::new(self.num_criteria(), self.device)
    }
}
