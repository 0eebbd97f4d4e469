//! Checkpoint persistence
//!
//! A checkpoint is one JSON record: the step counter, every named
//! parameter's values, and each optimizer's internal state. Files are
//! written as `snap-<step>.json` next to a `latest` pointer file, so a
//! restore needs only the run directory.

use crate::error::{Error, Result};
use crate::model::ParameterSet;
use crate::optim::OptimizerState;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LATEST_POINTER: &str = "latest";

/// Everything needed to resume a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub step: u64,
    pub params: BTreeMap<String, Vec<f32>>,
    pub optimizers: BTreeMap<String, OptimizerState>,
}

impl CheckpointRecord {
    /// Snapshot current parameter values and optimizer states
    pub fn capture(
        step: u64,
        params: &ParameterSet,
        optimizers: BTreeMap<String, OptimizerState>,
    ) -> Self {
        let params = params
            .iter()
            .map(|(name, tensor)| (name.to_string(), tensor.data().to_vec()))
            .collect();
        Self {
            step,
            params,
            optimizers,
        }
    }

    /// Write saved values back into live parameter storage.
    ///
    /// Every live parameter must be present in the record with a matching
    /// length; extra recorded names are ignored.
    pub fn restore_params(&self, params: &ParameterSet) -> Result<()> {
        for (name, tensor) in params.iter() {
            let values = self.params.get(name).ok_or_else(|| {
                Error::Checkpoint(format!("parameter {name} missing from checkpoint"))
            })?;
            if values.len() != tensor.len() {
                return Err(Error::Checkpoint(format!(
                    "parameter {name} has {} values, checkpoint has {}",
                    tensor.len(),
                    values.len()
                )));
            }
            *tensor.data_mut() = Array1::from(values.clone());
        }
        Ok(())
    }

    pub fn optimizer_state(&self, name: &str) -> Result<&OptimizerState> {
        self.optimizers.get(name).ok_or_else(|| {
            Error::Checkpoint(format!("optimizer state {name} missing from checkpoint"))
        })
    }
}

/// Persist a record as `snap-<step>.json` and repoint `latest`
pub fn save(dir: impl AsRef<Path>, record: &CheckpointRecord) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let name = format!("snap-{}.json", record.step);
    let path = dir.join(&name);
    let json = serde_json::to_string(record).map_err(|e| Error::Serialization(e.to_string()))?;
    std::fs::write(&path, json)?;
    std::fs::write(dir.join(LATEST_POINTER), &name)?;
    Ok(path)
}

/// Load one checkpoint file
pub fn load(path: impl AsRef<Path>) -> Result<CheckpointRecord> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Checkpoint(format!(
            "{} is not a checkpoint: {e}",
            path.as_ref().display()
        ))
    })
}

/// Load the checkpoint the `latest` pointer names, if the directory has one
pub fn load_latest(dir: impl AsRef<Path>) -> Result<Option<CheckpointRecord>> {
    let pointer = dir.as_ref().join(LATEST_POINTER);
    if !pointer.exists() {
        return Ok(None);
    }
    let name = std::fs::read_to_string(&pointer)?;
    let path = dir.as_ref().join(name.trim());
    Ok(Some(load(path)?))
}
