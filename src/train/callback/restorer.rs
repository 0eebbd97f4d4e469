//! Checkpoint restore at the start of a run

use super::traits::{CallbackContext, TrainCallback};
use crate::checkpoint;
use crate::error::{Error, Result};
use crate::model::ParameterSet;
use crate::train::{SharedOptimizer, StepCounter};
use std::path::PathBuf;

/// Restores parameters, optimizer states, and the step counter from the
/// newest checkpoint in a directory.
///
/// In optimistic mode an absent checkpoint is not an error; the run simply
/// starts fresh. A checkpoint that exists but cannot be applied always
/// aborts.
pub struct ModelRestorer {
    dir: PathBuf,
    params: ParameterSet,
    optimizers: Vec<(String, SharedOptimizer)>,
    counter: StepCounter,
    optimistic: bool,
}

impl ModelRestorer {
    pub fn new(
        dir: PathBuf,
        params: ParameterSet,
        optimizers: Vec<(String, SharedOptimizer)>,
        counter: StepCounter,
        optimistic: bool,
    ) -> Self {
        Self {
            dir,
            params,
            optimizers,
            counter,
            optimistic,
        }
    }
}

impl TrainCallback for ModelRestorer {
    fn name(&self) -> &'static str {
        "ModelRestorer"
    }

    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> Result<()> {
        let record = match checkpoint::load_latest(&self.dir)? {
            Some(record) => record,
            None => {
                if self.optimistic {
                    println!(
                        "No checkpoint in {}, starting fresh.",
                        self.dir.display()
                    );
                    return Ok(());
                }
                return Err(Error::Checkpoint(format!(
                    "no checkpoint found in {}",
                    self.dir.display()
                )));
            }
        };

        record.restore_params(&self.params)?;
        for (name, optimizer) in &self.optimizers {
            optimizer
                .borrow_mut()
                .load_state(record.optimizer_state(name)?)?;
        }
        self.counter.set(record.step);
        println!(
            "Restored step {} from {}.",
            record.step,
            self.dir.display()
        );
        Ok(())
    }
}
