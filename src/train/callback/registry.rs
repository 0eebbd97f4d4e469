//! Callback registration and ordered dispatch

use super::traits::{CallbackContext, CallbackPhase, TrainCallback};
use crate::error::{Error, Result};

struct Entry {
    callback: Box<dyn TrainCallback>,
    interval: u64,
    phase: CallbackPhase,
}

/// Ordered set of callbacks for one run
///
/// Dispatch follows registration order. An interval of 0 disables the step
/// hook; begin and end hooks always fire.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Vec<Entry>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        callback: Box<dyn TrainCallback>,
        interval: u64,
        phase: CallbackPhase,
    ) {
        self.entries.push(Entry {
            callback,
            interval,
            phase,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn train_begin(&mut self, ctx: &CallbackContext) -> Result<()> {
        for entry in &mut self.entries {
            entry
                .callback
                .on_train_begin(ctx)
                .map_err(|e| wrap(entry.callback.name(), ctx.step, e))?;
        }
        Ok(())
    }

    /// Fire step hooks for `phase` whose interval divides the step
    pub fn dispatch(&mut self, phase: CallbackPhase, ctx: &CallbackContext) -> Result<()> {
        for entry in &mut self.entries {
            if entry.phase != phase || entry.interval == 0 {
                continue;
            }
            if ctx.step % entry.interval != 0 {
                continue;
            }
            entry
                .callback
                .on_step(ctx)
                .map_err(|e| wrap(entry.callback.name(), ctx.step, e))?;
        }
        Ok(())
    }

    pub fn train_end(&mut self, ctx: &CallbackContext) -> Result<()> {
        for entry in &mut self.entries {
            entry
                .callback
                .on_train_end(ctx)
                .map_err(|e| wrap(entry.callback.name(), ctx.step, e))?;
        }
        Ok(())
    }
}

fn wrap(name: &'static str, step: u64, source: Error) -> Error {
    Error::Callback {
        name,
        step,
        source: Box::new(source),
    }
}
