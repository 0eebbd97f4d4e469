//! Callback trait and dispatch context
//!
//! Callbacks are side-effect observers around the step boundary. They hold
//! their own aliasing handles (parameter sets, counters, optimizer handles)
//! and never return values into the loop; any error they raise aborts the
//! run.

use crate::error::Result;

/// Where in the step a callback fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    /// Before the gradient step (and after the pre-step hook)
    PreStep,
    /// After the gradient step
    PostStep,
}

/// Step information handed to every callback invocation
#[derive(Debug, Clone, Copy)]
pub struct CallbackContext {
    /// 1-based index of the executing step (completed count at begin/end)
    pub step: u64,
    /// Step bound of the driving loop
    pub max_steps: u64,
}

/// Lifecycle hooks for one training run
pub trait TrainCallback {
    /// Stable name used in error reports
    fn name(&self) -> &'static str;

    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Fires on steps matching the registration interval
    fn on_step(&mut self, _ctx: &CallbackContext) -> Result<()> {
        Ok(())
    }

    fn on_train_end(&mut self, _ctx: &CallbackContext) -> Result<()> {
        Ok(())
    }
}
