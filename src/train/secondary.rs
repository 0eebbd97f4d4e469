//! Discriminator loop, run as a pre-step hook
//!
//! Before each primary step it matches (on its period), the secondary loop
//! runs a fixed number of inner gradient steps, each on fresh batches. Its
//! counter is independent of the primary's.

use super::optimization::{OptimizationLoop, PreStepHook};
use super::counter::StepCounter;
use crate::error::Result;

pub struct SecondaryLoop {
    inner: OptimizationLoop,
    pstep: u64,
    inner_iters: u64,
}

impl SecondaryLoop {
    /// Wrap `inner` to run `inner_iters` steps before every `pstep`-th
    /// primary step.
    pub fn new(inner: OptimizationLoop, pstep: u64, inner_iters: u64) -> Self {
        Self {
            inner,
            pstep: pstep.max(1),
            inner_iters,
        }
    }

    pub fn counter(&self) -> StepCounter {
        self.inner.counter()
    }
}

impl PreStepHook for SecondaryLoop {
    fn before_step(&mut self, step: u64) -> Result<()> {
        if step % self.pstep != 0 {
            return Ok(());
        }
        for _ in 0..self.inner_iters {
            let inner_step = self.inner.counter().get() + 1;
            self.inner.step_once(inner_step)?;
        }
        Ok(())
    }
}
