//! Shared step counter
//!
//! Loops increment it, checkpoint callbacks read and reset it. Clones share
//! the same cell, so a restorer moving the counter moves the loop.

use std::cell::Cell;
use std::rc::Rc;

/// Number of completed steps in one loop
#[derive(Clone, Default)]
pub struct StepCounter {
    completed: Rc<Cell<u64>>,
}

impl StepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed step count
    pub fn get(&self) -> u64 {
        self.completed.get()
    }

    /// Overwrite the count, used on checkpoint restore
    pub fn set(&self, steps: u64) {
        self.completed.set(steps);
    }

    /// Mark one more step completed
    pub fn increment(&self) {
        self.completed.set(self.completed.get() + 1);
    }
}

impl std::fmt::Debug for StepCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StepCounter({})", self.get())
    }
}
