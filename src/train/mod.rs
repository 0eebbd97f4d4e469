//! Training orchestration
//!
//! The primary generator loop drives the run; the discriminator runs as a
//! pre-step hook with its own inner iterations. Callbacks handle restore,
//! checkpointing, and observability around the step boundary.

pub mod callback;

mod aggregate;
mod coordinator;
mod counter;
mod optimization;
mod pipeline;
mod secondary;

pub use aggregate::aggregate_gradients;
pub use coordinator::{RunReport, TrainingCoordinator};
pub use counter::StepCounter;
pub use optimization::{LoopState, OptimizationLoop, PreStepHook, StopHandle};
pub use pipeline::GraphPipeline;
pub use secondary::SecondaryLoop;

use crate::optim::Optimizer;
use std::cell::RefCell;
use std::rc::Rc;

/// Optimizer handle shared between a loop and its checkpoint callbacks
pub type SharedOptimizer = Rc<RefCell<Box<dyn Optimizer>>>;

/// Wrap an optimizer for sharing
pub fn share_optimizer(optimizer: impl Optimizer + 'static) -> SharedOptimizer {
    Rc::new(RefCell::new(Box::new(optimizer)))
}
