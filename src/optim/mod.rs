//! Optimizers and gradient shaping

mod adam;
mod optimizer;
mod sgd;
mod shaping;

pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerState};
pub use sgd::SGD;
pub use shaping::{clip_by_average_norm, ShapingPolicy};
