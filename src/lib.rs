//! Rellenar: GAN training orchestration for image inpainting
//!
//! The crate trains a generator/discriminator pair with an asymmetric
//! cadence: the primary loop takes one generator step per iteration, and a
//! pre-step hook first runs a fixed number of discriminator steps. Loss
//! graphs are replicated across device slots with shared parameters, and
//! per-replica gradients are averaged before the optimizer update.
//!
//! Layers, bottom to top:
//! - [`autograd`]: tape tensors and differentiable ops
//! - [`model`]: the inpainting model behind the [`model::ModelDefinition`] seam
//! - [`graph`]: replica construction through an explicit context
//! - [`optim`]: Adam/SGD and gradient shaping
//! - [`train`]: loops, aggregation, callbacks, and the run coordinator

pub mod autograd;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod model;
pub mod optim;
pub mod summary;
pub mod train;

pub use error::{Error, Result};
