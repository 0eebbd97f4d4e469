//! Crate-wide error taxonomy
//!
//! Setup errors (`Config`, `UnsupportedLossType`, non-optimistic
//! `Checkpoint`) are raised before any training step runs. `Numeric` and
//! `Callback` abort a running loop immediately; the last completed
//! checkpoint is the recovery point for a manual restart.

use thiserror::Error;

/// Errors produced by the training orchestration
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("loss type is not supported: {0:?}")]
    UnsupportedLossType(String),

    #[error("data source exhausted: {0}")]
    DataExhausted(String),

    #[error("non-finite {what} in {loop_name} loop at step {step}")]
    Numeric {
        what: &'static str,
        loop_name: String,
        step: u64,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("callback {name} failed at step {step}: {source}")]
    Callback {
        name: &'static str,
        step: u64,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Result type for training operations
pub type Result<T> = std::result::Result<T, Error>;
