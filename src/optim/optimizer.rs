//! Optimizer trait and checkpointable state

use crate::autograd::Tensor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized optimizer internals, carried inside checkpoint records.
///
/// `slots` maps a buffer name ("m", "v", "velocity") to one entry per
/// parameter; an empty entry means the buffer was never initialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizerState {
    pub kind: String,
    pub step: u64,
    pub slots: BTreeMap<String, Vec<Vec<f32>>>,
}

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Apply one update to all parameters, consuming their gradients
    fn step(&mut self, params: &mut [Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Snapshot internal state for checkpointing
    fn state(&self) -> OptimizerState;

    /// Restore internal state from a checkpoint
    fn load_state(&mut self, state: &OptimizerState) -> Result<()>;
}

pub(crate) fn check_state_kind(expected: &str, state: &OptimizerState) -> Result<()> {
    if state.kind != expected {
        return Err(Error::Checkpoint(format!(
            "optimizer state kind mismatch: expected {expected}, found {}",
            state.kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    struct PlainSgd {
        learning_rate: f32,
    }

    impl Optimizer for PlainSgd {
        fn step(&mut self, params: &mut [Tensor]) {
            for param in params {
                if let Some(grad) = param.grad() {
                    *param.data_mut() -= &(&grad * self.learning_rate);
                }
            }
        }

        fn lr(&self) -> f32 {
            self.learning_rate
        }

        fn set_lr(&mut self, lr: f32) {
            self.learning_rate = lr;
        }

        fn state(&self) -> OptimizerState {
            OptimizerState {
                kind: "plain".to_string(),
                ..Default::default()
            }
        }

        fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
            check_state_kind("plain", state)
        }
    }

    #[test]
    fn test_default_zero_grad_clears_all() {
        let mut opt = PlainSgd { learning_rate: 0.1 };
        let mut params = vec![Tensor::from_vec(vec![1.0], true)];
        params[0].set_grad(arr1(&[2.0]));

        opt.zero_grad(&mut params);
        assert!(params[0].grad().is_none());
    }

    #[test]
    fn test_step_skips_params_without_grad() {
        let mut opt = PlainSgd { learning_rate: 0.1 };
        let mut params = vec![Tensor::from_vec(vec![1.0], true)];
        opt.step(&mut params);
        assert_eq!(params[0].data()[0], 1.0);
    }

    #[test]
    fn test_state_kind_mismatch_rejected() {
        let mut opt = PlainSgd { learning_rate: 0.1 };
        let state = OptimizerState {
            kind: "adam".to_string(),
            ..Default::default()
        };
        assert!(opt.load_state(&state).is_err());
    }
}
