//! Stochastic gradient descent with optional momentum

use super::optimizer::{check_state_kind, Optimizer, OptimizerState};
use crate::autograd::Tensor;
use crate::error::Result;
use ndarray::Array1;
use std::collections::BTreeMap;

/// SGD optimizer
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }

    fn ensure_velocities(&mut self, params: &[Tensor]) {
        if self.velocities.is_empty() {
            self.velocities = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_velocities(params);

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad() {
                if self.momentum > 0.0 {
                    // v = momentum * v - lr * grad
                    let velocity = match &self.velocities[i] {
                        Some(v) => v * self.momentum - &grad * self.lr,
                        None => &grad * (-self.lr),
                    };
                    *param.data_mut() += &velocity;
                    self.velocities[i] = Some(velocity);
                } else {
                    *param.data_mut() -= &(&grad * self.lr);
                }
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn state(&self) -> OptimizerState {
        let mut slots = BTreeMap::new();
        slots.insert(
            "velocity".to_string(),
            self.velocities
                .iter()
                .map(|v| v.as_ref().map_or_else(Vec::new, |b| b.to_vec()))
                .collect(),
        );
        OptimizerState {
            kind: "sgd".to_string(),
            step: 0,
            slots,
        }
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        check_state_kind("sgd", state)?;
        if let Some(raw) = state.slots.get("velocity") {
            self.velocities = raw
                .iter()
                .map(|buf| {
                    if buf.is_empty() {
                        None
                    } else {
                        Some(Array1::from(buf.clone()))
                    }
                })
                .collect();
        }
        Ok(())
    }
}
