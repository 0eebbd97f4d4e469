//! Adam optimizer

use super::optimizer::{check_state_kind, Optimizer, OptimizerState};
use crate::autograd::Tensor;
use crate::error::Result;
use ndarray::Array1;
use std::collections::BTreeMap;

/// Adam optimizer with bias-corrected first and second moments
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>,
    v: Vec<Option<Array1<f32>>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// GAN-training defaults: beta1 = 0.5, beta2 = 0.9
    pub fn gan_defaults(lr: f32) -> Self {
        Self::new(lr, 0.5, 0.9, 1e-8)
    }

    fn ensure_moments(&mut self, params: &[Tensor]) {
        if self.m.is_empty() {
            self.m = params.iter().map(|_| None).collect();
            self.v = params.iter().map(|_| None).collect();
        }
    }

    fn slot_to_vecs(slot: &[Option<Array1<f32>>]) -> Vec<Vec<f32>> {
        slot.iter()
            .map(|buf| buf.as_ref().map_or_else(Vec::new, |b| b.to_vec()))
            .collect()
    }

    fn slot_from_vecs(raw: &[Vec<f32>]) -> Vec<Option<Array1<f32>>> {
        raw.iter()
            .map(|buf| {
                if buf.is_empty() {
                    None
                } else {
                    Some(Array1::from(buf.clone()))
                }
            })
            .collect()
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_moments(params);
        self.t += 1;

        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad() {
                let m = self.m[i].get_or_insert_with(|| Array1::zeros(grad.len()));
                let v = self.v[i].get_or_insert_with(|| Array1::zeros(grad.len()));

                *m = &*m * self.beta1 + &grad * (1.0 - self.beta1);
                *v = &*v * self.beta2 + &grad.mapv(|g| g * g) * (1.0 - self.beta2);

                let m_hat = &*m / bias1;
                let v_hat = &*v / bias2;

                let update = &m_hat / &v_hat.mapv(|x| x.sqrt() + self.epsilon) * self.lr;
                *param.data_mut() -= &update;
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
        slots.insert("m".to_string(), Self::slot_to_vecs(&self.m));
        slots.insert("v".to_string(), Self::slot_to_vecs(&self.v));
        OptimizerState {
            kind: "adam".to_string(),
            step: self.t,
            slots,
        }
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        check_state_kind("adam", state)?;
        self.t = state.step;
        if let Some(raw) = state.slots.get("m") {
            self.m = Self::slot_from_vecs(raw);
        }
        if let Some(raw) = state.slots.get("v") {
            self.v = Self::slot_from_vecs(raw);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_first_step_moves_against_gradient() {
        let mut opt = Adam::gan_defaults(0.1);
        let mut params = vec![Tensor::from_vec(vec![1.0, -1.0], true)];
        params[0].set_grad(arr1(&[1.0, -1.0]));

        opt.step(&mut params);

        // With bias correction the first step has magnitude ≈ lr.
        let data = params[0].data().to_vec();
        assert!(data[0] < 1.0);
        assert!(data[1] > -1.0);
        assert_abs_diff_eq!(1.0 - data[0], 0.1, epsilon = 1e-3);
    }

    #[test]
    fn test_state_round_trip_preserves_trajectory() {
        let grad = arr1(&[0.3, -0.7]);

        // Run two steps straight through.
        let mut reference = Adam::gan_defaults(0.05);
        let mut ref_params = vec![Tensor::from_vec(vec![1.0, 2.0], true)];
        for _ in 0..2 {
            ref_params[0].set_grad(grad.clone());
            reference.step(&mut ref_params);
        }

        // Run one step, snapshot, restore into a fresh instance, run one more.
        let mut first = Adam::gan_defaults(0.05);
        let mut params = vec![Tensor::from_vec(vec![1.0, 2.0], true)];
        params[0].set_grad(grad.clone());
        first.step(&mut params);
        let state = first.state();

        let mut resumed = Adam::gan_defaults(0.05);
        resumed.load_state(&state).unwrap();
        params[0].set_grad(grad.clone());
        resumed.step(&mut params);

        let expected = ref_params[0].data().to_vec();
        let actual = params[0].data().to_vec();
        for (e, a) in expected.iter().zip(actual.iter()) {
            assert_abs_diff_eq!(e, a, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_state_reports_step_count() {
        let mut opt = Adam::gan_defaults(0.01);
        let mut params = vec![Tensor::from_vec(vec![1.0], true)];
        params[0].set_grad(arr1(&[1.0]));
        opt.step(&mut params);
        params[0].set_grad(arr1(&[1.0]));
        opt.step(&mut params);

        assert_eq!(opt.state().step, 2);
    }
}
