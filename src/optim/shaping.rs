//! Gradient shaping applied between aggregation and the optimizer step
//!
//! Shaping is configuration, not code: the policy is a serializable tagged
//! variant so a run's config file fully describes the transform.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Named gradient-shaping policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapingPolicy {
    /// Pass gradients through unchanged
    #[default]
    None,
    /// Bound each gradient tensor's average norm (L2 norm / element count)
    ClipAvgNorm { value: f32 },
}

impl ShapingPolicy {
    /// Apply the policy to every gradient in place
    pub fn apply(&self, grads: &mut [Array1<f32>]) {
        if let ShapingPolicy::ClipAvgNorm { value } = *self {
            for grad in grads.iter_mut() {
                clip_by_average_norm(grad, value);
            }
        }
    }
}

/// Clip a gradient so its average norm does not exceed `clip`.
///
/// Average norm is the L2 norm divided by the element count. Returns the
/// average norm before clipping.
pub fn clip_by_average_norm(grad: &mut Array1<f32>, clip: f32) -> f32 {
    let n = grad.len();
    if n == 0 {
        return 0.0;
    }
    let l2: f32 = grad.iter().map(|&g| g * g).sum::<f32>().sqrt();
    let avg_norm = l2 / n as f32;

    if avg_norm > clip {
        let scale = clip / avg_norm;
        grad.mapv_inplace(|g| g * scale);
    }

    avg_norm
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// After clipping, the average norm never exceeds the bound.
        #[test]
        fn clipped_avg_norm_is_bounded(
            values in proptest::collection::vec(-100.0f32..100.0, 1..32),
            clip in 0.01f32..10.0,
        ) {
            let mut grad = Array1::from(values);
            clip_by_average_norm(&mut grad, clip);

            let l2: f32 = grad.iter().map(|&g| g * g).sum::<f32>().sqrt();
            let avg = l2 / grad.len() as f32;
            prop_assert!(avg <= clip * (1.0 + 1e-4));
        }
    }
}
