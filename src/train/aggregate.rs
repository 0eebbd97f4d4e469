//! Cross-replica gradient aggregation
//!
//! Each replica loss is differentiated in isolation: gradients are zeroed,
//! one backward pass runs, and the per-parameter contributions are
//! snapshotted. The aggregate is the arithmetic mean over replicas, shaped
//! by the configured policy, and checked for finiteness before the
//! optimizer ever sees it. Replicas are evaluated in device order; since
//! each snapshot is taken against zeroed gradients, the result is the same
//! as if they had run concurrently.

use crate::autograd::{backward, Tensor};
use crate::error::{Error, Result};
use crate::optim::ShapingPolicy;
use ndarray::Array1;

/// Mean gradient of `params` across one loss per replica.
///
/// A parameter a replica's loss does not reach contributes zeros for that
/// replica. Errors carry `loop_name` and `step` for the abort report.
pub fn aggregate_gradients(
    losses: &[Tensor],
    params: &[Tensor],
    policy: &ShapingPolicy,
    loop_name: &str,
    step: u64,
) -> Result<Vec<Array1<f32>>> {
    if losses.is_empty() {
        return Err(Error::Config("no replica losses to aggregate".to_string()));
    }

    let numeric = |what: &'static str| Error::Numeric {
        what,
        loop_name: loop_name.to_string(),
        step,
    };

    let mut sums: Vec<Array1<f32>> = params.iter().map(|p| Array1::zeros(p.len())).collect();
    for loss in losses {
        if !loss.item().is_finite() {
            return Err(numeric("loss"));
        }

        for param in params {
            param.zero_grad();
        }
        backward(loss, None);

        for (sum, param) in sums.iter_mut().zip(params) {
            if let Some(grad) = param.grad() {
                *sum += &grad;
            }
        }
    }

    let scale = 1.0 / losses.len() as f32;
    for sum in sums.iter_mut() {
        sum.mapv_inplace(|g| g * scale);
    }
    policy.apply(&mut sums);

    for sum in &sums {
        if sum.iter().any(|g| !g.is_finite()) {
            return Err(numeric("gradient"));
        }
    }
    Ok(sums)
}
