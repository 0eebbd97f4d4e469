//! Parameter inventory printed at the start of a run

use super::traits::{CallbackContext, TrainCallback};
use crate::error::Result;
use crate::model::ParameterSet;

/// Prints every trainable parameter's name and size once
pub struct WeightsViewer {
    params: ParameterSet,
}

impl WeightsViewer {
    pub fn new(params: ParameterSet) -> Self {
        Self { params }
    }
}

impl TrainCallback for WeightsViewer {
    fn name(&self) -> &'static str {
        "WeightsViewer"
    }

    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> Result<()> {
        println!("Trainable variables:");
        for (name, tensor) in self.params.iter() {
            println!("  {name}: {} values", tensor.len());
        }
        println!("Total counts: {}", self.params.num_values());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::Tensor;

    #[test]
    fn test_begin_hook_is_infallible() {
        let mut set = ParameterSet::new();
        set.push("w", Tensor::zeros(3, true));

        let mut viewer = WeightsViewer::new(set);
        let ctx = CallbackContext {
            step: 0,
            max_steps: 10,
        };
        assert!(viewer.on_train_begin(&ctx).is_ok());
    }
}
