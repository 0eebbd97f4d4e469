//! Model-facing interfaces
//!
//! The orchestration never sees a network topology, only this boundary:
//! a model builds a (possibly parameter-sharing) loss graph for a batch and
//! hands back its generator and discriminator parameter sets.

mod inpaint;

pub use inpaint::CoarseInpaintModel;

use crate::autograd::Tensor;
use crate::config::TrainSpec;
use crate::data::Batch;
use crate::error::{Error, Result};
use crate::graph::GraphContext;

/// Ordered, named collection of one sub-model's trainable tensors
#[derive(Clone, Default)]
pub struct ParameterSet {
    entries: Vec<(String, Tensor)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.entries.push((name.into(), tensor));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Aliasing handles to the tensors, in declaration order
    pub fn tensors(&self) -> Vec<Tensor> {
        self.entries.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Total element count across all tensors
    pub fn num_values(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.len()).sum()
    }

    /// Whether no tensor here aliases a tensor in `other`
    pub fn is_disjoint(&self, other: &ParameterSet) -> bool {
        for (_, a) in &self.entries {
            for (_, b) in &other.entries {
                if a.same_storage(b) {
                    return false;
                }
            }
        }
        true
    }
}

/// Per-replica loss pair
pub struct Losses {
    pub g_loss: Tensor,
    pub d_loss: Tensor,
}

/// Result of one graph build
pub struct ModelGraph {
    pub g_params: ParameterSet,
    pub d_params: ParameterSet,
    pub losses: Losses,
}

/// The model capability consumed by the orchestration
///
/// `reuse` selects parameter sharing: the first build allocates the
/// parameter sets, every later build must alias them. `summary` asks the
/// model to record its loss scalars into the context's hub.
pub trait ModelDefinition {
    fn build_graph_with_losses(
        &mut self,
        ctx: &mut GraphContext,
        batch: &Batch,
        config: &TrainSpec,
        reuse: bool,
        summary: bool,
    ) -> Result<ModelGraph>;

    /// Inference-only subgraph for qualitative monitoring; not on the
    /// training gradient path.
    fn build_static_infer_graph(
        &mut self,
        ctx: &mut GraphContext,
        batch: &Batch,
        config: &TrainSpec,
        name: &str,
    ) -> Result<Tensor>;
}

/// Enforce generator/discriminator parameter disjointness
pub fn validate_disjoint(g_params: &ParameterSet, d_params: &ParameterSet) -> Result<()> {
    if !g_params.is_disjoint(d_params) {
        return Err(Error::Config(
            "generator and discriminator parameter sets share storage".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_set_order_is_preserved() {
        let mut set = ParameterSet::new();
        set.push("w", Tensor::zeros(2, true));
        set.push("b", Tensor::zeros(1, true));

        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["w", "b"]);
        assert_eq!(set.num_values(), 3);
    }

    #[test]
    fn test_disjointness_detects_aliasing() {
        let shared = Tensor::zeros(2, true);

        let mut g = ParameterSet::new();
        g.push("w", shared.clone());
        let mut d = ParameterSet::new();
        d.push("critic", shared);

        assert!(!g.is_disjoint(&d));
        assert!(validate_disjoint(&g, &d).is_err());
    }

    #[test]
    fn test_disjoint_sets_pass_validation() {
        let mut g = ParameterSet::new();
        g.push("w", Tensor::zeros(2, true));
        let mut d = ParameterSet::new();
        d.push("critic", Tensor::zeros(2, true));

        assert!(validate_disjoint(&g, &d).is_ok());
    }

    #[test]
    fn test_tensors_alias_the_set() {
        let mut set = ParameterSet::new();
        set.push("w", Tensor::from_vec(vec![1.0], true));

        let handles = set.tensors();
        handles[0].data_mut()[0] = 5.0;

        let (_, original) = set.iter().next().map(|(n, t)| (n, t.clone())).unwrap();
        assert_eq!(original.data()[0], 5.0);
    }
}
