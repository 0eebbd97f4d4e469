//! Backward operation trait

use super::Tensor;

/// A node on the gradient tape.
///
/// `apply` reads the gradient of the node's output and accumulates into its
/// inputs; it must not recurse. The traversal in [`super::backward`] calls
/// each reachable node exactly once, after every consumer of its output has
/// applied, so shared subexpressions contribute once per consuming edge.
/// Leaf tensors have no backward op.
pub trait BackwardOp {
    /// Propagate the output gradient into the inputs
    fn apply(&self);

    /// Input tensors, one entry per consuming edge
    fn inputs(&self) -> Vec<Tensor>;
}
