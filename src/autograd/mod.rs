//! Tape-based autograd engine
//!
//! A deliberately small gradient tape: tensors wrap shared
//! `ndarray::Array1<f32>` storage, operations record a `BackwardOp` node,
//! and `backward` walks the tape accumulating gradients into the leaves.
//! Cloning a tensor aliases its storage, which is what lets device replicas
//! share one parameter set.

mod backward;
mod ops;
mod tensor;

pub use backward::BackwardOp;
pub use ops::{add, add_scalar, mean, mul, relu, scale, sub, sum, tile};
pub use tensor::Tensor;

use ndarray::Array1;
use std::collections::HashMap;
use std::rc::Rc;

/// Run a backward pass from `tensor`, seeding with `grad_output` or ones.
///
/// Nodes are visited in reverse topological order, each exactly once after
/// all of its consumers, so a subexpression feeding several branches (or
/// one op twice) receives its full accumulated gradient before it
/// propagates. Only the subgraph reachable from `tensor` participates.
pub fn backward(tensor: &Tensor, grad_output: Option<Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        tensor.set_grad(Array1::ones(tensor.len()));
    }

    let root = match tensor.backward_op() {
        Some(op) => op,
        None => return,
    };

    // Count consuming edges per reachable node.
    let mut pending: HashMap<*const (), usize> = HashMap::new();
    let mut stack = vec![Rc::clone(&root)];
    let mut discovered = vec![node_key(&root)];
    while let Some(op) = stack.pop() {
        for input in op.inputs() {
            if let Some(child) = input.backward_op() {
                let key = node_key(&child);
                *pending.entry(key).or_insert(0) += 1;
                if !discovered.contains(&key) {
                    discovered.push(key);
                    stack.push(child);
                }
            }
        }
    }

    // Apply a node once all its consumers have.
    let mut ready = vec![root];
    while let Some(op) = ready.pop() {
        op.apply();
        for input in op.inputs() {
            if let Some(child) = input.backward_op() {
                if let Some(edges) = pending.get_mut(&node_key(&child)) {
                    *edges -= 1;
                    if *edges == 0 {
                        ready.push(child);
                    }
                }
            }
        }
    }
}

fn node_key(op: &Rc<dyn BackwardOp>) -> *const () {
    Rc::as_ptr(op) as *const ()
}
