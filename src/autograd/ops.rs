//! Differentiable operations: add, sub, mul, scale, add_scalar, relu, tile,
//! sum, mean

use super::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Add two tensors element-wise
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() + &*b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Subtract two tensors element-wise
pub fn sub(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() - &*b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(SubBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct SubBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SubBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(-grad);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Multiply two tensors element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() * &*b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * &*self.b.data());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad * &*self.a.data());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale a tensor by a constant
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = &*a.data() * factor;
    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Add a constant to every element
pub fn add_scalar(a: &Tensor, value: f32) -> Tensor {
    let data = &*a.data() + value;
    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(AddScalarBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct AddScalarBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddScalarBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Rectified linear unit
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // Subgradient at 0 is taken as 0
                let mask = self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad * &mask);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Repeat a tensor `k` times end to end
///
/// The backward pass sums the output gradient over repeats, so a tiled
/// per-frame parameter receives one contribution per batch element.
pub fn tile(a: &Tensor, k: usize) -> Tensor {
    let src = a.data();
    let mut values = Vec::with_capacity(src.len() * k);
    for _ in 0..k {
        values.extend(src.iter().copied());
    }
    drop(src);

    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(Array1::from(values), requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(TileBackward {
            a: a.clone(),
            k,
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct TileBackward {
    a: Tensor,
    k: usize,
    result_grad: GradCell,
}

impl BackwardOp for TileBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let len = self.a.len();
                let mut grad_a = Array1::zeros(len);
                for rep in 0..self.k {
                    for i in 0..len {
                        grad_a[i] += grad[rep * len + i];
                    }
                }
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Sum all elements into a one-element tensor
pub fn sum(a: &Tensor) -> Tensor {
    let data = Array1::from(vec![a.data().sum()]);
    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        }));
    }
    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn apply(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let grad_a = Array1::from_elem(self.a.len(), grad[0]);
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Arithmetic mean of all elements, as a one-element tensor
pub fn mean(a: &Tensor) -> Tensor {
    scale(&sum(a), 1.0 / a.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_add_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = Tensor::from_vec(vec![3.0, 4.0], true);
        let out = sum(&add(&a, &b));
        backward(&out, None);

        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(b.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_sub_backward_negates_rhs() {
        let a = Tensor::from_vec(vec![5.0], true);
        let b = Tensor::from_vec(vec![2.0], true);
        let out = sub(&a, &b);
        backward(&out, None);

        assert_eq!(a.grad().unwrap()[0], 1.0);
        assert_eq!(b.grad().unwrap()[0], -1.0);
    }

    #[test]
    fn test_mul_backward_swaps_operands() {
        let a = Tensor::from_vec(vec![3.0], true);
        let b = Tensor::from_vec(vec![7.0], true);
        let out = mul(&a, &b);
        backward(&out, None);

        assert_eq!(a.grad().unwrap()[0], 7.0);
        assert_eq!(b.grad().unwrap()[0], 3.0);
    }

    #[test]
    fn test_square_of_leaf_doubles_gradient() {
        // mul(x, x) on a leaf: d(x^2)/dx = 2x.
        let x = Tensor::from_vec(vec![3.0], true);
        let out = mul(&x, &x);
        backward(&out, None);
        assert_abs_diff_eq!(x.grad().unwrap()[0], 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_relu_gates_gradient() {
        let a = Tensor::from_vec(vec![-1.0, 2.0], true);
        let out = sum(&relu(&a));
        backward(&out, None);

        let grad = a.grad().unwrap();
        assert_eq!(grad[0], 0.0);
        assert_eq!(grad[1], 1.0);
    }

    #[test]
    fn test_mean_gradient_is_uniform() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let out = mean(&a);
        assert_abs_diff_eq!(out.item(), 2.5, epsilon = 1e-6);
        backward(&out, None);

        for &g in a.grad().unwrap().iter() {
            assert_abs_diff_eq!(g, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_add_scalar_shifts_value_not_grad() {
        let a = Tensor::from_vec(vec![1.0, 1.0], true);
        let out = sum(&add_scalar(&a, 10.0));
        assert_abs_diff_eq!(out.item(), 22.0, epsilon = 1e-6);
        backward(&out, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_tile_backward_sums_over_repeats() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let tiled = tile(&a, 3);
        assert_eq!(
            tiled.data().to_vec(),
            vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]
        );

        let out = sum(&tiled);
        backward(&out, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![3.0, 3.0]);
    }

    #[test]
    fn test_shared_leaf_accumulates_across_branches() {
        // w used in two separate forward branches; leaf grads must sum.
        let w = Tensor::from_vec(vec![2.0], true);
        let x = Tensor::from_vec(vec![3.0], false);

        let branch1 = mul(&w, &x);
        let branch2 = scale(&w, 4.0);
        let out = add(&branch1, &branch2);
        backward(&out, None);

        // d out / d w = x + 4
        assert_abs_diff_eq!(w.grad().unwrap()[0], 7.0, epsilon = 1e-6);
    }
}
