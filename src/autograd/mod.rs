//! Tape-based autograd engine
//!
//! Provides automatic differentiation using a computational graph with gradient tape.
//! Quantization ops plug into the same graph with straight-through gradients.

mod backward;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::rc::Rc;

pub use backward::BackwardOp;
pub use ops::*;
pub use tensor::{GradCell, Tensor};

/// Perform backward pass on a tensor
///
/// Ops run in reverse topological order, so a tensor consumed several times
/// has its gradient fully accumulated before it propagates further.
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::ArrayD<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Seed with ones, matching the tensor's shape
        let ones = ndarray::ArrayD::ones(tensor.data().raw_dim());
        tensor.set_grad(ones);
    }

    for op in topological_order(tensor) {
        op.backward();
    }
}

/// Ops reachable from `root`, every op before the ops producing its inputs
fn topological_order(root: &Tensor) -> Vec<Rc<dyn BackwardOp>> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    if let Some(op) = root.backward_op() {
        visit(op, &mut visited, &mut order);
    }
    order.reverse();
    order
}

fn visit(
    op: Rc<dyn BackwardOp>,
    visited: &mut HashSet<*const ()>,
    order: &mut Vec<Rc<dyn BackwardOp>>,
) {
    if !visited.insert(Rc::as_ptr(&op) as *const ()) {
        return;
    }
    for input in op.inputs() {
        if let Some(child) = input.backward_op() {
            visit(child, visited, order);
        }
    }
    order.push(op);
}
