//! Autograd operations with backward passes

use super::{BackwardOp, GradCell, Tensor};
use crate::error::{Error, Result};
use crate::quant::kernels;
use ndarray::ArrayD;
use std::rc::Rc;

fn check_same_shape(a: &Tensor, b: &Tensor) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        });
    }
    Ok(())
}

/// Add two tensors of the same shape
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    check_same_shape(a, b)?;
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a, &self.b]
    }
}

/// Multiply two tensors of the same shape element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    check_same_shape(a, b)?;
    let data = a.data() * b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * b
                self.a.accumulate_grad(grad * self.b.data());
            }
            if self.b.requires_grad() {
                // ∂L/∂b = ∂L/∂out * a
                self.b.accumulate_grad(grad * self.a.data());
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a, &self.b]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * factor
                self.a.accumulate_grad(grad * self.factor);
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }
}

/// Sum all elements into a 0-d tensor
pub fn sum(a: &Tensor) -> Tensor {
    let data = ArrayD::from_elem(ndarray::IxDyn(&[]), a.data().sum());
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂sum * 1 (broadcast)
                let grad_val = grad.sum();
                self.a
                    .accumulate_grad(ArrayD::from_elem(self.a.data().raw_dim(), grad_val));
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.a]
    }
}

/// Quantize with a straight-through gradient
///
/// Computes `clip(round(scale * input + bias), lower_bound, upper_bound)`.
/// `scale` and `bias` broadcast against `input` and are treated as constants:
/// they never receive gradient, whatever their `requires_grad` flag.
pub fn quantize(
    input: &Tensor,
    scale: &Tensor,
    bias: Option<&Tensor>,
    lower_bound: i64,
    upper_bound: i64,
) -> Result<Tensor> {
    let (data, in_range) = kernels::quantize_forward(
        input.data(),
        scale.data(),
        bias.map(Tensor::data),
        lower_bound,
        upper_bound,
    )?;
    let requires_grad = input.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(QuantizeBackward {
            input: input.clone(),
            in_range,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct QuantizeBackward {
    input: Tensor,
    in_range: ArrayD<bool>,
    result_grad: GradCell,
}

impl BackwardOp for QuantizeBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // STE: ∂L/∂x = ∂L/∂q inside [lower, upper], 0 where clipped
            match kernels::quantize_backward(&self.in_range, grad) {
                Ok(grad_input) => self.input.accumulate_grad(grad_input),
                Err(e) => tracing::warn!(error = %e, "skipping quantize backward"),
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.input]
    }
}

/// Dequantize: `(input - bias) / scale`
///
/// Gradient flows to `input` only, scaled by `1 / scale`.
pub fn dequantize(input: &Tensor, scale: &Tensor, bias: Option<&Tensor>) -> Result<Tensor> {
    let data = kernels::dequantize_forward(input.data(), scale.data(), bias.map(Tensor::data))?;
    let requires_grad = input.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(DequantizeBackward {
            input: input.clone(),
            scale: scale.data().clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct DequantizeBackward {
    input: Tensor,
    scale: ArrayD<f32>,
    result_grad: GradCell,
}

impl BackwardOp for DequantizeBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // ∂L/∂q = ∂L/∂x / scale
            match kernels::dequantize_backward(grad, &self.scale) {
                Ok(grad_input) => self.input.accumulate_grad(grad_input),
                Err(e) => tracing::warn!(error = %e, "skipping dequantize backward"),
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.input]
    }
}
