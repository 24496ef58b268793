//! Quantize / dequantize kernels
//!
//! Pure forward and backward functions for the affine map
//! `q = clip(round(scale * x + bias), lower_bound, upper_bound)`.
//!
//! - Forward rounds half to even (`0.5 -> 0`, `1.5 -> 2`, `2.5 -> 2`)
//! - Backward is the Straight-Through Estimator (STE): the gradient passes
//!   unchanged where the rounded value fell inside the bounds and is zero
//!   where it was clipped
//!
//! `scale` and `bias` broadcast against the input and never receive gradient.
//! `scale` must be strictly positive; this is not checked.

use crate::error::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, Zip};

/// Broadcast a parameter array to the shape of `target`
fn broadcast_to<'a>(param: &'a ArrayD<f32>, target: &ArrayD<f32>) -> Result<ArrayViewD<'a, f32>> {
    param
        .broadcast(target.raw_dim())
        .ok_or_else(|| Error::ShapeMismatch {
            expected: target.shape().to_vec(),
            got: param.shape().to_vec(),
        })
}

/// Quantize forward pass
///
/// Returns the rounded and clipped output together with the in-range mask,
/// evaluated before clipping, that the backward pass needs.
pub fn quantize_forward(
    input: &ArrayD<f32>,
    scale: &ArrayD<f32>,
    bias: Option<&ArrayD<f32>>,
    lower_bound: i64,
    upper_bound: i64,
) -> Result<(ArrayD<f32>, ArrayD<bool>)> {
    if lower_bound > upper_bound {
        return Err(Error::InvalidParameter(format!(
            "lower bound {lower_bound} exceeds upper bound {upper_bound}"
        )));
    }

    let mut output = input * &broadcast_to(scale, input)?;
    if let Some(bias) = bias {
        output += &broadcast_to(bias, input)?;
    }

    output.mapv_inplace(f32::round_ties_even);

    let lower = lower_bound as f32;
    let upper = upper_bound as f32;
    let in_range = output.mapv(|v| v >= lower && v <= upper);
    output.mapv_inplace(|v| v.clamp(lower, upper));

    Ok((output, in_range))
}

/// Quantize backward pass (STE)
///
/// ∂L/∂x = ∂L/∂q where the value was in range, 0 elsewhere.
pub fn quantize_backward(in_range: &ArrayD<bool>, grad_output: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    if in_range.shape() != grad_output.shape() {
        return Err(Error::ShapeMismatch {
            expected: in_range.shape().to_vec(),
            got: grad_output.shape().to_vec(),
        });
    }

    Ok(Zip::from(grad_output)
        .and(in_range)
        .map_collect(|&grad, &keep| if keep { grad } else { 0.0 }))
}

/// Dequantize forward pass: `(q - bias) / scale`, no rounding
pub fn dequantize_forward(
    input: &ArrayD<f32>,
    scale: &ArrayD<f32>,
    bias: Option<&ArrayD<f32>>,
) -> Result<ArrayD<f32>> {
    let output = match bias {
        Some(bias) => input - &broadcast_to(bias, input)?,
        None => input.clone(),
    };
    Ok(output / &broadcast_to(scale, input)?)
}

/// Dequantize backward pass: ∂L/∂q = ∂L/∂x / scale
pub fn dequantize_backward(grad_output: &ArrayD<f32>, scale: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    Ok(grad_output / &broadcast_to(scale, grad_output)?)
}
