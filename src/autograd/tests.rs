//! Tests for autograd operations with gradient checking

use super::*;
use approx::assert_abs_diff_eq;
use ndarray::{arr1, ArrayD};
use proptest::prelude::*;

const INPUT: [f32; 8] = [-9.8, -7.8, -5.8, -3.8, -1.8, 0.2, 2.2, 4.2];

fn ones(n: usize) -> ArrayD<f32> {
    ArrayD::ones(ndarray::IxDyn(&[n]))
}

/// Finite difference gradient checker
///
/// Computes numerical gradient using central difference:
/// f'(x) ≈ (f(x + h) - f(x - h)) / (2h)
fn finite_difference<F>(f: F, x: &[f32], epsilon: f32) -> Vec<f32>
where
    F: Fn(&[f32]) -> f32,
{
    let mut grad = vec![0.0; x.len()];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();

    for i in 0..x.len() {
        x_plus[i] = x[i] + epsilon;
        x_minus[i] = x[i] - epsilon;

        grad[i] = (f(&x_plus) - f(&x_minus)) / (2.0 * epsilon);

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    grad
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_tensor_creation() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        assert_eq!(t.len(), 3);
        assert_eq!(t.shape(), &[3]);
        assert!(t.requires_grad());
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_tensor_from_shape_vec() {
        let t = Tensor::from_shape_vec(&[2, 3], vec![0.0; 6], false).unwrap();
        assert_eq!(t.shape(), &[2, 3]);

        let bad = Tensor::from_shape_vec(&[2, 3], vec![0.0; 5], false);
        assert!(matches!(bad, Err(crate::Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_tensor_grad_accumulation() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);

        t.accumulate_grad(ones(3));
        assert_eq!(t.grad().unwrap()[0], 1.0);

        t.accumulate_grad(ones(3));
        assert_eq!(t.grad().unwrap()[0], 2.0);

        t.zero_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_detach_drops_grad_tracking() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let d = t.detach();
        assert!(!d.requires_grad());
        assert_eq!(d.data(), t.data());
    }

    #[test]
    fn test_add_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let b = Tensor::from_vec(vec![4.0, 5.0, 6.0], true);
        let mut c = add(&a, &b).unwrap();

        assert_abs_diff_eq!(c.data()[1], 7.0);

        backward(&mut c, Some(ones(3)));

        assert_abs_diff_eq!(a.grad().unwrap()[0], 1.0);
        assert_abs_diff_eq!(b.grad().unwrap()[0], 1.0);
    }

    #[test]
    fn test_mul_backward() {
        let a = Tensor::from_vec(vec![2.0, 3.0], true);
        let b = Tensor::from_vec(vec![5.0, 7.0], true);
        let mut c = mul(&a, &b).unwrap();

        backward(&mut c, Some(ones(2)));

        let grad_a = a.grad().unwrap();
        let grad_b = b.grad().unwrap();

        // ∂(a*b)/∂a = b
        assert_abs_diff_eq!(grad_a[0], 5.0);
        assert_abs_diff_eq!(grad_a[1], 7.0);

        // ∂(a*b)/∂b = a
        assert_abs_diff_eq!(grad_b[0], 2.0);
        assert_abs_diff_eq!(grad_b[1], 3.0);
    }

    #[test]
    fn test_sum_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let mut c = sum(&a);

        assert_eq!(c.shape(), &[] as &[usize]);
        backward(&mut c, None);

        let grad_a = a.grad().unwrap();
        assert_abs_diff_eq!(grad_a[0], 1.0);
        assert_abs_diff_eq!(grad_a[2], 1.0);
    }

    #[test]
    fn test_quantize_backpropagation() {
        let input = Tensor::from_vec(INPUT.to_vec(), true);
        let mut output = quantize(&input, &Tensor::scalar(0.3061), None, -3, 3).unwrap();

        backward(&mut output, Some(ones(8)));

        let grad = input.grad().unwrap();
        assert!(grad.iter().all(|&g| g == 1.0));
    }

    #[test]
    fn test_quantize_with_bias_backpropagation() {
        let input = Tensor::from_vec(INPUT.to_vec(), true);
        let mut output = quantize(
            &input,
            &Tensor::scalar(0.5),
            Some(&Tensor::scalar(1.0)),
            -2,
            1,
        )
        .unwrap();

        backward(&mut output, Some(ones(8)));

        let grad = input.grad().unwrap();
        assert_eq!(
            grad.as_slice().unwrap(),
            &[0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_quantize_scale_and_bias_get_no_grad() {
        let input = Tensor::from_vec(INPUT.to_vec(), true);
        let scale = Tensor::new(ndarray::arr0(0.5f32).into_dyn(), true);
        let bias = Tensor::new(ndarray::arr0(1.0f32).into_dyn(), true);
        let mut output = quantize(&input, &scale, Some(&bias), -4, 3).unwrap();

        backward(&mut output, None);

        assert!(input.grad().is_some());
        assert!(scale.grad().is_none());
        assert!(bias.grad().is_none());
    }

    #[test]
    fn test_quantize_without_grad_has_no_backward_op() {
        let input = Tensor::from_vec(INPUT.to_vec(), false);
        let output = quantize(&input, &Tensor::scalar(0.5), None, -4, 3).unwrap();

        assert!(!output.requires_grad());
        assert!(output.backward_op().is_none());
    }

    #[test]
    fn test_dequantize_backward() {
        let q = Tensor::from_vec(vec![-4.0, 0.0, 3.0], true);
        let mut x = dequantize(&q, &Tensor::scalar(0.5), Some(&Tensor::scalar(1.0))).unwrap();

        assert_abs_diff_eq!(x.data()[0], -10.0);
        assert_abs_diff_eq!(x.data()[2], 4.0);

        backward(&mut x, Some(ones(3)));

        // ∂x/∂q = 1 / scale
        let grad = q.grad().unwrap();
        assert!(grad.iter().all(|&g| (g - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_chain_rule_through_quantize() {
        // f(x) = sum(dequantize(quantize(2x)))
        let a = Tensor::from_vec(vec![-10.0, 0.4, 1.0], true);
        let b = scale(&a, 2.0);
        let q = quantize(&b, &Tensor::scalar(1.0), None, -3, 3).unwrap();
        let d = dequantize(&q, &Tensor::scalar(1.0), None).unwrap();
        let mut loss = sum(&d);

        backward(&mut loss, None);

        let grad_a = a.grad().unwrap();

        // x = -10: 2x = -20 is clipped, grad = 0
        assert_abs_diff_eq!(grad_a[0], 0.0);

        // In range: STE passes 1, scale contributes 2
        assert_abs_diff_eq!(grad_a[1], 2.0);
        assert_abs_diff_eq!(grad_a[2], 2.0);
    }

    #[test]
    fn test_multi_dim_quantize() {
        let input = Tensor::from_shape_vec(&[2, 2], vec![1.0, -1.0, 10.0, -10.0], true).unwrap();
        let scale = Tensor::new(arr1(&[1.0f32, 0.5]).into_dyn(), false);

        let mut output = quantize(&input, &scale, None, -3, 3).unwrap();
        assert_eq!(output.shape(), &[2, 2]);
        assert_eq!(output.data().as_slice().unwrap(), &[1.0, -0.0, 3.0, -3.0]);

        backward(&mut output, None);
        let grad = input.grad().unwrap();
        assert_eq!(grad.as_slice().unwrap(), &[1.0, 1.0, 0.0, 0.0]);
    }
}

// Property-based tests with proptest
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_add_backward_gradient_check(
        xy in prop::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 2..20)
    ) {
        let (x, y): (Vec<f32>, Vec<f32>) = xy.into_iter().unzip();

        let a = Tensor::from_vec(x.clone(), true);
        let b = Tensor::from_vec(y.clone(), true);
        let mut c = add(&a, &b).unwrap();

        backward(&mut c, Some(ones(x.len())));

        let analytical_a = a.grad().unwrap();

        let numerical_a = finite_difference(
            |x_val| {
                let t_a = Tensor::from_vec(x_val.to_vec(), false);
                let t_b = Tensor::from_vec(y.clone(), false);
                add(&t_a, &t_b).unwrap().data().sum()
            },
            &x,
            1e-3,  // Larger epsilon for f32 precision
        );

        for i in 0..x.len() {
            let diff = (analytical_a[i] - numerical_a[i]).abs();
            prop_assert!(diff < 0.1, "Gradient mismatch at index {}: analytical={}, numerical={}",
                        i, analytical_a[i], numerical_a[i]);
        }
    }

    #[test]
    fn prop_dequantize_backward_gradient_check(
        x in prop::collection::vec(-10.0f32..10.0, 2..20),
        scale in 0.2f32..5.0,
        bias in -4.0f32..4.0,
    ) {
        let q = Tensor::from_vec(x.clone(), true);
        let mut out = dequantize(&q, &Tensor::scalar(scale), Some(&Tensor::scalar(bias))).unwrap();

        backward(&mut out, Some(ones(x.len())));
        let analytical = q.grad().unwrap();

        let numerical = finite_difference(
            |x_val| {
                let t = Tensor::from_vec(x_val.to_vec(), false);
                dequantize(&t, &Tensor::scalar(scale), Some(&Tensor::scalar(bias)))
                    .unwrap()
                    .data()
                    .sum()
            },
            &x,
            1e-1,  // Linear in x, so a wide step only reduces f32 noise
        );

        for i in 0..x.len() {
            let rel = (analytical[i] - numerical[i]).abs() / analytical[i].abs().max(1.0);
            prop_assert!(rel < 0.05, "Gradient mismatch at index {}: analytical={}, numerical={}",
                        i, analytical[i], numerical[i]);
        }
    }

    #[test]
    fn prop_ste_grad_is_masked_identity(
        pairs in prop::collection::vec((-30.0f32..30.0, -3.0f32..3.0), 1..32),
    ) {
        let (x, g): (Vec<f32>, Vec<f32>) = pairs.into_iter().unzip();
        let input = Tensor::from_vec(x.clone(), true);
        let mut out = quantize(&input, &Tensor::scalar(0.25), None, -4, 3).unwrap();

        backward(&mut out, Some(arr1(&g).into_dyn()));
        let grad = input.grad().unwrap();

        for i in 0..x.len() {
            let pre_clip = (x[i] * 0.25).round_ties_even();
            let expected = if (-4.0..=3.0).contains(&pre_clip) { g[i] } else { 0.0 };
            prop_assert_eq!(grad[i], expected);
        }
    }
}
