//! Backward operation trait

use super::Tensor;

/// Trait for backward pass operations
///
/// Implementors read the gradient of the tensor they produced and push the
/// local gradient into their differentiable inputs. Graph traversal lives in
/// [`backward`](super::backward), which calls each op exactly once after all
/// of its consumers.
pub trait BackwardOp {
    /// Perform backward pass for this op only
    fn backward(&self);

    /// Inputs this op propagates gradient to
    fn inputs(&self) -> Vec<&Tensor>;
}
