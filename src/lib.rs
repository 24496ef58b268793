//! # Cuantizar: Affine Quantization with Calibration
//!
//! Cuantizar maps `f32` tensors onto a bounded integer range with a
//! calibrated scale and bias, and back. Gradients flow through the
//! non-differentiable rounding step via a straight-through estimator.
//!
//! ## Architecture
//!
//! - **autograd**: Tape-based automatic differentiation over `ndarray`
//! - **quant**: Observers, analyzers, kernels, and the calibrating `Quantizer`
//! - **patch**: Scoped attribute patching with guaranteed restoration
//! - **config**: Declarative YAML/JSON quantizer configuration
//!
//! ## Example
//!
//! ```
//! use cuantizar::{Quantizer, Tensor};
//!
//! let mut quantizer = Quantizer::min_max(3, true).unwrap();
//! let input = Tensor::from_vec(vec![-9.8, -7.8, -5.8, -3.8, -1.8, 0.2, 2.2, 4.2], true);
//!
//! quantizer
//!     .calibrate_with(|q| q.forward(&input).map(|_| ()))
//!     .unwrap();
//!
//! let output = quantizer.forward(&input).unwrap();
//! assert_eq!(output.data().as_slice().unwrap(), &[-3.0, -2.0, -2.0, -1.0, -1.0, 0.0, 1.0, 1.0]);
//! ```

pub mod autograd;
pub mod config;
pub mod patch;
pub mod quant;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
pub use quant::{
    Analyzer, CalibrationScope, CalibrationState, MinMaxAnalyzer, MinMaxObserver, Observer,
    QuantParams, Quantizer, Range,
};
