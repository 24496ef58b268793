//! Affine quantization with calibration
//!
//! - [`Observer`]: per-batch min/max statistics merged into a running range
//! - [`Analyzer`]: turns running statistics into quantization bounds
//! - [`Quantizer`]: freezes bounds in a calibration scope and quantizes with
//!   a straight-through gradient
//! - [`kernels`]: the raw quantize and dequantize arithmetic

mod analyzer;
pub mod kernels;
mod observer;
mod quantizer;
mod stats;

pub use analyzer::{Analyzer, MinMaxAnalyzer};
pub use observer::{MinMaxObserver, Observer};
pub use quantizer::{CalibrationScope, CalibrationState, ForwardHook, QuantParams, Quantizer};
pub use stats::Range;
