//! Calibrating quantizer
//!
//! A [`Quantizer`] composes an [`Analyzer`] with the quantize kernels. Its
//! bounds come from a calibration scope:
//!
//! ```text
//! Uncalibrated --calibrate()--> Calibrating --finish()--> Calibrated
//! ```
//!
//! Inside the scope every `forward` call observes its input, quantizes with
//! the bounds observed so far, and leaves the frozen bounds untouched. On
//! `finish` the analyzer's final bounds are frozen. Leaving the scope by any
//! path resets the analyzer and restores the inference forward.
//!
//! Scale and bias are derived from the frozen bounds on every call:
//!
//! | | symmetric | asymmetric |
//! |---|---|---|
//! | lower bound | `-2^(b-1) + 1` | `-2^(b-1)` |
//! | upper bound | `2^(b-1) - 1` | `2^(b-1) - 1` |
//! | scale | `upper / max` | `(2^b - 1) / (max - min)` |
//! | bias | none | `-round(min * scale) - 2^(b-1)` |

use super::analyzer::{Analyzer, MinMaxAnalyzer};
use crate::autograd::{self, Tensor};
use crate::config::{validate_config, QuantizerConfig, MAX_BITS, MIN_BITS};
use crate::error::{Error, Result};
use crate::patch::AttributePatch;
use ndarray::{ArrayD, Zip};
use std::ops::{Deref, DerefMut};

/// Forward behavior installed in place of plain inference
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardHook {
    /// Observe each batch and quantize with the bounds observed so far
    Calibrate,
}

/// Lifecycle of a quantizer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationState {
    /// No bounds frozen yet
    Uncalibrated,
    /// Inside a calibration scope
    Calibrating,
    /// Bounds frozen by a completed calibration scope
    Calibrated,
}

/// Quantization parameters derived from frozen bounds
#[derive(Clone, Debug, PartialEq)]
pub struct QuantParams {
    /// Multiplier applied before rounding
    pub scale: ArrayD<f32>,
    /// Offset added after scaling (asymmetric only)
    pub bias: Option<ArrayD<f32>>,
    /// Smallest representable integer
    pub lower_bound: i64,
    /// Largest representable integer
    pub upper_bound: i64,
}

/// Stateful affine quantizer
#[derive(Debug)]
pub struct Quantizer {
    bits: u32,
    symmetric: bool,
    analyzer: Box<dyn Analyzer>,
    min: Option<ArrayD<f32>>,
    max: Option<ArrayD<f32>>,
    hook: Option<ForwardHook>,
}

impl Quantizer {
    /// Create an uncalibrated quantizer
    ///
    /// # Arguments
    /// * `bits` - Bit width, 2 to 24
    /// * `symmetric` - Symmetric range without bias
    /// * `analyzer` - Strategy deriving bounds from observed batches
    pub fn new(bits: u32, symmetric: bool, analyzer: impl Analyzer + 'static) -> Result<Self> {
        if !(MIN_BITS..=MAX_BITS).contains(&bits) {
            return Err(Error::InvalidParameter(format!(
                "bits must be between {MIN_BITS} and {MAX_BITS}, got {bits}"
            )));
        }

        Ok(Self {
            bits,
            symmetric,
            analyzer: Box::new(analyzer),
            min: None,
            max: None,
            hook: None,
        })
    }

    /// Min-max quantizer reducing over all axes
    pub fn min_max(bits: u32, symmetric: bool) -> Result<Self> {
        Self::new(bits, symmetric, MinMaxAnalyzer::new())
    }

    /// Min-max quantizer from a declarative configuration
    pub fn from_config(config: &QuantizerConfig) -> Result<Self> {
        validate_config(config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
        Self::new(
            config.bits,
            config.symmetric,
            MinMaxAnalyzer::with_dims(config.dims.clone()),
        )
    }

    /// Bit width
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Whether the range is symmetric about zero
    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Frozen lower calibration bound
    pub fn min(&self) -> Option<&ArrayD<f32>> {
        self.min.as_ref()
    }

    /// Frozen upper calibration bound
    pub fn max(&self) -> Option<&ArrayD<f32>> {
        self.max.as_ref()
    }

    /// Analyzer collecting calibration statistics
    pub fn analyzer(&self) -> &dyn Analyzer {
        self.analyzer.as_ref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CalibrationState {
        if self.hook.is_some() {
            CalibrationState::Calibrating
        } else if self.min.is_some() && self.max.is_some() {
            CalibrationState::Calibrated
        } else {
            CalibrationState::Uncalibrated
        }
    }

    /// Smallest representable integer
    pub fn lower_bound(&self) -> i64 {
        let half = 1i64 << (self.bits - 1);
        if self.symmetric {
            -half + 1
        } else {
            -half
        }
    }

    /// Largest representable integer
    pub fn upper_bound(&self) -> i64 {
        (1i64 << (self.bits - 1)) - 1
    }

    fn bounds(&self) -> Result<(&ArrayD<f32>, &ArrayD<f32>)> {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => Ok((min, max)),
            _ => Err(Error::Uninitialized(
                "run a calibration scope before quantizing".into(),
            )),
        }
    }

    /// Scale derived from the frozen bounds
    ///
    /// A zero-width range (an all-zero channel, or a constant one when
    /// asymmetric) is widened to `f32::EPSILON` so its values map onto a
    /// single level instead of NaN. Bounds that still yield a non-finite or
    /// non-positive scale fail with [`Error::InvalidState`].
    pub fn scale(&self) -> Result<ArrayD<f32>> {
        let (min, max) = self.bounds()?;

        let scale = if self.symmetric {
            let upper = self.upper_bound() as f32;
            max.mapv(|m| upper / nonzero_width(m))
        } else {
            if min.shape() != max.shape() {
                return Err(Error::ShapeMismatch {
                    expected: min.shape().to_vec(),
                    got: max.shape().to_vec(),
                });
            }
            let levels = ((1i64 << self.bits) - 1) as f32;
            Zip::from(min)
                .and(max)
                .map_collect(|&lo, &hi| levels / nonzero_width(hi - lo))
        };

        if let Some(bad) = scale.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(Error::InvalidState(format!(
                "calibrated bounds give unusable scale {bad}"
            )));
        }
        Ok(scale)
    }

    /// Bias derived from the frozen bounds, `None` when symmetric
    pub fn bias(&self) -> Result<Option<ArrayD<f32>>> {
        if self.symmetric {
            // Still report an uncalibrated quantizer
            self.bounds()?;
            return Ok(None);
        }

        let scale = self.scale()?;
        let (min, _) = self.bounds()?;
        let half = (1i64 << (self.bits - 1)) as f32;
        Ok(Some(
            Zip::from(min)
                .and(&scale)
                .map_collect(|&lo, &s| -(lo * s).round_ties_even() - half),
        ))
    }

    /// All parameters the quantize kernel needs
    pub fn params(&self) -> Result<QuantParams> {
        Ok(QuantParams {
            scale: self.scale()?,
            bias: self.bias()?,
            lower_bound: self.lower_bound(),
            upper_bound: self.upper_bound(),
        })
    }

    /// Quantize `input`
    ///
    /// Outside a calibration scope this requires frozen bounds and fails with
    /// [`Error::Uninitialized`] otherwise. Inside a scope it also observes
    /// `input`. Gradient flows back to `input` through the straight-through
    /// estimator.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        match self.hook {
            Some(ForwardHook::Calibrate) => self.calibration_forward(input),
            None => self.inference_forward(input),
        }
    }

    /// Map quantized values back using the frozen parameters
    pub fn dequantize(&self, input: &Tensor) -> Result<Tensor> {
        let scale = Tensor::new(self.scale()?, false);
        let bias = self.bias()?.map(|b| Tensor::new(b, false));
        autograd::dequantize(input, &scale, bias.as_ref())
    }

    fn inference_forward(&self, input: &Tensor) -> Result<Tensor> {
        let params = self.params()?;
        let scale = Tensor::new(params.scale, false);
        let bias = params.bias.map(|b| Tensor::new(b, false));
        autograd::quantize(
            input,
            &scale,
            bias.as_ref(),
            params.lower_bound,
            params.upper_bound,
        )
    }

    fn calibration_forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.analyzer.update_stats(input.data())?;
        tracing::debug!(shape = ?input.shape(), "observed calibration batch");

        let stats = self.analyzer.compute_stats(self.bits, self.symmetric)?;
        let (Some(min), Some(max)) = (stats.min, stats.max) else {
            return Err(Error::InvalidState(
                "analyzer returned incomplete bounds".into(),
            ));
        };

        tracing::trace!(shape = ?input.shape(), "quantizing with transient calibration bounds");

        let mut with_min = AttributePatch::new(self, |q| &mut q.min, min);
        let with_bounds = AttributePatch::new(&mut *with_min, |q| &mut q.max, max);
        with_bounds.inference_forward(input)
    }

    /// Open a calibration scope
    ///
    /// Call [`CalibrationScope::finish`] to freeze the observed bounds.
    /// Dropping the scope without finishing discards them.
    ///
    /// # Example
    ///
    /// ```
    /// use cuantizar::{Quantizer, Tensor};
    ///
    /// let mut quantizer = Quantizer::min_max(8, false).unwrap();
    /// let batch = Tensor::from_vec(vec![-1.0, 0.0, 3.0], false);
    ///
    /// let mut scope = quantizer.calibrate();
    /// scope.forward(&batch).unwrap();
    /// scope.finish().unwrap();
    ///
    /// assert!(quantizer.min().is_some());
    /// ```
    pub fn calibrate(&mut self) -> CalibrationScope<'_> {
        tracing::debug!(bits = self.bits, symmetric = self.symmetric, "entering calibration scope");
        CalibrationScope {
            quantizer: AttributePatch::new(self, |q| &mut q.hook, ForwardHook::Calibrate),
        }
    }

    /// Run `f` inside a calibration scope
    ///
    /// Errors from `f` propagate unchanged and leave the frozen bounds as they
    /// were. On success the observed bounds are frozen.
    pub fn calibrate_with<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Quantizer) -> Result<R>,
    {
        let mut scope = self.calibrate();
        let value = f(&mut scope)?;
        scope.finish()?;
        Ok(value)
    }
}

fn nonzero_width(width: f32) -> f32 {
    if width == 0.0 {
        f32::EPSILON
    } else {
        width
    }
}

/// Guard for an open calibration scope
///
/// Dereferences to the quantizer, whose `forward` observes batches while the
/// guard is alive.
pub struct CalibrationScope<'a> {
    quantizer: AttributePatch<'a, Quantizer, ForwardHook>,
}

impl CalibrationScope<'_> {
    /// Freeze the analyzer's final bounds and close the scope
    ///
    /// Fails with [`Error::InvalidState`] if no batch was observed, leaving
    /// the frozen bounds untouched.
    pub fn finish(mut self) -> Result<()> {
        let q = &mut *self.quantizer;
        let stats = q.analyzer.compute_stats(q.bits, q.symmetric)?;
        let (Some(min), Some(max)) = (stats.min, stats.max) else {
            return Err(Error::InvalidState(
                "analyzer returned incomplete bounds".into(),
            ));
        };

        tracing::debug!(shape = ?min.shape(), "freezing calibration bounds");
        q.min = Some(min);
        q.max = Some(max);
        Ok(())
    }
}

impl Deref for CalibrationScope<'_> {
    type Target = Quantizer;

    fn deref(&self) -> &Quantizer {
        &self.quantizer
    }
}

impl DerefMut for CalibrationScope<'_> {
    fn deref_mut(&mut self) -> &mut Quantizer {
        &mut self.quantizer
    }
}

impl Drop for CalibrationScope<'_> {
    fn drop(&mut self) {
        if self.quantizer.analyzer.stats().is_empty() {
            tracing::warn!("calibration scope closed without observing any batch");
        }
        self.quantizer.analyzer.reset_stats();
        tracing::debug!("leaving calibration scope");
    }
}
