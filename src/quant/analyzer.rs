//! Analyzers: derive quantization bounds from observed statistics
//!
//! An analyzer owns an [`Observer`] and turns its running range into the
//! bounds a quantizer freezes:
//! - Asymmetric: the running range as observed
//! - Symmetric: `[-m, m]` with `m = max(|min|, |max|)` elementwise

use super::observer::{MinMaxObserver, Observer};
use super::stats::Range;
use crate::error::{Error, Result};
use ndarray::{ArrayD, Zip};
use std::fmt::Debug;

/// Bound derivation strategy
pub trait Analyzer: Debug {
    /// Derive bounds from the running statistics
    ///
    /// Fails with [`Error::InvalidState`] if no batch has been observed.
    fn compute_stats(&self, bit_width: u32, symmetric: bool) -> Result<Range>;

    /// Observer backing this analyzer
    fn observer(&self) -> &dyn Observer;

    /// Mutable observer backing this analyzer
    fn observer_mut(&mut self) -> &mut dyn Observer;

    /// Observe a batch and merge it into the running statistics
    fn update_stats(&mut self, batch: &ArrayD<f32>) -> Result<()> {
        let stats = self.observer().compute_stats(batch)?;
        self.observer_mut().merge(stats)
    }

    /// Discard running statistics
    fn reset_stats(&mut self) {
        self.observer_mut().reset();
    }

    /// Running statistics
    fn stats(&self) -> &Range {
        self.observer().stats()
    }
}

/// Min-max analyzer
#[derive(Clone, Debug, Default)]
pub struct MinMaxAnalyzer {
    observer: MinMaxObserver,
}

impl MinMaxAnalyzer {
    /// Analyzer reducing over all axes
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer reducing over the given axes
    pub fn with_dims(dims: impl Into<Vec<usize>>) -> Self {
        Self {
            observer: MinMaxObserver::with_dims(dims),
        }
    }
}

impl Analyzer for MinMaxAnalyzer {
    fn compute_stats(&self, bit_width: u32, symmetric: bool) -> Result<Range> {
        let Some((min, max)) = self.stats().bounds() else {
            return Err(Error::InvalidState(
                "no statistics observed; update_stats must run before compute_stats".into(),
            ));
        };

        tracing::trace!(bit_width, symmetric, "deriving min-max bounds");

        if !symmetric {
            return Ok(self.stats().clone());
        }

        let max_abs = Zip::from(min)
            .and(max)
            .map_collect(|&lo, &hi| lo.abs().max(hi.abs()));
        Ok(Range::new(max_abs.mapv(|m| -m), max_abs))
    }

    fn observer(&self) -> &dyn Observer {
        &self.observer
    }

    fn observer_mut(&mut self) -> &mut dyn Observer {
        &mut self.observer
    }
}
