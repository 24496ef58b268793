//! Observers: per-batch statistics merged into a running range
//!
//! An observer reduces each batch along its configured axes and folds the
//! result into running statistics:
//! - Empty `dims` reduces every axis to a 0-d value
//! - Non-empty `dims` keeps the reduced axes with length 1, so the stats
//!   broadcast back against batches of the same shape

use super::stats::Range;
use crate::error::{Error, Result};
use ndarray::{ArrayD, Axis, Zip};
use std::fmt::Debug;

/// Statistic collector for calibration
pub trait Observer: Debug {
    /// Axes reduced by `compute_stats`
    fn dims(&self) -> &[usize];

    /// Compute statistics of a single batch without touching running state
    fn compute_stats(&self, batch: &ArrayD<f32>) -> Result<Range>;

    /// Fold batch statistics into the running statistics
    fn merge(&mut self, stats: Range) -> Result<()>;

    /// Discard running statistics
    fn reset(&mut self);

    /// Running statistics
    fn stats(&self) -> &Range;
}

/// Min-max observer
#[derive(Clone, Debug, Default)]
pub struct MinMaxObserver {
    dims: Vec<usize>,
    stats: Range,
}

impl MinMaxObserver {
    /// Observer reducing over all axes
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer reducing over the given axes
    pub fn with_dims(dims: impl Into<Vec<usize>>) -> Self {
        let mut dims = dims.into();
        dims.sort_unstable();
        dims.dedup();
        Self {
            dims,
            stats: Range::empty(),
        }
    }

    /// Running minimum
    pub fn min(&self) -> Option<&ArrayD<f32>> {
        self.stats.min.as_ref()
    }

    /// Running maximum
    pub fn max(&self) -> Option<&ArrayD<f32>> {
        self.stats.max.as_ref()
    }
}

impl Observer for MinMaxObserver {
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn compute_stats(&self, batch: &ArrayD<f32>) -> Result<Range> {
        // NaN carries no range information
        if batch.iter().all(|v| v.is_nan()) {
            return Ok(Range::empty());
        }

        let min = reduce(batch, &self.dims, f32::INFINITY, f32::min)?;
        let max = reduce(batch, &self.dims, f32::NEG_INFINITY, f32::max)?;
        Ok(Range::new(min, max))
    }

    fn merge(&mut self, stats: Range) -> Result<()> {
        merge_bound(&mut self.stats.min, stats.min, f32::min)?;
        merge_bound(&mut self.stats.max, stats.max, f32::max)
    }

    fn reset(&mut self) {
        self.stats = Range::empty();
    }

    fn stats(&self) -> &Range {
        &self.stats
    }
}

fn reduce(batch: &ArrayD<f32>, dims: &[usize], init: f32, f: fn(f32, f32) -> f32) -> Result<ArrayD<f32>> {
    if dims.is_empty() {
        let value = batch.iter().fold(init, |acc, &x| f(acc, x));
        return Ok(ArrayD::from_elem(ndarray::IxDyn(&[]), value));
    }

    let ndim = batch.ndim();
    if let Some(&axis) = dims.iter().find(|&&axis| axis >= ndim) {
        return Err(Error::InvalidAxis { axis, ndim });
    }

    let mut reduced = batch.clone();
    for &axis in dims {
        reduced = reduced
            .fold_axis(Axis(axis), init, |&acc, &x| f(acc, x))
            .insert_axis(Axis(axis));
    }
    Ok(reduced)
}

fn merge_bound(
    running: &mut Option<ArrayD<f32>>,
    incoming: Option<ArrayD<f32>>,
    combine: fn(f32, f32) -> f32,
) -> Result<()> {
    let Some(incoming) = incoming else {
        return Ok(());
    };

    match running {
        None => *running = Some(incoming),
        Some(current) => {
            if current.shape() != incoming.shape() {
                return Err(Error::ShapeMismatch {
                    expected: current.shape().to_vec(),
                    got: incoming.shape().to_vec(),
                });
            }
            Zip::from(current)
                .and(&incoming)
                .for_each(|acc, &x| *acc = combine(*acc, x));
        }
    }
    Ok(())
}
