//! Running range statistics

use ndarray::ArrayD;

/// Observed value range
///
/// Both bounds are absent until the first batch holding a non-NaN value is
/// merged, and present afterwards with `min <= max` elementwise. NaN values
/// are skipped; a reduced lane that is entirely NaN holds `+inf`/`-inf` until
/// a later batch supplies a value for it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Range {
    /// Elementwise minimum
    pub min: Option<ArrayD<f32>>,
    /// Elementwise maximum
    pub max: Option<ArrayD<f32>>,
}

impl Range {
    /// Range with no observations
    pub fn empty() -> Self {
        Self::default()
    }

    /// Range with both bounds present
    pub fn new(min: ArrayD<f32>, max: ArrayD<f32>) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// True if neither bound is present
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// True if both bounds are present
    pub fn is_complete(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Both bounds, if present
    pub fn bounds(&self) -> Option<(&ArrayD<f32>, &ArrayD<f32>)> {
        self.min.as_ref().zip(self.max.as_ref())
    }
}
