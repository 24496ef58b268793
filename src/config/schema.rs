//! YAML schema for declarative quantizer configuration

use serde::{Deserialize, Serialize};

/// Quantizer specification
///
/// # Example
///
/// ```yaml
/// bits: 8
/// symmetric: false
/// dims: [1]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Quantization bits (2..=24)
    pub bits: u32,

    /// Symmetric quantization (no bias, range centered at zero)
    #[serde(default = "default_true")]
    pub symmetric: bool,

    /// Axes reduced when observing statistics; empty reduces all axes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dims: Vec<usize>,
}

fn default_true() -> bool {
    true
}

impl QuantizerConfig {
    /// Symmetric configuration reducing over all axes
    pub fn symmetric(bits: u32) -> Self {
        Self {
            bits,
            symmetric: true,
            dims: Vec::new(),
        }
    }

    /// Asymmetric configuration reducing over all axes
    pub fn asymmetric(bits: u32) -> Self {
        Self {
            bits,
            symmetric: false,
            dims: Vec::new(),
        }
    }

    /// Reduce only over the given axes
    pub fn with_dims(mut self, dims: impl Into<Vec<usize>>) -> Self {
        self.dims = dims.into();
        self
    }
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self::symmetric(8)
    }
}
