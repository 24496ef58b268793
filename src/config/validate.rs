//! Configuration validation

use super::schema::QuantizerConfig;

/// Smallest supported bit width
pub const MIN_BITS: u32 = 2;

/// Largest bit width whose integer bounds are exact in `f32`
pub const MAX_BITS: u32 = 24;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid quantization bits: {0} (must be between 2 and 24)")]
    InvalidBits(u32),

    #[error("Duplicate reduction axis: {0}")]
    DuplicateDim(usize),
}

/// Validate a quantizer specification
///
/// Checks:
/// - Bit width is in range
/// - Reduction axes are unique
pub fn validate_config(config: &QuantizerConfig) -> Result<(), ValidationError> {
    if !(MIN_BITS..=MAX_BITS).contains(&config.bits) {
        return Err(ValidationError::InvalidBits(config.bits));
    }

    let mut seen = Vec::with_capacity(config.dims.len());
    for &dim in &config.dims {
        if seen.contains(&dim) {
            return Err(ValidationError::DuplicateDim(dim));
        }
        seen.push(dim);
    }

    Ok(())
}
