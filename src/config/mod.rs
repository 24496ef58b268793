//! Declarative quantizer configuration
//!
//! # Example
//!
//! ```yaml
//! bits: 8
//! symmetric: false
//! dims: [1]
//! ```

mod load;
mod schema;
mod validate;



pub use load::load_config;
pub use schema::QuantizerConfig;
pub use validate::{validate_config, ValidationError, MAX_BITS, MIN_BITS};
