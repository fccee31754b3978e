//! AirQ Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the AirQ workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`AirqError`] and the crate [`Result`] alias
//! - **Logging**: tracing subscriber bootstrap driven by `LOG_*` variables
//! - **Types**: the measurement model and the closed set of sensor parameters
//!
//! # Example
//!
//! ```no_run
//! use airq_common::types::Parameter;
//!
//! fn column_for(name: &str) -> airq_common::Result<&'static str> {
//!     let parameter: Parameter = name.parse()?;
//!     Ok(parameter.column())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{AirqError, Result};
pub use types::{Measurement, Parameter};
