//! Air quality feature module
//!
//! Read-only access to stored measurements: per-parameter time series and
//! statistics, raw rows inside a window, and a store summary.

pub mod queries;
pub mod routes;


pub use routes::{air_quality_routes, AirQualityState};
