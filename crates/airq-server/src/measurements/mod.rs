//! Measurement storage
//!
//! Write side: [`BulkWriter`](crate::ingest::BulkWriter) upserts keyed by
//! timestamp. Read side: [`MeasurementRepository`]. Both are implemented by
//! the PostgreSQL repository and by the in-memory store.

pub mod memory;
pub mod postgres;
pub mod repository;
pub mod statistics;

pub use memory::MemoryMeasurementStore;
pub use postgres::PgMeasurementRepository;
pub use repository::{
    DateRange, MeasurementRepository, ParameterStatistics, QueryError, TimeSeriesPoint,
};
