//! Parquet file format support for the data pipeline.
//!
//! This module provides functionality to decode Apache Parquet objects into
//! tables. It includes:
//! - Schema mapping between Arrow and SQL types
//! - Conversion from Arrow RecordBatches to row-based Records
//! - ParquetDecoder that implements the TableDecoder trait

mod conversion;
mod decoder;
mod schema;

pub use decoder::ParquetDecoder;

#[cfg(test)]
pub(crate) use decoder::fixtures;
