//! Source format decoders

pub mod delimited;
pub mod json;
pub mod parquet;
pub mod table;

pub use table::{Format, Record, Table, TableDecoder};

#[cfg(test)]
pub(crate) use self::parquet::fixtures;
