use anyhow::{Result, anyhow};
use bytes::Bytes;

use super::delimited::DelimitedDecoder;
use super::json::JsonDecoder;
use super::parquet::ParquetDecoder;
use crate::db::schema::Schema;

/// A single record (row) of a decoded table
///
/// Every value is carried as text and `None` is SQL NULL, so an empty string
/// stays an empty string. The writer parses fields back into typed values
/// according to the column's SqlType.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: Vec<Option<String>>,
}

impl Record {
    /// Borrowed view of the fields
    pub fn values(&self) -> Vec<Option<&str>> {
        self.fields.iter().map(Option::as_deref).collect()
    }
}

/// In-memory tabular structure shared by all source formats
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.records.len()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.columns.len()
    }
}

/// Decodes the complete byte content of a source object into a Table
pub trait TableDecoder: Send + Sync {
    fn decode(&self, data: Bytes) -> Result<Table>;
}

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Parquet,
}

impl Format {
    /// Parse format from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "parquet" => Ok(Format::Parquet),
            _ => Err(anyhow!(
                "Unsupported format: {}. Supported formats: csv, json, parquet",
                s
            )),
        }
    }

    /// Auto-detect the format from an object key's extension
    pub fn from_key(key: &str) -> Option<Self> {
        let lower = key.to_lowercase();

        if lower.ends_with(".csv") {
            Some(Format::Csv)
        } else if lower.ends_with(".json") {
            Some(Format::Json)
        } else if lower.ends_with(".parquet") {
            Some(Format::Parquet)
        } else {
            None
        }
    }

    /// Decoder for this format
    pub fn decoder(self) -> Box<dyn TableDecoder> {
        match self {
            Format::Csv => Box::new(DelimitedDecoder::csv()),
            Format::Json => Box::new(JsonDecoder),
            Format::Parquet => Box::new(ParquetDecoder),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Parquet => "parquet",
        };
        f.write_str(name)
    }
}
