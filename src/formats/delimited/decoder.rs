use anyhow::{Context, Result};
use bytes::Bytes;

use crate::db::schema::SchemaInferrer;
use crate::formats::table::{Record, Table, TableDecoder};

/// Configuration for delimited file decoding
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

/// Decoder for delimited text with a header row
pub struct DelimitedDecoder {
    config: DelimitedConfig,
}

impl DelimitedDecoder {
    pub fn new(config: DelimitedConfig) -> Self {
        Self { config }
    }

    pub fn csv() -> Self {
        Self::new(DelimitedConfig::default())
    }
}

impl TableDecoder for DelimitedDecoder {
    fn decode(&self, data: Bytes) -> Result<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .quote(self.config.quote)
            .has_headers(true)
            .from_reader(data.as_ref());

        let raw_header = csv_reader.headers().context("Failed to read CSV header")?;
        if raw_header.is_empty() {
            anyhow::bail!("CSV input has no header row");
        }
        let header = column_names(raw_header.iter());

        let mut records = Vec::new();
        for (idx, result) in csv_reader.records().enumerate() {
            // Line numbers are 1-based and the header occupies line 1
            let record =
                result.with_context(|| format!("Failed to parse CSV record {}", idx + 2))?;

            // Only a truly empty field is NULL; whitespace is kept as text
            records.push(Record {
                fields: record
                    .iter()
                    .map(|s| (!s.is_empty()).then(|| s.to_string()))
                    .collect(),
            });
        }

        let schema = SchemaInferrer::infer_from_records(&header, &records)?;

        Ok(Table { schema, records })
    }
}

/// Turn header cells into usable, unique column names
///
/// Names are kept verbatim. A blank cell becomes `Unnamed: <position>` and a
/// repeated name gets a `.1`, `.2`, ... suffix, so an exported index column
/// or a duplicated heading still yields valid DDL.
fn column_names<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for (idx, cell) in cells.enumerate() {
        let base = if cell.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            cell.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 0;
        while names.contains(&name) {
            suffix += 1;
            name = format!("{}.{}", base, suffix);
        }
        names.push(name);
    }

    names
}
