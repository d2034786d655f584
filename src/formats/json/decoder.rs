//! JSON table decoding.
//!
//! Accepted shapes:
//! - an array of objects, one object per row (`[{"sku": "A", "price": 1.5}, ...]`)
//! - an array of scalars, decoded as a single column named `0`
//! - an object of columns, each column either an object keyed by row label
//!   (`{"sku": {"0": "A", "1": "B"}}`) or an array of values
//!   (`{"sku": ["A", "B"]}`)
//!
//! Column types come from the JSON value kinds rather than from text
//! inference, so `"42"` stays TEXT while `42` becomes BIGINT.

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::db::schema::{Column, Schema, SqlType};
use crate::formats::table::{Record, Table, TableDecoder};

/// Decoder for JSON arrays/objects of rows
pub struct JsonDecoder;

impl TableDecoder for JsonDecoder {
    fn decode(&self, data: Bytes) -> Result<Table> {
        let value: Value = serde_json::from_slice(&data).context("Failed to parse JSON")?;

        let columns = match value {
            Value::Array(rows) => columns_from_rows(rows)?,
            Value::Object(columns) => columns_from_object(columns)?,
            other => {
                return Err(anyhow!(
                    "Expected a JSON array or object at the top level, found {}",
                    kind_name(&other)
                ));
            }
        };

        Ok(build_table(columns))
    }
}

/// Column-major intermediate: name plus one optional value per row
struct JsonColumn {
    name: String,
    values: Vec<Option<Value>>,
}

fn columns_from_rows(rows: Vec<Value>) -> Result<Vec<JsonColumn>> {
    if rows.is_empty() {
        anyhow::bail!("JSON array is empty; no columns can be derived");
    }

    if !rows.iter().any(Value::is_object) {
        let values = rows.into_iter().map(non_null).collect();
        return Ok(vec![JsonColumn {
            name: "0".to_string(),
            values,
        }]);
    }

    let num_rows = rows.len();
    let mut columns: Vec<JsonColumn> = Vec::new();

    for (row_idx, row) in rows.into_iter().enumerate() {
        let object = match row {
            Value::Object(object) => object,
            other => {
                return Err(anyhow!(
                    "JSON row {} is {}, expected an object",
                    row_idx,
                    kind_name(&other)
                ));
            }
        };

        for (key, value) in object {
            let position = match columns.iter().position(|c| c.name == key) {
                Some(position) => position,
                None => {
                    // Keys first seen on a later row are NULL for earlier rows
                    columns.push(JsonColumn {
                        name: key,
                        values: vec![None; num_rows],
                    });
                    columns.len() - 1
                }
            };
            columns[position].values[row_idx] = non_null(value);
        }
    }

    Ok(columns)
}

fn columns_from_object(object: Map<String, Value>) -> Result<Vec<JsonColumn>> {
    if object.is_empty() {
        anyhow::bail!("JSON object is empty; no columns can be derived");
    }

    // Row labels across all columns, in first-seen order
    let mut row_labels: Vec<String> = Vec::new();
    for (name, column) in &object {
        match column {
            Value::Object(cells) => {
                for label in cells.keys() {
                    if !row_labels.contains(label) {
                        row_labels.push(label.clone());
                    }
                }
            }
            Value::Array(cells) => {
                for idx in row_labels.len()..cells.len() {
                    row_labels.push(idx.to_string());
                }
            }
            other => {
                return Err(anyhow!(
                    "JSON column '{}' is {}; columns must be objects or arrays",
                    name,
                    kind_name(other)
                ));
            }
        }
    }

    object
        .into_iter()
        .map(|(name, column)| {
            let values = match column {
                Value::Object(mut cells) => row_labels
                    .iter()
                    .map(|label| cells.remove(label).and_then(non_null))
                    .collect(),
                Value::Array(cells) => {
                    let mut values: Vec<Option<Value>> =
                        cells.into_iter().map(non_null).collect();
                    values.resize(row_labels.len(), None);
                    values
                }
                other => {
                    return Err(anyhow!(
                        "JSON column '{}' is {}; columns must be objects or arrays",
                        name,
                        kind_name(&other)
                    ));
                }
            };
            Ok(JsonColumn { name, values })
        })
        .collect()
}

fn build_table(columns: Vec<JsonColumn>) -> Table {
    let num_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);

    let schema = Schema {
        columns: columns
            .iter()
            .map(|column| {
                let (sql_type, nullable) = infer_column_type(&column.values);
                Column {
                    name: column.name.clone(),
                    sql_type,
                    nullable,
                }
            })
            .collect(),
    };

    let records = (0..num_rows)
        .map(|row_idx| Record {
            fields: columns
                .iter()
                .map(|column| column.values[row_idx].as_ref().map(value_to_field))
                .collect(),
        })
        .collect();

    Table { schema, records }
}

fn infer_column_type(values: &[Option<Value>]) -> (SqlType, bool) {
    let mut inferred: Option<SqlType> = None;
    let mut has_nulls = false;

    for value in values {
        match value {
            Some(value) => {
                let value_type = value_type(value);
                inferred = Some(match inferred {
                    None => value_type,
                    Some(current) => current.common_type(&value_type),
                });
            }
            None => has_nulls = true,
        }
    }

    match inferred {
        Some(sql_type) => (sql_type, has_nulls),
        None => (SqlType::Text, true),
    }
}

fn value_type(value: &Value) -> SqlType {
    match value {
        Value::Bool(_) => SqlType::Boolean,
        Value::Number(n) if n.is_i64() => SqlType::BigInt,
        Value::Number(n) if n.is_u64() => SqlType::Numeric,
        Value::Number(_) => SqlType::DoublePrecision,
        _ => SqlType::Text,
    }
}

fn value_to_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Nested structures are stored as their JSON text
        nested => nested.to_string(),
    }
}

fn non_null(value: Value) -> Option<Value> {
    if value.is_null() { None } else { Some(value) }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
