//! Conversion from Arrow RecordBatch to row-based Records.
//!
//! All values are converted to text and nulls to `None`, so an empty Arrow
//! string stays an empty string. The writer later parses these strings back to typed values based
//! on the destination column's SqlType, so every rendering here must be
//! accepted by the matching Postgres input function (`\x`-prefixed hex for
//! BYTEA, explicit UTC offset for zoned timestamps).

use anyhow::{Context, Result};
use arrow::array::*;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int8Type,
    Int16Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
    UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use chrono::{DateTime, Utc};

use crate::formats::table::Record;

/// Convert an Arrow RecordBatch to a vector of Records
pub fn record_batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let num_rows = batch.num_rows();
    let num_columns = batch.num_columns();

    if num_rows == 0 {
        return Ok(Vec::new());
    }

    let mut column_fields: Vec<Vec<Option<String>>> = Vec::with_capacity(num_columns);
    for col_idx in 0..num_columns {
        let array = batch.column(col_idx);
        let fields = array_to_fields(array).with_context(|| {
            format!(
                "Failed to convert column {} ({:?}) to text",
                col_idx,
                array.data_type()
            )
        })?;
        column_fields.push(fields);
    }

    // Transpose to rows, moving each value out of its column
    let mut columns: Vec<std::vec::IntoIter<Option<String>>> =
        column_fields.into_iter().map(Vec::into_iter).collect();
    let mut records = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let fields = columns
            .iter_mut()
            .map(|col| col.next().flatten())
            .collect();

        records.push(Record { fields });
    }

    Ok(records)
}

/// Convert an Arrow array to one optional text value per row
fn array_to_fields(array: &dyn Array) -> Result<Vec<Option<String>>> {
    let mut fields = Vec::with_capacity(array.len());

    match array.data_type() {
        DataType::Boolean => {
            let arr = as_boolean_array(array);
            fields.extend(arr.iter().map(|v| v.map(|b| b.to_string())));
        }
        DataType::Int8 => convert_primitive::<Int8Type>(array, &mut fields),
        DataType::Int16 => convert_primitive::<Int16Type>(array, &mut fields),
        DataType::Int32 => convert_primitive::<Int32Type>(array, &mut fields),
        DataType::Int64 => convert_primitive::<Int64Type>(array, &mut fields),
        DataType::UInt8 => convert_primitive::<UInt8Type>(array, &mut fields),
        DataType::UInt16 => convert_primitive::<UInt16Type>(array, &mut fields),
        DataType::UInt32 => convert_primitive::<UInt32Type>(array, &mut fields),
        DataType::UInt64 => convert_primitive::<UInt64Type>(array, &mut fields),
        DataType::Float32 => convert_primitive::<Float32Type>(array, &mut fields),
        DataType::Float64 => convert_primitive::<Float64Type>(array, &mut fields),
        DataType::Utf8 => {
            let arr = as_string_array(array);
            fields.extend(arr.iter().map(|v| v.map(str::to_string)));
        }
        DataType::LargeUtf8 => {
            let arr = as_largestring_array(array);
            fields.extend(arr.iter().map(|v| v.map(str::to_string)));
        }
        DataType::Binary => {
            let arr = as_generic_binary_array::<i32>(array);
            fields.extend(arr.iter().map(|v| v.map(format_bytea)));
        }
        DataType::LargeBinary => {
            let arr = as_generic_binary_array::<i64>(array);
            fields.extend(arr.iter().map(|v| v.map(format_bytea)));
        }
        DataType::Date32 => {
            let arr = as_primitive_array::<Date32Type>(array);
            for value in arr.iter() {
                fields.push(match value {
                    None => None,
                    Some(days) => {
                        // Days since epoch
                        let datetime = DateTime::from_timestamp(days as i64 * 86_400, 0)
                            .context("Invalid date")?;
                        Some(datetime.format("%Y-%m-%d").to_string())
                    }
                });
            }
        }
        DataType::Date64 => {
            let arr = as_primitive_array::<Date64Type>(array);
            for value in arr.iter() {
                fields.push(match value {
                    None => None,
                    Some(millis) => {
                        let datetime =
                            DateTime::from_timestamp_millis(millis).context("Invalid date")?;
                        Some(datetime.format("%Y-%m-%d").to_string())
                    }
                });
            }
        }
        DataType::Timestamp(unit, tz) => {
            convert_timestamp(array, unit, tz.is_some(), &mut fields)?;
        }
        DataType::Decimal128(_, scale) => {
            let arr = as_primitive_array::<Decimal128Type>(array);
            // Values too large to rescale in i128 keep Arrow's rendering
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array, &options)
                .context("Failed to create display formatter")?;
            for i in 0..arr.len() {
                fields.push(if arr.is_null(i) {
                    None
                } else {
                    Some(
                        format_decimal128(arr.value(i), *scale)
                            .unwrap_or_else(|| formatter.value(i).to_string()),
                    )
                });
            }
        }
        // Everything else (decimal256, times, durations, lists, structs,
        // dictionaries, ...) is stored as Arrow's display text
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array, &options)
                .context("Failed to create display formatter")?;
            for i in 0..array.len() {
                fields.push(if array.is_null(i) {
                    None
                } else {
                    Some(formatter.value(i).to_string())
                });
            }
        }
    }

    Ok(fields)
}

/// Helper to convert primitive arrays
fn convert_primitive<T: ArrowPrimitiveType>(array: &dyn Array, fields: &mut Vec<Option<String>>)
where
    T::Native: std::fmt::Display,
{
    let arr = as_primitive_array::<T>(array);
    fields.extend(arr.iter().map(|v| v.map(|n| n.to_string())));
}

/// Convert timestamp arrays to text
///
/// Arrow timestamps are instants relative to the UTC epoch; zoned columns keep
/// an explicit `+00:00` so Postgres does not reinterpret them in the session
/// time zone.
fn convert_timestamp(
    array: &dyn Array,
    unit: &TimeUnit,
    zoned: bool,
    fields: &mut Vec<Option<String>>,
) -> Result<()> {
    let to_datetime = |value: i64| -> Option<DateTime<Utc>> {
        match unit {
            TimeUnit::Second => DateTime::from_timestamp(value, 0),
            TimeUnit::Millisecond => DateTime::from_timestamp_millis(value),
            TimeUnit::Microsecond => DateTime::from_timestamp_micros(value),
            TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(value)),
        }
    };

    let values: Vec<Option<i64>> = match unit {
        TimeUnit::Second => as_primitive_array::<TimestampSecondType>(array).iter().collect(),
        TimeUnit::Millisecond => as_primitive_array::<TimestampMillisecondType>(array)
            .iter()
            .collect(),
        TimeUnit::Microsecond => as_primitive_array::<TimestampMicrosecondType>(array)
            .iter()
            .collect(),
        TimeUnit::Nanosecond => as_primitive_array::<TimestampNanosecondType>(array)
            .iter()
            .collect(),
    };

    let format = if zoned {
        "%Y-%m-%d %H:%M:%S%.f+00:00"
    } else {
        "%Y-%m-%d %H:%M:%S%.f"
    };

    for value in values {
        fields.push(match value {
            None => None,
            Some(value) => {
                let datetime = to_datetime(value).context("Invalid timestamp")?;
                Some(datetime.format(format).to_string())
            }
        });
    }
    Ok(())
}

/// Format a Decimal128 value with the given scale
///
/// `None` when rescaling a negative-scale value would overflow i128.
fn format_decimal128(value: i128, scale: i8) -> Option<String> {
    if scale <= 0 {
        let factor = 10_i128.checked_pow(scale.unsigned_abs() as u32)?;
        return value.checked_mul(factor).map(|v| v.to_string());
    }

    let scale = scale as u32;
    let divisor = 10_i128.checked_pow(scale)?;
    let sign = if value < 0 { "-" } else { "" };
    let int_part = (value / divisor).abs();
    let frac_part = (value % divisor).abs();

    Some(format!(
        "{}{}.{:0width$}",
        sign,
        int_part,
        frac_part,
        width = scale as usize
    ))
}

/// Postgres hex input format for BYTEA
fn format_bytea(bytes: &[u8]) -> String {
    format!("\\x{}", hex::encode(bytes))
}
