//! Mapping from Arrow field types to destination SQL types.

use arrow::datatypes::{DataType, Schema as ArrowSchema};

use crate::db::schema::{Column, Schema, SqlType};

/// Map an Arrow data type to the SQL type of its destination column
///
/// Anything without a closer match is stored as TEXT, mirroring the display
/// fallback used when converting values.
pub fn sql_type_for(data_type: &DataType) -> SqlType {
    match data_type {
        DataType::Boolean => SqlType::Boolean,
        DataType::Int8 | DataType::Int16 | DataType::UInt8 => SqlType::SmallInt,
        DataType::Int32 | DataType::UInt16 => SqlType::Integer,
        DataType::Int64 | DataType::UInt32 => SqlType::BigInt,
        DataType::UInt64 => SqlType::Numeric,
        DataType::Float32 => SqlType::Real,
        DataType::Float64 => SqlType::DoublePrecision,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => SqlType::Numeric,
        DataType::Date32 | DataType::Date64 => SqlType::Date,
        DataType::Timestamp(_, None) => SqlType::Timestamp,
        DataType::Timestamp(_, Some(_)) => SqlType::TimestampTz,
        DataType::Binary | DataType::LargeBinary => SqlType::Bytea,
        _ => SqlType::Text,
    }
}

/// Build the destination schema from a Parquet file's embedded Arrow schema
pub fn schema_from_arrow(arrow_schema: &ArrowSchema) -> Schema {
    Schema {
        columns: arrow_schema
            .fields()
            .iter()
            .map(|field| Column {
                name: field.name().clone(),
                sql_type: sql_type_for(field.data_type()),
                nullable: field.is_nullable(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, TimeUnit};

    #[test]
    fn test_sql_type_mapping() {
        let test_cases = [
            (DataType::Int16, SqlType::SmallInt),
            (DataType::Int32, SqlType::Integer),
            (DataType::Int64, SqlType::BigInt),
            (DataType::UInt64, SqlType::Numeric),
            (DataType::Float32, SqlType::Real),
            (DataType::Float64, SqlType::DoublePrecision),
            (DataType::Decimal128(10, 2), SqlType::Numeric),
            (DataType::Utf8, SqlType::Text),
            (DataType::LargeUtf8, SqlType::Text),
            (DataType::Date32, SqlType::Date),
            (
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                SqlType::Timestamp,
            ),
            (
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                SqlType::TimestampTz,
            ),
            (DataType::Binary, SqlType::Bytea),
            (DataType::Time64(TimeUnit::Microsecond), SqlType::Text),
        ];

        for (data_type, expected) in test_cases {
            assert_eq!(sql_type_for(&data_type), expected, "{:?}", data_type);
        }
    }

    #[test]
    fn test_schema_keeps_order_and_nullability() {
        let arrow_schema = ArrowSchema::new(vec![
            Field::new("sale_id", DataType::Int64, false),
            Field::new("amount", DataType::Float64, true),
        ]);

        let schema = schema_from_arrow(&arrow_schema);

        assert_eq!(schema.column_names(), vec!["sale_id", "amount"]);
        assert!(!schema.columns[0].nullable);
        assert!(schema.columns[1].nullable);
    }
}
