use anyhow::Result;

use crate::formats::Record;

/// SQL data type of a destination column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Bytea,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Text => "TEXT",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            SqlType::Bytea => "BYTEA",
        }
    }

    /// Find the most specific common type that accommodates both types
    pub fn common_type(&self, other: &SqlType) -> SqlType {
        if self == other {
            return *self;
        }

        let type_promotion = |a: &SqlType, b: &SqlType| -> Option<SqlType> {
            use SqlType::*;
            match (a, b) {
                // Booleans only combine with booleans; `true` next to `2`
                // falls through to TEXT

                // Integer type promotions
                (SmallInt, Integer) | (Integer, SmallInt) => Some(Integer),
                (SmallInt, BigInt) | (BigInt, SmallInt) => Some(BigInt),
                (Integer, BigInt) | (BigInt, Integer) => Some(BigInt),

                (SmallInt | Integer | BigInt, Numeric) | (Numeric, SmallInt | Integer | BigInt) => {
                    Some(Numeric)
                }

                // Anything numeric mixed with floats becomes double precision
                (Real, DoublePrecision) | (DoublePrecision, Real) => Some(DoublePrecision),
                (SmallInt | Integer | BigInt | Numeric, Real | DoublePrecision)
                | (Real | DoublePrecision, SmallInt | Integer | BigInt | Numeric) => {
                    Some(DoublePrecision)
                }

                (Date, Timestamp) | (Timestamp, Date) => Some(Timestamp),
                (Date, TimestampTz) | (TimestampTz, Date) => Some(TimestampTz),
                (Timestamp, TimestampTz) | (TimestampTz, Timestamp) => Some(TimestampTz),

                _ => None,
            }
        };

        type_promotion(self, other).unwrap_or(SqlType::Text)
    }
}

/// A column in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Ordered column set of a decoded table
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Generate the CREATE TABLE statement for this schema
    pub fn generate_ddl(&self, table_name: &str) -> String {
        let mut ddl = format!("CREATE TABLE {} (\n", quote_identifier(table_name));

        let column_defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let nullable_clause = if col.nullable { "" } else { " NOT NULL" };
                format!(
                    "  {} {}{}",
                    quote_identifier(&col.name),
                    col.sql_type.to_postgres(),
                    nullable_clause
                )
            })
            .collect();

        ddl.push_str(&column_defs.join(",\n"));
        ddl.push_str("\n)");

        ddl
    }
}

/// Quote an SQL identifier, doubling any embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Infers column types from the textual values of delimited files
pub struct SchemaInferrer;

impl SchemaInferrer {
    /// Infer the type of a single value
    fn infer_value_type(value: &str) -> SqlType {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return SqlType::Text;
        }

        if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            return SqlType::Boolean;
        }

        if let Ok(val) = trimmed.parse::<i64>() {
            return if val >= i16::MIN as i64 && val <= i16::MAX as i64 {
                SqlType::SmallInt
            } else if val >= i32::MIN as i64 && val <= i32::MAX as i64 {
                SqlType::Integer
            } else {
                SqlType::BigInt
            };
        }

        // Floats always land in DOUBLE PRECISION; REAL silently drops digits
        if trimmed.parse::<f64>().is_ok() {
            return SqlType::DoublePrecision;
        }

        if chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
            return SqlType::Date;
        }

        if Self::is_valid_timestamp(trimmed) {
            return SqlType::Timestamp;
        }

        SqlType::Text
    }

    /// Check if a value is an ISO 8601 timestamp without zone
    fn is_valid_timestamp(value: &str) -> bool {
        TIMESTAMP_FORMATS
            .iter()
            .any(|format| chrono::NaiveDateTime::parse_from_str(value, format).is_ok())
    }

    /// Infer column types from multiple values
    fn infer_column_type<'a>(values: impl Iterator<Item = Option<&'a str>>) -> (SqlType, bool) {
        let mut inferred_type: Option<SqlType> = None;
        let mut has_nulls = false;

        for value in values {
            match value.map(Self::infer_value_type) {
                Some(val_type) => {
                    inferred_type = Some(match inferred_type {
                        None => val_type,
                        Some(current) => current.common_type(&val_type),
                    });
                }
                None => {
                    has_nulls = true;
                }
            }
        }

        // A column with no values at all can hold anything
        match inferred_type {
            Some(sql_type) => (sql_type, has_nulls),
            None => (SqlType::Text, true),
        }
    }

    /// Infer a schema for `header` from every record of the table
    pub fn infer_from_records(header: &[String], records: &[Record]) -> Result<Schema> {
        if header.is_empty() {
            anyhow::bail!("Cannot infer schema without column names");
        }

        let columns = header
            .iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let values = records
                    .iter()
                    .map(|record| record.fields.get(col_idx).and_then(|f| f.as_deref()));
                let (sql_type, nullable) = Self::infer_column_type(values);
                Column {
                    name: name.clone(),
                    sql_type,
                    nullable,
                }
            })
            .collect();

        Ok(Schema { columns })
    }
}

/// Timestamp layouts recognised during inference and accepted when binding
pub const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",    // 2025-01-01 12:34:56
    "%Y-%m-%dT%H:%M:%S",    // 2025-01-01T12:34:56
    "%Y-%m-%d %H:%M:%S%.f", // With fractional seconds
    "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 with fractional seconds
    "%Y-%m-%d %H:%M",       // Without seconds
    "%Y-%m-%dT%H:%M",       // ISO 8601 without seconds
];
