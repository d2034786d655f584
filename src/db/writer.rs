use anyhow::{Context, Result, anyhow};
use sqlx::Connection as _;
use tracing::debug;

use super::connection::{Connection, Dialect};
use super::schema::{Schema, SqlType, TIMESTAMP_FORMATS, quote_identifier};
use crate::formats::{Record, Table};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// How a column's text values are turned into bind parameters
#[derive(Debug, Clone, Copy, PartialEq)]
enum TypeCategory {
    /// Parsed to native Rust types (bool, i16, i32, i64, f32, f64)
    NativeNumeric,
    /// Parsed to chrono types (NaiveDateTime)
    NativeParsed,
    /// Bound as text and wrapped in CAST (NUMERIC, DATE, TIMESTAMPTZ, BYTEA)
    StringCast,
    /// Bound as text directly
    DirectString,
}

impl TypeCategory {
    fn from_sql_type(sql_type: SqlType) -> Self {
        match sql_type {
            SqlType::Boolean
            | SqlType::SmallInt
            | SqlType::Integer
            | SqlType::BigInt
            | SqlType::Real
            | SqlType::DoublePrecision => TypeCategory::NativeNumeric,
            SqlType::Timestamp => TypeCategory::NativeParsed,
            SqlType::Numeric | SqlType::Date | SqlType::TimestampTz | SqlType::Bytea => {
                TypeCategory::StringCast
            }
            SqlType::Text => TypeCategory::DirectString,
        }
    }
}

/// Writes decoded tables with replace semantics
pub struct TableWriter {
    batch_size: usize,
}

impl TableWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Replace `table_name` with the contents of `table`
    ///
    /// Drop, create and all inserts run in one transaction, so a failure leaves
    /// the previous version of this table in place. Other tables are not
    /// affected either way. Returns the number of rows written.
    pub async fn replace_table(
        &self,
        conn: &mut Connection,
        table_name: &str,
        table: &Table,
    ) -> Result<u64> {
        if table.num_columns() == 0 {
            anyhow::bail!("Cannot create table '{}' without columns", table_name);
        }

        let dialect = conn.dialect();
        let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(table_name));
        let create_sql = table.schema.generate_ddl(table_name);
        let rows_per_batch = self.rows_per_batch(table.num_columns(), dialect);

        match conn {
            Connection::Postgres(pg_conn) => {
                let mut tx = pg_conn
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;

                sqlx::query(&drop_sql)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to drop table '{}'", table_name))?;
                sqlx::query(&create_sql)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to create table '{}'", table_name))?;

                for (batch_idx, records) in table.records.chunks(rows_per_batch).enumerate() {
                    let insert_sql =
                        build_insert_sql(table_name, &table.schema, records.len(), dialect);
                    let mut query = sqlx::query(&insert_sql);
                    for record in records {
                        query = bind_record_fields(query, &record.fields, &table.schema)?;
                    }
                    query.execute(&mut *tx).await.with_context(|| {
                        batch_error_context(table_name, batch_idx, records)
                    })?;
                    debug!(table = table_name, batch = batch_idx, rows = records.len(), "batch inserted");
                }

                tx.commit()
                    .await
                    .with_context(|| format!("Failed to commit table '{}'", table_name))?;
            }
            #[cfg(test)]
            Connection::Sqlite(sqlite_conn) => {
                let mut tx = sqlite_conn
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;

                sqlx::query(&drop_sql)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to drop table '{}'", table_name))?;
                sqlx::query(&create_sql)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to create table '{}'", table_name))?;

                for (batch_idx, records) in table.records.chunks(rows_per_batch).enumerate() {
                    let insert_sql =
                        build_insert_sql(table_name, &table.schema, records.len(), dialect);
                    // SQLite column affinity does the conversion, so every
                    // value goes in as text
                    let mut query = sqlx::query(&insert_sql);
                    for record in records {
                        for field in &record.fields {
                            query = query.bind(field.as_deref());
                        }
                    }
                    query.execute(&mut *tx).await.with_context(|| {
                        batch_error_context(table_name, batch_idx, records)
                    })?;
                }

                tx.commit()
                    .await
                    .with_context(|| format!("Failed to commit table '{}'", table_name))?;
            }
        }

        Ok(table.num_rows() as u64)
    }

    /// Rows per INSERT, bounded by the dialect's bind parameter ceiling
    fn rows_per_batch(&self, num_columns: usize, dialect: Dialect) -> usize {
        let by_params = dialect.max_bind_params() / num_columns.max(1);
        self.batch_size.min(by_params).max(1)
    }
}

/// Build a multi-row INSERT:
/// `INSERT INTO "t" ("a", "b") VALUES ($1, $2), ($3, $4), ...`
///
/// Types Postgres will not coerce from a text parameter get an explicit CAST.
fn build_insert_sql(table_name: &str, schema: &Schema, num_rows: usize, dialect: Dialect) -> String {
    let column_list: Vec<String> = schema
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect();

    let mut value_groups = Vec::with_capacity(num_rows);
    let mut param_idx = 1;

    for _ in 0..num_rows {
        let placeholders: Vec<String> = schema
            .columns
            .iter()
            .map(|col| {
                let placeholder = dialect.placeholder(param_idx);
                param_idx += 1;

                if dialect.uses_casts()
                    && TypeCategory::from_sql_type(col.sql_type) == TypeCategory::StringCast
                {
                    format!("CAST({} AS {})", placeholder, col.sql_type.to_postgres())
                } else {
                    placeholder
                }
            })
            .collect();
        value_groups.push(format!("({})", placeholders.join(", ")));
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(table_name),
        column_list.join(", "),
        value_groups.join(", ")
    )
}

/// Context for a failed batch: table, batch number and a preview of the
/// first record
fn batch_error_context(table_name: &str, batch_idx: usize, records: &[Record]) -> String {
    let first_record_sample = records
        .first()
        .map(|r| {
            let preview: Vec<_> = r
                .values()
                .into_iter()
                .take(3)
                .map(|f| match f {
                    None => "NULL".to_string(),
                    Some(f) if f.chars().count() > 20 => {
                        format!("{}...", f.chars().take(20).collect::<String>())
                    }
                    Some(f) => f.to_string(),
                })
                .collect();
            format!(
                "[{}{}]",
                preview.join(", "),
                if r.fields.len() > 3 { ", ..." } else { "" }
            )
        })
        .unwrap_or_else(|| "<empty>".to_string());

    format!(
        "Failed to insert batch {} ({} records) into '{}', first record: {}",
        batch_idx,
        records.len(),
        table_name,
        first_record_sample
    )
}

/// Bind record fields to query with proper types based on schema
fn bind_record_fields<'q>(
    mut query: PgQuery<'q>,
    fields: &'q [Option<String>],
    schema: &Schema,
) -> Result<PgQuery<'q>> {
    for (column, field) in schema.columns.iter().zip(fields) {
        query = bind_typed_value(query, field.as_deref(), column.sql_type)
            .with_context(|| format!("Invalid value for column '{}'", column.name))?;
    }

    Ok(query)
}

/// Bind a single value with proper type conversion
///
/// `None` is NULL. TEXT keeps the value as is, empty strings included.
fn bind_typed_value<'q>(
    query: PgQuery<'q>,
    value: Option<&'q str>,
    sql_type: SqlType,
) -> Result<PgQuery<'q>> {
    let Some(value) = value else {
        return Ok(bind_null(query, sql_type));
    };

    // Blank text has no typed value
    let trimmed = value.trim();
    if trimmed.is_empty() && sql_type != SqlType::Text {
        return Ok(bind_null(query, sql_type));
    }

    Ok(match sql_type {
        SqlType::Boolean => query.bind(parse_bool(trimmed)?),
        SqlType::SmallInt => query.bind(parse::<i16>(trimmed, sql_type)?),
        SqlType::Integer => query.bind(parse::<i32>(trimmed, sql_type)?),
        SqlType::BigInt => query.bind(parse::<i64>(trimmed, sql_type)?),
        SqlType::Real => query.bind(parse::<f32>(trimmed, sql_type)?),
        SqlType::DoublePrecision => query.bind(parse::<f64>(trimmed, sql_type)?),
        SqlType::Timestamp => query.bind(parse_timestamp(trimmed)?),
        // NUMERIC, DATE, TIMESTAMPTZ and BYTEA go through CAST() in the SQL
        SqlType::Numeric | SqlType::Date | SqlType::TimestampTz | SqlType::Bytea => {
            query.bind(trimmed)
        }
        SqlType::Text => query.bind(value),
    })
}

/// Bind NULL value for the appropriate type
fn bind_null(query: PgQuery<'_>, sql_type: SqlType) -> PgQuery<'_> {
    match sql_type {
        SqlType::Boolean => query.bind(None::<bool>),
        SqlType::SmallInt => query.bind(None::<i16>),
        SqlType::Integer => query.bind(None::<i32>),
        SqlType::BigInt => query.bind(None::<i64>),
        SqlType::Real => query.bind(None::<f32>),
        SqlType::DoublePrecision => query.bind(None::<f64>),
        SqlType::Timestamp => query.bind(None::<chrono::NaiveDateTime>),
        SqlType::Numeric
        | SqlType::Date
        | SqlType::TimestampTz
        | SqlType::Bytea
        | SqlType::Text => query.bind(None::<String>),
    }
}

/// Parse a value from string
fn parse<T: std::str::FromStr>(value: &str, sql_type: SqlType) -> Result<T>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    value.parse().map_err(|e| {
        anyhow!(
            "Cannot convert '{}' to {}: {}",
            value,
            sql_type.to_postgres(),
            e
        )
    })
}

fn parse_bool(value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("t") || value == "1" {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("f") || value == "0"
    {
        Ok(false)
    } else {
        Err(anyhow!("Cannot convert '{}' to BOOLEAN", value))
    }
}

/// Parse a TIMESTAMP value; bare dates are midnight
fn parse_timestamp(value: &str) -> Result<chrono::NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| anyhow!("Cannot convert '{}' to TIMESTAMP", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::Column;
    use crate::formats::delimited::DelimitedDecoder;
    use crate::formats::fixtures::sales_parquet;
    use crate::formats::json::JsonDecoder;
    use crate::formats::parquet::ParquetDecoder;
    use crate::formats::TableDecoder;
    use bytes::Bytes;

    fn schema(columns: &[(&str, SqlType)]) -> Schema {
        Schema {
            columns: columns
                .iter()
                .map(|(name, sql_type)| Column {
                    name: name.to_string(),
                    sql_type: *sql_type,
                    nullable: true,
                })
                .collect(),
        }
    }

    #[test]
    fn test_build_insert_sql_postgres_casts() {
        let schema = schema(&[
            ("id", SqlType::BigInt),
            ("sold_on", SqlType::Date),
            ("amount", SqlType::Numeric),
        ]);

        let sql = build_insert_sql("sales", &schema, 2, Dialect::Postgres);

        assert_eq!(
            sql,
            "INSERT INTO \"sales\" (\"id\", \"sold_on\", \"amount\") VALUES \
             ($1, CAST($2 AS DATE), CAST($3 AS NUMERIC)), \
             ($4, CAST($5 AS DATE), CAST($6 AS NUMERIC))"
        );
    }

    #[test]
    fn test_build_insert_sql_sqlite_placeholders() {
        let schema = schema(&[("id", SqlType::BigInt), ("sold_on", SqlType::Date)]);

        let sql = build_insert_sql("sales", &schema, 2, Dialect::Sqlite);

        assert_eq!(
            sql,
            "INSERT INTO \"sales\" (\"id\", \"sold_on\") VALUES (?, ?), (?, ?)"
        );
    }

    #[test]
    fn test_rows_per_batch_respects_bind_limit() {
        let writer = TableWriter::new(1000);

        assert_eq!(writer.rows_per_batch(4, Dialect::Postgres), 1000);
        // 65535 / 100 columns
        assert_eq!(writer.rows_per_batch(100, Dialect::Postgres), 655);
        assert_eq!(TableWriter::new(0).rows_per_batch(4, Dialect::Postgres), 1);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("t").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 1, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2024-01-01 00:01:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-01T00:01:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-01 00:01").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-01-01 00:01:00.250")
                .unwrap()
                .and_utc()
                .timestamp_subsec_millis(),
            250
        );
        assert_eq!(
            parse_timestamp("2024-01-01").unwrap(),
            expected - chrono::Duration::minutes(1)
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_reports_type() {
        let err = parse::<i16>("70000", SqlType::SmallInt).unwrap_err();
        assert!(err.to_string().contains("SMALLINT"));
    }

    #[test]
    fn test_batch_error_context_previews_first_record() {
        let records = vec![Record {
            fields: vec![
                Some("1".to_string()),
                Some("a very long product description indeed".to_string()),
                None,
                Some("y".to_string()),
            ],
        }];

        let context = batch_error_context("products", 0, &records);

        assert!(context.contains("'products'"));
        assert!(context.contains("[1, a very long product ..., NULL, ...]"));
    }

    /// Bind every record of a decoded table the way the Postgres insert does
    fn bind_all(table: &Table) -> Result<()> {
        let sql = build_insert_sql("t", &table.schema, 1, Dialect::Postgres);
        for (row_idx, record) in table.records.iter().enumerate() {
            bind_record_fields(sqlx::query(&sql), &record.fields, &table.schema)
                .with_context(|| format!("row {}: {:?}", row_idx, record.fields))?;
        }
        Ok(())
    }

    #[test]
    fn test_csv_records_bind_to_their_inferred_types() {
        let data = "id,name,flag,score,joined,seen_at,note,mixed\n\
                    1,Ann,true,1,2024-01-02,2024-01-02 10:00:00,,true\n\
                    70000,Bob,false,2.5,2024-02-03,2024-02-03,  ,2\n\
                    9000000000,,TRUE,-3,2024-03-04,2024-03-04T11:30:00,x,\n";
        let table = DelimitedDecoder::csv()
            .decode(Bytes::from_static(data.as_bytes()))
            .unwrap();

        let types: Vec<SqlType> = table.schema.columns.iter().map(|c| c.sql_type).collect();
        assert_eq!(
            types,
            vec![
                SqlType::BigInt,
                SqlType::Text,
                SqlType::Boolean,
                SqlType::DoublePrecision,
                SqlType::Date,
                SqlType::Timestamp,
                SqlType::Text,
                SqlType::Text,
            ]
        );
        bind_all(&table).unwrap();
    }

    #[test]
    fn test_json_records_bind_to_their_inferred_types() {
        let data = r#"[
            {"id": 1, "big": 18446744073709551615, "v": 1, "price": 9.99, "tags": ["a"], "note": ""},
            {"id": 2, "big": 1, "v": true, "price": 3, "tags": null, "note": "ok"},
            {"id": -7, "big": 2, "v": "x", "price": null, "flag": false}
        ]"#;
        let table = JsonDecoder
            .decode(Bytes::from_static(data.as_bytes()))
            .unwrap();

        assert_eq!(table.schema.columns[1].sql_type, SqlType::Numeric);
        assert_eq!(table.schema.columns[2].sql_type, SqlType::Text);
        assert_eq!(table.schema.columns[3].sql_type, SqlType::DoublePrecision);
        bind_all(&table).unwrap();
    }

    #[test]
    fn test_parquet_records_bind_to_their_types() {
        let table = ParquetDecoder
            .decode(Bytes::from(sales_parquet(250, 100)))
            .unwrap();

        bind_all(&table).unwrap();
    }

    #[test]
    fn test_booleans_mixed_with_integers_bind_as_text() {
        let table = DelimitedDecoder::csv()
            .decode(Bytes::from_static(b"flag\ntrue\n2\n"))
            .unwrap();

        assert_eq!(table.schema.columns[0].sql_type, SqlType::Text);
        bind_all(&table).unwrap();
    }

    #[test]
    fn test_text_binds_empty_string_and_typed_columns_reject_garbage() {
        let sql = "INSERT INTO \"t\" (\"a\") VALUES ($1)";

        assert!(bind_typed_value(sqlx::query(sql), Some(""), SqlType::Text).is_ok());
        assert!(bind_typed_value(sqlx::query(sql), None, SqlType::BigInt).is_ok());
        assert!(bind_typed_value(sqlx::query(sql), Some("two"), SqlType::BigInt).is_err());
        assert!(bind_typed_value(sqlx::query(sql), Some("2"), SqlType::Boolean).is_err());
    }
}
