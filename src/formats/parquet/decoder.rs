//! Parquet object decoder.

use anyhow::{Context, Result};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::conversion::record_batch_to_records;
use super::schema::schema_from_arrow;
use crate::formats::table::{Table, TableDecoder};

/// Decodes a complete in-memory Parquet object, all row groups included
pub struct ParquetDecoder;

impl TableDecoder for ParquetDecoder {
    fn decode(&self, data: Bytes) -> Result<Table> {
        // Bytes implements ChunkReader, so the footer and row groups are read
        // straight from the fetched buffer
        let builder = ParquetRecordBatchReaderBuilder::try_new(data)
            .context("Failed to read Parquet metadata")?;

        let schema = schema_from_arrow(builder.schema());
        let expected_rows: i64 = builder
            .metadata()
            .row_groups()
            .iter()
            .map(|rg| rg.num_rows())
            .sum();

        let reader = builder.build().context("Failed to build Parquet reader")?;

        let mut records = Vec::with_capacity(expected_rows.max(0) as usize);
        for batch_result in reader {
            let batch = batch_result.context("Failed to read record batch")?;
            let batch_records = record_batch_to_records(&batch)
                .context("Failed to convert RecordBatch to Records")?;
            records.extend(batch_records);
        }

        if records.len() as i64 != expected_rows {
            anyhow::bail!(
                "Parquet footer declares {} rows but {} were decoded",
                expected_rows,
                records.len()
            );
        }

        Ok(Table { schema, records })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use arrow::array::*;
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;
    use std::sync::Arc;

    /// Build an in-memory sales Parquet file with `num_rows` rows
    pub fn sales_parquet(num_rows: usize, row_group_size: usize) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("sale_id", DataType::Int64, false),
            Field::new("customer_id", DataType::Int32, false),
            Field::new("amount", DataType::Float64, true),
            Field::new(
                "sold_at",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
        ]));

        let props = WriterProperties::builder()
            .set_max_row_group_size(row_group_size)
            .build();

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, schema.clone(), Some(props)).unwrap();

        let batch_size = 100;
        for start in (0..num_rows).step_by(batch_size) {
            let end = std::cmp::min(start + batch_size, num_rows);

            let sale_ids = Int64Array::from_iter_values(start as i64..end as i64);
            let customer_ids = Int32Array::from_iter_values((start..end).map(|i| (i % 7) as i32));
            let amounts = Float64Array::from_iter(
                (start..end).map(|i| if i % 10 == 9 { None } else { Some(i as f64 * 1.5) }),
            );
            // One sale per minute from 2024-01-01 00:00:00
            let sold_at = TimestampMicrosecondArray::from_iter_values(
                (start..end).map(|i| 1_704_067_200_000_000 + i as i64 * 60_000_000),
            );

            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(sale_ids),
                    Arc::new(customer_ids),
                    Arc::new(amounts),
                    Arc::new(sold_at),
                ],
            )
            .unwrap();

            writer.write(&batch).unwrap();
        }

        writer.close().unwrap();
        buffer
    }
}
