use arrow::array::{Array, StringArray, UInt32Array};
use arrow::compute::{concat_batches, take_record_batch};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use common::{Error, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashSet;

/// Decodes one parquet object into its record batches.
pub fn parquet_to_batches(content: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(content))?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

pub fn concat(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch> {
    Ok(concat_batches(schema, batches)?)
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::SchemaMismatch(format!("column '{}' not found", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::SchemaMismatch(format!("column '{}' is not a string column", name)))
}

/// Keeps `names`, in that order.
pub fn project_columns(batch: &RecordBatch, names: &[&str]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = names
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| Error::SchemaMismatch(format!("column '{}' not found", name)))
        })
        .collect::<Result<Vec<usize>>>()?;
    Ok(batch.project(&indices)?)
}

/// Rows whose `key_column` value has not been seen earlier in the batch.
/// Null keys compare equal to each other.
pub fn first_seen_by_key(batch: &RecordBatch, key_column: &str) -> Result<RecordBatch> {
    let keys = string_column(batch, key_column)?;
    let mut seen: HashSet<Option<&str>> = HashSet::new();
    let indices: UInt32Array = (0..keys.len())
        .filter(|&row| {
            let key = if keys.is_null(row) { None } else { Some(keys.value(row)) };
            seen.insert(key)
        })
        .map(|row| row as u32)
        .collect();
    Ok(take_record_batch(batch, &indices)?)
}
