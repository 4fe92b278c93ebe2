use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int32Array, StringArray, TimestampMicrosecondArray,
};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use common::{Error, Result};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;
use tracing::info;

use super::types::SilverSale;
use crate::schema::get_silver_schema;
use crate::storage::join_key;
use crate::storage::s3::ObjectStorage;
use crate::utils::paths::fragment_file_name;

pub struct StorageManager {
    storage: Arc<dyn ObjectStorage>,
    max_rows_per_file: usize,
}

impl StorageManager {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_rows_per_file: usize) -> Self {
        Self {
            storage,
            max_rows_per_file: max_rows_per_file.max(1),
        }
    }

    /// Appends `rows` to a partition as engine-named parquet fragments.
    /// Existing objects in the partition are left untouched.
    pub async fn append_partition(
        &self,
        rows: &[SilverSale],
        partition_prefix: &str,
        write_id: &str,
    ) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for (index, chunk) in rows.chunks(self.max_rows_per_file).enumerate() {
            let key = join_key(partition_prefix, &fragment_file_name(index, write_id));
            let batch = sales_to_record_batch(chunk)?;
            let buffer = encode_parquet(&batch)
                .map_err(|e| Error::Write(format!("encoding {}: {}", key, e)))?;

            self.storage
                .put_object(&key, &buffer)
                .await
                .map_err(|e| Error::Write(format!("s3://{}/{}: {}", self.storage.bucket(), key, e)))?;

            info!(key = %key, rows = chunk.len(), "Silver: fragment written");
            written.push(key);
        }

        Ok(written)
    }
}

fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer: Vec<u8> = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buffer)
}

pub fn sales_to_record_batch(rows: &[SilverSale]) -> Result<RecordBatch> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| Error::Other("invalid epoch date".to_string()))?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.transaction_id.as_str()))),
        Arc::new(Date32Array::from_iter(
            rows.iter()
                .map(|r| r.date.map(|d| d.signed_duration_since(epoch).num_days() as i32)),
        )),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.store_id.as_str()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.store_name.as_deref()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.city.as_deref()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.product_id.as_str()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.product_name.as_deref()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.category.as_deref()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.customer_id.as_str()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.customer_name.as_deref()))),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.quantity_sold))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.unit_price))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.total_amount))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.payment_method.as_deref()))),
        Arc::new(
            TimestampMicrosecondArray::from_iter_values(
                rows.iter().map(|r| r.ingested_at.timestamp_micros()),
            )
            .with_timezone("UTC"),
        ),
    ];

    Ok(RecordBatch::try_new(get_silver_schema(), columns)?)
}
