use chrono::NaiveDateTime;
use common::config::PartitionOrder;
use common::{Error, Result};
use tracing::{debug, info};

use crate::storage::file_name;
use crate::storage::s3::ObjectStorage;
use crate::utils::paths::{SilverPartition, parse_raw_file_timestamp};

/// Finds the newest raw drop: `sales_<YYYYMMDD>_<HHMMSS>.<ext>` with the
/// greatest embedded timestamp. Names that do not parse are ignored.
pub async fn latest_raw_object(
    storage: &dyn ObjectStorage,
    prefix: &str,
    extension: &str,
) -> Result<String> {
    let keys = storage.list_objects(prefix).await?;
    select_latest_raw(&keys, extension).ok_or_else(|| {
        Error::NotFound(format!(
            "No sales_*.{} files found under s3://{}/{}",
            extension,
            storage.bucket(),
            prefix
        ))
    })
}

pub fn select_latest_raw(keys: &[String], extension: &str) -> Option<String> {
    let mut candidates: Vec<(NaiveDateTime, &String)> = keys
        .iter()
        .filter_map(|key| {
            let parsed = parse_raw_file_timestamp(file_name(key), extension);
            if parsed.is_none() {
                debug!(key = %key, "Skipping object without a raw timestamp name");
            }
            parsed.map(|ts| (ts, key))
        })
        .collect();

    // Ties on the timestamp fall back to the key so the pick is stable.
    candidates.sort();
    let latest = candidates.pop().map(|(_, key)| key.clone());
    if let Some(key) = &latest {
        info!(key = %key, candidates = candidates.len() + 1, "Latest raw file selected");
    }
    latest
}

/// Finds the newest `.../sales_day=<D>/` partition below `prefix`.
pub async fn latest_silver_partition(
    storage: &dyn ObjectStorage,
    prefix: &str,
    order: PartitionOrder,
) -> Result<String> {
    let keys = storage.list_objects(prefix).await?;
    select_latest_partition(&keys, order).ok_or_else(|| {
        Error::NotFound(format!(
            "No day-level partitions found under s3://{}/{}",
            storage.bucket(),
            prefix
        ))
    })
}

/// Partition prefix (ending in `/`) of a key containing `sales_day=`.
pub fn partition_prefix_of(key: &str) -> Option<String> {
    let (head, tail) = key.split_once("sales_day=")?;
    let day = tail.split('/').next().unwrap_or_default();
    Some(format!("{}sales_day={}/", head, day))
}

pub fn select_latest_partition(keys: &[String], order: PartitionOrder) -> Option<String> {
    let mut partitions: Vec<String> = keys.iter().filter_map(|k| partition_prefix_of(k)).collect();
    partitions.sort();
    partitions.dedup();

    let latest = match order {
        // String maximum: "sales_day=9/" sorts after "sales_day=10/".
        PartitionOrder::Lexicographic => partitions.last().cloned(),
        PartitionOrder::Numeric => partitions
            .iter()
            .filter_map(|p| SilverPartition::parse(p).map(|parsed| (parsed, p)))
            .max()
            .map(|(_, p)| p.clone()),
    };

    if let Some(partition) = &latest {
        info!(
            partition = %partition,
            candidates = partitions.len(),
            order = ?order,
            "Latest silver partition selected"
        );
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::generic::ObjectStoreStorage;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn picks_most_recent_raw_timestamp() {
        let listing = keys(&[
            "raw/sales/sales_20250101_000000.json",
            "raw/sales/sales_20250601_120000.json",
            "raw/sales/sales_20250301_093000.json",
        ]);

        assert_eq!(
            select_latest_raw(&listing, "json").as_deref(),
            Some("raw/sales/sales_20250601_120000.json")
        );
    }

    #[test]
    fn unparseable_raw_names_are_excluded() {
        let listing = keys(&[
            "raw/sales/sales_20250101_000000.json",
            "raw/sales/sales_backup.json",
            "raw/sales/sales_99999999_999999.json",
            "raw/sales/sales_20991231_235959.csv",
            "raw/sales/_SUCCESS",
        ]);

        assert_eq!(
            select_latest_raw(&listing, "json").as_deref(),
            Some("raw/sales/sales_20250101_000000.json")
        );
        assert!(select_latest_raw(&keys(&["raw/sales/notes.txt"]), "json").is_none());
    }

    #[test]
    fn partition_prefix_is_cut_after_day_value() {
        assert_eq!(
            partition_prefix_of("silver/sales_year=2025/sales_month=1/sales_day=5/sales_x.parquet")
                .as_deref(),
            Some("silver/sales_year=2025/sales_month=1/sales_day=5/")
        );
        assert!(partition_prefix_of("silver/sales_year=2025/_SUCCESS").is_none());
    }

    #[test]
    fn lexicographic_order_prefers_single_digit_day() {
        // Documented edge case: string order, not calendar order.
        let listing = keys(&[
            "silver/sales_year=2025/sales_month=6/sales_day=10/a.parquet",
            "silver/sales_year=2025/sales_month=6/sales_day=9/b.parquet",
        ]);

        assert_eq!(
            select_latest_partition(&listing, PartitionOrder::Lexicographic).as_deref(),
            Some("silver/sales_year=2025/sales_month=6/sales_day=9/")
        );
    }

    #[test]
    fn numeric_order_picks_calendar_latest() {
        let listing = keys(&[
            "silver/sales_year=2025/sales_month=6/sales_day=10/a.parquet",
            "silver/sales_year=2025/sales_month=6/sales_day=9/b.parquet",
            "silver/sales_year=2024/sales_month=12/sales_day=31/c.parquet",
        ]);

        assert_eq!(
            select_latest_partition(&listing, PartitionOrder::Numeric).as_deref(),
            Some("silver/sales_year=2025/sales_month=6/sales_day=10/")
        );
    }

    #[tokio::test]
    async fn empty_locations_fail_with_not_found() {
        let storage = ObjectStoreStorage::in_memory("lake");
        storage.put_object("raw/sales/readme.txt", b"x").await.unwrap();

        let raw = latest_raw_object(&storage, "raw/sales", "json").await.unwrap_err();
        assert!(raw.is_not_found());

        let silver = latest_silver_partition(&storage, "silver/sales", PartitionOrder::Lexicographic)
            .await
            .unwrap_err();
        assert!(silver.is_not_found());
    }
}
