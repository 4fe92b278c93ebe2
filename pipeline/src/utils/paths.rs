use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::storage::join_key;

static RAW_FILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sales_(?P<stamp>\d{8}_\d{6})\.(?P<ext>[A-Za-z0-9]+)$")
        .expect("Invalid raw file regex")
});

static RENAMED_FILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sales_(?P<stamp>\d{8}_\d{6})_(?P<seq>\d{5})\.(?P<ext>[A-Za-z0-9]+)$")
        .expect("Invalid renamed file regex")
});

static PARTITION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"sales_year=(?P<year>[^/]+)/sales_month=(?P<month>[^/]+)/sales_day=(?P<day>[^/]+)/")
        .expect("Invalid partition regex")
});

pub const RAW_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `sales_<YYYYMMDD>_<HHMMSS>.json`
pub fn raw_file_name(produced_at: NaiveDateTime) -> String {
    format!("sales_{}.json", produced_at.format(RAW_TIMESTAMP_FORMAT))
}

/// Timestamp embedded in a raw file name, if the name follows the contract.
pub fn parse_raw_file_timestamp(file_name: &str, extension: &str) -> Option<NaiveDateTime> {
    let caps = RAW_FILE_REGEX.captures(file_name)?;
    if &caps["ext"] != extension {
        return None;
    }
    NaiveDateTime::parse_from_str(&caps["stamp"], RAW_TIMESTAMP_FORMAT).ok()
}

pub fn job_timestamp(at: DateTime<Utc>) -> String {
    at.format(RAW_TIMESTAMP_FORMAT).to_string()
}

/// `sales_<job_timestamp>_<00000>.<ext>`
pub fn renamed_file_name(job_timestamp: &str, sequence: usize, extension: &str) -> String {
    format!("sales_{}_{:05}.{}", job_timestamp, sequence, extension)
}

/// Returns (job timestamp, sequence) for a file already carrying the renamed form.
pub fn parse_renamed_file_name(file_name: &str) -> Option<(String, usize)> {
    let caps = RENAMED_FILE_REGEX.captures(file_name)?;
    let sequence = caps["seq"].parse::<usize>().ok()?;
    Some((caps["stamp"].to_string(), sequence))
}

/// Name the writer gives a fragment before the renamer runs.
pub fn fragment_file_name(index: usize, write_id: &str) -> String {
    format!("part-{:05}-{}.snappy.parquet", index, write_id)
}

/// Day-level silver partition, derived from processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SilverPartition {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl SilverPartition {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            day: at.day(),
        }
    }

    /// `<base>/sales_year=<Y>/sales_month=<M>/sales_day=<D>/`, values unpadded.
    pub fn prefix(&self, base: &str) -> String {
        join_key(
            base,
            &format!(
                "sales_year={}/sales_month={}/sales_day={}/",
                self.year, self.month, self.day
            ),
        )
    }

    /// Parses the partition triple out of any key below a day partition.
    pub fn parse(key: &str) -> Option<Self> {
        let caps = PARTITION_REGEX.captures(key)?;
        Some(Self {
            year: caps["year"].parse().ok()?,
            month: caps["month"].parse().ok()?,
            day: caps["day"].parse().ok()?,
        })
    }
}

/// The four gold datasets and their fixed sub-paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldTable {
    FactSales,
    DimStore,
    DimProduct,
    DimCustomer,
}

impl GoldTable {
    /// Write order: fact first, then dimensions.
    pub const ALL: [GoldTable; 4] = [
        GoldTable::FactSales,
        GoldTable::DimStore,
        GoldTable::DimProduct,
        GoldTable::DimCustomer,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::FactSales => "fact_sales",
            Self::DimStore => "dim_store",
            Self::DimProduct => "dim_product",
            Self::DimCustomer => "dim_customer",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::FactSales => "fact_sales_csv",
            Self::DimStore => "dim_store_csv",
            Self::DimProduct => "dim_product_csv",
            Self::DimCustomer => "dim_customer_csv",
        }
    }

    pub fn is_dimension(&self) -> bool {
        !matches!(self, Self::FactSales)
    }

    pub fn prefix(&self, gold_base: &str) -> String {
        join_key(gold_base, &format!("{}/", self.dir_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn raw_file_name_round_trips_through_parser() {
        let produced = NaiveDate::from_ymd_opt(2025, 8, 22)
            .unwrap()
            .and_hms_opt(19, 51, 42)
            .unwrap();
        let name = raw_file_name(produced);

        assert_eq!(name, "sales_20250822_195142.json");
        assert_eq!(parse_raw_file_timestamp(&name, "json"), Some(produced));
    }

    #[test]
    fn raw_parser_rejects_other_names() {
        assert!(parse_raw_file_timestamp("sales_20250822_195142.csv", "json").is_none());
        assert!(parse_raw_file_timestamp("sales_latest.json", "json").is_none());
        assert!(parse_raw_file_timestamp("sales_20251399_000000.json", "json").is_none());
        assert!(parse_raw_file_timestamp("old_sales_20250822_195142.json", "json").is_none());
    }

    #[test]
    fn renamed_names_are_distinguishable_from_fragments() {
        let renamed = renamed_file_name("20250101_000000", 7, "parquet");
        assert_eq!(renamed, "sales_20250101_000000_00007.parquet");
        assert_eq!(
            parse_renamed_file_name(&renamed),
            Some(("20250101_000000".to_string(), 7))
        );
        assert!(parse_renamed_file_name(&fragment_file_name(0, "abc")).is_none());
        assert!(parse_renamed_file_name("part-00000.snappy.parquet").is_none());
    }

    #[test]
    fn partition_prefix_uses_unpadded_values() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 59).unwrap();
        let partition = SilverPartition::from_datetime(at);

        assert_eq!(
            partition.prefix("silver/sales"),
            "silver/sales/sales_year=2025/sales_month=3/sales_day=9/"
        );
        assert_eq!(
            SilverPartition::parse("silver/sales/sales_year=2025/sales_month=3/sales_day=9/x.parquet"),
            Some(partition)
        );
    }

    #[test]
    fn gold_prefixes_match_contract() {
        let dirs: Vec<String> = GoldTable::ALL.iter().map(|t| t.prefix("gold/sales")).collect();
        assert_eq!(
            dirs,
            vec![
                "gold/sales/fact_sales_csv/",
                "gold/sales/dim_store_csv/",
                "gold/sales/dim_product_csv/",
                "gold/sales/dim_customer_csv/",
            ]
        );
        assert!(!GoldTable::FactSales.is_dimension());
        assert!(GoldTable::DimStore.is_dimension());
    }
}
