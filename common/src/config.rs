use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub storage: StorageSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub silver: SilverSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub warehouse: WarehouseSettings,
    #[serde(default)]
    pub crawler: CrawlerSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Root directory for the `local` backend.
    #[serde(default = "default_local_root")]
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathSettings {
    #[serde(default = "default_raw_prefix")]
    pub raw_prefix: String,
    #[serde(default = "default_silver_prefix")]
    pub silver_prefix: String,
    #[serde(default = "default_gold_prefix")]
    pub gold_prefix: String,
    #[serde(default = "default_jobs_prefix")]
    pub jobs_prefix: String,
}

/// How the latest `sales_day=` partition is chosen.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartitionOrder {
    /// Plain string maximum of the partition prefix.
    #[default]
    Lexicographic,
    /// Maximum of the parsed (year, month, day) triple.
    Numeric,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SilverSettings {
    #[serde(default = "default_max_rows_per_file")]
    pub max_rows_per_file: usize,
    #[serde(default)]
    pub partition_order: PartitionOrder,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WarehouseSettings {
    #[serde(default)]
    pub iam_role: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CrawlerSettings {
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            raw_prefix: default_raw_prefix(),
            silver_prefix: default_silver_prefix(),
            gold_prefix: default_gold_prefix(),
            jobs_prefix: default_jobs_prefix(),
        }
    }
}

impl Default for SilverSettings {
    fn default() -> Self {
        Self {
            max_rows_per_file: default_max_rows_per_file(),
            partition_order: PartitionOrder::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_local_root() -> String {
    "./data".to_string()
}

fn default_raw_prefix() -> String {
    "raw/sales".to_string()
}

fn default_silver_prefix() -> String {
    "silver/sales".to_string()
}

fn default_gold_prefix() -> String {
    "gold/sales".to_string()
}

fn default_jobs_prefix() -> String {
    "_jobs".to_string()
}

fn default_max_rows_per_file() -> usize {
    100_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            backend = ?settings.storage.backend,
            bucket = %settings.storage.bucket,
            raw_prefix = %settings.paths.raw_prefix,
            silver_prefix = %settings.paths.silver_prefix,
            gold_prefix = %settings.paths.gold_prefix,
            "Loaded pipeline settings"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let file = write_config(
            r#"
            [storage]
            bucket = "sales-etl-pipeline-dev-datalake"
            "#,
        );

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::S3);
        assert_eq!(settings.storage.region, "us-east-1");
        assert_eq!(settings.paths.raw_prefix, "raw/sales");
        assert_eq!(settings.paths.gold_prefix, "gold/sales");
        assert_eq!(settings.silver.max_rows_per_file, 100_000);
        assert_eq!(settings.silver.partition_order, PartitionOrder::Lexicographic);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.crawler.name.is_none());
    }

    #[test]
    fn explicit_sections_are_parsed() {
        let file = write_config(
            r#"
            [storage]
            backend = "local"
            bucket = "lake"
            root = "/tmp/lake"

            [paths]
            raw_prefix = "landing/sales"

            [silver]
            max_rows_per_file = 10
            partition_order = "numeric"

            [logging]
            level = "debug"
            json = true

            [warehouse]
            iam_role = "arn:aws:iam::123456789012:role/redshift-copy"

            [crawler]
            name = "sales-silver-crawler"
            "#,
        );

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::Local);
        assert_eq!(settings.storage.root, "/tmp/lake");
        assert_eq!(settings.paths.raw_prefix, "landing/sales");
        assert_eq!(settings.paths.silver_prefix, "silver/sales");
        assert_eq!(settings.silver.max_rows_per_file, 10);
        assert_eq!(settings.silver.partition_order, PartitionOrder::Numeric);
        assert!(settings.logging.json);
        assert_eq!(
            settings.warehouse.iam_role.as_deref(),
            Some("arn:aws:iam::123456789012:role/redshift-copy")
        );
        assert_eq!(settings.crawler.name.as_deref(), Some("sales-silver-crawler"));
    }

    #[test]
    fn missing_storage_section_is_an_error() {
        let file = write_config(
            r#"
            [paths]
            raw_prefix = "raw/sales"
            "#,
        );

        assert!(Settings::new(file.path().to_str().unwrap()).is_err());
    }
}
