use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use lazy_static::lazy_static;
use std::sync::Arc;

/// Target type of a raw column after casting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Double,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
}

const fn column(name: &'static str, column_type: ColumnType, required: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        column_type,
        required,
    }
}

/// Declared raw sales schema, in file column order.
pub const RAW_SALES_COLUMNS: [ColumnSpec; 14] = [
    column("transaction_id", ColumnType::String, true),
    column("date", ColumnType::String, false),
    column("store_id", ColumnType::String, true),
    column("store_name", ColumnType::String, false),
    column("city", ColumnType::String, false),
    column("product_id", ColumnType::String, true),
    column("product_name", ColumnType::String, false),
    column("category", ColumnType::String, false),
    column("customer_id", ColumnType::String, true),
    column("customer_name", ColumnType::String, false),
    column("quantity_sold", ColumnType::Integer, false),
    column("unit_price", ColumnType::Double, false),
    column("total_amount", ColumnType::Double, false),
    column("payment_method", ColumnType::String, false),
];

/// Columns a row must carry to be admitted to silver.
pub const KEY_COLUMNS: [&str; 4] = ["transaction_id", "store_id", "product_id", "customer_id"];

pub const PARTITION_COLUMNS: [&str; 3] = ["sales_year", "sales_month", "sales_day"];

pub const FACT_SALES_COLUMNS: [&str; 9] = [
    "transaction_id",
    "date",
    "store_id",
    "product_id",
    "customer_id",
    "quantity_sold",
    "unit_price",
    "total_amount",
    "payment_method",
];
pub const DIM_STORE_COLUMNS: [&str; 3] = ["store_id", "store_name", "city"];
pub const DIM_PRODUCT_COLUMNS: [&str; 3] = ["product_id", "product_name", "category"];
pub const DIM_CUSTOMER_COLUMNS: [&str; 2] = ["customer_id", "customer_name"];

// Silver file schema. Partition columns live in the object path only.
pub fn silver_sales_schema() -> Schema {
    Schema::new(vec![
        Field::new("transaction_id", DataType::Utf8, false),
        Field::new("date", DataType::Date32, true),
        Field::new("store_id", DataType::Utf8, false),
        Field::new("store_name", DataType::Utf8, true),
        Field::new("city", DataType::Utf8, true),
        Field::new("product_id", DataType::Utf8, false),
        Field::new("product_name", DataType::Utf8, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("customer_name", DataType::Utf8, true),
        Field::new("quantity_sold", DataType::Int32, false),
        Field::new("unit_price", DataType::Float64, false),
        Field::new("total_amount", DataType::Float64, false),
        Field::new("payment_method", DataType::Utf8, true),
        Field::new(
            "ingested_at",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
    ])
}

/// Types the gold stage re-applies to a silver partition before projecting.
pub fn silver_recast_columns() -> [(&'static str, DataType); 4] {
    [
        ("date", DataType::Date32),
        ("quantity_sold", DataType::Int32),
        ("unit_price", DataType::Float64),
        ("total_amount", DataType::Float64),
    ]
}

pub fn get_silver_schema() -> SchemaRef {
    SILVER_SALES_SCHEMA.clone()
}

// Lazy-loaded static schemas
lazy_static! {
    static ref SILVER_SALES_SCHEMA: SchemaRef = Arc::new(silver_sales_schema());
}
