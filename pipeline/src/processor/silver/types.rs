use chrono::{DateTime, NaiveDate, Utc};

/// A raw sale after the declared schema is applied. Every value is kept as
/// its source token; numeric columns are cast later in the silver pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawSale {
    pub transaction_id: Option<String>,
    pub date: Option<String>,
    pub store_id: Option<String>,
    pub store_name: Option<String>,
    pub city: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub quantity_sold: Option<String>,
    pub unit_price: Option<String>,
    pub total_amount: Option<String>,
    pub payment_method: Option<String>,
}

impl RawSale {
    /// Mutable slot for a declared column name.
    pub fn slot_mut(&mut self, column: &str) -> Option<&mut Option<String>> {
        let slot = match column {
            "transaction_id" => &mut self.transaction_id,
            "date" => &mut self.date,
            "store_id" => &mut self.store_id,
            "store_name" => &mut self.store_name,
            "city" => &mut self.city,
            "product_id" => &mut self.product_id,
            "product_name" => &mut self.product_name,
            "category" => &mut self.category,
            "customer_id" => &mut self.customer_id,
            "customer_name" => &mut self.customer_name,
            "quantity_sold" => &mut self.quantity_sold,
            "unit_price" => &mut self.unit_price,
            "total_amount" => &mut self.total_amount,
            "payment_method" => &mut self.payment_method,
            _ => return None,
        };
        Some(slot)
    }
}

/// The four join keys every silver row carries.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleKeys {
    pub transaction_id: String,
    pub store_id: String,
    pub product_id: String,
    pub customer_id: String,
}

/// Raw sale with its key columns proven non-null.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedSale {
    pub keys: SaleKeys,
    pub raw: RawSale,
}

/// Keyed sale after the numeric casts; a failed cast leaves `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CastSale {
    pub keys: SaleKeys,
    pub raw: RawSale,
    pub quantity_sold: Option<i32>,
    pub unit_price: Option<f64>,
}

/// A row as written to silver.
#[derive(Debug, Clone, PartialEq)]
pub struct SilverSale {
    pub transaction_id: String,
    pub date: Option<NaiveDate>,
    pub store_id: String,
    pub store_name: Option<String>,
    pub city: Option<String>,
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub quantity_sold: i32,
    pub unit_price: f64,
    pub total_amount: f64,
    pub payment_method: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

/// Row counts emitted at each step of the raw to silver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SilverCounts {
    pub input_rows: usize,
    pub malformed_lines: usize,
    pub after_dedup: usize,
    pub after_key_filter: usize,
    pub after_quality_filter: usize,
}
