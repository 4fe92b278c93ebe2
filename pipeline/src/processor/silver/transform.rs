use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

use super::types::{CastSale, KeyedSale, RawSale, SaleKeys, SilverCounts, SilverSale};
use crate::processor::validation::{LoadedRecords, cast_to_date, cast_to_double, cast_to_integer};

/// Cleans raw sales into silver rows.
///
/// The stages run in a fixed order over one lazy pass: exact-duplicate
/// removal, key null filter, numeric casts, positivity filter, derived
/// total, date parse, ingestion stamp.
pub struct DataTransformer {
    ingested_at: DateTime<Utc>,
}

impl DataTransformer {
    pub fn new(ingested_at: DateTime<Utc>) -> Self {
        Self { ingested_at }
    }

    pub fn transform(&self, loaded: impl Into<LoadedRecords>) -> (Vec<SilverSale>, SilverCounts) {
        let LoadedRecords {
            records,
            malformed_lines,
        } = loaded.into();
        let input_rows = records.len();
        let mut after_dedup = 0;
        let mut after_key_filter = 0;
        let mut cast_failures = 0;
        let mut after_quality_filter = 0;

        let rows: Vec<SilverSale> = dedup_rows(records)
            .inspect(|_| after_dedup += 1)
            .filter_map(require_keys)
            .inspect(|_| after_key_filter += 1)
            .map(cast_measures)
            .inspect(|sale| {
                if sale.cast_failed() {
                    cast_failures += 1;
                }
            })
            .filter(is_positive_sale)
            .inspect(|_| after_quality_filter += 1)
            .map(|sale| finalize(sale, self.ingested_at))
            .collect();

        let counts = SilverCounts {
            input_rows,
            malformed_lines,
            after_dedup,
            after_key_filter,
            after_quality_filter,
        };

        info!(
            input_rows,
            malformed_lines,
            after_dedup,
            after_key_filter,
            cast_failures,
            after_quality_filter,
            "Silver: cleaning complete"
        );

        (rows, counts)
    }
}

/// Drops exact full-row duplicates, keeping first occurrences in order.
pub fn dedup_rows(records: impl IntoIterator<Item = RawSale>) -> impl Iterator<Item = RawSale> {
    let mut seen = HashSet::new();
    records.into_iter().filter(move |record| seen.insert(record.clone()))
}

pub fn require_keys(raw: RawSale) -> Option<KeyedSale> {
    let keys = SaleKeys {
        transaction_id: raw.transaction_id.clone()?,
        store_id: raw.store_id.clone()?,
        product_id: raw.product_id.clone()?,
        customer_id: raw.customer_id.clone()?,
    };
    Some(KeyedSale { keys, raw })
}

pub fn cast_measures(sale: KeyedSale) -> CastSale {
    let quantity_sold = sale.raw.quantity_sold.as_deref().and_then(|token| {
        cast_to_integer("quantity_sold", token)
            .map_err(|e| debug!(transaction_id = %sale.keys.transaction_id, "{}", e))
            .ok()
    });
    let unit_price = sale.raw.unit_price.as_deref().and_then(|token| {
        cast_to_double("unit_price", token)
            .map_err(|e| debug!(transaction_id = %sale.keys.transaction_id, "{}", e))
            .ok()
    });

    CastSale {
        keys: sale.keys,
        raw: sale.raw,
        quantity_sold,
        unit_price,
    }
}

impl CastSale {
    /// A token was present but did not cast.
    pub fn cast_failed(&self) -> bool {
        (self.raw.quantity_sold.is_some() && self.quantity_sold.is_none())
            || (self.raw.unit_price.is_some() && self.unit_price.is_none())
    }
}

pub fn is_positive_sale(sale: &CastSale) -> bool {
    matches!(sale.quantity_sold, Some(q) if q > 0) && matches!(sale.unit_price, Some(p) if p > 0.0)
}

/// Derives the total, parses the date and stamps ingestion time. Callers
/// pass only rows that survived `is_positive_sale`.
pub fn finalize(sale: CastSale, ingested_at: DateTime<Utc>) -> SilverSale {
    let quantity_sold = sale.quantity_sold.unwrap_or_default();
    let unit_price = sale.unit_price.unwrap_or_default();
    let date = sale
        .raw
        .date
        .as_deref()
        .and_then(|token| cast_to_date("date", token).ok());

    SilverSale {
        transaction_id: sale.keys.transaction_id,
        date,
        store_id: sale.keys.store_id,
        store_name: sale.raw.store_name,
        city: sale.raw.city,
        product_id: sale.keys.product_id,
        product_name: sale.raw.product_name,
        category: sale.raw.category,
        customer_id: sale.keys.customer_id,
        customer_name: sale.raw.customer_name,
        quantity_sold,
        unit_price,
        total_amount: round_half_up(quantity_sold as f64 * unit_price, 2),
        payment_method: sale.raw.payment_method,
        ingested_at,
    }
}

/// Half-up rounding on the shortest decimal form of `value`, so 2.675
/// rounds to 2.68 rather than following its binary approximation down.
pub fn round_half_up(value: f64, scale: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let repr = format!("{}", value.abs());
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    if frac_part.len() <= scale {
        return value;
    }

    let round_up = frac_part.as_bytes()[scale] >= b'5';
    let digits = format!("{}{}", int_part, &frac_part[..scale]);
    match digits.parse::<u128>() {
        Ok(mut units) => {
            if round_up {
                units += 1;
            }
            let rounded = units as f64 / 10f64.powi(scale as i32);
            if value.is_sign_negative() { -rounded } else { rounded }
        }
        Err(_) => value,
    }
}
