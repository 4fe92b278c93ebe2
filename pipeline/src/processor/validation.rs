use chrono::NaiveDate;
use common::{Error, Result};
use serde_json::Value;
use tracing::warn;

use crate::processor::silver::types::RawSale;
use crate::schema::{ColumnSpec, ColumnType, RAW_SALES_COLUMNS};

/// Raw records loaded from one newline-delimited JSON object.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<RawSale>,
    pub malformed_lines: usize,
}

impl From<Vec<RawSale>> for LoadedRecords {
    fn from(records: Vec<RawSale>) -> Self {
        Self {
            records,
            malformed_lines: 0,
        }
    }
}

/// Applies the declared raw column set at read time.
///
/// Absent columns become null and unknown fields are ignored. Lines that are
/// not JSON objects become all-null records, so they are counted as input
/// rows and later removed by the key filter instead of failing the load.
pub struct SchemaValidator {
    columns: &'static [ColumnSpec],
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            columns: &RAW_SALES_COLUMNS,
        }
    }

    pub fn load(&self, content: &[u8]) -> LoadedRecords {
        let text = String::from_utf8_lossy(content);
        let mut loaded = LoadedRecords::default();

        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value @ Value::Object(_)) => loaded.records.push(self.conform(&value)),
                Ok(_) | Err(_) => {
                    if loaded.malformed_lines == 0 {
                        warn!(line = line_no + 1, "Raw line is not a JSON object; loading as nulls");
                    }
                    loaded.malformed_lines += 1;
                    loaded.records.push(RawSale::default());
                }
            }
        }

        loaded
    }

    pub fn conform(&self, value: &Value) -> RawSale {
        let mut record = RawSale::default();
        for spec in self.columns {
            if let Some(slot) = record.slot_mut(spec.name) {
                *slot = value
                    .get(spec.name)
                    .and_then(|field| token_of(field, spec.column_type));
            }
        }
        record
    }
}

/// JSON numbers are rendered in the column's declared form, so `10` and
/// `10.0` yield the same token in a double column.
fn token_of(value: &Value, column_type: ColumnType) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_token(n, column_type)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn number_token(n: &serde_json::Number, column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Double => n.as_f64().map(|f| f.to_string()),
        ColumnType::Integer => n.as_i64().map(|i| i.to_string()).or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| (f as i64).to_string())
        }),
        ColumnType::String => None,
    }
    .unwrap_or_else(|| n.to_string())
}

/// Casts a token to the declared integer type. Integral decimals such as
/// `"3.0"` are accepted; fractions, overflow and words are cast failures.
pub fn cast_to_integer(column: &str, token: &str) -> Result<i32> {
    let trimmed = token.trim();
    if let Ok(value) = trimmed.parse::<i32>() {
        return Ok(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value)
            if value.is_finite()
                && value.fract() == 0.0
                && value >= i32::MIN as f64
                && value <= i32::MAX as f64 =>
        {
            Ok(value as i32)
        }
        _ => Err(cast_error(column, token)),
    }
}

/// Casts a token to the declared double type. Non-finite values fail.
pub fn cast_to_double(column: &str, token: &str) -> Result<f64> {
    match token.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(cast_error(column, token)),
    }
}

/// Parses a `yyyy-MM-dd` calendar date.
pub fn cast_to_date(column: &str, token: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(token.trim(), "%Y-%m-%d").map_err(|_| cast_error(column, token))
}

fn cast_error(column: &str, token: &str) -> Error {
    Error::SchemaCast {
        column: column.to_string(),
        value: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_columns_are_null_and_extras_ignored() {
        let validator = SchemaValidator::new();
        let record = validator.conform(&json!({
            "transaction_id": "t1",
            "store_id": "S101",
            "quantity_sold": 2,
            "unit_price": 9.5,
            "loyalty_tier": "gold"
        }));

        assert_eq!(record.transaction_id.as_deref(), Some("t1"));
        assert_eq!(record.quantity_sold.as_deref(), Some("2"));
        assert_eq!(record.unit_price.as_deref(), Some("9.5"));
        assert!(record.customer_id.is_none());
        assert!(record.payment_method.is_none());
    }

    #[test]
    fn wrong_typed_values_are_kept_as_tokens() {
        let validator = SchemaValidator::new();
        let record = validator.conform(&json!({
            "unit_price": "FREE",
            "customer_name": null,
            "store_id": 101
        }));

        assert_eq!(record.unit_price.as_deref(), Some("FREE"));
        assert_eq!(record.store_id.as_deref(), Some("101"));
        assert!(record.customer_name.is_none());
    }

    #[test]
    fn numeric_tokens_follow_declared_type() {
        let validator = SchemaValidator::new();
        let whole = validator.conform(&json!({
            "quantity_sold": 3,
            "unit_price": 10,
            "total_amount": 30
        }));
        let decimal = validator.conform(&json!({
            "quantity_sold": 3.0,
            "unit_price": 10.0,
            "total_amount": 30.00
        }));

        assert_eq!(whole, decimal);
        assert_eq!(decimal.quantity_sold.as_deref(), Some("3"));
        assert_eq!(decimal.unit_price.as_deref(), Some("10"));

        let fractional = validator.conform(&json!({ "quantity_sold": 2.5, "unit_price": 19.99 }));
        assert_eq!(fractional.quantity_sold.as_deref(), Some("2.5"));
        assert_eq!(fractional.unit_price.as_deref(), Some("19.99"));
    }

    #[test]
    fn load_counts_malformed_lines_as_null_rows() {
        let validator = SchemaValidator::new();
        let content = b"{\"transaction_id\":\"a\"}\n\nnot json\n[1,2]\n{\"transaction_id\":\"b\"}\n";
        let loaded = validator.load(content);

        assert_eq!(loaded.records.len(), 4);
        assert_eq!(loaded.malformed_lines, 2);
        assert_eq!(loaded.records[1], RawSale::default());
        assert_eq!(loaded.records[3].transaction_id.as_deref(), Some("b"));
    }

    #[test]
    fn integer_cast_rules() {
        assert_eq!(cast_to_integer("quantity_sold", "3").unwrap(), 3);
        assert_eq!(cast_to_integer("quantity_sold", " -5 ").unwrap(), -5);
        assert_eq!(cast_to_integer("quantity_sold", "4.0").unwrap(), 4);
        assert!(cast_to_integer("quantity_sold", "2.5").is_err());
        assert!(cast_to_integer("quantity_sold", "many").is_err());
        assert!(cast_to_integer("quantity_sold", "99999999999").is_err());
    }

    #[test]
    fn double_cast_rejects_words_and_non_finite() {
        assert_eq!(cast_to_double("unit_price", "10.25").unwrap(), 10.25);
        assert_eq!(cast_to_double("unit_price", "7").unwrap(), 7.0);
        let err = cast_to_double("unit_price", "FREE").unwrap_err();
        assert!(matches!(err, Error::SchemaCast { ref column, ref value } if column == "unit_price" && value == "FREE"));
        assert!(cast_to_double("unit_price", "NaN").is_err());
        assert!(cast_to_double("unit_price", "inf").is_err());
    }

    #[test]
    fn date_cast_uses_iso_format() {
        assert_eq!(
            cast_to_date("date", "2025-02-28").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert!(cast_to_date("date", "28/02/2025").is_err());
    }
}
