use arrow::record_batch::RecordBatch;
use common::Result;
use datafusion::datasource::MemTable;
use datafusion::logical_expr::{Expr, col, try_cast};
use datafusion::prelude::{SessionConfig, SessionContext};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::schema::{
    DIM_CUSTOMER_COLUMNS, DIM_PRODUCT_COLUMNS, DIM_STORE_COLUMNS, FACT_SALES_COLUMNS,
    get_silver_schema, silver_recast_columns,
};
use crate::utils::arrow::{concat, first_seen_by_key, project_columns};
use crate::utils::paths::GoldTable;

/// Column list of each gold dataset. Dimensions lead with their natural key.
pub fn table_columns(table: GoldTable) -> &'static [&'static str] {
    match table {
        GoldTable::FactSales => &FACT_SALES_COLUMNS,
        GoldTable::DimStore => &DIM_STORE_COLUMNS,
        GoldTable::DimProduct => &DIM_PRODUCT_COLUMNS,
        GoldTable::DimCustomer => &DIM_CUSTOMER_COLUMNS,
    }
}

#[derive(Debug, Clone)]
pub struct GoldTables {
    pub fact_sales: RecordBatch,
    pub dim_store: RecordBatch,
    pub dim_product: RecordBatch,
    pub dim_customer: RecordBatch,
}

impl GoldTables {
    pub fn get(&self, table: GoldTable) -> &RecordBatch {
        match table {
            GoldTable::FactSales => &self.fact_sales,
            GoldTable::DimStore => &self.dim_store,
            GoldTable::DimProduct => &self.dim_product,
            GoldTable::DimCustomer => &self.dim_customer,
        }
    }
}

pub struct DataTransformer {
    ctx: SessionContext,
}

impl Default for DataTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTransformer {
    pub fn new() -> Self {
        // One partition keeps rows in read order for the first-seen rule.
        let config = SessionConfig::new().with_target_partitions(1);
        Self {
            ctx: SessionContext::new_with_config(config),
        }
    }

    /// Re-applies the silver types to `date` and the measures. Values that
    /// no longer cast become null; already-typed columns pass through.
    pub async fn recast(&self, batches: Vec<RecordBatch>) -> Result<RecordBatch> {
        let schema = batches
            .first()
            .map(|b| b.schema())
            .unwrap_or_else(get_silver_schema);
        let targets: HashMap<&str, _> = silver_recast_columns().into_iter().collect();

        let table = MemTable::try_new(schema.clone(), vec![batches])?;
        let df = self.ctx.read_table(Arc::new(table))?;

        let exprs: Vec<Expr> = schema
            .fields()
            .iter()
            .map(|field| {
                let name = field.name().as_str();
                match targets.get(name) {
                    Some(data_type) => try_cast(col(name), data_type.clone()).alias(name),
                    None => col(name),
                }
            })
            .collect();

        let df = df.select(exprs)?;
        let output_schema = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await?;
        concat(&output_schema, &batches)
    }

    /// Splits a silver partition into the fact table and three
    /// deduplicated dimensions.
    pub fn decompose(&self, silver: &RecordBatch) -> Result<GoldTables> {
        let fact_sales = project_columns(silver, table_columns(GoldTable::FactSales))?;
        let dim_store = dimension(silver, GoldTable::DimStore)?;
        let dim_product = dimension(silver, GoldTable::DimProduct)?;
        let dim_customer = dimension(silver, GoldTable::DimCustomer)?;

        info!(
            fact_sales = fact_sales.num_rows(),
            dim_store = dim_store.num_rows(),
            dim_product = dim_product.num_rows(),
            dim_customer = dim_customer.num_rows(),
            "Gold: tables derived"
        );

        Ok(GoldTables {
            fact_sales,
            dim_store,
            dim_product,
            dim_customer,
        })
    }
}

fn dimension(silver: &RecordBatch, table: GoldTable) -> Result<RecordBatch> {
    let columns = table_columns(table);
    let projected = project_columns(silver, columns)?;
    first_seen_by_key(&projected, columns[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::silver::storage::sales_to_record_batch;
    use crate::processor::silver::types::SilverSale;
    use crate::utils::arrow::string_column;
    use arrow::array::{Array, Float64Array};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::HashSet;

    fn sale(id: &str, store: &str, store_name: &str, product: &str, customer: &str) -> SilverSale {
        SilverSale {
            transaction_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1),
            store_id: store.to_string(),
            store_name: Some(store_name.to_string()),
            city: Some("Rockville".to_string()),
            product_id: product.to_string(),
            product_name: Some(format!("name-{}", product)),
            category: Some("Grocery".to_string()),
            customer_id: customer.to_string(),
            customer_name: None,
            quantity_sold: 2,
            unit_price: 4.5,
            total_amount: 9.0,
            payment_method: Some("Card".to_string()),
            ingested_at: Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
        }
    }

    fn silver() -> RecordBatch {
        sales_to_record_batch(&[
            sale("t1", "S1", "Main St", "P1", "C1"),
            sale("t2", "S2", "Harbor", "P1", "C2"),
            sale("t3", "S1", "Main Street (renamed)", "P2", "C1"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn recast_is_idempotent_on_typed_input() {
        let transformer = DataTransformer::new();
        let input = silver();

        let once = transformer.recast(vec![input.clone()]).await.unwrap();
        let twice = transformer.recast(vec![once.clone()]).await.unwrap();

        assert_eq!(once.num_rows(), 3);
        let types = |b: &RecordBatch| -> Vec<(String, arrow::datatypes::DataType)> {
            b.schema()
                .fields()
                .iter()
                .map(|f| (f.name().clone(), f.data_type().clone()))
                .collect()
        };
        assert_eq!(types(&once), types(&input));
        assert_eq!(once, twice);
        let totals = once
            .column_by_name("total_amount")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(totals.value(0), 9.0);
    }

    #[tokio::test]
    async fn recast_keeps_read_order_across_batches() {
        let transformer = DataTransformer::new();
        let first = sales_to_record_batch(&[sale("t1", "S1", "a", "P1", "C1")]).unwrap();
        let second = sales_to_record_batch(&[sale("t2", "S2", "b", "P2", "C2")]).unwrap();

        let merged = transformer.recast(vec![first, second]).await.unwrap();

        let ids = string_column(&merged, "transaction_id").unwrap();
        assert_eq!(ids.value(0), "t1");
        assert_eq!(ids.value(1), "t2");
    }

    #[test]
    fn dimensions_have_unique_keys_and_first_seen_attributes() {
        let tables = DataTransformer::new().decompose(&silver()).unwrap();

        let stores = string_column(&tables.dim_store, "store_id").unwrap();
        let unique: HashSet<&str> = stores.iter().flatten().collect();
        assert_eq!(unique.len(), stores.len());
        assert_eq!(tables.dim_store.num_rows(), 2);
        assert_eq!(string_column(&tables.dim_store, "store_name").unwrap().value(0), "Main St");

        assert_eq!(tables.dim_product.num_rows(), 2);
        assert_eq!(tables.dim_customer.num_rows(), 2);
        assert!(tables.dim_customer.column_by_name("customer_name").unwrap().is_null(0));
    }

    #[test]
    fn fact_keeps_keys_and_measures_only() {
        let tables = DataTransformer::new().decompose(&silver()).unwrap();
        let schema = tables.fact_sales.schema();
        let columns: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();

        assert_eq!(columns, FACT_SALES_COLUMNS.to_vec());
        assert_eq!(tables.fact_sales.num_rows(), 3);
    }
}
