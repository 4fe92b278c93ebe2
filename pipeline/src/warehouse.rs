use async_trait::async_trait;
use common::config::WarehouseSettings;
use common::{Error, Result};
use tracing::{error, info};

use crate::storage::join_key;
use crate::utils::paths::GoldTable;

/// Executes SQL against the warehouse.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStep {
    pub table: String,
    pub source: String,
    /// Dimensions are replaced; the fact table is appended to.
    pub truncate: bool,
}

impl LoadStep {
    pub fn statements(&self, iam_role: &str) -> Vec<String> {
        let mut statements = Vec::with_capacity(2);
        if self.truncate {
            statements.push(truncate_sql(&self.table));
        }
        statements.push(copy_sql(&self.table, &self.source, iam_role));
        statements
    }
}

/// Bulk-copy plan for the four gold datasets: dimensions first, fact last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub iam_role: String,
    pub steps: Vec<LoadStep>,
}

impl LoadPlan {
    pub fn for_gold(bucket: &str, gold_prefix: &str, settings: &WarehouseSettings) -> Result<Self> {
        let iam_role = settings
            .iam_role
            .clone()
            .filter(|role| !role.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("warehouse.iam_role is not configured".to_string()))?;

        let ordered = GoldTable::ALL
            .iter()
            .filter(|t| t.is_dimension())
            .chain(GoldTable::ALL.iter().filter(|t| !t.is_dimension()));

        let steps = ordered
            .map(|table| LoadStep {
                table: qualified_name(settings.schema.as_deref(), table.table_name()),
                source: format!("s3://{}", join_key(bucket, &table.prefix(gold_prefix))),
                truncate: table.is_dimension(),
            })
            .collect();

        Ok(Self { iam_role, steps })
    }

    pub fn statements(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|step| step.statements(&self.iam_role))
            .collect()
    }
}

fn qualified_name(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) if !schema.is_empty() => format!("{}.{}", schema, table),
        _ => table.to_string(),
    }
}

pub fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {};", table)
}

pub fn copy_sql(table: &str, source: &str, iam_role: &str) -> String {
    format!(
        "COPY {} FROM '{}' IAM_ROLE '{}' DELIMITER ',' IGNOREHEADER 1 CSV DATEFORMAT 'auto' TIMEFORMAT 'auto';",
        table, source, iam_role
    )
}

/// Runs the plan in order and stops at the first failing statement.
/// Returns the number of statements executed.
pub async fn load_gold(client: &dyn WarehouseClient, plan: &LoadPlan) -> Result<usize> {
    let mut executed = 0;
    for step in &plan.steps {
        info!(table = %step.table, source = %step.source, truncate = step.truncate, "Loading warehouse table");
        for sql in step.statements(&plan.iam_role) {
            if let Err(e) = client.execute(&sql).await {
                error!(table = %step.table, error = %e, "Warehouse statement failed");
                return Err(e);
            }
            executed += 1;
        }
    }
    info!(statements = executed, "Warehouse load complete");
    Ok(executed)
}
