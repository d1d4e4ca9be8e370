//! Truncate-then-load refresh of a warehouse table
//!
//! A refresh runs three statements strictly in sequence:
//! 1. existence check against `information_schema.tables`
//! 2. `TRUNCATE` when the table exists, skipped otherwise
//! 3. `COPY` of the extract from blob storage, skipping the header row
//!
//! The steps are not one transaction. A load failure after a successful
//! truncate leaves the table empty; [`RefreshError::table_state`] reports it.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::executor::StatementExecutor;
use super::waiter::StatementWaiter;
use super::{ResultSet, StatementHandle, WarehouseError, WarehouseResult};
use crate::blob::BlobLocation;

static RE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("Invalid regex"));

/// Destination of a load
///
/// Built once through [`RefreshPlan::new`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPlan {
    database: String,
    schema: String,
    table: String,
    source: BlobLocation,
    access_role: String,
}

impl RefreshPlan {
    /// Validate and build a plan
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        source: BlobLocation,
        access_role: impl Into<String>,
    ) -> WarehouseResult<Self> {
        // Unquoted identifiers fold to lower case in the warehouse catalog
        let plan = Self {
            database: database.into(),
            schema: schema.into().to_lowercase(),
            table: table.into().to_lowercase(),
            source,
            access_role: access_role.into(),
        };

        validate_identifier("schema", &plan.schema)?;
        validate_identifier("table", &plan.table)?;
        if plan.database.trim().is_empty() {
            return Err(WarehouseError::InvalidPlan(
                "database must not be empty".to_string(),
            ));
        }
        if plan.access_role.trim().is_empty() {
            return Err(WarehouseError::InvalidPlan(
                "access role must not be empty".to_string(),
            ));
        }
        if plan.source.bucket.is_empty() || plan.source.key.is_empty() {
            return Err(WarehouseError::InvalidPlan(format!(
                "source location is incomplete: {}",
                plan.source
            )));
        }

        Ok(plan)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn source(&self) -> &BlobLocation {
        &self.source
    }

    pub fn access_role(&self) -> &str {
        &self.access_role
    }

    /// `schema.table`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Query returning one boolean cell
    pub fn table_exists_sql(&self) -> String {
        format!(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_schema = '{}' AND table_name = '{}');",
            quote_literal(&self.schema),
            quote_literal(&self.table)
        )
    }

    pub fn truncate_sql(&self) -> String {
        format!("TRUNCATE TABLE {};", self.qualified_table())
    }

    pub fn copy_sql(&self) -> String {
        format!(
            "COPY {} FROM '{}' IAM_ROLE '{}' CSV IGNOREHEADER 1;",
            self.qualified_table(),
            quote_literal(&self.source.uri()),
            quote_literal(&self.access_role)
        )
    }
}

fn validate_identifier(kind: &str, value: &str) -> WarehouseResult<()> {
    if RE_IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(WarehouseError::InvalidPlan(format!(
            "{} '{}' is not a plain SQL identifier",
            kind, value
        )))
    }
}

fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Step of the refresh protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStep {
    ExistenceCheck,
    Truncate,
    Load,
}

impl fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStep::ExistenceCheck => write!(f, "existence check"),
            RefreshStep::Truncate => write!(f, "truncate"),
            RefreshStep::Load => write!(f, "load"),
        }
    }
}

/// What a failed refresh left behind in the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Prior contents (or absence) retained
    Unchanged,
    /// Truncated, but the load did not complete
    Emptied,
}

/// A refresh step failed
#[derive(Debug, thiserror::Error)]
#[error("Refresh of {table} failed during {step}: {source}")]
pub struct RefreshError {
    pub table: String,
    pub step: RefreshStep,
    /// Whether the truncate step had completed
    pub truncated: bool,
    #[source]
    pub source: WarehouseError,
}

impl RefreshError {
    pub fn table_state(&self) -> TableState {
        if self.truncated {
            TableState::Emptied
        } else {
            TableState::Unchanged
        }
    }
}

/// Outcome of a successful refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// `schema.table`
    pub table: String,
    /// Existence check result
    pub table_existed: bool,
    /// Whether the truncate step ran
    pub truncated: bool,
    /// Handles of every statement issued, in order
    pub statements: Vec<StatementHandle>,
}

/// Runs the refresh protocol
pub struct TableRefresher {
    executor: StatementExecutor,
    waiter: StatementWaiter,
}

impl TableRefresher {
    pub fn new(executor: StatementExecutor, waiter: StatementWaiter) -> Self {
        Self { executor, waiter }
    }

    /// Replace the table contents with the extract at the plan's source
    pub async fn refresh(
        &self,
        plan: &RefreshPlan,
        cancel: &CancellationToken,
    ) -> Result<RefreshReport, RefreshError> {
        let table = plan.qualified_table();
        let mut report = RefreshReport {
            table: table.clone(),
            ..RefreshReport::default()
        };
        let failed = |step, truncated, source| RefreshError {
            table: table.clone(),
            step,
            truncated,
            source,
        };

        let rows = self
            .execute(&plan.table_exists_sql(), cancel, &mut report)
            .await
            .map_err(|e| failed(RefreshStep::ExistenceCheck, false, e))?;
        let exists = interpret_exists(rows.as_ref())
            .map_err(|e| failed(RefreshStep::ExistenceCheck, false, e))?;
        report.table_existed = exists;

        if exists {
            info!("Table {} exists. Truncating...", table);
            self.execute(&plan.truncate_sql(), cancel, &mut report)
                .await
                .map_err(|e| failed(RefreshStep::Truncate, false, e))?;
            report.truncated = true;
            info!("Table {} truncated successfully.", table);
        } else {
            info!("Table {} does not exist. Skipping truncate.", table);
        }

        self.execute(&plan.copy_sql(), cancel, &mut report)
            .await
            .map_err(|e| failed(RefreshStep::Load, report.truncated, e))?;

        info!(
            "Successfully loaded data from {} into {}",
            plan.source().uri(),
            table
        );
        Ok(report)
    }

    async fn execute(
        &self,
        sql: &str,
        cancel: &CancellationToken,
        report: &mut RefreshReport,
    ) -> WarehouseResult<Option<ResultSet>> {
        let mut statement = self.executor.submit(sql).await?;
        report.statements.push(statement.handle().clone());
        self.waiter.wait(&mut statement, cancel).await
    }
}

/// Read the boolean cell of an existence check
fn interpret_exists(rows: Option<&ResultSet>) -> WarehouseResult<bool> {
    let cell = rows.and_then(ResultSet::first_cell).ok_or_else(|| {
        WarehouseError::UnexpectedResult("existence check returned no rows".to_string())
    })?;

    match cell {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Number(n) => Ok(n.as_i64().is_some_and(|v| v != 0)),
        serde_json::Value::String(s) => match s.trim().to_lowercase().as_str() {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            other => Err(WarehouseError::UnexpectedResult(format!(
                "existence check returned '{}'",
                other
            ))),
        },
        other => Err(WarehouseError::UnexpectedResult(format!(
            "existence check returned {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan() -> RefreshPlan {
        RefreshPlan::new(
            "dev",
            "governance",
            "subscriptions",
            BlobLocation::new("extracts", "datazone/subscriptions.csv"),
            "arn:aws:iam::123456789012:role/redshift-copy",
        )
        .unwrap()
    }

    #[test]
    fn test_plan_sql() {
        let plan = plan();
        assert_eq!(plan.qualified_table(), "governance.subscriptions");
        assert!(plan.table_exists_sql().contains("table_schema = 'governance'"));
        assert!(plan.table_exists_sql().contains("table_name = 'subscriptions'"));
        assert_eq!(plan.truncate_sql(), "TRUNCATE TABLE governance.subscriptions;");

        let copy = plan.copy_sql();
        assert!(copy.starts_with("COPY governance.subscriptions FROM 's3://extracts/datazone/subscriptions.csv'"));
        assert!(copy.contains("IAM_ROLE 'arn:aws:iam::123456789012:role/redshift-copy'"));
        assert!(copy.contains("CSV IGNOREHEADER 1"));
    }

    #[test]
    fn test_plan_rejects_unsafe_identifiers() {
        let source = BlobLocation::new("b", "k");
        let result = RefreshPlan::new("dev", "public; DROP TABLE x", "t", source.clone(), "role");
        assert!(matches!(result, Err(WarehouseError::InvalidPlan(_))));

        let result = RefreshPlan::new("dev", "public", "1table", source.clone(), "role");
        assert!(matches!(result, Err(WarehouseError::InvalidPlan(_))));

        let result = RefreshPlan::new("dev", "public", "t", source, " ");
        assert!(matches!(result, Err(WarehouseError::InvalidPlan(_))));
    }

    #[test]
    fn test_literal_quoting() {
        let plan = RefreshPlan::new(
            "dev",
            "public",
            "t",
            BlobLocation::new("bucket", "o'brien.csv"),
            "role",
        )
        .unwrap();
        assert!(plan.copy_sql().contains("'s3://bucket/o''brien.csv'"));
    }

    #[test]
    fn test_interpret_exists() {
        let t = ResultSet::single(json!(true));
        let f = ResultSet::single(json!(false));
        assert!(interpret_exists(Some(&t)).unwrap());
        assert!(!interpret_exists(Some(&f)).unwrap());
        assert!(interpret_exists(Some(&ResultSet::single(json!(1)))).unwrap());
        assert!(!interpret_exists(Some(&ResultSet::single(json!("f")))).unwrap());
        assert!(interpret_exists(None).is_err());
        assert!(interpret_exists(Some(&ResultSet::default())).is_err());
        assert!(interpret_exists(Some(&ResultSet::single(json!("maybe")))).is_err());
    }

    #[test]
    fn test_refresh_error_table_state() {
        let err = RefreshError {
            table: "a.b".to_string(),
            step: RefreshStep::Load,
            truncated: true,
            source: WarehouseError::Upstream("boom".to_string()),
        };
        assert_eq!(err.table_state(), TableState::Emptied);
        assert!(err.to_string().contains("during load"));

        let err = RefreshError {
            table: "a.b".to_string(),
            step: RefreshStep::Truncate,
            truncated: false,
            source: WarehouseError::Upstream("boom".to_string()),
        };
        assert_eq!(err.table_state(), TableState::Unchanged);
    }
}
