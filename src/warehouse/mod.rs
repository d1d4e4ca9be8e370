//! Warehouse statement execution
//!
//! The warehouse runs every command asynchronously: a submission returns a
//! statement handle immediately and completion is observed by polling. This
//! module provides:
//! - [`StatementService`]: the remote submit/status protocol
//! - [`StatementExecutor`]: submits one command against a bound target
//! - [`StatementWaiter`]: polls a handle until it reaches a terminal state
//! - [`TableRefresher`]: existence check, conditional truncate, bulk load

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod executor;
#[cfg(feature = "aws")]
pub mod redshift;
pub mod refresh;
pub mod waiter;

pub use executor::{AsyncStatement, ExecutionTarget, StatementExecutor};
#[cfg(feature = "aws")]
pub use redshift::RedshiftDataService;
pub use refresh::{RefreshError, RefreshPlan, RefreshReport, RefreshStep, TableRefresher, TableState};
pub use waiter::{DEFAULT_POLL_INTERVAL, PollOutcome, StatementWaiter, WaitPolicy};

/// Reason reported for a statement the service aborted
pub const ABORTED_REASON: &str = "aborted";

/// Reason reported for a failed statement that carries no error text
pub const UNKNOWN_ERROR_REASON: &str = "Unknown error";

/// Error type for warehouse operations
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// The service rejected the command before accepting it
    #[error("Statement submission rejected: {0}")]
    Submission(String),

    /// The command was accepted but ended FAILED or ABORTED
    #[error("Statement {statement_id} failed: {reason}")]
    Execution {
        statement_id: String,
        reason: String,
    },

    /// The caller cancelled the wait
    #[error("Wait for statement {statement_id} was cancelled")]
    Cancelled { statement_id: String },

    /// The wait policy bound was reached before a terminal state
    #[error("Statement {statement_id} not finished after {attempts} polls")]
    WaitTimeout { statement_id: String, attempts: u32 },

    /// A finished statement returned a payload of the wrong shape
    #[error("Unexpected statement result: {0}")]
    UnexpectedResult(String),

    /// The refresh plan cannot be turned into safe SQL
    #[error("Invalid refresh plan: {0}")]
    InvalidPlan(String),

    /// Transport or service failure while talking to the warehouse
    #[error("Warehouse service error: {0}")]
    Upstream(String),
}

impl WarehouseError {
    /// Remote failure text for `Execution` errors
    pub fn reason(&self) -> Option<&str> {
        match self {
            WarehouseError::Execution { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Opaque identifier of a submitted statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementHandle(String);

impl StatementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote execution state of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementStatus {
    Submitted,
    Picked,
    Started,
    Finished,
    Failed,
    Aborted,
}

impl StatementStatus {
    /// FINISHED, FAILED and ABORTED never change again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatementStatus::Finished | StatementStatus::Failed | StatementStatus::Aborted
        )
    }

    /// Position on the path toward a terminal state
    pub(crate) fn progress_rank(self) -> u8 {
        match self {
            StatementStatus::Submitted => 0,
            StatementStatus::Picked => 1,
            StatementStatus::Started => 2,
            StatementStatus::Finished | StatementStatus::Failed | StatementStatus::Aborted => 3,
        }
    }
}

impl std::str::FromStr for StatementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUBMITTED" => Ok(StatementStatus::Submitted),
            "PICKED" => Ok(StatementStatus::Picked),
            "STARTED" | "RUNNING" => Ok(StatementStatus::Started),
            "FINISHED" => Ok(StatementStatus::Finished),
            "FAILED" => Ok(StatementStatus::Failed),
            "ABORTED" => Ok(StatementStatus::Aborted),
            _ => Err(format!("Unknown statement status: {}", s)),
        }
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementStatus::Submitted => write!(f, "SUBMITTED"),
            StatementStatus::Picked => write!(f, "PICKED"),
            StatementStatus::Started => write!(f, "STARTED"),
            StatementStatus::Finished => write!(f, "FINISHED"),
            StatementStatus::Failed => write!(f, "FAILED"),
            StatementStatus::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Tabular payload of a finished statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of cells, positionally aligned with `columns`
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl ResultSet {
    /// Create a new result set
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    /// Result set holding one unnamed cell
    pub fn single(value: serde_json::Value) -> Self {
        Self {
            columns: vec!["?column?".to_string()],
            rows: vec![vec![value]],
        }
    }

    /// First column of the first row
    pub fn first_cell(&self) -> Option<&serde_json::Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One observation of a statement's remote state
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: StatementStatus,
    /// Present once FINISHED, and only for commands that produce rows
    pub rows: Option<ResultSet>,
    /// Remote error text, present for FAILED statements
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn pending(status: StatementStatus) -> Self {
        Self {
            status,
            rows: None,
            error: None,
        }
    }

    pub fn finished(rows: Option<ResultSet>) -> Self {
        Self {
            status: StatementStatus::Finished,
            rows,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: StatementStatus::Failed,
            rows: None,
            error: Some(error.into()),
        }
    }

    pub fn aborted() -> Self {
        Self::pending(StatementStatus::Aborted)
    }
}

/// Remote asynchronous execution protocol
///
/// Implementations map the vendor API onto two calls: `submit` issues exactly
/// one command and must not wait for it, `status` reports the current state of
/// a handle. A synchronous rejection from `submit` is reported as
/// [`WarehouseError::Submission`].
#[async_trait]
pub trait StatementService: Send + Sync {
    /// Submit a SQL command for asynchronous execution
    async fn submit(&self, sql: &str, target: &ExecutionTarget)
    -> WarehouseResult<StatementHandle>;

    /// Describe the current state of a submitted command
    async fn status(&self, handle: &StatementHandle) -> WarehouseResult<StatusResponse>;

    /// Get the service type name
    fn service_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            StatementStatus::from_str("FINISHED").unwrap(),
            StatementStatus::Finished
        );
        assert_eq!(
            StatementStatus::from_str("running").unwrap(),
            StatementStatus::Started
        );
        assert_eq!(
            StatementStatus::from_str("Aborted").unwrap(),
            StatementStatus::Aborted
        );
        assert!(StatementStatus::from_str("ALL").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(StatementStatus::Finished.is_terminal());
        assert!(StatementStatus::Failed.is_terminal());
        assert!(StatementStatus::Aborted.is_terminal());
        assert!(!StatementStatus::Submitted.is_terminal());
        assert!(!StatementStatus::Picked.is_terminal());
        assert!(!StatementStatus::Started.is_terminal());
    }

    #[test]
    fn test_result_set_first_cell() {
        let result = ResultSet::single(serde_json::Value::Bool(true));
        assert_eq!(result.first_cell(), Some(&serde_json::Value::Bool(true)));
        assert_eq!(result.row_count(), 1);

        let empty = ResultSet::default();
        assert!(empty.is_empty());
        assert!(empty.first_cell().is_none());
    }

    #[test]
    fn test_execution_error_reason() {
        let err = WarehouseError::Execution {
            statement_id: "s-1".to_string(),
            reason: "syntax error".to_string(),
        };
        assert_eq!(err.reason(), Some("syntax error"));
        assert!(err.to_string().contains("syntax error"));
        assert!(WarehouseError::Upstream("x".into()).reason().is_none());
    }
}
