//! Statement submission and per-statement state

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::waiter::PollOutcome;
use super::{
    ResultSet, StatementHandle, StatementService, StatementStatus, StatusResponse,
    UNKNOWN_ERROR_REASON, WarehouseResult,
};
use crate::secrets::WarehouseCredentials;

/// Where and as whom a statement runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    /// Database the statement runs in
    pub database: String,
    /// Cluster that hosts the database
    pub cluster_identifier: String,
    /// Secret the service authenticates with
    pub secret_arn: String,
}

impl ExecutionTarget {
    /// Bind a database to resolved credentials
    pub fn new(database: impl Into<String>, credentials: &WarehouseCredentials) -> Self {
        Self {
            database: database.into(),
            cluster_identifier: credentials.cluster_identifier.clone(),
            secret_arn: credentials.secret_arn.clone(),
        }
    }
}

/// One in-flight remote command
///
/// Status only moves toward a terminal state. Observations that would move it
/// backwards, or any observation after a terminal state, are ignored.
#[derive(Debug, Clone)]
pub struct AsyncStatement {
    handle: StatementHandle,
    status: StatementStatus,
    result_rows: Option<ResultSet>,
    error_message: Option<String>,
    poll_count: u32,
}

impl AsyncStatement {
    /// State of a statement the service just accepted
    pub fn submitted(handle: StatementHandle) -> Self {
        Self {
            handle,
            status: StatementStatus::Submitted,
            result_rows: None,
            error_message: None,
            poll_count: 0,
        }
    }

    pub fn handle(&self) -> &StatementHandle {
        &self.handle
    }

    pub fn status(&self) -> StatementStatus {
        self.status
    }

    pub fn result_rows(&self) -> Option<&ResultSet> {
        self.result_rows.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Number of status observations applied so far
    pub fn poll_count(&self) -> u32 {
        self.poll_count
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one status observation and classify the result
    pub fn observe(&mut self, response: StatusResponse) -> PollOutcome {
        self.poll_count += 1;

        if !self.status.is_terminal()
            && response.status.progress_rank() >= self.status.progress_rank()
        {
            if response.status != self.status {
                debug!(
                    statement_id = %self.handle,
                    from = %self.status,
                    to = %response.status,
                    "Statement status changed"
                );
            }
            self.status = response.status;
            if self.status.is_terminal() {
                self.result_rows = response.rows;
                self.error_message = response.error;
            }
        }

        self.outcome()
    }

    /// Classification of the current state
    pub fn outcome(&self) -> PollOutcome {
        match self.status {
            StatementStatus::Finished => PollOutcome::Finished(self.result_rows.clone()),
            StatementStatus::Failed => PollOutcome::Failed(
                self.error_message
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ERROR_REASON.to_string()),
            ),
            StatementStatus::Aborted => PollOutcome::Aborted,
            StatementStatus::Submitted | StatementStatus::Picked | StatementStatus::Started => {
                PollOutcome::Pending
            }
        }
    }
}

/// Submits commands against one execution target
#[derive(Clone)]
pub struct StatementExecutor {
    service: Arc<dyn StatementService>,
    target: ExecutionTarget,
}

impl StatementExecutor {
    /// Create an executor bound to a target
    pub fn new(service: Arc<dyn StatementService>, target: ExecutionTarget) -> Self {
        Self { service, target }
    }

    pub fn target(&self) -> &ExecutionTarget {
        &self.target
    }

    /// Issue exactly one remote command without waiting for it
    pub async fn submit(&self, sql: &str) -> WarehouseResult<AsyncStatement> {
        debug!(
            service = self.service.service_type(),
            database = %self.target.database,
            sql = %sql.trim(),
            "Submitting statement"
        );

        let handle = self.service.submit(sql, &self.target).await?;
        info!(statement_id = %handle, "Statement submitted");

        Ok(AsyncStatement::submitted(handle))
    }
}
