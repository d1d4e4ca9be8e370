//! Poll loop for asynchronous statements

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::executor::AsyncStatement;
use super::{ABORTED_REASON, ResultSet, StatementService, WarehouseError, WarehouseResult};

/// Default delay between two status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Classification of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Not terminal yet, poll again
    Pending,
    /// Completed, with the payload if the command produced rows
    Finished(Option<ResultSet>),
    /// Completed unsuccessfully with the remote error text
    Failed(String),
    /// Stopped by the service
    Aborted,
}

/// Bounds of a wait
///
/// The default policy polls every two seconds without any bound, so a wait
/// only ends on a terminal remote state or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            timeout: None,
        }
    }
}

impl WaitPolicy {
    /// Unbounded policy with a custom interval
    pub fn every(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Polls statements until they reach a terminal state
#[derive(Clone)]
pub struct StatementWaiter {
    service: Arc<dyn StatementService>,
    policy: WaitPolicy,
}

impl StatementWaiter {
    pub fn new(service: Arc<dyn StatementService>, policy: WaitPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Wait for a statement to finish
    ///
    /// Polls immediately, then once per interval. Returns the payload of a
    /// FINISHED statement (absent for commands without rows). FAILED and
    /// ABORTED statements are never retried.
    ///
    /// Cancellation and the policy timeout also interrupt a status call that
    /// is still in flight, and the last sleep is cut short at the deadline.
    pub async fn wait(
        &self,
        statement: &mut AsyncStatement,
        cancel: &CancellationToken,
    ) -> WarehouseResult<Option<ResultSet>> {
        let deadline = self.policy.timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(statement));
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(statement)),
                _ = sleep_until(deadline) => return Err(timed_out(statement)),
                response = self.service.status(statement.handle()) => response?,
            };

            match statement.observe(response) {
                PollOutcome::Pending => {}
                PollOutcome::Finished(rows) => {
                    debug!(
                        statement_id = %statement.handle(),
                        polls = statement.poll_count(),
                        "Statement finished"
                    );
                    return Ok(rows);
                }
                PollOutcome::Failed(reason) => {
                    warn!(statement_id = %statement.handle(), "Query failed: {}", reason);
                    return Err(WarehouseError::Execution {
                        statement_id: statement.handle().to_string(),
                        reason,
                    });
                }
                PollOutcome::Aborted => {
                    warn!(statement_id = %statement.handle(), "Query was aborted");
                    return Err(WarehouseError::Execution {
                        statement_id: statement.handle().to_string(),
                        reason: ABORTED_REASON.to_string(),
                    });
                }
            }

            if self.policy.attempts_exhausted(statement.poll_count())
                || deadline.is_some_and(|deadline| Instant::now() >= deadline)
            {
                return Err(timed_out(statement));
            }

            let pause = match deadline {
                Some(deadline) => self
                    .policy
                    .poll_interval
                    .min(deadline.saturating_duration_since(Instant::now())),
                None => self.policy.poll_interval,
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled(statement)),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

/// Sleep until the deadline, or forever without one
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn cancelled(statement: &AsyncStatement) -> WarehouseError {
    WarehouseError::Cancelled {
        statement_id: statement.handle().to_string(),
    }
}

fn timed_out(statement: &AsyncStatement) -> WarehouseError {
    WarehouseError::WaitTimeout {
        statement_id: statement.handle().to_string(),
        attempts: statement.poll_count(),
    }
}
