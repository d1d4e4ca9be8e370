//! Redshift Data API statement service
//!
//! Maps the Data API onto [`StatementService`]: `ExecuteStatement` for
//! submission, `DescribeStatement` for status and `GetStatementResult` for the
//! rows of finished statements that have a result set.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_redshiftdata::Client;
use aws_sdk_redshiftdata::error::DisplayErrorContext;
use aws_sdk_redshiftdata::types::{Field, StatusString};

use super::{
    ExecutionTarget, ResultSet, StatementHandle, StatementService, StatementStatus,
    StatusResponse, WarehouseError, WarehouseResult,
};

/// Statement service backed by the Redshift Data API
#[derive(Clone)]
pub struct RedshiftDataService {
    client: Client,
}

impl RedshiftDataService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from a shared SDK configuration
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    async fn fetch_rows(&self, handle: &StatementHandle) -> WarehouseResult<ResultSet> {
        let output = self
            .client
            .get_statement_result()
            .id(handle.as_str())
            .send()
            .await
            .map_err(|e| WarehouseError::Upstream(DisplayErrorContext(&e).to_string()))?;

        let columns = output
            .column_metadata()
            .iter()
            .map(|c| c.name().unwrap_or_default().to_string())
            .collect();
        let rows = output
            .records()
            .iter()
            .map(|record| record.iter().map(field_to_json).collect())
            .collect();

        Ok(ResultSet::new(columns, rows))
    }
}

#[async_trait]
impl StatementService for RedshiftDataService {
    async fn submit(
        &self,
        sql: &str,
        target: &ExecutionTarget,
    ) -> WarehouseResult<StatementHandle> {
        let output = self
            .client
            .execute_statement()
            .cluster_identifier(&target.cluster_identifier)
            .database(&target.database)
            .secret_arn(&target.secret_arn)
            .sql(sql)
            .send()
            .await
            .map_err(|e| WarehouseError::Submission(DisplayErrorContext(&e).to_string()))?;

        output.id().map(StatementHandle::new).ok_or_else(|| {
            WarehouseError::Upstream("ExecuteStatement returned no statement id".to_string())
        })
    }

    async fn status(&self, handle: &StatementHandle) -> WarehouseResult<StatusResponse> {
        let output = self
            .client
            .describe_statement()
            .id(handle.as_str())
            .send()
            .await
            .map_err(|e| WarehouseError::Upstream(DisplayErrorContext(&e).to_string()))?;

        let status = match output.status() {
            Some(StatusString::Submitted) => StatementStatus::Submitted,
            Some(StatusString::Picked) => StatementStatus::Picked,
            Some(StatusString::Started) => StatementStatus::Started,
            Some(StatusString::Finished) => StatementStatus::Finished,
            Some(StatusString::Failed) => StatementStatus::Failed,
            Some(StatusString::Aborted) => StatementStatus::Aborted,
            other => {
                return Err(WarehouseError::Upstream(format!(
                    "Unrecognised status for statement {}: {:?}",
                    handle, other
                )));
            }
        };

        let rows = if status == StatementStatus::Finished && output.has_result_set() == Some(true)
        {
            Some(self.fetch_rows(handle).await?)
        } else {
            None
        };

        Ok(StatusResponse {
            status,
            rows,
            error: output.error().map(str::to_string),
        })
    }

    fn service_type(&self) -> &'static str {
        "redshift-data"
    }
}

fn field_to_json(field: &Field) -> serde_json::Value {
    match field {
        Field::BooleanValue(b) => serde_json::Value::Bool(*b),
        Field::LongValue(n) => serde_json::Value::Number((*n).into()),
        Field::DoubleValue(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Field::StringValue(s) => serde_json::Value::String(s.clone()),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_to_json() {
        assert_eq!(
            field_to_json(&Field::BooleanValue(true)),
            serde_json::Value::Bool(true)
        );
        assert_eq!(field_to_json(&Field::LongValue(7)), serde_json::json!(7));
        assert_eq!(
            field_to_json(&Field::StringValue("t".to_string())),
            serde_json::json!("t")
        );
        assert_eq!(field_to_json(&Field::IsNull(true)), serde_json::Value::Null);
    }
}
