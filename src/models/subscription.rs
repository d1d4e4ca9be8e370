//! Traversed subscription with its resolved access scope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column and row restriction applied to a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRef {
    pub name: String,
    /// `None` means every column is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_columns: Option<Vec<String>>,
    /// `None` means every row is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_row_expression: Option<String>,
}

impl FilterRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            effective_columns: None,
            effective_row_expression: None,
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.effective_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_row_expression(mut self, expression: impl Into<String>) -> Self {
        self.effective_row_expression = Some(expression.into());
        self
    }
}

/// Access granted by a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "filters", rename_all = "snake_case")]
pub enum AccessScope {
    /// The listing carries no access scope
    FullAccess,
    /// The listing carries an access scope with these filters, possibly none
    Filtered(Vec<FilterRef>),
}

impl AccessScope {
    pub fn is_full_access(&self) -> bool {
        matches!(self, AccessScope::FullAccess)
    }

    /// Resolved filters; empty for full access
    pub fn filters(&self) -> &[FilterRef] {
        match self {
            AccessScope::FullAccess => &[],
            AccessScope::Filtered(filters) => filters,
        }
    }
}

/// One subscription with everything the extract row needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionNode {
    pub asset_name: Option<String>,
    pub asset_external_id: Option<String>,
    pub subscription_id: String,
    pub subscriber_project_name: Option<String>,
    pub status: String,
    pub request_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Identity of the requester
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Identity of the last approver or rejecter
    pub updated_by: Option<String>,
    pub access: AccessScope,
}

impl SubscriptionNode {
    /// Node with only the subscription id set and full access
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            asset_name: None,
            asset_external_id: None,
            subscription_id: subscription_id.into(),
            subscriber_project_name: None,
            status: String::new(),
            request_id: None,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
            access: AccessScope::FullAccess,
        }
    }
}
