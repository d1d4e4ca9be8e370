//! Record flattening
//!
//! Projects one [`SubscriptionNode`] onto the fixed extract row. Filters fold
//! into three parallel lists aligned by index, so the i-th name, column list
//! and row expression always describe the same filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AccessScope, SubscriptionNode};

/// Filter name written for subscriptions without an access scope
pub const FULL_ACCESS: &str = "Full Access";

/// Textual form of every timestamp in the extract
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator between filters inside a list cell
pub const FILTER_SEPARATOR: &str = ";";

/// Separator between column names of one filter
pub const COLUMN_SEPARATOR: &str = ",";

/// One exported row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecord {
    pub asset_name: String,
    pub asset_system_name: String,
    pub subscription_id: String,
    pub subscriber_project: String,
    pub status: String,
    pub request_id: String,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
    pub filter_names: Vec<String>,
    /// One column list per filter; empty means every column
    pub filter_columns: Vec<Vec<String>>,
    /// One expression per filter; `None` means every row
    pub filter_row_expressions: Vec<Option<String>>,
}

impl FlatRecord {
    /// Number of filters carried by the record
    pub fn filter_cardinality(&self) -> usize {
        debug_assert_eq!(self.filter_names.len(), self.filter_columns.len());
        debug_assert_eq!(self.filter_names.len(), self.filter_row_expressions.len());
        self.filter_names.len()
    }

    /// Whether the record carries the full-access sentinel
    pub fn is_full_access(&self) -> bool {
        self.filter_names.len() == 1 && self.filter_names[0] == FULL_ACCESS
    }

    /// Cells in extract column order
    pub fn to_row(&self) -> Vec<String> {
        let columns = self
            .filter_columns
            .iter()
            .map(|cols| cols.join(COLUMN_SEPARATOR))
            .collect::<Vec<_>>()
            .join(FILTER_SEPARATOR);
        let rows = self
            .filter_row_expressions
            .iter()
            .map(|expr| expr.as_deref().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(FILTER_SEPARATOR);

        vec![
            self.asset_name.clone(),
            self.asset_system_name.clone(),
            self.subscription_id.clone(),
            self.subscriber_project.clone(),
            self.status.clone(),
            self.request_id.clone(),
            self.created_at.clone(),
            self.created_by.clone(),
            self.updated_at.clone(),
            self.updated_by.clone(),
            self.filter_names.join(FILTER_SEPARATOR),
            columns,
            rows,
        ]
    }
}

/// Format a timestamp for the extract; absent values become empty
pub fn format_timestamp(value: Option<&DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Flatten one traversed subscription
pub fn flatten(node: &SubscriptionNode) -> FlatRecord {
    let (filter_names, filter_columns, filter_row_expressions) = match &node.access {
        AccessScope::FullAccess => (vec![FULL_ACCESS.to_string()], vec![Vec::new()], vec![None]),
        AccessScope::Filtered(filters) => {
            let mut names = Vec::with_capacity(filters.len());
            let mut columns = Vec::with_capacity(filters.len());
            let mut rows = Vec::with_capacity(filters.len());
            for filter in filters {
                names.push(filter.name.clone());
                columns.push(filter.effective_columns.clone().unwrap_or_default());
                rows.push(filter.effective_row_expression.clone());
            }
            (names, columns, rows)
        }
    };

    FlatRecord {
        asset_name: node.asset_name.clone().unwrap_or_default(),
        asset_system_name: node.asset_external_id.clone().unwrap_or_default(),
        subscription_id: node.subscription_id.clone(),
        subscriber_project: node.subscriber_project_name.clone().unwrap_or_default(),
        status: node.status.clone(),
        request_id: node.request_id.clone().unwrap_or_default(),
        created_at: format_timestamp(node.created_at.as_ref()),
        created_by: node.created_by.clone().unwrap_or_default(),
        updated_at: format_timestamp(node.updated_at.as_ref()),
        updated_by: node.updated_by.clone().unwrap_or_default(),
        filter_names,
        filter_columns,
        filter_row_expressions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterRef;
    use chrono::TimeZone;

    fn node() -> SubscriptionNode {
        let mut node = SubscriptionNode::new("s-1");
        node.asset_name = Some("Orders".to_string());
        node.asset_external_id = Some("sales.orders".to_string());
        node.status = "APPROVED".to_string();
        node.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        node.created_by = Some("arn:aws:iam::1:user/alice".to_string());
        node
    }

    #[test]
    fn test_full_access_sentinel() {
        let record = flatten(&node());
        assert_eq!(record.filter_cardinality(), 1);
        assert!(record.is_full_access());

        let row = record.to_row();
        assert_eq!(row.len(), 13);
        assert_eq!(row[6], "2024-01-01 10:00:00");
        assert_eq!(row[8], "");
        assert_eq!(&row[10..], &["Full Access", "", ""]);
    }

    #[test]
    fn test_filters_stay_aligned() {
        let mut node = node();
        node.access = AccessScope::Filtered(vec![
            FilterRef::new("eu_rows").with_row_expression("region = 'eu'"),
            FilterRef::new("no_pii").with_columns(["id", "amount"]),
            FilterRef::new("both")
                .with_columns(["id"])
                .with_row_expression("amount > 0"),
        ]);

        let record = flatten(&node);
        assert_eq!(record.filter_cardinality(), 3);
        assert_eq!(record.filter_columns[0], Vec::<String>::new());
        assert_eq!(record.filter_row_expressions[1], None);

        let row = record.to_row();
        assert_eq!(row[10], "eu_rows;no_pii;both");
        assert_eq!(row[11], ";id,amount;id");
        assert_eq!(row[12], "region = 'eu';;amount > 0");
    }

    #[test]
    fn test_scope_without_filters_is_not_full_access() {
        let mut node = node();
        node.access = AccessScope::Filtered(Vec::new());

        let record = flatten(&node);
        assert_eq!(record.filter_cardinality(), 0);
        assert!(!record.is_full_access());
        assert_eq!(&record.to_row()[10..], &["", "", ""]);
    }

    #[test]
    fn test_missing_optionals_become_empty() {
        let record = flatten(&SubscriptionNode::new("s-9"));
        let row = record.to_row();
        assert_eq!(row[2], "s-9");
        assert!(row[..2].iter().all(String::is_empty));
        assert!(row[3..10].iter().all(String::is_empty));
    }
}
