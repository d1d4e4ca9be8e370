//! Table refresh protocol tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use catalog_subscription_sync::blob::BlobLocation;
use catalog_subscription_sync::warehouse::{
    RefreshPlan, RefreshStep, StatementExecutor, StatementWaiter, TableRefresher, TableState,
    WaitPolicy,
};
use common::{FakeWarehouse, target};
use tokio_util::sync::CancellationToken;

const SOURCE_URI: &str = "s3://extracts/datazone/subscriptions.csv";
const EXTRACT: &str = "header\nrow-1\nrow-2\n";

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

fn refresher(warehouse: &Arc<FakeWarehouse>) -> TableRefresher {
    TableRefresher::new(
        StatementExecutor::new(warehouse.clone(), target()),
        StatementWaiter::new(warehouse.clone(), WaitPolicy::every(Duration::from_millis(1))),
    )
}

#[tokio::test]
async fn test_existing_table_is_truncated_then_loaded() {
    let warehouse = Arc::new(
        FakeWarehouse::default()
            .with_running_polls(2)
            .with_table("governance.subscriptions", &["stale"])
            .with_blob(SOURCE_URI, EXTRACT),
    );

    let report = refresher(&warehouse)
        .refresh(&plan(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.table_existed);
    assert!(report.truncated);
    assert_eq!(report.table, "governance.subscriptions");
    assert_eq!(report.statements.len(), 3);
    assert_eq!(
        warehouse.rows("governance.subscriptions").unwrap(),
        vec!["row-1", "row-2"]
    );
}

#[tokio::test]
async fn test_mixed_case_names_refresh_the_folded_table() {
    let warehouse = Arc::new(
        FakeWarehouse::default()
            .with_table("governance.subscriptions", &["stale"])
            .with_blob(SOURCE_URI, EXTRACT),
    );
    let plan = RefreshPlan::new(
        "dev",
        "Governance",
        "Subscriptions",
        BlobLocation::new("extracts", "datazone/subscriptions.csv"),
        "arn:aws:iam::123456789012:role/redshift-copy",
    )
    .unwrap();
    let refresher = refresher(&warehouse);
    let cancel = CancellationToken::new();

    let report = refresher.refresh(&plan, &cancel).await.unwrap();
    assert!(report.table_existed);
    assert!(report.truncated);
    assert_eq!(report.table, "governance.subscriptions");

    refresher.refresh(&plan, &cancel).await.unwrap();
    assert_eq!(
        warehouse.rows("governance.subscriptions").unwrap(),
        vec!["row-1", "row-2"]
    );
}

#[tokio::test]
async fn test_missing_table_skips_truncate() {
    let warehouse = Arc::new(FakeWarehouse::default().with_blob(SOURCE_URI, EXTRACT));

    let report = refresher(&warehouse)
        .refresh(&plan(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.table_existed);
    assert!(!report.truncated);
    assert_eq!(report.statements.len(), 2);
    assert_eq!(warehouse.statements_starting_with("TRUNCATE"), 0);
    assert_eq!(warehouse.statements_starting_with("COPY"), 1);
    assert_eq!(warehouse.rows("governance.subscriptions").unwrap().len(), 2);
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let warehouse = Arc::new(FakeWarehouse::default().with_blob(SOURCE_URI, EXTRACT));
    let refresher = refresher(&warehouse);
    let cancel = CancellationToken::new();

    refresher.refresh(&plan(), &cancel).await.unwrap();
    let first = warehouse.rows("governance.subscriptions").unwrap();

    let report = refresher.refresh(&plan(), &cancel).await.unwrap();
    let second = warehouse.rows("governance.subscriptions").unwrap();

    assert!(report.truncated);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failed_load_leaves_table_emptied() {
    let warehouse = Arc::new(
        FakeWarehouse::default()
            .with_table("governance.subscriptions", &["stale"])
            .failing_on("COPY", "syntax error"),
    );

    let err = refresher(&warehouse)
        .refresh(&plan(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, RefreshStep::Load);
    assert!(err.truncated);
    assert_eq!(err.table_state(), TableState::Emptied);
    assert_eq!(err.source.reason(), Some("syntax error"));
    assert!(warehouse.rows("governance.subscriptions").unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_truncate_leaves_table_unchanged() {
    let warehouse = Arc::new(
        FakeWarehouse::default()
            .with_table("governance.subscriptions", &["kept"])
            .with_blob(SOURCE_URI, EXTRACT)
            .failing_on("TRUNCATE", "permission denied"),
    );

    let err = refresher(&warehouse)
        .refresh(&plan(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, RefreshStep::Truncate);
    assert_eq!(err.table_state(), TableState::Unchanged);
    assert_eq!(warehouse.statements_starting_with("COPY"), 0);
    assert_eq!(
        warehouse.rows("governance.subscriptions").unwrap(),
        vec!["kept"]
    );
}

#[tokio::test]
async fn test_failed_existence_check() {
    let warehouse = Arc::new(FakeWarehouse::default().failing_on("SELECT", "syntax error"));

    let err = refresher(&warehouse)
        .refresh(&plan(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, RefreshStep::ExistenceCheck);
    assert_eq!(err.table_state(), TableState::Unchanged);
    assert_eq!(warehouse.statements_starting_with("TRUNCATE"), 0);
}

#[tokio::test]
async fn test_missing_source_fails_the_load() {
    let warehouse = Arc::new(FakeWarehouse::default());

    let err = refresher(&warehouse)
        .refresh(&plan(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, RefreshStep::Load);
    assert!(!err.truncated);
    assert_eq!(err.table_state(), TableState::Unchanged);
}
