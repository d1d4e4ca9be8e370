//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use catalog_subscription_sync::catalog::models::{
    AssetDetail, AssetFilterDetail, Page, ProjectSummary, SubscriptionDetail,
    SubscriptionRequestDetail, SubscriptionSummary, UserProfile,
};
use catalog_subscription_sync::catalog::{CatalogError, CatalogResult, CatalogService};
use catalog_subscription_sync::warehouse::{
    ExecutionTarget, ResultSet, StatementHandle, StatementService, StatementStatus,
    StatusResponse, WarehouseError, WarehouseResult,
};
use serde_json::{Value, json};

/// Catalog backed by maps of raw JSON documents
#[derive(Default)]
pub struct FakeCatalog {
    pub project_pages: Vec<Vec<ProjectSummary>>,
    pub subscription_pages: HashMap<String, Vec<Vec<SubscriptionSummary>>>,
    pub subscriptions: HashMap<String, Value>,
    pub assets: HashMap<String, Value>,
    pub filters: HashMap<String, Value>,
    pub requests: HashMap<String, Value>,
    pub profiles: HashMap<String, Value>,
    pub calls: Mutex<Vec<String>>,
}

fn page<T: Clone>(pages: &[Vec<T>], next_token: Option<&str>) -> Page<T> {
    let index = next_token
        .and_then(|t| t.strip_prefix("page-"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    let items = pages.get(index).cloned().unwrap_or_default();
    let next_token = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
    Page { items, next_token }
}

fn lookup<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    map: &HashMap<String, Value>,
    id: &str,
) -> CatalogResult<T> {
    let value = map
        .get(id)
        .ok_or_else(|| CatalogError::upstream(operation, format!("ResourceNotFound: {}", id)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| CatalogError::malformed(operation, e.to_string()))
}

impl FakeCatalog {
    pub fn project(mut self, id: &str, name: &str) -> Self {
        let summary = ProjectSummary {
            id: id.to_string(),
            name: name.to_string(),
        };
        match self.project_pages.last_mut() {
            Some(last) => last.push(summary),
            None => self.project_pages.push(vec![summary]),
        }
        self
    }

    /// Start a new page of projects
    pub fn project_page(mut self) -> Self {
        self.project_pages.push(Vec::new());
        self
    }

    /// Register one page of subscriptions approved by `project_id`
    pub fn subscription_page(mut self, project_id: &str, ids: &[&str]) -> Self {
        self.subscription_pages
            .entry(project_id.to_string())
            .or_default()
            .push(
                ids.iter()
                    .map(|id| SubscriptionSummary {
                        id: id.to_string(),
                        status: None,
                    })
                    .collect(),
            );
        self
    }

    pub fn subscription(mut self, detail: Value) -> Self {
        let id = detail["id"].as_str().unwrap_or_default().to_string();
        self.subscriptions.insert(id, detail);
        self
    }

    pub fn asset(mut self, id: &str, external_identifier: &str) -> Self {
        self.assets.insert(
            id.to_string(),
            json!({"id": id, "externalIdentifier": external_identifier}),
        );
        self
    }

    pub fn filter(mut self, detail: Value) -> Self {
        let id = detail["id"].as_str().unwrap_or_default().to_string();
        self.filters.insert(id, detail);
        self
    }

    pub fn request(mut self, id: &str, created_by: &str) -> Self {
        self.requests
            .insert(id.to_string(), json!({"id": id, "createdBy": created_by}));
        self
    }

    pub fn iam_user(mut self, id: &str, arn: &str) -> Self {
        self.profiles
            .insert(id.to_string(), json!({"id": id, "details": {"iam": {"arn": arn}}}));
        self
    }

    pub fn bare_user(mut self, id: &str) -> Self {
        self.profiles.insert(id.to_string(), json!({"id": id}));
        self
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn list_projects(
        &self,
        _domain_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<ProjectSummary>> {
        self.record("ListProjects");
        Ok(page(&self.project_pages, next_token))
    }

    async fn list_subscriptions(
        &self,
        _domain_id: &str,
        approver_project_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<SubscriptionSummary>> {
        self.record("ListSubscriptions");
        let pages = self
            .subscription_pages
            .get(approver_project_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(page(pages, next_token))
    }

    async fn get_subscription(
        &self,
        _domain_id: &str,
        subscription_id: &str,
    ) -> CatalogResult<SubscriptionDetail> {
        self.record("GetSubscription");
        lookup("GetSubscription", &self.subscriptions, subscription_id)
    }

    async fn get_asset(&self, _domain_id: &str, asset_id: &str) -> CatalogResult<AssetDetail> {
        self.record("GetAsset");
        lookup("GetAsset", &self.assets, asset_id)
    }

    async fn get_asset_filter(
        &self,
        _domain_id: &str,
        _asset_id: &str,
        filter_id: &str,
    ) -> CatalogResult<AssetFilterDetail> {
        self.record("GetAssetFilter");
        lookup("GetAssetFilter", &self.filters, filter_id)
    }

    async fn get_subscription_request(
        &self,
        _domain_id: &str,
        request_id: &str,
    ) -> CatalogResult<SubscriptionRequestDetail> {
        self.record("GetSubscriptionRequest");
        lookup("GetSubscriptionRequest", &self.requests, request_id)
    }

    async fn get_user_profile(
        &self,
        _domain_id: &str,
        user_id: &str,
    ) -> CatalogResult<UserProfile> {
        self.record("GetUserProfile");
        lookup("GetUserProfile", &self.profiles, user_id)
    }
}

/// The `sales` / `p-1` / `s-1` / `a-1` catalog without any access scope
pub fn sales_catalog() -> FakeCatalog {
    FakeCatalog::default()
        .project("p-0", "marketing")
        .project("p-1", "sales")
        .subscription_page("p-1", &["s-1"])
        .subscription(json!({
            "id": "s-1",
            "status": "APPROVED",
            "subscriptionRequestId": "r-1",
            "createdAt": "2024-01-01T10:00:00Z",
            "updatedAt": "2024-01-02T08:30:00Z",
            "updatedBy": "u-approver",
            "subscribedListing": {
                "name": "Orders",
                "item": {"assetListing": {"entityId": "a-1"}}
            },
            "subscribedPrincipal": {"project": {"id": "p-9", "name": "analytics"}}
        }))
        .asset("a-1", "sales.orders")
        .request("r-1", "u-requester")
        .iam_user("u-requester", "arn:aws:iam::123456789012:user/alice")
        .iam_user("u-approver", "arn:aws:iam::123456789012:user/bob")
}

/// Statement service replaying scripted status sequences
///
/// Each submitted statement takes the next script; each poll pops the next
/// response from it. An exhausted script keeps reporting RUNNING.
#[derive(Default)]
pub struct ScriptedStatements {
    scripts: Mutex<VecDeque<VecDeque<StatusResponse>>>,
    active: Mutex<HashMap<String, VecDeque<StatusResponse>>>,
    pub submitted: Mutex<Vec<String>>,
    pub polls: Mutex<u32>,
    pub reject_with: Option<String>,
}

impl ScriptedStatements {
    pub fn with_script(self, script: Vec<StatusResponse>) -> Self {
        self.scripts.lock().unwrap().push_back(script.into());
        self
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_with = Some(message.to_string());
        self
    }

    pub fn poll_count(&self) -> u32 {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl StatementService for ScriptedStatements {
    async fn submit(
        &self,
        sql: &str,
        _target: &ExecutionTarget,
    ) -> WarehouseResult<StatementHandle> {
        if let Some(message) = &self.reject_with {
            return Err(WarehouseError::Submission(message.clone()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(sql.to_string());
        let id = format!("stmt-{}", submitted.len());
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        self.active.lock().unwrap().insert(id.clone(), script);
        Ok(StatementHandle::new(id))
    }

    async fn status(&self, handle: &StatementHandle) -> WarehouseResult<StatusResponse> {
        *self.polls.lock().unwrap() += 1;
        let mut active = self.active.lock().unwrap();
        let script = active
            .get_mut(handle.as_str())
            .ok_or_else(|| WarehouseError::Upstream(format!("unknown statement {}", handle)))?;
        Ok(script
            .pop_front()
            .unwrap_or_else(|| StatusResponse::pending(StatementStatus::Started)))
    }

    fn service_type(&self) -> &'static str {
        "scripted"
    }
}

/// Warehouse keeping tables and blobs in memory
///
/// Understands the three statements of a refresh. Every statement reports
/// RUNNING for `running_polls` polls before its terminal state. A COPY into a
/// missing table creates it. Unquoted names in TRUNCATE and COPY fold to lower
/// case, while the `information_schema` lookup compares literally.
#[derive(Default)]
pub struct FakeWarehouse {
    pub tables: Mutex<HashMap<String, Vec<String>>>,
    pub blobs: Mutex<HashMap<String, String>>,
    pub running_polls: u32,
    /// Statements starting with the prefix fail with the reason
    pub fail_on: Option<(String, String)>,
    statements: Mutex<HashMap<String, (u32, StatusResponse)>>,
    pub log: Mutex<Vec<String>>,
}

impl FakeWarehouse {
    pub fn with_table(self, name: &str, rows: &[&str]) -> Self {
        self.tables.lock().unwrap().insert(
            name.to_string(),
            rows.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn with_blob(self, uri: &str, content: &str) -> Self {
        self.blobs
            .lock()
            .unwrap()
            .insert(uri.to_string(), content.to_string());
        self
    }

    pub fn with_running_polls(mut self, polls: u32) -> Self {
        self.running_polls = polls;
        self
    }

    pub fn failing_on(mut self, prefix: &str, reason: &str) -> Self {
        self.fail_on = Some((prefix.to_string(), reason.to_string()));
        self
    }

    pub fn rows(&self, table: &str) -> Option<Vec<String>> {
        self.tables.lock().unwrap().get(table).cloned()
    }

    pub fn statements_starting_with(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    fn execute(&self, sql: &str) -> StatusResponse {
        if let Some((prefix, reason)) = &self.fail_on
            && sql.starts_with(prefix.as_str())
        {
            return StatusResponse::failed(reason.clone());
        }

        let mut tables = self.tables.lock().unwrap();
        if sql.starts_with("SELECT EXISTS") {
            let schema = quoted_after(sql, "table_schema = '");
            let table = quoted_after(sql, "table_name = '");
            let name = format!("{}.{}", schema, table);
            return StatusResponse::finished(Some(ResultSet::single(json!(
                tables.contains_key(&name)
            ))));
        }
        if let Some(rest) = sql.strip_prefix("TRUNCATE TABLE ") {
            let name = rest.trim_end_matches(';').to_lowercase();
            return match tables.get_mut(&name) {
                Some(rows) => {
                    rows.clear();
                    StatusResponse::finished(None)
                }
                None => StatusResponse::failed(format!("relation \"{}\" does not exist", name)),
            };
        }
        if let Some(rest) = sql.strip_prefix("COPY ") {
            let name = rest
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_lowercase();
            let uri = quoted_after(sql, "FROM '");
            let Some(content) = self.blobs.lock().unwrap().get(&uri).cloned() else {
                return StatusResponse::failed(format!("S3 object {} not found", uri));
            };
            tables
                .entry(name)
                .or_default()
                .extend(content.lines().skip(1).map(str::to_string));
            return StatusResponse::finished(None);
        }
        StatusResponse::failed("syntax error")
    }
}

fn quoted_after(sql: &str, marker: &str) -> String {
    sql.split_once(marker)
        .and_then(|(_, rest)| rest.split_once('\''))
        .map(|(value, _)| value.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl StatementService for FakeWarehouse {
    async fn submit(
        &self,
        sql: &str,
        _target: &ExecutionTarget,
    ) -> WarehouseResult<StatementHandle> {
        let mut log = self.log.lock().unwrap();
        log.push(sql.to_string());
        let id = format!("stmt-{}", log.len());
        let outcome = self.execute(sql);
        self.statements
            .lock()
            .unwrap()
            .insert(id.clone(), (self.running_polls, outcome));
        Ok(StatementHandle::new(id))
    }

    async fn status(&self, handle: &StatementHandle) -> WarehouseResult<StatusResponse> {
        let mut statements = self.statements.lock().unwrap();
        let (remaining, outcome) = statements
            .get_mut(handle.as_str())
            .ok_or_else(|| WarehouseError::Upstream(format!("unknown statement {}", handle)))?;
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(StatusResponse::pending(StatementStatus::Started));
        }
        Ok(outcome.clone())
    }

    fn service_type(&self) -> &'static str {
        "in-memory"
    }
}

pub fn target() -> ExecutionTarget {
    ExecutionTarget {
        database: "dev".to_string(),
        cluster_identifier: "analytics".to_string(),
        secret_arn: "arn:aws:secretsmanager:eu-west-1:123456789012:secret:redshift".to_string(),
    }
}
