//! HTTP catalog client
//!
//! Talks to the catalog's REST interface with JSON bodies. Requests carry a
//! bearer token when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{
    AssetDetail, AssetFilterDetail, Page, ProjectSummary, SubscriptionDetail,
    SubscriptionRequestDetail, SubscriptionSummary, UserProfile,
};
use super::{CatalogError, CatalogResult, CatalogService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`CatalogService`] over HTTP
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalogClient {
    /// Create a client for `base_url`, e.g. `https://catalog.eu-west-1.example.com`
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CatalogError::upstream("HttpClient", e))?;

        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a URL under the domain from raw path segments
    fn domain_url(&self, domain_id: &str, segments: &[&str]) -> String {
        let mut url = format!(
            "{}/v2/domains/{}",
            self.base_url,
            urlencoding::encode(domain_id)
        );
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> CatalogResult<T> {
        debug!(operation, url, "Catalog request");

        let mut req = self.client.get(url).query(query);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| CatalogError::upstream(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::upstream(
                operation,
                format!("API error ({}): {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::malformed(operation, e.to_string()))
    }
}

fn with_token<'a>(
    mut query: Vec<(&'a str, &'a str)>,
    next_token: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    if let Some(token) = next_token {
        query.push(("nextToken", token));
    }
    query
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn list_projects(
        &self,
        domain_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<ProjectSummary>> {
        let url = self.domain_url(domain_id, &["projects"]);
        self.get_json("ListProjects", &url, &with_token(Vec::new(), next_token))
            .await
    }

    async fn list_subscriptions(
        &self,
        domain_id: &str,
        approver_project_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<SubscriptionSummary>> {
        let url = self.domain_url(domain_id, &["subscriptions"]);
        let query = with_token(vec![("approverProjectId", approver_project_id)], next_token);
        self.get_json("ListSubscriptions", &url, &query).await
    }

    async fn get_subscription(
        &self,
        domain_id: &str,
        subscription_id: &str,
    ) -> CatalogResult<SubscriptionDetail> {
        let url = self.domain_url(domain_id, &["subscriptions", subscription_id]);
        self.get_json("GetSubscription", &url, &[]).await
    }

    async fn get_asset(&self, domain_id: &str, asset_id: &str) -> CatalogResult<AssetDetail> {
        let url = self.domain_url(domain_id, &["assets", asset_id]);
        self.get_json("GetAsset", &url, &[]).await
    }

    async fn get_asset_filter(
        &self,
        domain_id: &str,
        asset_id: &str,
        filter_id: &str,
    ) -> CatalogResult<AssetFilterDetail> {
        let url = self.domain_url(domain_id, &["assets", asset_id, "filters", filter_id]);
        self.get_json("GetAssetFilter", &url, &[]).await
    }

    async fn get_subscription_request(
        &self,
        domain_id: &str,
        request_id: &str,
    ) -> CatalogResult<SubscriptionRequestDetail> {
        let url = self.domain_url(domain_id, &["subscription-requests", request_id]);
        self.get_json("GetSubscriptionRequestDetails", &url, &[])
            .await
    }

    async fn get_user_profile(
        &self,
        domain_id: &str,
        user_id: &str,
    ) -> CatalogResult<UserProfile> {
        let url = self.domain_url(domain_id, &["users", user_id]);
        self.get_json("GetUserProfile", &url, &[]).await
    }
}
