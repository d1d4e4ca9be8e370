//! Catalog access and subscription traversal
//!
//! The catalog is the system of record for projects, data assets and the
//! subscriptions that grant projects access to assets. This module provides:
//! - [`CatalogService`]: paginated listings and point lookups
//! - [`CatalogTraverser`]: walks approver project → subscriptions → asset →
//!   filters → identities and yields one [`SubscriptionNode`] per subscription
//! - a DataZone adapter on the AWS SDK (`aws` feature)
//! - an HTTP client for a REST gateway in front of the catalog (`api-backend`
//!   feature)

use async_trait::async_trait;

#[cfg(feature = "aws")]
pub mod datazone;
#[cfg(feature = "api-backend")]
pub mod http;
pub mod models;
pub mod traverser;

#[cfg(feature = "aws")]
pub use datazone::DataZoneCatalog;
#[cfg(feature = "api-backend")]
pub use http::HttpCatalogClient;
pub use models::{
    AssetDetail, AssetFilterDetail, Page, ProjectSummary, SubscriptionDetail,
    SubscriptionRequestDetail, SubscriptionSummary, UserProfile,
};
pub use traverser::{CatalogTraverser, SubscriptionWalk};

/// Errors that can occur during catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No project in the domain carries the requested name
    #[error("Project '{project_name}' not found in domain {domain_id}")]
    ProjectNotFound {
        domain_id: String,
        project_name: String,
    },

    /// A catalog call failed
    #[error("Catalog call {operation} failed: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },

    /// A catalog response lacks a field the traversal cannot do without
    #[error("Malformed {operation} response: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },

    /// Traversal stopped by the caller
    #[error("Catalog traversal cancelled")]
    Cancelled,
}

impl CatalogError {
    pub fn upstream(operation: &'static str, message: impl ToString) -> Self {
        CatalogError::Upstream {
            operation,
            message: message.to_string(),
        }
    }

    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        CatalogError::MalformedResponse {
            operation,
            message: message.into(),
        }
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog listings and lookups used by the traversal
///
/// Listings return one page per call; `next_token` is `None` for the first
/// page.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// List projects in a domain
    async fn list_projects(
        &self,
        domain_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<ProjectSummary>>;

    /// List subscriptions approved by a project
    async fn list_subscriptions(
        &self,
        domain_id: &str,
        approver_project_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<SubscriptionSummary>>;

    async fn get_subscription(
        &self,
        domain_id: &str,
        subscription_id: &str,
    ) -> CatalogResult<SubscriptionDetail>;

    async fn get_asset(&self, domain_id: &str, asset_id: &str) -> CatalogResult<AssetDetail>;

    async fn get_asset_filter(
        &self,
        domain_id: &str,
        asset_id: &str,
        filter_id: &str,
    ) -> CatalogResult<AssetFilterDetail>;

    async fn get_subscription_request(
        &self,
        domain_id: &str,
        request_id: &str,
    ) -> CatalogResult<SubscriptionRequestDetail>;

    async fn get_user_profile(&self, domain_id: &str, user_id: &str)
    -> CatalogResult<UserProfile>;
}
