//! Subscription traversal
//!
//! Walks approver project → subscriptions → asset → filters → identities.
//! The walk is pull-based: one page of subscription summaries is buffered and
//! each call to [`SubscriptionWalk::next`] resolves a single subscription.
//! Every catalog call is raced against the cancellation token, so a stalled
//! page fetch does not hold up shutdown.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::models::{SubscriptionDetail, SubscriptionSummary};
use super::{CatalogError, CatalogResult, CatalogService};
use crate::models::{AccessScope, FilterRef, SubscriptionNode};

/// Entry point for subscription walks over one catalog
#[derive(Clone)]
pub struct CatalogTraverser {
    service: Arc<dyn CatalogService>,
    cancel: CancellationToken,
}

impl CatalogTraverser {
    pub fn new(service: Arc<dyn CatalogService>) -> Self {
        Self {
            service,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop project resolution and every walk started here when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve a project display name to its identifier
    ///
    /// Pages through every project in the domain and stops at the first exact
    /// match.
    pub async fn resolve_project_id(
        &self,
        domain_id: &str,
        project_name: &str,
    ) -> CatalogResult<String> {
        let mut next_token: Option<String> = None;
        loop {
            let page = until_cancelled(
                &self.cancel,
                self.service.list_projects(domain_id, next_token.as_deref()),
            )
            .await?;

            if let Some(project) = page.items.iter().find(|p| p.name == project_name) {
                info!(project_id = %project.id, project_name, "Resolved approver project");
                return Ok(project.id.clone());
            }

            match page.continuation() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Err(CatalogError::ProjectNotFound {
            domain_id: domain_id.to_string(),
            project_name: project_name.to_string(),
        })
    }

    /// Start a fresh walk over the subscriptions approved by `project_name`
    pub async fn traverse(
        &self,
        domain_id: &str,
        project_name: &str,
    ) -> CatalogResult<SubscriptionWalk> {
        let project_id = self.resolve_project_id(domain_id, project_name).await?;
        Ok(SubscriptionWalk {
            service: Arc::clone(&self.service),
            domain_id: domain_id.to_string(),
            project_id,
            buffered: VecDeque::new(),
            next_token: None,
            exhausted: false,
            stopped: false,
            cancel: self.cancel.clone(),
        })
    }
}

/// Lazy sequence of [`SubscriptionNode`]s for one approver project
pub struct SubscriptionWalk {
    service: Arc<dyn CatalogService>,
    domain_id: String,
    project_id: String,
    buffered: VecDeque<SubscriptionSummary>,
    next_token: Option<String>,
    exhausted: bool,
    stopped: bool,
    cancel: CancellationToken,
}

impl SubscriptionWalk {
    /// Stop the walk when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Resolve the next subscription, or `None` once every page is consumed
    pub async fn next(&mut self) -> Option<CatalogResult<SubscriptionNode>> {
        loop {
            if self.stopped {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.stop();
                return Some(Err(CatalogError::Cancelled));
            }

            if let Some(summary) = self.buffered.pop_front() {
                let result = until_cancelled(
                    &self.cancel,
                    resolve_subscription(self.service.as_ref(), &self.domain_id, &summary.id),
                )
                .await;
                if matches!(result, Err(CatalogError::Cancelled)) {
                    self.stop();
                }
                return Some(result);
            }

            if self.exhausted {
                return None;
            }

            let fetched = until_cancelled(
                &self.cancel,
                self.service.list_subscriptions(
                    &self.domain_id,
                    &self.project_id,
                    self.next_token.as_deref(),
                ),
            )
            .await;
            let page = match fetched {
                Ok(page) => page,
                Err(CatalogError::Cancelled) => {
                    self.stop();
                    return Some(Err(CatalogError::Cancelled));
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            };

            debug!(count = page.items.len(), "Fetched subscription page");
            self.next_token = page.continuation().map(str::to_string);
            self.exhausted = self.next_token.is_none();
            self.buffered.extend(page.items);
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.buffered.clear();
    }

    /// Drain the walk, stopping at the first error
    pub async fn collect_all(mut self) -> CatalogResult<Vec<SubscriptionNode>> {
        let mut nodes = Vec::new();
        while let Some(node) = self.next().await {
            nodes.push(node?);
        }
        Ok(nodes)
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = CatalogResult<T>>,
) -> CatalogResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Cancelled),
        result = call => result,
    }
}

async fn resolve_subscription(
    service: &dyn CatalogService,
    domain_id: &str,
    subscription_id: &str,
) -> CatalogResult<SubscriptionNode> {
    info!(subscription_id, "Processing subscription");
    let detail = service.get_subscription(domain_id, subscription_id).await?;

    let listing = detail.asset_listing().ok_or_else(|| {
        CatalogError::malformed(
            "GetSubscription",
            format!("subscription {} has no asset listing", subscription_id),
        )
    })?;
    let asset_id = listing.entity_id.as_deref().ok_or_else(|| {
        CatalogError::malformed(
            "GetSubscription",
            format!("subscription {} has no asset entity id", subscription_id),
        )
    })?;

    let asset = service.get_asset(domain_id, asset_id).await?;

    let access = match &listing.asset_scope {
        None => AccessScope::FullAccess,
        Some(scope) => {
            let mut filters = Vec::with_capacity(scope.filter_ids.len());
            for filter_id in &scope.filter_ids {
                let filter = service
                    .get_asset_filter(domain_id, asset_id, filter_id)
                    .await?;
                filters.push(FilterRef {
                    name: filter.name,
                    effective_columns: filter.effective_column_names,
                    effective_row_expression: filter.effective_row_filter,
                });
            }
            AccessScope::Filtered(filters)
        }
    };

    let (created_by, updated_by) = resolve_identities(service, domain_id, &detail).await?;

    Ok(SubscriptionNode {
        asset_name: detail.listing_name().map(str::to_string),
        asset_external_id: asset.external_identifier,
        subscription_id: detail.id.clone(),
        subscriber_project_name: detail.subscriber_project_name().map(str::to_string),
        status: detail.status.clone(),
        request_id: detail.subscription_request_id.clone(),
        created_at: detail.created_at,
        created_by,
        updated_at: detail.updated_at,
        updated_by,
        access,
    })
}

/// Requester and last updater, each falling back to the raw user id
async fn resolve_identities(
    service: &dyn CatalogService,
    domain_id: &str,
    detail: &SubscriptionDetail,
) -> CatalogResult<(Option<String>, Option<String>)> {
    let created_by = match detail.subscription_request_id.as_deref() {
        Some(request_id) => {
            let request = service
                .get_subscription_request(domain_id, request_id)
                .await?;
            Some(resolve_identity(service, domain_id, &request.created_by).await?)
        }
        None => None,
    };

    let updated_by = match detail.updated_by.as_deref() {
        Some(user_id) => Some(resolve_identity(service, domain_id, user_id).await?),
        None => None,
    };

    Ok((created_by, updated_by))
}

async fn resolve_identity(
    service: &dyn CatalogService,
    domain_id: &str,
    user_id: &str,
) -> CatalogResult<String> {
    let profile = service.get_user_profile(domain_id, user_id).await?;
    Ok(profile
        .identity()
        .map(str::to_string)
        .unwrap_or_else(|| user_id.to_string()))
}
