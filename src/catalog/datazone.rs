//! Amazon DataZone catalog service
//!
//! Maps the DataZone API onto [`CatalogService`]. Requests are signed by the
//! SDK with the credentials of the shared [`SdkConfig`]; responses are
//! converted into the catalog wire models so the traversal stays vendor
//! neutral.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_datazone::Client;
use aws_sdk_datazone::error::DisplayErrorContext;
use aws_sdk_datazone::primitives::DateTime as SdkDateTime;
use aws_sdk_datazone::types::{
    AssetScope as SdkAssetScope, SubscribedListing as SdkListing,
    SubscribedListingItem as SdkListingItem, SubscribedPrincipal as SdkPrincipal,
    SubscriptionStatus, UserProfileDetails as SdkProfileDetails,
};
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use super::models::{
    AssetDetail, AssetFilterDetail, AssetListing, AssetScope, IamUserProfile, Page,
    PrincipalProject, ProjectSummary, SsoUserProfile, SubscribedListing, SubscribedListingItem,
    SubscribedPrincipal, SubscriptionDetail, SubscriptionRequestDetail, SubscriptionSummary,
    UserProfile, UserProfileDetails,
};
use super::{CatalogError, CatalogResult, CatalogService};

/// [`CatalogService`] backed by the DataZone API
#[derive(Clone)]
pub struct DataZoneCatalog {
    client: Client,
}

impl DataZoneCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from a shared SDK configuration
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn upstream<E>(operation: &'static str, err: E) -> CatalogError
where
    E: std::error::Error,
{
    CatalogError::upstream(operation, DisplayErrorContext(&err).to_string())
}

/// Text member, whether the SDK models it as required or optional
fn text<'a>(value: impl Into<Option<&'a str>>) -> Option<&'a str> {
    value.into().filter(|v| !v.is_empty())
}

/// Structure member, whether the SDK models it as required or optional
fn member<'a, T>(value: impl Into<Option<&'a T>>) -> Option<&'a T> {
    value.into()
}

fn owned<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    text(value).map(str::to_string)
}

fn timestamp<'a>(value: impl Into<Option<&'a SdkDateTime>>) -> Option<DateTime<Utc>> {
    let value = value.into()?;
    Utc.timestamp_opt(value.secs(), value.subsec_nanos()).single()
}

fn status<'a>(value: impl Into<Option<&'a SubscriptionStatus>>) -> Option<String> {
    value.into().map(|s| s.as_str().to_string())
}

fn listing(listing: &SdkListing) -> SubscribedListing {
    let asset_listing = member::<SdkListingItem>(listing.item())
        .and_then(|item| item.as_asset_listing().ok())
        .map(|asset| AssetListing {
            entity_id: owned(asset.entity_id()),
            asset_scope: member::<SdkAssetScope>(asset.asset_scope()).map(|scope| AssetScope {
                asset_id: owned(scope.asset_id()),
                filter_ids: scope.filter_ids().to_vec(),
            }),
        });

    SubscribedListing {
        id: owned(listing.id()),
        name: owned(listing.name()),
        item: Some(SubscribedListingItem { asset_listing }),
    }
}

fn principal(principal: &SdkPrincipal) -> SubscribedPrincipal {
    SubscribedPrincipal {
        project: principal.as_project().ok().map(|project| PrincipalProject {
            id: owned(project.id()),
            name: owned(project.name()),
        }),
    }
}

fn profile_details(details: &SdkProfileDetails) -> UserProfileDetails {
    UserProfileDetails {
        iam: details.as_iam().ok().map(|iam| IamUserProfile {
            arn: owned(iam.arn()),
        }),
        sso: details.as_sso().ok().map(|sso| SsoUserProfile {
            username: owned(sso.username()),
        }),
    }
}

#[async_trait]
impl CatalogService for DataZoneCatalog {
    async fn list_projects(
        &self,
        domain_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<ProjectSummary>> {
        let output = self
            .client
            .list_projects()
            .domain_identifier(domain_id)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| upstream("ListProjects", e))?;

        let items = output
            .items()
            .iter()
            .map(|project| ProjectSummary {
                id: owned(project.id()).unwrap_or_default(),
                name: owned(project.name()).unwrap_or_default(),
            })
            .collect();

        Ok(Page {
            items,
            next_token: owned(output.next_token()),
        })
    }

    async fn list_subscriptions(
        &self,
        domain_id: &str,
        approver_project_id: &str,
        next_token: Option<&str>,
    ) -> CatalogResult<Page<SubscriptionSummary>> {
        let output = self
            .client
            .list_subscriptions()
            .domain_identifier(domain_id)
            .approver_project_id(approver_project_id)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| upstream("ListSubscriptions", e))?;

        let items = output
            .items()
            .iter()
            .map(|subscription| SubscriptionSummary {
                id: owned(subscription.id()).unwrap_or_default(),
                status: status(subscription.status()),
            })
            .collect();

        debug!(domain_id, approver_project_id, "Listed subscription page");
        Ok(Page {
            items,
            next_token: owned(output.next_token()),
        })
    }

    async fn get_subscription(
        &self,
        domain_id: &str,
        subscription_id: &str,
    ) -> CatalogResult<SubscriptionDetail> {
        let output = self
            .client
            .get_subscription()
            .domain_identifier(domain_id)
            .identifier(subscription_id)
            .send()
            .await
            .map_err(|e| upstream("GetSubscription", e))?;

        Ok(SubscriptionDetail {
            id: owned(output.id()).unwrap_or_else(|| subscription_id.to_string()),
            status: status(output.status()).unwrap_or_default(),
            subscription_request_id: owned(output.subscription_request_id()),
            created_at: timestamp(output.created_at()),
            updated_at: timestamp(output.updated_at()),
            created_by: owned(output.created_by()),
            updated_by: owned(output.updated_by()),
            subscribed_listing: member::<SdkListing>(output.subscribed_listing()).map(listing),
            subscribed_principal: member::<SdkPrincipal>(output.subscribed_principal())
                .map(principal),
        })
    }

    async fn get_asset(&self, domain_id: &str, asset_id: &str) -> CatalogResult<AssetDetail> {
        let output = self
            .client
            .get_asset()
            .domain_identifier(domain_id)
            .identifier(asset_id)
            .send()
            .await
            .map_err(|e| upstream("GetAsset", e))?;

        Ok(AssetDetail {
            id: owned(output.id()).unwrap_or_else(|| asset_id.to_string()),
            name: owned(output.name()),
            external_identifier: owned(output.external_identifier()),
        })
    }

    async fn get_asset_filter(
        &self,
        domain_id: &str,
        asset_id: &str,
        filter_id: &str,
    ) -> CatalogResult<AssetFilterDetail> {
        let output = self
            .client
            .get_asset_filter()
            .domain_identifier(domain_id)
            .asset_identifier(asset_id)
            .identifier(filter_id)
            .send()
            .await
            .map_err(|e| upstream("GetAssetFilter", e))?;

        let columns = output.effective_column_names();
        Ok(AssetFilterDetail {
            id: owned(output.id()).unwrap_or_else(|| filter_id.to_string()),
            name: owned(output.name()).unwrap_or_default(),
            effective_column_names: (!columns.is_empty()).then(|| columns.to_vec()),
            effective_row_filter: owned(output.effective_row_filter()),
        })
    }

    async fn get_subscription_request(
        &self,
        domain_id: &str,
        request_id: &str,
    ) -> CatalogResult<SubscriptionRequestDetail> {
        let output = self
            .client
            .get_subscription_request_details()
            .domain_identifier(domain_id)
            .identifier(request_id)
            .send()
            .await
            .map_err(|e| upstream("GetSubscriptionRequestDetails", e))?;

        let created_by = owned(output.created_by()).ok_or_else(|| {
            CatalogError::malformed(
                "GetSubscriptionRequestDetails",
                format!("subscription request {} has no creator", request_id),
            )
        })?;

        Ok(SubscriptionRequestDetail {
            id: owned(output.id()).unwrap_or_else(|| request_id.to_string()),
            created_by,
        })
    }

    async fn get_user_profile(
        &self,
        domain_id: &str,
        user_id: &str,
    ) -> CatalogResult<UserProfile> {
        let output = self
            .client
            .get_user_profile()
            .domain_identifier(domain_id)
            .user_identifier(user_id)
            .send()
            .await
            .map_err(|e| upstream("GetUserProfile", e))?;

        Ok(UserProfile {
            id: owned(output.id()).unwrap_or_else(|| user_id.to_string()),
            details: member::<SdkProfileDetails>(output.details()).map(profile_details),
        })
    }
}
