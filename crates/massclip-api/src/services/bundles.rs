//! Bundle catalog: creation, edits, content membership and checkout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use massclip_firestore::{
    BundleRepository, BundleUpdate, UploadRepository, UserRepository, MAX_FULFILLMENT_GRANTS,
};
use massclip_models::{new_id, to_minor_units, Bundle, ContentMetadata, PriceError};
use massclip_stripe::{CheckoutSessionParams, SharedGateway};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::security::{sanitize_text, sanitize_title, validate_file_url};

const DEFAULT_CURRENCY: &str = "usd";

/// Metadata type marking a bundle checkout.
pub const PRODUCT_BOX_TYPE: &str = "product_box";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBundle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub custom_preview_thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub active: Option<bool>,
    pub custom_preview_thumbnail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleContent {
    pub content_count: u32,
    pub content_items: Vec<String>,
    pub content_metadata: ContentMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLink {
    pub session_id: String,
    pub url: Option<String>,
}

fn price_error(e: PriceError) -> ApiError {
    ApiError::validation("INVALID_PRICE", e.to_string())
}

fn validate_thumbnail(url: Option<String>) -> ApiResult<Option<String>> {
    match url.filter(|u| !u.trim().is_empty()) {
        Some(u) => validate_file_url(&u)
            .map(Some)
            .map_err(|e| ApiError::validation("INVALID_THUMBNAIL_URL", e)),
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct BundleService {
    bundles: BundleRepository,
    uploads: UploadRepository,
    users: UserRepository,
    gateway: SharedGateway,
    config: ApiConfig,
}

impl BundleService {
    pub fn new(
        bundles: BundleRepository,
        uploads: UploadRepository,
        users: UserRepository,
        gateway: SharedGateway,
        config: &ApiConfig,
    ) -> Self {
        Self {
            bundles,
            uploads,
            users,
            gateway,
            config: config.clone(),
        }
    }

    async fn connected_account(&self, uid: &str) -> ApiResult<Option<String>> {
        Ok(self.users.get(uid).await?.and_then(|u| u.stripe_account_id))
    }

    /// Provision a product and price on the creator's account.
    async fn provision_product(
        &self,
        account: &str,
        bundle: &Bundle,
    ) -> ApiResult<(String, String)> {
        let description = (!bundle.description.is_empty()).then_some(bundle.description.as_str());
        let product = self
            .gateway
            .create_product(&bundle.title, description, Some(account))
            .await?;
        let price = self
            .gateway
            .create_price(
                &product.id,
                to_minor_units(bundle.price),
                &bundle.currency,
                Some(account),
            )
            .await?;
        Ok((product.id, price.id))
    }

    pub async fn create(&self, creator_id: &str, request: NewBundle) -> ApiResult<Bundle> {
        let title = sanitize_title(&request.title);
        if title.is_empty() {
            return Err(ApiError::validation("MISSING_TITLE", "Title is required"));
        }
        Bundle::validate_price(request.price).map_err(price_error)?;
        let thumbnail = validate_thumbnail(request.custom_preview_thumbnail)?;

        let currency = request
            .currency
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| c.len() == 3)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let mut bundle = Bundle::new(
            new_id(),
            creator_id,
            title,
            request.description.as_deref().map(sanitize_text).unwrap_or_default(),
            request.price,
            currency,
        );
        bundle.custom_preview_thumbnail = thumbnail;

        if let Some(account) = self.connected_account(creator_id).await? {
            match self.provision_product(&account, &bundle).await {
                Ok((product_id, price_id)) => {
                    bundle.product_id = Some(product_id);
                    bundle.price_id = Some(price_id);
                }
                Err(e) => warn!(
                    bundle_id = %bundle.id,
                    account_id = %account,
                    error = %e,
                    "Failed to provision gateway product for bundle"
                ),
            }
        }

        self.bundles.create(&bundle).await?;
        info!(bundle_id = %bundle.id, creator_id = %creator_id, price = bundle.price, "Created bundle");
        Ok(bundle)
    }

    pub async fn list(&self, creator_id: &str) -> ApiResult<Vec<Bundle>> {
        Ok(self.bundles.list_by_creator(creator_id).await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Bundle> {
        self.bundles
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Bundle {} not found", id)))
    }

    async fn owned(&self, uid: &str, id: &str) -> ApiResult<Bundle> {
        let bundle = self.get(id).await?;
        if !bundle.is_owned_by(uid) {
            return Err(ApiError::forbidden("You do not own this bundle"));
        }
        Ok(bundle)
    }

    pub async fn update(&self, uid: &str, id: &str, changes: BundleChanges) -> ApiResult<Bundle> {
        let bundle = self.owned(uid, id).await?;

        let title = match changes.title {
            Some(t) => {
                let t = sanitize_title(&t);
                if t.is_empty() {
                    return Err(ApiError::validation("MISSING_TITLE", "Title cannot be empty"));
                }
                Some(t)
            }
            None => None,
        };
        if let Some(price) = changes.price {
            Bundle::validate_price(price).map_err(price_error)?;
        }

        let mut update = BundleUpdate {
            title,
            description: changes.description.as_deref().map(sanitize_text),
            price: changes.price,
            active: changes.active,
            custom_preview_thumbnail: validate_thumbnail(changes.custom_preview_thumbnail)?,
            price_id: None,
        };
        if update.is_empty() {
            return Ok(bundle);
        }

        let price_changed = changes.price.is_some_and(|p| p != bundle.price);
        if let (true, Some(product_id)) = (price_changed, bundle.product_id.as_deref()) {
            let account = self.connected_account(uid).await?;
            let new_price = changes.price.unwrap_or(bundle.price);
            let provisioned = self
                .gateway
                .create_price(
                    product_id,
                    to_minor_units(new_price),
                    &bundle.currency,
                    account.as_deref(),
                )
                .await;
            match provisioned {
                Ok(price) => update.price_id = Some(price.id),
                Err(e) => warn!(bundle_id = %id, error = %e, "Failed to provision new gateway price"),
            }
        }

        self.bundles.update(id, update).await?;
        info!(bundle_id = %id, "Updated bundle");
        self.get(id).await
    }

    /// Add uploads to a bundle. Each upload must exist and belong to the caller.
    pub async fn add_content(
        &self,
        uid: &str,
        id: &str,
        content_ids: Vec<String>,
    ) -> ApiResult<BundleContent> {
        let bundle = self.owned(uid, id).await?;
        if content_ids.is_empty() {
            return Err(ApiError::validation("MISSING_CONTENT_IDS", "contentIds is required"));
        }

        let mut added: Vec<String> = Vec::new();
        for content_id in content_ids {
            if !bundle.contains(&content_id) && !added.contains(&content_id) {
                added.push(content_id);
            }
        }
        // Every item becomes one access grant, and a purchase commits them together
        if bundle.content_items.len() + added.len() > MAX_FULFILLMENT_GRANTS {
            return Err(ApiError::validation(
                "BUNDLE_TOO_LARGE",
                format!("A bundle can hold at most {} items", MAX_FULFILLMENT_GRANTS),
            ));
        }

        let mut items = bundle.content_items.clone();
        for content_id in added {
            let upload = self
                .uploads
                .get(&content_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("Upload {} not found", content_id)))?;
            if upload.uid != uid {
                return Err(ApiError::forbidden(format!(
                    "Upload {} belongs to another user",
                    content_id
                )));
            }
            items.push(content_id);
        }

        self.store_content(id, items).await
    }

    pub async fn remove_content(
        &self,
        uid: &str,
        id: &str,
        content_id: &str,
    ) -> ApiResult<BundleContent> {
        let bundle = self.owned(uid, id).await?;
        if !bundle.contains(content_id) {
            return Err(ApiError::not_found("Content is not part of this bundle"));
        }
        let items = bundle
            .content_items
            .into_iter()
            .filter(|c| c != content_id)
            .collect();
        self.store_content(id, items).await
    }

    /// Recompute aggregates over the full list and persist both.
    async fn store_content(&self, id: &str, items: Vec<String>) -> ApiResult<BundleContent> {
        let uploads = self.uploads.get_many(&items).await?;
        let metadata = ContentMetadata::from_uploads(&uploads);
        self.bundles.set_content(id, &items, &metadata).await?;

        info!(bundle_id = %id, content_count = items.len(), "Updated bundle content");
        Ok(BundleContent {
            content_count: items.len() as u32,
            content_items: items,
            content_metadata: metadata,
        })
    }

    /// Open a checkout session for a buyer.
    pub async fn checkout(
        &self,
        buyer_uid: &str,
        email: Option<&str>,
        id: &str,
    ) -> ApiResult<CheckoutLink> {
        let bundle = self.get(id).await?;
        if !bundle.active {
            return Err(ApiError::validation("BUNDLE_INACTIVE", "This bundle is not for sale"));
        }
        let account = self.connected_account(&bundle.creator_id).await?.ok_or_else(|| {
            ApiError::validation(
                "CREATOR_NOT_CONNECTED",
                "The creator has not set up payouts yet",
            )
        })?;

        let unit_amount = to_minor_units(bundle.price);

        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), PRODUCT_BOX_TYPE.to_string());
        metadata.insert("productBoxId".to_string(), bundle.id.clone());
        metadata.insert("buyerUid".to_string(), buyer_uid.to_string());
        metadata.insert("creatorId".to_string(), bundle.creator_id.clone());

        let params = CheckoutSessionParams {
            product_name: bundle.title.clone(),
            product_description: (!bundle.description.is_empty()).then(|| bundle.description.clone()),
            unit_amount,
            currency: bundle.currency.clone(),
            success_url: format!(
                "{}/purchase/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.app_base_url
            ),
            cancel_url: format!("{}/product-box/{}", self.config.app_base_url, bundle.id),
            customer_email: email.map(str::to_string),
            client_reference_id: Some(buyer_uid.to_string()),
            metadata,
            destination_account: Some(account),
            application_fee_amount: self.config.platform_fee(unit_amount),
        };

        let session = self.gateway.create_checkout_session(&params).await?;
        info!(bundle_id = %bundle.id, buyer_uid = %buyer_uid, session_id = %session.id, "Created checkout session");
        Ok(CheckoutLink {
            session_id: session.id,
            url: session.url,
        })
    }
}
