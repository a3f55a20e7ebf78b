//! Application state.

use std::sync::Arc;

use massclip_firestore::{
    BundleRepository, FirestoreClient, FreeContentRepository, SharedStore, UploadRepository,
    UploadSessionRepository, UserRepository,
};
use massclip_storage::{R2Client, SharedObjectStore};
use massclip_stripe::{SharedGateway, StripeClient};

use crate::auth::{FirebaseVerifier, SharedVerifier};
use crate::config::{ApiConfig, WebhookSettings};
use crate::services::status_cache::{spawn_failure_logger, DEFAULT_CAPACITY};
use crate::services::{
    BundleService, FreeContentService, PayoutService, ProfileService, PurchaseService,
    StatusCacheWriter, UploadService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: SharedStore,
    pub objects: SharedObjectStore,
    pub gateway: SharedGateway,
    pub verifier: SharedVerifier,
    pub webhook: WebhookSettings,
    pub uploads: UploadService,
    pub bundles: BundleService,
    pub purchases: PurchaseService,
    pub payouts: PayoutService,
    pub free_content: FreeContentService,
    pub profile: ProfileService,
}

impl AppState {
    /// Create application state from environment-configured clients.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let firestore = FirestoreClient::from_env().await?;
        let storage = R2Client::from_env().await?;
        let stripe = StripeClient::from_env()?;
        let verifier = FirebaseVerifier::from_env().await?;

        let webhook = WebhookSettings::from(stripe.config());

        Ok(Self::from_parts(
            config,
            Arc::new(firestore),
            Arc::new(storage),
            Arc::new(stripe),
            Arc::new(verifier),
            webhook,
        ))
    }

    /// Assemble state from already-built backends.
    ///
    /// Spawns the status cache writer, so this must run inside a tokio runtime.
    pub fn from_parts(
        config: ApiConfig,
        store: SharedStore,
        objects: SharedObjectStore,
        gateway: SharedGateway,
        verifier: SharedVerifier,
        webhook: WebhookSettings,
    ) -> Self {
        let users = UserRepository::new(store.clone());
        let uploads = UploadRepository::new(store.clone());

        let (cache_writer, failures) = StatusCacheWriter::spawn(users.clone(), DEFAULT_CAPACITY);
        spawn_failure_logger(failures);

        Self {
            uploads: UploadService::new(
                uploads.clone(),
                UploadSessionRepository::new(store.clone()),
                objects.clone(),
            ),
            bundles: BundleService::new(
                BundleRepository::new(store.clone()),
                uploads.clone(),
                users.clone(),
                gateway.clone(),
                &config,
            ),
            purchases: PurchaseService::new(
                store.clone(),
                gateway.clone(),
                config.allow_unverified_access_grants,
            ),
            payouts: PayoutService::new(
                users.clone(),
                gateway.clone(),
                cache_writer,
                config.status_cache_ttl,
                config.app_base_url.clone(),
            ),
            free_content: FreeContentService::new(
                FreeContentRepository::new(store.clone()),
                uploads,
            ),
            profile: ProfileService::new(users, objects.clone()),
            config,
            store,
            objects,
            gateway,
            verifier,
            webhook,
        }
    }
}
