//! Firestore access for the MassClip backend.
//!
//! This crate provides:
//! - A REST client with token caching, retries and metrics
//! - The [`DocumentStore`] seam, implemented by the client and by an
//!   in-memory store for tests (feature `memory`)
//! - Typed repositories for users, uploads, bundles, purchases, access
//!   grants, upload sessions and free content
//! - [`FulfillmentWrites`], the atomic commit behind every purchase

pub mod access_repo;
pub mod bundle_repo;
pub mod client;
pub mod codec;
pub mod error;
pub mod free_content_repo;
pub mod fulfillment;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod metrics;
pub mod purchase_repo;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;
pub mod upload_repo;
pub mod upload_session_repo;
pub mod user_repo;

pub use access_repo::AccessRepository;
pub use bundle_repo::{BundleRepository, BundleUpdate};
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use free_content_repo::FreeContentRepository;
pub use fulfillment::{CommitOutcome, FulfillmentWrites, MAX_FULFILLMENT_GRANTS};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryStore;
pub use purchase_repo::PurchaseRepository;
pub use store::{DocumentStore, SharedStore};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value, Write};
pub use upload_repo::UploadRepository;
pub use upload_session_repo::UploadSessionRepository;
pub use user_repo::UserRepository;

/// Collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const UPLOADS: &str = "uploads";
    pub const BUNDLES: &str = "bundles";
    pub const PURCHASES: &str = "purchases";
    pub const USER_ACCESS: &str = "userAccess";
    pub const UPLOAD_SESSIONS: &str = "uploadSessions";
    pub const FREE_CONTENT: &str = "free_content";
    pub const WEBHOOK_EVENTS: &str = "webhookEvents";
    /// Subcollection under `users/{uid}`
    pub const DAILY_STATS: &str = "daily_stats";
}
