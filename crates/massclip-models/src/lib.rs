//! Shared data models for the MassClip backend.
//!
//! This crate provides Serde-serializable types for:
//! - Users, uploads and chunked upload sessions
//! - Bundles (product boxes) and their content aggregates
//! - Purchases and per-content access grants
//! - Free content projections
//! - Connected payout account status snapshots
//! - Processed webhook event markers

pub mod access;
pub mod bundle;
pub mod connect_status;
pub mod free_content;
pub mod purchase;
pub mod requirements;
pub mod upload;
pub mod upload_session;
pub mod user;
pub mod utils;
pub mod webhook_event;

// Re-export common types
pub use access::{AccessStatus, AccessType, UserAccess};
pub use bundle::{Bundle, ContentMetadata, PriceError, MAX_BUNDLE_PRICE, MIN_BUNDLE_PRICE};
pub use connect_status::{AccountRequirements, ConnectAccountState, ConnectStatusSnapshot};
pub use free_content::FreeContent;
pub use purchase::{Purchase, PurchaseKind, PurchaseSource, PurchaseStatus};
pub use requirements::{describe_all, describe_requirement, DescribedRequirement};
pub use upload::{Upload, UploadType};
pub use upload_session::{UploadSession, UploadSessionStatus};
pub use user::UserProfile;
pub use utils::{from_minor_units, new_id, to_minor_units};
pub use webhook_event::ProcessedEvent;
