//! Business logic services.

pub mod bundles;
pub mod free_content;
pub mod payouts;
pub mod profile;
pub mod purchases;
pub mod status_cache;
pub mod uploads;

pub use bundles::BundleService;
pub use free_content::FreeContentService;
pub use payouts::PayoutService;
pub use profile::ProfileService;
pub use purchases::PurchaseService;
pub use status_cache::StatusCacheWriter;
pub use uploads::UploadService;
