//! Request handlers.

pub mod bundles;
pub mod free_content;
pub mod health;
pub mod payouts;
pub mod profile;
pub mod purchases;
pub mod uploads;

pub use health::*;

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_document_id;

/// Reject path ids that cannot be document ids.
pub(crate) fn require_id(id: &str, what: &str) -> ApiResult<()> {
    if is_valid_document_id(id) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Invalid {}", what)))
    }
}
