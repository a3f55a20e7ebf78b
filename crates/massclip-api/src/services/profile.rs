//! Profile picture uploads and public profile view counting.

use chrono::Utc;
use tracing::info;

use massclip_firestore::UserRepository;
use massclip_storage::keys::{image_extension, profile_pic_key};
use massclip_storage::SharedObjectStore;

use crate::error::{ApiError, ApiResult};

/// Largest accepted profile picture.
pub const MAX_PROFILE_PIC_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct ProfileService {
    users: UserRepository,
    objects: SharedObjectStore,
}

impl ProfileService {
    pub fn new(users: UserRepository, objects: SharedObjectStore) -> Self {
        Self { users, objects }
    }

    /// Store a new profile picture and point the user document at it.
    pub async fn upload_picture(
        &self,
        uid: &str,
        email: Option<&str>,
        content_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<String> {
        let ext = image_extension(content_type).ok_or_else(|| {
            ApiError::validation(
                "UNSUPPORTED_IMAGE_TYPE",
                format!("Unsupported image type '{}'", content_type),
            )
        })?;
        if data.is_empty() {
            return Err(ApiError::validation("EMPTY_IMAGE", "Image body is empty"));
        }
        if data.len() > MAX_PROFILE_PIC_BYTES {
            return Err(ApiError::validation(
                "IMAGE_TOO_LARGE",
                "Profile pictures are limited to 10 MB",
            ));
        }

        self.users.get_or_create(uid, email).await?;

        let key = profile_pic_key(uid, Utc::now().timestamp_millis(), ext);
        let mime = content_type.split(';').next().unwrap_or(content_type).trim();
        self.objects.put(&key, data, mime).await?;

        let url = self.objects.public_url(&key);
        self.users.set_profile_pic(uid, &url).await?;
        info!(uid = %uid, key = %key, "Updated profile picture");
        Ok(url)
    }

    /// Count one view of a public profile.
    pub async fn record_view(&self, uid: &str) -> ApiResult<()> {
        self.users
            .record_profile_view(uid, Utc::now().date_naive())
            .await?;
        Ok(())
    }
}
