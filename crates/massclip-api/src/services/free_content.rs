//! Free content area: uploads a creator publishes without a price.

use serde::Serialize;
use tracing::info;

use massclip_firestore::{FreeContentRepository, UploadRepository};
use massclip_models::{new_id, FreeContent};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedFreeContent {
    pub already_exists: bool,
    pub item: FreeContent,
}

#[derive(Clone)]
pub struct FreeContentService {
    free_content: FreeContentRepository,
    uploads: UploadRepository,
}

impl FreeContentService {
    pub fn new(free_content: FreeContentRepository, uploads: UploadRepository) -> Self {
        Self {
            free_content,
            uploads,
        }
    }

    /// Copy one of the caller's uploads into the free area.
    ///
    /// An entry for the same upload (or the same file URL) is returned as is.
    pub async fn add(&self, uid: &str, upload_id: &str) -> ApiResult<AddedFreeContent> {
        let upload = self
            .uploads
            .get(upload_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Upload {} not found", upload_id)))?;
        if upload.uid != uid {
            return Err(ApiError::forbidden("Upload belongs to another user"));
        }

        if let Some(existing) = self
            .free_content
            .find_existing(uid, &upload.id, &upload.file_url)
            .await?
        {
            return Ok(AddedFreeContent {
                already_exists: true,
                item: existing,
            });
        }

        let item = FreeContent::from_upload(new_id(), &upload);
        self.free_content.create(&item).await?;
        info!(uid = %uid, upload_id = %upload.id, free_content_id = %item.id, "Added free content");
        Ok(AddedFreeContent {
            already_exists: false,
            item,
        })
    }

    pub async fn list(&self, uid: &str) -> ApiResult<Vec<FreeContent>> {
        Ok(self.free_content.list_by_user(uid).await?)
    }

    pub async fn delete(&self, uid: &str, id: &str) -> ApiResult<()> {
        let item = self
            .free_content
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Free content not found"))?;
        if item.uid != uid {
            return Err(ApiError::forbidden("Free content belongs to another user"));
        }
        self.free_content.delete(id).await?;
        Ok(())
    }
}
