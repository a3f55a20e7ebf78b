//! Object key layout.
//!
//! - `profile-pics/{uid}/{timestamp}.{ext}` for profile pictures
//! - `uploads/{uid}/{timestamp}-{filename}` for finished uploads
//! - `{r2_key}.chunk.{n}` for chunks of an in-flight upload

/// Key for a profile picture.
pub fn profile_pic_key(uid: &str, timestamp_ms: i64, ext: &str) -> String {
    format!("profile-pics/{}/{}.{}", uid, timestamp_ms, ext)
}

/// Key for a finished upload.
pub fn upload_key(uid: &str, timestamp_ms: i64, filename: &str) -> String {
    format!("uploads/{}/{}-{}", uid, timestamp_ms, sanitize_filename(filename))
}

/// Key for chunk `index` of the upload that will land at `r2_key`.
pub fn chunk_key(r2_key: &str, index: u32) -> String {
    format!("{}.chunk.{}", r2_key, index)
}

/// Restrict a client-supplied filename to characters safe in a key.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File extension for an image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(profile_pic_key("u1", 42, "png"), "profile-pics/u1/42.png");
        assert_eq!(upload_key("u1", 42, "clip.mp4"), "uploads/u1/42-clip.mp4");
        assert_eq!(chunk_key("uploads/u1/42-clip.mp4", 3), "uploads/u1/42-clip.mp4.chunk.3");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_filename("..."), "file");
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/jpeg; charset=binary"), Some("jpg"));
        assert_eq!(image_extension("video/mp4"), None);
    }
}
