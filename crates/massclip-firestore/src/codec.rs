//! Serde bridge between model structs and Firestore field maps.
//!
//! Models serialize to camelCase JSON; each top-level property becomes a
//! field. Properties whose name ends in `At` (plus `lastChecked`) that hold
//! an RFC 3339 string are stored as timestamps so they order correctly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

fn is_timestamp_field(name: &str) -> bool {
    name.ends_with("At") || name == "lastChecked"
}

/// Encode a model into document fields, leaving out `skip` (typically the id).
pub fn encode<T: Serialize>(model: &T, skip: &[&str]) -> FirestoreResult<HashMap<String, Value>> {
    let json = serde_json::to_value(model)?;
    let serde_json::Value::Object(map) = json else {
        return Err(FirestoreError::SerializationError(
            "model did not serialize to an object".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| {
            let value = match &v {
                serde_json::Value::String(s) if is_timestamp_field(&k) => {
                    match DateTime::parse_from_rfc3339(s) {
                        Ok(dt) => dt.with_timezone(&Utc).to_firestore_value(),
                        Err(_) => v.to_firestore_value(),
                    }
                }
                _ => v.to_firestore_value(),
            };
            (k, value)
        })
        .collect())
}

/// Decode a document into a model, injecting the document id as `id_field`.
pub fn decode<T: DeserializeOwned>(doc: &Document, id_field: &str) -> FirestoreResult<T> {
    let mut object = serde_json::Map::new();
    for (k, v) in doc.fields.iter().flatten() {
        if let Some(json) = serde_json::Value::from_firestore_value(v) {
            object.insert(k.clone(), json);
        }
    }
    if let Some(id) = doc.id() {
        object
            .entry(id_field.to_string())
            .or_insert_with(|| serde_json::Value::String(id.to_string()));
    }

    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
        FirestoreError::SerializationError(format!(
            "{}: {}",
            doc.name.as_deref().unwrap_or("document"),
            e
        ))
    })
}

/// Decode every document, skipping (and logging) the ones that do not parse.
pub fn decode_all<T: DeserializeOwned>(docs: &[Document], id_field: &str) -> Vec<T> {
    docs.iter()
        .filter_map(|d| match decode(d, id_field) {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use massclip_models::{Upload, UploadType};

    #[test]
    fn test_upload_survives_encode_decode() {
        let upload = Upload {
            id: "up1".into(),
            uid: "creator".into(),
            file_url: "https://cdn.example.com/uploads/creator/1-a.mp4".into(),
            r2_key: Some("uploads/creator/1-a.mp4".into()),
            filename: "a.mp4".into(),
            title: "A".into(),
            upload_type: UploadType::Video,
            size: 1024,
            mime_type: "video/mp4".into(),
            duration: Some(12.5),
            thumbnail_url: None,
            created_at: Utc::now(),
        };

        let fields = encode(&upload, &["id"]).unwrap();
        assert!(!fields.contains_key("id"));
        assert!(matches!(fields.get("createdAt"), Some(Value::TimestampValue(_))));
        assert_eq!(fields.get("type"), Some(&Value::StringValue("video".into())));

        let mut doc = Document::new(fields);
        doc.name = Some("projects/p/databases/d/documents/uploads/up1".into());
        let decoded: Upload = decode(&doc, "id").unwrap();
        assert_eq!(decoded.id, "up1");
        assert_eq!(decoded.size, 1024);
        assert_eq!(decoded.upload_type, UploadType::Video);
        assert_eq!(
            decoded.created_at.timestamp_micros(),
            upload.created_at.timestamp_micros()
        );
    }
}
