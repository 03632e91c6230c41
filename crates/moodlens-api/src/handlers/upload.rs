//! Multipart upload parsing shared by the image and video endpoints.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use moodlens_models::MediaKind;

use crate::error::{ApiError, ApiResult};
use crate::security::sanitize_filename;

/// A parsed upload: the `file` part plus any plain form fields.
pub(crate) struct Upload {
    pub filename: String,
    pub bytes: Bytes,
    pub fields: HashMap<String, String>,
}

impl Upload {
    pub async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut file: Option<(String, Bytes)> = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field
                    .file_name()
                    .and_then(sanitize_filename)
                    .ok_or_else(|| ApiError::bad_request("Uploaded file has no usable filename"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read upload: {}", e)))?;
                file = Some((filename, bytes));
            } else if !name.is_empty() {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid field {}: {}", name, e)))?;
                fields.insert(name, value);
            }
        }

        let (filename, bytes) = file.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }

        Ok(Self {
            filename,
            bytes,
            fields,
        })
    }

    /// Reject files whose extension is not allowed for `expected`.
    pub fn require_kind(&self, expected: MediaKind) -> ApiResult<()> {
        if MediaKind::from_filename(&self.filename) == Some(expected) {
            return Ok(());
        }
        let allowed = match expected {
            MediaKind::Image => MediaKind::IMAGE_EXTENSIONS,
            MediaKind::Video => MediaKind::VIDEO_EXTENSIONS,
        };
        Err(ApiError::unsupported_media(format!(
            "{} (allowed {} types: {})",
            self.filename,
            expected.as_str(),
            allowed.join(", ")
        )))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
