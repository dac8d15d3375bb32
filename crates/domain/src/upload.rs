//! Image upload rules and result envelopes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted upload, in bytes (5 MB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// MIME types accepted for product and review images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// A file picked by the user, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadValidationError {
    #[error("File is empty")]
    Empty,

    #[error("File size must be less than 5MB")]
    TooLarge { size: usize },

    #[error("Only JPEG, PNG, WEBP and GIF images are allowed")]
    UnsupportedType { mime_type: String },
}

/// Check a file against the size and type rules.
pub fn validate_image(file: &UploadFile) -> Result<(), UploadValidationError> {
    if file.bytes.is_empty() {
        return Err(UploadValidationError::Empty);
    }
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(UploadValidationError::TooLarge { size: file.size() });
    }
    let mime = file.mime_type.trim().to_ascii_lowercase();
    if !ALLOWED_IMAGE_TYPES.contains(&mime.as_str()) {
        return Err(UploadValidationError::UnsupportedType {
            mime_type: file.mime_type.clone(),
        });
    }
    Ok(())
}

/// Hosted image returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    #[serde(default, alias = "public_id", skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

/// `{ success, data | message }` result of a single upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> UploadOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Result of uploading several files.
///
/// Uploads are independent: `data` holds every file that made it even when
/// `success` is false, and `failed` counts the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUploadOutcome<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> BatchUploadOutcome<T> {
    /// Fold individual outcomes, preserving the order of successful uploads.
    pub fn collect(outcomes: impl IntoIterator<Item = UploadOutcome<T>>) -> Self {
        let mut data = Vec::new();
        let mut failed = 0;
        for outcome in outcomes {
            match outcome.data {
                Some(value) if outcome.success => data.push(value),
                _ => failed += 1,
            }
        }

        let message = (failed > 0).then(|| format!("{failed} file(s) failed to upload"));
        Self {
            success: failed == 0,
            data,
            failed,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(size: usize) -> UploadFile {
        UploadFile::new("photo.png", "image/png", vec![0u8; size])
    }

    #[test]
    fn accepts_supported_image_within_limit() {
        assert_eq!(validate_image(&png(1024)), Ok(()));
        assert_eq!(validate_image(&png(MAX_UPLOAD_BYTES)), Ok(()));
    }

    #[test]
    fn rejects_oversized_file() {
        let err = validate_image(&png(MAX_UPLOAD_BYTES + 1)).unwrap_err();
        assert_eq!(
            err,
            UploadValidationError::TooLarge {
                size: MAX_UPLOAD_BYTES + 1
            }
        );
        assert_eq!(err.to_string(), "File size must be less than 5MB");
    }

    #[test]
    fn rejects_unsupported_type_and_empty_file() {
        let pdf = UploadFile::new("invoice.pdf", "application/pdf", vec![1, 2, 3]);
        assert!(matches!(
            validate_image(&pdf),
            Err(UploadValidationError::UnsupportedType { .. })
        ));
        assert_eq!(validate_image(&png(0)), Err(UploadValidationError::Empty));
    }

    #[test]
    fn batch_outcome_reports_partial_failure() {
        let batch = BatchUploadOutcome::collect(vec![
            UploadOutcome::ok("a.png".to_string()),
            UploadOutcome::failed("boom"),
            UploadOutcome::ok("c.png".to_string()),
        ]);

        assert!(!batch.success);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.data, vec!["a.png".to_string(), "c.png".to_string()]);
        assert_eq!(batch.message.as_deref(), Some("1 file(s) failed to upload"));
    }

    #[test]
    fn uploaded_image_accepts_snake_case_public_id() {
        let image: UploadedImage = serde_json::from_str(
            r#"{"url": "https://cdn.example.com/a.png", "public_id": "products/a"}"#,
        )
        .unwrap();
        assert_eq!(image.public_id.as_deref(), Some("products/a"));

        let bare: UploadedImage =
            serde_json::from_str(r#"{"url": "https://cdn.example.com/b.png"}"#).unwrap();
        assert_eq!(bare.public_id, None);
    }
}
