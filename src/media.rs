//! Image hosting for room photos (Cloudinary upload API).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::MediaSettings;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media host request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("media host rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store the image and return its public HTTPS URL.
    async fn upload(&self, image: ImageUpload) -> Result<String, MediaError>;
}

pub struct CloudinaryHost {
    client: reqwest::Client,
    settings: MediaSettings,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryHost {
    pub fn new(client: reqwest::Client, settings: MediaSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.settings.cloud_name
        )
    }
}

/// Signature over the signed upload parameters (only `timestamp` here).
pub fn upload_signature(timestamp: i64, api_secret: &str) -> String {
    let digest = Sha256::digest(format!("timestamp={timestamp}{api_secret}").as_bytes());
    hex::encode(digest)
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, image: ImageUpload) -> Result<String, MediaError> {
        let timestamp = chrono::Utc::now().timestamp();
        let mut file = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = image.content_type {
            file = file.mime_str(&content_type)?;
        }
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.settings.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature_algorithm", "sha256")
            .text("signature", upload_signature(timestamp, &self.settings.api_secret));

        let response = self.client.post(self.endpoint()).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.secure_url)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out predictable URLs and rejects files named `broken*`.
    #[derive(Default)]
    pub struct FakeMediaHost {
        pub uploads: AtomicUsize,
    }

    #[async_trait]
    impl MediaHost for FakeMediaHost {
        async fn upload(&self, image: ImageUpload) -> Result<String, MediaError> {
            if image.file_name.starts_with("broken") {
                return Err(MediaError::Rejected {
                    status: 400,
                    body: "Invalid image file".to_string(),
                });
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://media.test/{}", image.file_name))
        }
    }
}
