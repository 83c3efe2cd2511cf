//! Downloads source images over plain HTTP(S).

use async_trait::async_trait;
use editflow_core::payload::DEFAULT_IMAGE_MIME_TYPE;

use crate::error::CapabilityError;
use crate::traits::{BlobReader, ImageBlob};

pub struct HttpBlobReader {
    client: reqwest::Client,
}

impl HttpBlobReader {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpBlobReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobReader for HttpBlobReader {
    async fn download_blob(&self, url: &str) -> Result<ImageBlob, CapabilityError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Api {
                service: "Image download",
                status: status.as_u16(),
                body: format!("GET {url}"),
            });
        }

        let mime_type = mime_from_content_type(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = response.bytes().await?;
        Ok(ImageBlob::new(bytes.to_vec(), mime_type))
    }
}

/// Mime type from a `Content-Type` header, dropping parameters such as
/// `charset`. Missing or blank headers fall back to JPEG.
fn mime_from_content_type(header: Option<&str>) -> String {
    header
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME_TYPE)
        .to_ascii_lowercase()
}
