//! Capability traits and the values that cross them.

use async_trait::async_trait;

use crate::error::CapabilityError;

/// Raw image bytes and their mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Result of language detection. `translated_text` is set only when the
/// prompt was translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub language: String,
    pub translated_text: Option<String>,
}

/// Where an upload should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDestination {
    pub user_id: String,
    /// Requested filename, e.g. `edited_cat.png`. Storage may decorate it.
    pub filename: String,
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub public_url: String,
    /// Filename as actually stored.
    pub filename: String,
}

#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe_image(&self, image: &ImageBlob) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait PromptTranslator: Send + Sync {
    async fn detect_language_and_translate(
        &self,
        text: &str,
    ) -> Result<Translation, CapabilityError>;
}

#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Produce an edited image from the source, its description, and the
    /// editing instructions.
    async fn edit_image(
        &self,
        image: &ImageBlob,
        description: &str,
        instructions: &str,
    ) -> Result<ImageBlob, CapabilityError>;
}

#[async_trait]
pub trait BlobReader: Send + Sync {
    async fn download_blob(&self, url: &str) -> Result<ImageBlob, CapabilityError>;
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload_blob(
        &self,
        image: &ImageBlob,
        destination: &BlobDestination,
    ) -> Result<StoredBlob, CapabilityError>;
}
