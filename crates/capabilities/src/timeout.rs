//! Wall-clock bounds on capability calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::traits::{
    BlobDestination, BlobReader, BlobStorage, ImageBlob, ImageEditor, PromptTranslator,
    StoredBlob, Translation, VisionDescriber,
};
use crate::Capabilities;

/// Wraps a capability so every call is bounded by `limit`.
pub struct Timed<T: ?Sized> {
    inner: Arc<T>,
    limit: Duration,
}

impl<T: ?Sized> Timed<T> {
    pub fn new(inner: Arc<T>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn run<R>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<R, CapabilityError>>,
    ) -> Result<R, CapabilityError> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, limit = ?self.limit, "Capability call timed out");
                Err(CapabilityError::Timeout {
                    operation,
                    limit: self.limit,
                })
            }
        }
    }
}

pub(crate) fn bounded(caps: Capabilities, limit: Duration) -> Capabilities {
    Capabilities {
        vision: Arc::new(Timed::new(caps.vision, limit)),
        translator: Arc::new(Timed::new(caps.translator, limit)),
        editor: Arc::new(Timed::new(caps.editor, limit)),
        reader: Arc::new(Timed::new(caps.reader, limit)),
        storage: Arc::new(Timed::new(caps.storage, limit)),
    }
}

#[async_trait]
impl VisionDescriber for Timed<dyn VisionDescriber> {
    async fn describe_image(&self, image: &ImageBlob) -> Result<String, CapabilityError> {
        self.run("describe_image", self.inner.describe_image(image)).await
    }
}

#[async_trait]
impl PromptTranslator for Timed<dyn PromptTranslator> {
    async fn detect_language_and_translate(
        &self,
        text: &str,
    ) -> Result<Translation, CapabilityError> {
        self.run(
            "detect_language_and_translate",
            self.inner.detect_language_and_translate(text),
        )
        .await
    }
}

#[async_trait]
impl ImageEditor for Timed<dyn ImageEditor> {
    async fn edit_image(
        &self,
        image: &ImageBlob,
        description: &str,
        instructions: &str,
    ) -> Result<ImageBlob, CapabilityError> {
        self.run(
            "edit_image",
            self.inner.edit_image(image, description, instructions),
        )
        .await
    }
}

#[async_trait]
impl BlobReader for Timed<dyn BlobReader> {
    async fn download_blob(&self, url: &str) -> Result<ImageBlob, CapabilityError> {
        self.run("download_blob", self.inner.download_blob(url)).await
    }
}

#[async_trait]
impl BlobStorage for Timed<dyn BlobStorage> {
    async fn upload_blob(
        &self,
        image: &ImageBlob,
        destination: &BlobDestination,
    ) -> Result<StoredBlob, CapabilityError> {
        self.run("upload_blob", self.inner.upload_blob(image, destination))
            .await
    }
}
