//! External capabilities the orchestrator calls: vision description,
//! language detection and translation, image editing, and blob transfer.
//!
//! The orchestrator only sees the traits in [`traits`] through a
//! [`Capabilities`] bundle. Production adapters live in [`gemini`],
//! [`http_blob`] and [`s3`]; [`fakes`] provides scripted stand-ins.

use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod fakes;
pub mod gemini;
pub mod http_blob;
pub mod object_key;
pub mod s3;
pub mod timeout;
pub mod traits;

pub use config::CapabilityConfig;
pub use error::CapabilityError;
pub use traits::{
    BlobDestination, BlobReader, BlobStorage, ImageBlob, ImageEditor, PromptTranslator,
    StoredBlob, Translation, VisionDescriber,
};

/// Every capability the stage executor needs, injected as trait objects.
#[derive(Clone)]
pub struct Capabilities {
    pub vision: Arc<dyn VisionDescriber>,
    pub translator: Arc<dyn PromptTranslator>,
    pub editor: Arc<dyn ImageEditor>,
    pub reader: Arc<dyn BlobReader>,
    pub storage: Arc<dyn BlobStorage>,
}

impl Capabilities {
    /// Bound every call with `limit`. A call that overruns fails with
    /// [`CapabilityError::Timeout`].
    pub fn with_timeout(self, limit: Duration) -> Self {
        timeout::bounded(self, limit)
    }

    /// Build the production adapters from configuration.
    ///
    /// Gemini serves vision, translation and editing; originals are
    /// downloaded over HTTP; results are uploaded to S3.
    pub async fn from_config(config: &CapabilityConfig) -> Self {
        let http = reqwest::Client::new();
        let gemini = Arc::new(gemini::GeminiClient::with_client(
            http.clone(),
            config.gemini.clone(),
        ));
        let reader = Arc::new(http_blob::HttpBlobReader::with_client(http));
        let storage = Arc::new(s3::S3BlobStorage::from_config(&config.storage).await);

        Capabilities {
            vision: gemini.clone(),
            translator: gemini.clone(),
            editor: gemini,
            reader,
            storage,
        }
        .with_timeout(config.call_timeout)
    }
}
