//! Edited-image uploads to an S3-compatible bucket.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::StorageConfig;
use crate::error::CapabilityError;
use crate::object_key::{check_upload, object_key, stored_filename};
use crate::traits::{BlobDestination, BlobStorage, ImageBlob, StoredBlob};

pub struct S3BlobStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStorage {
    pub fn new(client: aws_sdk_s3::Client, config: &StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Build a client from the ambient AWS configuration (env, profile,
    /// instance metadata). A custom endpoint switches to path-style
    /// addressing for S3-compatible stores.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let shared = aws_config::load_from_env().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(aws_sdk_s3::Client::from_conf(builder.build()), config)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.public_base_url, self.bucket)
    }
}

#[async_trait]
impl BlobStorage for S3BlobStorage {
    async fn upload_blob(
        &self,
        image: &ImageBlob,
        destination: &BlobDestination,
    ) -> Result<StoredBlob, CapabilityError> {
        check_upload(image, destination)?;

        let filename = stored_filename(&destination.filename, chrono::Utc::now().timestamp_millis());
        let key = object_key(&destination.user_id, &filename);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&image.mime_type)
            .body(ByteStream::from(image.bytes.clone()))
            .send()
            .await
            .map_err(|e| CapabilityError::Storage(DisplayErrorContext(e).to_string()))?;

        tracing::info!(bucket = %self.bucket, key = %key, bytes = image.bytes.len(), "Uploaded edited image");

        Ok(StoredBlob {
            public_url: self.public_url(&key),
            filename,
        })
    }
}
