use std::time::Duration;

/// Default bound on a single capability call, in seconds.
pub const DEFAULT_CAPABILITY_TIMEOUT_SECS: u64 = 60;

/// Gemini REST endpoint settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Base URL up to and including the API version, without trailing slash.
    pub api_url: String,
    /// Model used for image description and editing guidance.
    pub vision_model: String,
    /// Model used for language detection and translation.
    pub text_model: String,
}

/// Object storage settings for edited images.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// Public base URL; object URLs are `<base>/<bucket>/<key>`.
    pub public_base_url: String,
    /// Custom S3 endpoint (MinIO, R2, Supabase S3). `None` uses AWS.
    pub endpoint_url: Option<String>,
}

/// Configuration for every production capability adapter.
#[derive(Debug, Clone)]
pub struct CapabilityConfig {
    pub gemini: GeminiConfig,
    pub storage: StorageConfig,
    pub call_timeout: Duration,
}

impl CapabilityConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                              |
    /// |---------------------------|------------------------------------------------------|
    /// | `GEMINI_API_KEY`          | *(required)*                                         |
    /// | `GEMINI_API_URL`          | `https://generativelanguage.googleapis.com/v1beta`   |
    /// | `GEMINI_VISION_MODEL`     | `gemini-1.5-pro-vision`                              |
    /// | `GEMINI_TEXT_MODEL`       | `gemini-1.5-pro`                                     |
    /// | `EDITED_IMAGES_BUCKET`    | `edited-images`                                      |
    /// | `STORAGE_PUBLIC_BASE_URL` | `http://localhost:9000`                              |
    /// | `S3_ENDPOINT_URL`         | *(unset: AWS)*                                       |
    /// | `CAPABILITY_TIMEOUT_SECS` | `60`                                                 |
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");

        let api_url = std::env::var("GEMINI_API_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into())
            .trim_end_matches('/')
            .to_string();

        let vision_model =
            std::env::var("GEMINI_VISION_MODEL").unwrap_or_else(|_| "gemini-1.5-pro-vision".into());
        let text_model =
            std::env::var("GEMINI_TEXT_MODEL").unwrap_or_else(|_| "gemini-1.5-pro".into());

        let bucket =
            std::env::var("EDITED_IMAGES_BUCKET").unwrap_or_else(|_| "edited-images".into());
        let public_base_url = std::env::var("STORAGE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9000".into())
            .trim_end_matches('/')
            .to_string();
        let endpoint_url = std::env::var("S3_ENDPOINT_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let timeout_secs: u64 = std::env::var("CAPABILITY_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_CAPABILITY_TIMEOUT_SECS.to_string())
            .parse()
            .expect("CAPABILITY_TIMEOUT_SECS must be a valid u64");

        Self {
            gemini: GeminiConfig {
                api_key,
                api_url,
                vision_model,
                text_model,
            },
            storage: StorageConfig {
                bucket,
                public_base_url,
                endpoint_url,
            },
            call_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
