//! REST client for the Gemini `generateContent` endpoint.
//!
//! One client serves three capabilities: describing an image, detecting the
//! prompt language (translating Arabic to English), and editing. Images are
//! sent inline as base64.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::CapabilityError;
use crate::traits::{ImageBlob, ImageEditor, PromptTranslator, Translation, VisionDescriber};

const SERVICE: &str = "Gemini";

/// Shortest base64 image the describe call accepts.
const MIN_IMAGE_BASE64_LEN: usize = 100;

/// Language code the detector answers for Arabic.
pub const ARABIC: &str = "ar";

const DESCRIBE_PROMPT: &str = "Describe this image in detail. Focus on the main subjects, \
colors, setting, and any notable elements. Keep it concise but comprehensive.";

fn detect_prompt(text: &str) -> String {
    format!(
        "Detect the language of the following text and respond with only \"ar\" for Arabic \
         or \"en\" for English or other languages: \"{text}\""
    )
}

fn translate_prompt(text: &str) -> String {
    format!("Translate the following Arabic text to English: \"{text}\"")
}

fn edit_prompt(description: &str, instructions: &str) -> String {
    format!(
        "I have an image that I want to edit. Here's a description of the original image:\n\
         \"{description}\"\n\n\
         Please describe in detail how this image should be modified according to these \
         instructions:\n\
         \"{instructions}\"\n\n\
         Be specific about what elements should change and how they should look after editing."
    )
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    /// Concatenated text of every part.
    fn text(&self) -> String {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .concat()
    }

    fn first_image(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<RequestPart<'_>>,
    ) -> Result<GenerateResponse, CapabilityError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{model}:generateContent",
                self.config.api_url
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CapabilityError::Api {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<GenerateResponse>().await?)
    }

    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, CapabilityError> {
        let response = self
            .generate(model, vec![RequestPart::Text { text: prompt }])
            .await?;
        Ok(response.text())
    }
}

fn inline(image: &ImageBlob) -> InlineData {
    InlineData {
        mime_type: image.mime_type.clone(),
        data: STANDARD.encode(&image.bytes),
    }
}

#[async_trait]
impl VisionDescriber for GeminiClient {
    async fn describe_image(&self, image: &ImageBlob) -> Result<String, CapabilityError> {
        let inline_data = inline(image);
        if inline_data.data.len() < MIN_IMAGE_BASE64_LEN {
            return Err(CapabilityError::InvalidInput(
                "Invalid base64 image data".into(),
            ));
        }

        tracing::debug!(
            model = %self.config.vision_model,
            mime_type = %image.mime_type,
            bytes = image.bytes.len(),
            "Describing image",
        );
        let response = self
            .generate(
                &self.config.vision_model,
                vec![
                    RequestPart::Text {
                        text: DESCRIBE_PROMPT,
                    },
                    RequestPart::Inline { inline_data },
                ],
            )
            .await?;

        let description = response.text();
        if description.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse(SERVICE));
        }
        Ok(description)
    }
}

#[async_trait]
impl PromptTranslator for GeminiClient {
    async fn detect_language_and_translate(
        &self,
        text: &str,
    ) -> Result<Translation, CapabilityError> {
        let model = &self.config.text_model;
        let language = normalize_language(&self.generate_text(model, &detect_prompt(text)).await?);

        let translated_text = if language == ARABIC {
            let translated = self.generate_text(model, &translate_prompt(text)).await?;
            Some(translated.trim().to_string()).filter(|t| !t.is_empty())
        } else {
            None
        };

        Ok(Translation {
            language,
            translated_text,
        })
    }
}

#[async_trait]
impl ImageEditor for GeminiClient {
    /// Ask the vision model for editing guidance. When the answer carries an
    /// inline image that image is the result; otherwise the source image is
    /// returned unchanged.
    async fn edit_image(
        &self,
        image: &ImageBlob,
        description: &str,
        instructions: &str,
    ) -> Result<ImageBlob, CapabilityError> {
        let prompt = edit_prompt(description, instructions);
        let response = self
            .generate(
                &self.config.vision_model,
                vec![
                    RequestPart::Text { text: &prompt },
                    RequestPart::Inline {
                        inline_data: inline(image),
                    },
                ],
            )
            .await?;

        match response.first_image() {
            Some(edited) => {
                let bytes = STANDARD.decode(&edited.data).map_err(|e| {
                    CapabilityError::InvalidInput(format!("Edited image is not valid base64: {e}"))
                })?;
                Ok(ImageBlob::new(bytes, edited.mime_type.clone()))
            }
            None => {
                tracing::debug!(guidance = %response.text(), "No edited image returned, keeping source");
                Ok(image.clone())
            }
        }
    }
}

/// Reduce a detector answer like `"AR"\n` or `ar.` to a bare language code.
fn normalize_language(answer: &str) -> String {
    answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .trim()
        .to_lowercase()
}
