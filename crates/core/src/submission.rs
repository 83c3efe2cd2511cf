//! Validation of a new edit request before anything is persisted.

use serde::Deserialize;
use validator::Validate;

use crate::error::CoreError;
use crate::payload::StagePayload;

/// Maximum accepted prompt length, in characters.
pub const MAX_PROMPT_CHARS: u64 = 2000;

/// Body of `POST /api/v1/edits`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEdit {
    #[validate(url)]
    pub original_image_url: String,
    #[validate(length(min = 1, max = 255))]
    pub original_image_filename: String,
    #[validate(length(min = 1, max = MAX_PROMPT_CHARS))]
    pub user_prompt: String,
}

impl SubmitEdit {
    /// Validate and trim. Whitespace-only prompts are rejected.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        self.user_prompt = self.user_prompt.trim().to_owned();
        self.original_image_filename = self.original_image_filename.trim().to_owned();
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Ok(self)
    }

    /// Payload the job starts with.
    pub fn initial_payload(&self) -> StagePayload {
        StagePayload::submitted(
            &self.original_image_url,
            &self.original_image_filename,
            &self.user_prompt,
        )
    }
}
