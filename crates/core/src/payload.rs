//! Stage payload contracts.
//!
//! The payload is persisted as a JSON object with camelCase keys. It only ever
//! grows: every step contributes a patch, and the store merges patches key by
//! key (JSONB `||` in Postgres), so keys written by earlier steps survive.
//!
//! Each step reads a typed input ([`DescribeInput`], [`TranslateInput`],
//! [`EditInput`], [`UploadInput`]) and produces a typed patch
//! ([`DescribePatch`], [`TranslatePatch`], [`EditPatch`], [`UploadPatch`]).
//! Extracting an input reports the first missing key as
//! `missing required field: <name>`.

use serde::{Deserialize, Serialize};

/// Mime type assumed when the source image does not report one.
pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Filename assumed when the payload has no original filename.
pub const DEFAULT_IMAGE_FILENAME: &str = "image.jpg";

/// Prefix applied to the original filename for the uploaded result.
pub const EDITED_FILENAME_PREFIX: &str = "edited_";

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Keys of the persisted payload object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    OriginalImageUrl,
    OriginalImageFilename,
    UserPrompt,
    AiImageDescription,
    PromptLanguage,
    TranslatedUserPrompt,
    EditedImageEncoding,
    EditedImageMimeType,
    EditedImageUrl,
    EditedImageFilename,
}

impl PayloadField {
    /// JSON key as stored in `stage_payload`.
    pub fn name(self) -> &'static str {
        match self {
            PayloadField::OriginalImageUrl => "originalImageUrl",
            PayloadField::OriginalImageFilename => "originalImageFilename",
            PayloadField::UserPrompt => "userPrompt",
            PayloadField::AiImageDescription => "aiImageDescription",
            PayloadField::PromptLanguage => "promptLanguage",
            PayloadField::TranslatedUserPrompt => "translatedUserPrompt",
            PayloadField::EditedImageEncoding => "editedImageEncoding",
            PayloadField::EditedImageMimeType => "editedImageMimeType",
            PayloadField::EditedImageUrl => "editedImageUrl",
            PayloadField::EditedImageFilename => "editedImageFilename",
        }
    }
}

/// A required key was absent (or empty) when a step tried to read it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required field: {}", .0.name())]
pub struct MissingField(pub PayloadField);

// ---------------------------------------------------------------------------
// StagePayload
// ---------------------------------------------------------------------------

/// The accumulated payload of a job.
///
/// Unknown keys are kept in `extra` so that a payload written by a newer
/// version of the pipeline survives a round trip through an older one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_image_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_image_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_image_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_image_filename: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// How far along the superset chain a payload has grown.
///
/// `Submitted ⊂ Described ⊂ Translated ⊂ Edited ⊂ Uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PayloadVersion {
    Partial,
    Submitted,
    Described,
    Translated,
    Edited,
    Uploaded,
}

impl StagePayload {
    /// Payload written when an edit is submitted.
    pub fn submitted(
        original_image_url: impl Into<String>,
        original_image_filename: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            original_image_url: Some(original_image_url.into()),
            original_image_filename: Some(original_image_filename.into()),
            user_prompt: Some(user_prompt.into()),
            ..Self::default()
        }
    }

    /// Parse a stored JSON value. `null` is an empty payload.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Serialization of plain strings and a JSON map cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    /// Overlay every key present in `patch`. Keys absent from the patch keep
    /// their current value.
    pub fn merge(&mut self, patch: &StagePayload) {
        fn overlay(dst: &mut Option<String>, src: &Option<String>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        overlay(&mut self.original_image_url, &patch.original_image_url);
        overlay(&mut self.original_image_filename, &patch.original_image_filename);
        overlay(&mut self.user_prompt, &patch.user_prompt);
        overlay(&mut self.ai_image_description, &patch.ai_image_description);
        overlay(&mut self.prompt_language, &patch.prompt_language);
        overlay(&mut self.translated_user_prompt, &patch.translated_user_prompt);
        overlay(&mut self.edited_image_encoding, &patch.edited_image_encoding);
        overlay(&mut self.edited_image_mime_type, &patch.edited_image_mime_type);
        overlay(&mut self.edited_image_url, &patch.edited_image_url);
        overlay(&mut self.edited_image_filename, &patch.edited_image_filename);
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Read a string field, treating absent and empty values alike.
    pub fn get(&self, field: PayloadField) -> Option<&str> {
        let value = match field {
            PayloadField::OriginalImageUrl => &self.original_image_url,
            PayloadField::OriginalImageFilename => &self.original_image_filename,
            PayloadField::UserPrompt => &self.user_prompt,
            PayloadField::AiImageDescription => &self.ai_image_description,
            PayloadField::PromptLanguage => &self.prompt_language,
            PayloadField::TranslatedUserPrompt => &self.translated_user_prompt,
            PayloadField::EditedImageEncoding => &self.edited_image_encoding,
            PayloadField::EditedImageMimeType => &self.edited_image_mime_type,
            PayloadField::EditedImageUrl => &self.edited_image_url,
            PayloadField::EditedImageFilename => &self.edited_image_filename,
        };
        value.as_deref().filter(|s| !s.is_empty())
    }

    pub fn require(&self, field: PayloadField) -> Result<&str, MissingField> {
        self.get(field).ok_or(MissingField(field))
    }

    pub fn version(&self) -> PayloadVersion {
        use PayloadField::*;
        let has_all = |fields: &[PayloadField]| fields.iter().all(|f| self.get(*f).is_some());

        if !has_all(&[OriginalImageUrl, OriginalImageFilename, UserPrompt]) {
            PayloadVersion::Partial
        } else if !has_all(&[AiImageDescription]) {
            PayloadVersion::Submitted
        } else if !has_all(&[PromptLanguage, TranslatedUserPrompt]) {
            PayloadVersion::Described
        } else if !has_all(&[EditedImageEncoding]) {
            PayloadVersion::Translated
        } else if !has_all(&[EditedImageUrl]) {
            PayloadVersion::Edited
        } else {
            PayloadVersion::Uploaded
        }
    }

    fn original_filename_or_default(&self) -> &str {
        self.get(PayloadField::OriginalImageFilename)
            .unwrap_or(DEFAULT_IMAGE_FILENAME)
    }
}

// ---------------------------------------------------------------------------
// Step inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeInput {
    pub image_url: String,
}

impl DescribeInput {
    pub fn from_payload(payload: &StagePayload) -> Result<Self, MissingField> {
        Ok(Self {
            image_url: payload.require(PayloadField::OriginalImageUrl)?.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateInput {
    pub user_prompt: String,
}

impl TranslateInput {
    pub fn from_payload(payload: &StagePayload) -> Result<Self, MissingField> {
        Ok(Self {
            user_prompt: payload.require(PayloadField::UserPrompt)?.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInput {
    pub image_url: String,
    pub description: String,
    /// Translated prompt when available, the user's own prompt otherwise.
    pub instructions: String,
}

impl EditInput {
    pub fn from_payload(payload: &StagePayload) -> Result<Self, MissingField> {
        let image_url = payload.require(PayloadField::OriginalImageUrl)?.to_owned();
        let description = payload.require(PayloadField::AiImageDescription)?.to_owned();
        let instructions = payload
            .get(PayloadField::TranslatedUserPrompt)
            .or_else(|| payload.get(PayloadField::UserPrompt))
            .ok_or(MissingField(PayloadField::TranslatedUserPrompt))?
            .to_owned();
        Ok(Self {
            image_url,
            description,
            instructions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInput {
    /// Base64 (standard alphabet) of the edited image.
    pub encoding: String,
    pub mime_type: String,
    /// Filename the result is stored under.
    pub filename: String,
}

impl UploadInput {
    pub fn from_payload(payload: &StagePayload) -> Result<Self, MissingField> {
        Ok(Self {
            encoding: payload.require(PayloadField::EditedImageEncoding)?.to_owned(),
            mime_type: payload
                .get(PayloadField::EditedImageMimeType)
                .unwrap_or(DEFAULT_IMAGE_MIME_TYPE)
                .to_owned(),
            filename: format!(
                "{EDITED_FILENAME_PREFIX}{}",
                payload.original_filename_or_default()
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Step patches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribePatch {
    pub ai_image_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatePatch {
    pub prompt_language: String,
    pub translated_user_prompt: String,
}

impl TranslatePatch {
    /// Build the patch from a detection result. When nothing was translated
    /// the user's prompt is carried forward unchanged.
    pub fn new(language: impl Into<String>, translated: Option<String>, user_prompt: &str) -> Self {
        Self {
            prompt_language: language.into(),
            translated_user_prompt: translated
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| user_prompt.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPatch {
    pub edited_image_encoding: String,
    pub edited_image_mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPatch {
    pub edited_image_url: String,
    pub edited_image_filename: String,
}

impl From<DescribePatch> for StagePayload {
    fn from(patch: DescribePatch) -> Self {
        Self {
            ai_image_description: Some(patch.ai_image_description),
            ..Self::default()
        }
    }
}

impl From<TranslatePatch> for StagePayload {
    fn from(patch: TranslatePatch) -> Self {
        Self {
            prompt_language: Some(patch.prompt_language),
            translated_user_prompt: Some(patch.translated_user_prompt),
            ..Self::default()
        }
    }
}

impl From<EditPatch> for StagePayload {
    fn from(patch: EditPatch) -> Self {
        Self {
            edited_image_encoding: Some(patch.edited_image_encoding),
            edited_image_mime_type: Some(patch.edited_image_mime_type),
            ..Self::default()
        }
    }
}

impl From<UploadPatch> for StagePayload {
    fn from(patch: UploadPatch) -> Self {
        Self {
            edited_image_url: Some(patch.edited_image_url),
            edited_image_filename: Some(patch.edited_image_filename),
            ..Self::default()
        }
    }
}
