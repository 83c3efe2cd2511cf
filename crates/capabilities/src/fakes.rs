//! Scripted capabilities for tests and local runs.
//!
//! Each fake answers from a queue of scripted results, falling back to a
//! fixed success once the queue is empty, and counts its calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::traits::{
    BlobDestination, BlobReader, BlobStorage, ImageBlob, ImageEditor, PromptTranslator,
    StoredBlob, Translation, VisionDescriber,
};
use crate::Capabilities;

/// Base URL of objects stored by [`FakeBlobStorage`].
pub const FAKE_STORAGE_URL: &str = "https://storage.test";

struct Script<T> {
    queue: Mutex<VecDeque<Result<T, String>>>,
    fallback: T,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, result: Result<T, String>) {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(result);
    }

    fn next(&self, service: &'static str) -> Result<T, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match scripted {
            Some(Ok(value)) => Ok(value),
            Some(Err(body)) => Err(CapabilityError::Api {
                service,
                status: 500,
                body,
            }),
            None => Ok(self.fallback.clone()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Vision
// ---------------------------------------------------------------------------

pub struct FakeVision {
    script: Script<String>,
}

impl FakeVision {
    pub fn new() -> Self {
        Self {
            script: Script::new("A cat sitting on a red sofa in a sunlit room.".to_string()),
        }
    }

    pub fn push_ok(&self, description: impl Into<String>) {
        self.script.push(Ok(description.into()));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script.push(Err(message.into()));
    }

    pub fn default_description(&self) -> &str {
        &self.script.fallback
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl Default for FakeVision {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionDescriber for FakeVision {
    async fn describe_image(&self, _image: &ImageBlob) -> Result<String, CapabilityError> {
        self.script.next("fake vision")
    }
}

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

pub struct FakeTranslator {
    script: Script<Translation>,
}

impl FakeTranslator {
    /// Detects English and translates nothing unless scripted otherwise.
    pub fn new() -> Self {
        Self {
            script: Script::new(Translation {
                language: "en".into(),
                translated_text: None,
            }),
        }
    }

    pub fn push_ok(&self, language: impl Into<String>, translated_text: Option<&str>) {
        self.script.push(Ok(Translation {
            language: language.into(),
            translated_text: translated_text.map(str::to_owned),
        }));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script.push(Err(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl Default for FakeTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptTranslator for FakeTranslator {
    async fn detect_language_and_translate(
        &self,
        _text: &str,
    ) -> Result<Translation, CapabilityError> {
        self.script.next("fake translator")
    }
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// Returns the scripted image, or the source image unchanged.
pub struct FakeEditor {
    script: Script<Option<ImageBlob>>,
    instructions: Mutex<Vec<String>>,
}

impl FakeEditor {
    pub fn new() -> Self {
        Self {
            script: Script::new(None),
            instructions: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, image: ImageBlob) {
        self.script.push(Ok(Some(image)));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script.push(Err(message.into()));
    }

    /// Instructions received, in call order.
    pub fn instructions(&self) -> Vec<String> {
        self.instructions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl Default for FakeEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEditor for FakeEditor {
    async fn edit_image(
        &self,
        image: &ImageBlob,
        _description: &str,
        instructions: &str,
    ) -> Result<ImageBlob, CapabilityError> {
        self.instructions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(instructions.to_owned());
        Ok(self.script.next("fake editor")?.unwrap_or_else(|| image.clone()))
    }
}

// ---------------------------------------------------------------------------
// Blob transfer
// ---------------------------------------------------------------------------

pub struct FakeBlobReader {
    script: Script<ImageBlob>,
}

impl FakeBlobReader {
    pub fn new() -> Self {
        Self {
            script: Script::new(ImageBlob::new(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg")),
        }
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script.push(Err(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl Default for FakeBlobReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobReader for FakeBlobReader {
    async fn download_blob(&self, _url: &str) -> Result<ImageBlob, CapabilityError> {
        self.script.next("fake download")
    }
}

/// Records uploads and serves them from [`FAKE_STORAGE_URL`].
pub struct FakeBlobStorage {
    script: Script<()>,
    uploads: Mutex<Vec<(BlobDestination, ImageBlob)>>,
}

impl FakeBlobStorage {
    pub fn new() -> Self {
        Self {
            script: Script::new(()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script.push(Err(message.into()));
    }

    pub fn uploads(&self) -> Vec<(BlobDestination, ImageBlob)> {
        self.uploads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

impl Default for FakeBlobStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStorage for FakeBlobStorage {
    async fn upload_blob(
        &self,
        image: &ImageBlob,
        destination: &BlobDestination,
    ) -> Result<StoredBlob, CapabilityError> {
        self.script.next("fake storage")?;
        self.uploads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((destination.clone(), image.clone()));
        Ok(StoredBlob {
            public_url: format!(
                "{FAKE_STORAGE_URL}/{}/{}",
                destination.user_id, destination.filename
            ),
            filename: destination.filename.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// All fakes, kept as concrete handles so tests can script and inspect them.
#[derive(Clone, Default)]
pub struct FakeCapabilities {
    pub vision: Arc<FakeVision>,
    pub translator: Arc<FakeTranslator>,
    pub editor: Arc<FakeEditor>,
    pub reader: Arc<FakeBlobReader>,
    pub storage: Arc<FakeBlobStorage>,
}

impl FakeCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            vision: self.vision.clone(),
            translator: self.translator.clone(),
            editor: self.editor.clone(),
            reader: self.reader.clone(),
            storage: self.storage.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_results_come_before_fallback() {
        let vision = FakeVision::new();
        vision.push_err("quota exceeded");
        vision.push_ok("a dog");
        let image = ImageBlob::new(vec![1], "image/png");

        let err = vision.describe_image(&image).await.unwrap_err();
        assert_eq!(err.to_string(), "fake vision API error (500): quota exceeded");
        assert_eq!(vision.describe_image(&image).await.unwrap(), "a dog");
        assert_eq!(
            vision.describe_image(&image).await.unwrap(),
            vision.default_description()
        );
        assert_eq!(vision.calls(), 3);
    }

    #[tokio::test]
    async fn editor_returns_source_unless_scripted() {
        let editor = FakeEditor::new();
        let source = ImageBlob::new(vec![1, 2], "image/png");
        let edited = editor.edit_image(&source, "d", "brighter").await.unwrap();
        assert_eq!(edited, source);
        assert_eq!(editor.instructions(), vec!["brighter".to_string()]);
    }

    #[tokio::test]
    async fn storage_records_uploads() {
        let storage = FakeBlobStorage::new();
        let dest = BlobDestination {
            user_id: "user_1".into(),
            filename: "edited_a.png".into(),
        };
        let stored = storage
            .upload_blob(&ImageBlob::new(vec![9], "image/png"), &dest)
            .await
            .unwrap();
        assert_eq!(stored.public_url, "https://storage.test/user_1/edited_a.png");
        assert_eq!(storage.uploads().len(), 1);
    }
}
