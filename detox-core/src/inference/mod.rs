//! Model abstractions for the two local collaborators.
//!
//! `Transcriber` turns an uploaded clip into text, `Classifier` turns text
//! into six category probabilities. Both decouple the pipeline from any
//! specific backend (stub, ONNX Whisper, ONNX sequence classifier, ...).
//!
//! `&mut self` on the hot methods expresses that backends own mutable
//! session state. All access is therefore serialised through the handles'
//! `parking_lot::Mutex`.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxClassifierConfig, WhisperConfig, WhisperTranscriber};

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::scores::CategoryScores;

/// Contract for speech recognition backends.
pub trait Transcriber: Send + 'static {
    /// One-time warm-up: load weights and run a dummy inference.
    /// Called once at startup.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn warm_up(&mut self) -> Result<()>;

    /// Transcribe the audio file at `audio`.
    ///
    /// # Errors
    /// `Transcription` / `AudioDecode` on corrupt or unreadable audio.
    fn transcribe(&mut self, audio: &Path) -> Result<String>;
}

/// Contract for multi-label toxicity classifiers.
pub trait Classifier: Send + 'static {
    /// One-time warm-up, see [`Transcriber::warm_up`].
    fn warm_up(&mut self) -> Result<()>;

    /// Score `text`. Input longer than the backend's token budget is
    /// truncated to its first tokens.
    ///
    /// # Errors
    /// `Inference` on malformed input or model failure.
    fn classify(&mut self, text: &str) -> Result<CategoryScores>;
}

/// Thread-safe reference-counted handle to any `Transcriber`.
#[derive(Clone)]
pub struct TranscriberHandle(pub Arc<Mutex<dyn Transcriber>>);

impl TranscriberHandle {
    pub fn new<T: Transcriber>(transcriber: T) -> Self {
        Self(Arc::new(Mutex::new(transcriber)))
    }
}

impl std::fmt::Debug for TranscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriberHandle").finish_non_exhaustive()
    }
}

/// Thread-safe reference-counted handle to any `Classifier`.
#[derive(Clone)]
pub struct ClassifierHandle(pub Arc<Mutex<dyn Classifier>>);

impl ClassifierHandle {
    pub fn new<C: Classifier>(classifier: C) -> Self {
        Self(Arc::new(Mutex::new(classifier)))
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle").finish_non_exhaustive()
    }
}
