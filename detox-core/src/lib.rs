//! # detox-core
//!
//! Toxicity decision pipeline SDK.
//!
//! ## Architecture
//!
//! ```text
//! text ─────────────────────────────┐
//!                                   ├─► Classifier ─► decide(> 0.5) ─► Verdict
//! audio (WAV) ─► Transcriber ───────┘                                   │
//!                                                     Narrator ─► NarrationStore[request id]
//! ```
//!
//! All three collaborators are injected into [`DecisionPipeline`]; ONNX
//! backends live behind the `onnx` feature, Google Translate narration
//! behind `google-tts`, and stub backends are always available.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod engine;
pub mod error;
pub mod inference;
pub mod narration;
pub mod scores;

// Convenience re-exports for downstream crates
pub use engine::{
    AnalysisRequest, AnalysisResponse, DecisionPipeline, DiagnosticsSnapshot, InputSource,
    NarrationRef, PipelineConfig, StageTimings, NO_INPUT_STATUS,
};
pub use error::{DetoxError, Result};
pub use inference::{
    stub::{StubClassifier, StubTranscriber},
    Classifier, ClassifierHandle, Transcriber, TranscriberHandle,
};
pub use narration::{
    AudioFormat, NarrationArtifact, NarrationStore, Narrator, NarratorHandle, SilentNarrator,
    SynthesizedAudio,
};
pub use scores::{decide, Category, CategoryScore, CategoryScores, Verdict};

#[cfg(feature = "onnx")]
pub use inference::{OnnxClassifier, OnnxClassifierConfig, WhisperConfig, WhisperTranscriber};

#[cfg(feature = "google-tts")]
pub use narration::{GoogleTranslateTts, GoogleTtsConfig};
