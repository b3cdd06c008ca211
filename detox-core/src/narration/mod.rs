//! Spoken narration of the verdict.
//!
//! A [`Narrator`] turns a short English phrase into an audio artifact. The
//! pipeline stores each artifact in a [`NarrationStore`] under the request's
//! id, so concurrent requests never overwrite each other's audio.

#[cfg(feature = "google-tts")]
pub mod gtts;
pub mod silent;
pub mod store;

#[cfg(feature = "google-tts")]
pub use gtts::{GoogleTranslateTts, GoogleTtsConfig};
pub use silent::SilentNarrator;
pub use store::{NarrationArtifact, NarrationStore};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

/// Encoded audio returned by a narrator.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Text-to-speech backend.
///
/// Implementations may block (network or CPU bound); callers run them off
/// the async executor.
pub trait Narrator: Send + Sync + 'static {
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;

    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Shared, clonable narrator reference.
#[derive(Clone)]
pub struct NarratorHandle(pub Arc<dyn Narrator>);

impl NarratorHandle {
    pub fn new<N: Narrator>(narrator: N) -> Self {
        Self(Arc::new(narrator))
    }
}

impl fmt::Debug for NarratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NarratorHandle").field(&self.0.name()).finish()
    }
}
