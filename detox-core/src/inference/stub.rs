//! Placeholder backends used when model files are not installed.
//!
//! They keep the whole request path (upload → transcript → verdict →
//! narration → UI) exercisable without downloading any weights.

use std::path::Path;

use tracing::debug;

use crate::audio::{load_wav, WHISPER_SAMPLE_RATE};
use crate::error::Result;
use crate::inference::{Classifier, Transcriber};
use crate::scores::{Category, CategoryScores, CATEGORY_COUNT};

/// Echo-style transcriber.
///
/// Decodes the clip (so corrupt uploads still fail the same way as with a
/// real model) and returns `"[stub: <N> samples @ <SR> Hz]"`.
#[derive(Debug, Default)]
pub struct StubTranscriber;

impl StubTranscriber {
    pub fn new() -> Self {
        Self
    }
}

impl Transcriber for StubTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubTranscriber::warm_up — no-op");
        Ok(())
    }

    fn transcribe(&mut self, audio: &Path) -> Result<String> {
        let clip = load_wav(audio, WHISPER_SAMPLE_RATE)?;
        Ok(format!(
            "[stub: {} samples @ {} Hz]",
            clip.samples.len(),
            clip.sample_rate
        ))
    }
}

/// Score assigned to a category whose lexicon matched.
const STUB_HIT: f32 = 0.9;
/// Score assigned to every other category.
const STUB_MISS: f32 = 0.05;

/// Keyword classifier.
///
/// Each category has a tiny fixed word list; a matching word pushes that
/// category to `STUB_HIT`. Deterministic and model-free.
#[derive(Debug, Default)]
pub struct StubClassifier;

impl StubClassifier {
    pub fn new() -> Self {
        Self
    }

    fn lexicon(category: Category) -> &'static [&'static str] {
        match category {
            Category::Toxic => &["idiot", "stupid", "hate", "trash"],
            Category::SevereToxic => &["scum", "vermin"],
            Category::Obscene => &["damn", "crap"],
            Category::Threat => &["hurt", "kill", "destroy"],
            Category::Insult => &["idiot", "loser", "moron", "ugly"],
            Category::IdentityHate => &["bigot"],
        }
    }
}

impl Classifier for StubClassifier {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubClassifier::warm_up — no-op");
        Ok(())
    }

    fn classify(&mut self, text: &str) -> Result<CategoryScores> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut raw = [STUB_MISS; CATEGORY_COUNT];
        for category in Category::ALL {
            if Self::lexicon(category)
                .iter()
                .any(|needle| words.iter().any(|w| w == needle))
            {
                raw[category.index()] = STUB_HIT;
            }
        }
        CategoryScores::from_slice(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::{decide, Verdict, DEFAULT_TOXICITY_THRESHOLD};

    #[test]
    fn benign_text_scores_low() {
        let scores = StubClassifier::new()
            .classify("You are wonderful")
            .expect("classify");
        assert_eq!(decide(&scores, DEFAULT_TOXICITY_THRESHOLD), Verdict::NonToxic);
    }

    #[test]
    fn threat_word_raises_threat_only() {
        let scores = StubClassifier::new()
            .classify("I will HURT you.")
            .expect("classify");
        assert_eq!(scores.get(Category::Threat), STUB_HIT);
        assert_eq!(scores.get(Category::Insult), STUB_MISS);
        assert_eq!(decide(&scores, DEFAULT_TOXICITY_THRESHOLD), Verdict::Toxic);
    }

    #[test]
    fn shared_word_raises_several_categories() {
        let scores = StubClassifier::new().classify("idiot").expect("classify");
        assert_eq!(scores.get(Category::Toxic), STUB_HIT);
        assert_eq!(scores.get(Category::Insult), STUB_HIT);
    }

    #[test]
    fn stub_transcriber_rejects_missing_file() {
        let err = StubTranscriber::new()
            .transcribe(Path::new("/nonexistent/clip.wav"))
            .expect_err("missing file");
        assert!(err.is_transcription_failure());
    }
}
