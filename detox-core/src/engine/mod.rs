//! `DecisionPipeline`: input arbitration → classification → verdict →
//! narration → response.
//!
//! ## Flow
//!
//! ```text
//! AnalysisRequest { text, audio }
//!     ├─ text.trim() non-empty ──────────────► effective text (typed)
//!     ├─ else audio ─► Transcriber ──────────► effective text (spoken)
//!     └─ neither / blank transcript ─────────► "No input provided." (no calls)
//!
//! effective text ─► Classifier ─► CategoryScores ─► decide(threshold) ─► Verdict
//!                                                          │
//!                  Narrator("Result is …") ─► NarrationStore[request id]
//! ```
//!
//! Every call is independent. Collaborators are injected at construction;
//! a narration failure never affects the verdict.

mod diagnostics;

pub use diagnostics::{DiagnosticsSnapshot, PipelineDiagnostics};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::inference::{ClassifierHandle, TranscriberHandle};
use crate::narration::{AudioFormat, NarrationStore, NarratorHandle};
use crate::scores::{decide, CategoryScore, Verdict, DEFAULT_TOXICITY_THRESHOLD};

/// Status text of the no-input sentinel.
pub const NO_INPUT_STATUS: &str = "No input provided.";

/// Token budget applied by classifier backends.
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Deployment-level pipeline settings. Never varied per call.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// A category strictly above this marks the text toxic. Default: 0.5.
    pub toxicity_threshold: f32,
    /// Classifier input cap in tokens, first tokens kept. Default: 512.
    ///
    /// Backends take it at construction; build their config from this field
    /// so the logged budget is the one in force.
    pub max_tokens: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            toxicity_threshold: DEFAULT_TOXICITY_THRESHOLD,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Raw user input. Text wins whenever it has non-whitespace content.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub text: Option<String>,
    pub audio: Option<PathBuf>,
}

impl AnalysisRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            audio: None,
        }
    }

    pub fn audio(path: impl Into<PathBuf>) -> Self {
        Self {
            text: None,
            audio: Some(path.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InputSource {
    Typed,
    Spoken,
}

/// Where the narration for a response can be fetched, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum NarrationRef {
    Ready { id: Uuid, format: AudioFormat },
    Unavailable { reason: String },
    Skipped,
}

impl NarrationRef {
    pub fn is_ready(&self) -> bool {
        matches!(self, NarrationRef::Ready { .. })
    }
}

/// Per-stage wall time in milliseconds. Stages that did not run are omitted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribe_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classify_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrate_ms: Option<f64>,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<InputSource>,
    pub narration: NarrationRef,
    /// All six categories, present only for a toxic verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<CategoryScore>>,
    pub recognized_text: String,
    /// Threshold the verdict was decided against.
    pub threshold: f32,
    pub timings: StageTimings,
}

impl AnalysisResponse {
    fn no_input(request_id: Uuid, threshold: f32, timings: StageTimings) -> Self {
        Self {
            request_id,
            status: NO_INPUT_STATUS.to_string(),
            verdict: None,
            source: None,
            narration: NarrationRef::Skipped,
            breakdown: None,
            recognized_text: String::new(),
            threshold,
            timings,
        }
    }

    pub fn is_no_input(&self) -> bool {
        self.verdict.is_none()
    }
}

pub struct DecisionPipeline {
    config: PipelineConfig,
    transcriber: TranscriberHandle,
    classifier: ClassifierHandle,
    narrator: NarratorHandle,
    store: Arc<NarrationStore>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl DecisionPipeline {
    pub fn new(
        config: PipelineConfig,
        transcriber: TranscriberHandle,
        classifier: ClassifierHandle,
        narrator: NarratorHandle,
        store: Arc<NarrationStore>,
    ) -> Self {
        Self {
            config,
            transcriber,
            classifier,
            narrator,
            store,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        }
    }

    /// Load and warm both models. Call once before serving.
    pub fn warm_up(&self) -> Result<()> {
        self.transcriber.0.lock().warm_up()?;
        self.classifier.0.lock().warm_up()?;
        info!(
            threshold = self.config.toxicity_threshold,
            max_tokens = self.config.max_tokens,
            narrator = self.narrator.0.name(),
            "decision pipeline ready"
        );
        Ok(())
    }

    pub fn store(&self) -> &Arc<NarrationStore> {
        &self.store
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Run one request end to end. Blocks on model and network calls.
    ///
    /// Only a classifier failure is returned as `Err`.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let mut timings = StageTimings::default();
        self.diagnostics.record_request();

        let Some((text, source)) = self.resolve_input(request, &mut timings)? else {
            self.diagnostics.record_no_input();
            timings.total_ms = elapsed_ms(started);
            info!(%request_id, "no input provided");
            return Ok(AnalysisResponse::no_input(
                request_id,
                self.config.toxicity_threshold,
                timings,
            ));
        };

        let t = Instant::now();
        let scores = match self.classifier.0.lock().classify(&text) {
            Ok(scores) => scores,
            Err(e) => {
                self.diagnostics.record_inference_error();
                warn!(%request_id, error = %e, "classification failed");
                return Err(e);
            }
        };
        timings.classify_ms = Some(elapsed_ms(t));
        self.diagnostics.record_classification();

        let verdict = decide(&scores, self.config.toxicity_threshold);
        if verdict.is_toxic() {
            self.diagnostics.record_toxic();
        }

        let t = Instant::now();
        let narration = self.narrate(request_id, verdict);
        timings.narrate_ms = Some(elapsed_ms(t));
        timings.total_ms = elapsed_ms(started);

        let (top_category, top_score) = scores.max();
        info!(
            %request_id,
            ?source,
            ?verdict,
            top = top_category.key(),
            top_score,
            narration_ready = narration.is_ready(),
            transcribe_ms = ?timings.transcribe_ms,
            classify_ms = ?timings.classify_ms,
            narrate_ms = ?timings.narrate_ms,
            total_ms = timings.total_ms,
            "analysis complete"
        );

        Ok(AnalysisResponse {
            request_id,
            status: verdict.status_text().to_string(),
            verdict: Some(verdict),
            source: Some(source),
            narration,
            breakdown: verdict.is_toxic().then(|| scores.breakdown()),
            recognized_text: text,
            threshold: self.config.toxicity_threshold,
            timings,
        })
    }

    /// Pick the effective text, transcribing only when no text was typed.
    ///
    /// `Ok(None)` means the no-input sentinel applies.
    fn resolve_input(
        &self,
        request: &AnalysisRequest,
        timings: &mut StageTimings,
    ) -> Result<Option<(String, InputSource)>> {
        if let Some(text) = request.text.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(Some((text.to_string(), InputSource::Typed)));
        }
        let Some(audio) = request.audio.as_deref() else {
            return Ok(None);
        };

        let t = Instant::now();
        let transcript = self.transcriber.0.lock().transcribe(audio);
        timings.transcribe_ms = Some(elapsed_ms(t));
        self.diagnostics.record_transcription();

        match transcript {
            Ok(text) if text.trim().is_empty() => {
                debug!(audio = %audio.display(), "transcript is blank");
                Ok(None)
            }
            Ok(text) => Ok(Some((text, InputSource::Spoken))),
            Err(e) if e.is_transcription_failure() => {
                self.diagnostics.record_transcription_error();
                warn!(audio = %audio.display(), error = %e, "transcription failed; treating as no input");
                Ok(None)
            }
            Err(e) => {
                self.diagnostics.record_transcription_error();
                Err(e)
            }
        }
    }

    fn narrate(&self, request_id: Uuid, verdict: Verdict) -> NarrationRef {
        let outcome = self
            .narrator
            .0
            .synthesize(verdict.narration_text())
            .and_then(|audio| {
                self.store.put(request_id, &audio)?;
                Ok(audio.format)
            });
        match outcome {
            Ok(format) => {
                self.diagnostics.record_narration();
                NarrationRef::Ready {
                    id: request_id,
                    format,
                }
            }
            Err(e) => {
                self.diagnostics.record_narration_failure();
                warn!(%request_id, narrator = self.narrator.0.name(), error = %e, "narration unavailable");
                NarrationRef::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1_000.0
}
