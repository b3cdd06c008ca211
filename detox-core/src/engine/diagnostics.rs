use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Lifetime counters for a `DecisionPipeline`.
#[derive(Debug, Default)]
pub struct PipelineDiagnostics {
    requests: AtomicUsize,
    no_input: AtomicUsize,
    transcriptions: AtomicUsize,
    transcription_errors: AtomicUsize,
    classifications: AtomicUsize,
    inference_errors: AtomicUsize,
    toxic_verdicts: AtomicUsize,
    narrations: AtomicUsize,
    narration_failures: AtomicUsize,
}

impl PipelineDiagnostics {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_no_input(&self) {
        self.no_input.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transcription(&self) {
        self.transcriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transcription_error(&self) {
        self.transcription_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_classification(&self) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inference_error(&self) {
        self.inference_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_toxic(&self) {
        self.toxic_verdicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_narration(&self) {
        self.narrations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_narration_failure(&self) {
        self.narration_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            no_input: self.no_input.load(Ordering::Relaxed),
            transcriptions: self.transcriptions.load(Ordering::Relaxed),
            transcription_errors: self.transcription_errors.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            toxic_verdicts: self.toxic_verdicts.load(Ordering::Relaxed),
            narrations: self.narrations.load(Ordering::Relaxed),
            narration_failures: self.narration_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub requests: usize,
    pub no_input: usize,
    pub transcriptions: usize,
    pub transcription_errors: usize,
    pub classifications: usize,
    pub inference_errors: usize,
    pub toxic_verdicts: usize,
    pub narrations: usize,
    pub narration_failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let d = PipelineDiagnostics::default();
        assert_eq!(d.snapshot(), DiagnosticsSnapshot::default());

        d.record_request();
        d.record_request();
        d.record_toxic();
        d.record_narration_failure();

        let snap = d.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.toxic_verdicts, 1);
        assert_eq!(snap.narration_failures, 1);
        assert_eq!(snap.narrations, 0);
    }
}
