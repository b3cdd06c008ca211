//! Shared HTTP state and rolling latency metrics.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use detox_core::{DecisionPipeline, DiagnosticsSnapshot, StageTimings};
use parking_lot::Mutex;
use serde::Serialize;

/// Latency samples kept per stage.
const WINDOW_CAP: usize = 512;

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DecisionPipeline>,
    /// Wall-clock budget for one `/api/analyze` call.
    pub request_timeout: Duration,
    /// Where uploaded clips are spooled for the transcriber.
    pub upload_dir: PathBuf,
    pub perf_metrics: Arc<Mutex<PerfMetrics>>,
}

impl AppState {
    pub fn new(pipeline: Arc<DecisionPipeline>, request_timeout: Duration, upload_dir: PathBuf) -> Self {
        Self {
            pipeline,
            request_timeout,
            upload_dir,
            perf_metrics: Arc::new(Mutex::new(PerfMetrics::default())),
        }
    }

    pub fn perf_snapshot(&self) -> PerfSnapshot {
        PerfSnapshot {
            pipeline: self.pipeline.diagnostics_snapshot(),
            pending_narrations: self.pipeline.store().len(),
            latency: self.perf_metrics.lock().snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSnapshot {
    pub pipeline: DiagnosticsSnapshot,
    pub pending_narrations: usize,
    pub latency: PerfMetricsSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfStageSnapshot {
    /// Lifetime sample count. The statistics cover the last `WINDOW_CAP`.
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Default)]
pub struct PerfMetrics {
    transcribe_ms: StageWindow,
    classify_ms: StageWindow,
    narrate_ms: StageWindow,
    total_ms: StageWindow,
}

impl PerfMetrics {
    /// Record every stage that ran for one request.
    pub fn record(&mut self, timings: &StageTimings) {
        if let Some(ms) = timings.transcribe_ms {
            self.transcribe_ms.record(ms);
        }
        if let Some(ms) = timings.classify_ms {
            self.classify_ms.record(ms);
        }
        if let Some(ms) = timings.narrate_ms {
            self.narrate_ms.record(ms);
        }
        self.total_ms.record(timings.total_ms);
    }

    pub fn snapshot(&self) -> PerfMetricsSnapshot {
        PerfMetricsSnapshot {
            transcribe_ms: self.transcribe_ms.snapshot(),
            classify_ms: self.classify_ms.snapshot(),
            narrate_ms: self.narrate_ms.snapshot(),
            total_ms: self.total_ms.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfMetricsSnapshot {
    pub transcribe_ms: PerfStageSnapshot,
    pub classify_ms: PerfStageSnapshot,
    pub narrate_ms: PerfStageSnapshot,
    pub total_ms: PerfStageSnapshot,
}

#[derive(Debug)]
struct StageWindow {
    samples: VecDeque<f64>,
    count: usize,
}

impl Default for StageWindow {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_CAP),
            count: 0,
        }
    }
}

impl StageWindow {
    fn record(&mut self, elapsed_ms: f64) {
        let v = if elapsed_ms.is_finite() {
            elapsed_ms.max(0.0)
        } else {
            0.0
        };
        if self.samples.len() == WINDOW_CAP {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(v);
        self.count = self.count.saturating_add(1);
    }

    fn snapshot(&self) -> PerfStageSnapshot {
        if self.samples.is_empty() {
            return PerfStageSnapshot {
                count: 0,
                mean_ms: 0.0,
                p50_ms: 0.0,
                p95_ms: 0.0,
                p99_ms: 0.0,
                max_ms: 0.0,
            };
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();

        let percentile = |p: f64| -> f64 {
            let idx = ((n - 1) as f64 * p).round() as usize;
            sorted[idx.min(n - 1)]
        };

        PerfStageSnapshot {
            count: self.count,
            mean_ms: sorted.iter().sum::<f64>() / n as f64,
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
            max_ms: sorted[n - 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_is_all_zero() {
        let snap = StageWindow::default().snapshot();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.max_ms, 0.0);
    }

    #[test]
    fn percentiles_over_known_samples() {
        let mut window = StageWindow::default();
        for v in 1..=100 {
            window.record(v as f64);
        }
        let snap = window.snapshot();
        assert_eq!(snap.count, 100);
        assert_eq!(snap.p50_ms, 51.0);
        assert_eq!(snap.p95_ms, 95.0);
        assert_eq!(snap.max_ms, 100.0);
        assert!((snap.mean_ms - 50.5).abs() < 1e-9);
    }

    #[test]
    fn window_forgets_old_samples_but_counts_them() {
        let mut window = StageWindow::default();
        window.record(10_000.0);
        for _ in 0..WINDOW_CAP {
            window.record(1.0);
        }
        let snap = window.snapshot();
        assert_eq!(snap.count, WINDOW_CAP + 1);
        assert_eq!(snap.max_ms, 1.0);
    }

    #[test]
    fn skipped_stages_are_not_recorded() {
        let mut metrics = PerfMetrics::default();
        metrics.record(&StageTimings {
            transcribe_ms: None,
            classify_ms: Some(4.0),
            narrate_ms: Some(20.0),
            total_ms: 25.0,
        });
        let snap = metrics.snapshot();
        assert_eq!(snap.transcribe_ms.count, 0);
        assert_eq!(snap.classify_ms.count, 1);
        assert_eq!(snap.total_ms.max_ms, 25.0);
    }

    #[test]
    fn non_finite_samples_clamp_to_zero() {
        let mut window = StageWindow::default();
        window.record(f64::NAN);
        window.record(-3.0);
        assert_eq!(window.snapshot().max_ms, 0.0);
    }
}
