//! ONNX Runtime backends via the `ort` crate.
//!
//! | Backend | Files | Export |
//! |---------|-------|--------|
//! | `OnnxClassifier` | `model.onnx`, `tokenizer.json` | HF `optimum` sequence classification |
//! | `WhisperTranscriber` | `encoder_model.onnx`, `decoder_model.onnx`, `tokenizer.json` | HF `optimum` Whisper (no KV cache) |
//!
//! Models live under one directory per model inside the models dir:
//! `DETOX_MODEL_DIR` if set, otherwise the platform data directory.

pub mod classifier;
mod mel;
pub mod whisper;

pub use classifier::{OnnxClassifier, OnnxClassifierConfig};
pub use whisper::{WhisperConfig, WhisperTranscriber};

use std::path::{Path, PathBuf};

use ort::{
    ep,
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
};
use tracing::{info, warn};

use crate::error::{DetoxError, Result};

/// Sub-directory holding the toxicity classifier export.
pub const DEFAULT_CLASSIFIER_MODEL: &str = "nontoxicme";
/// Sub-directory holding the Whisper export.
pub const DEFAULT_TRANSCRIBER_MODEL: &str = "whisper-tiny";

/// Root directory that holds one sub-directory per model.
pub fn models_dir() -> PathBuf {
    match std::env::var("DETOX_MODEL_DIR") {
        Ok(explicit) if !explicit.trim().is_empty() => PathBuf::from(explicit.trim()),
        _ => default_models_dir(),
    }
}

pub fn default_models_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(|p| PathBuf::from(p).join("Detox").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("detox")
            .join("models")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrtExecutionPreference {
    Auto,
    Cpu,
    DirectML,
}

fn ort_execution_preference() -> OrtExecutionPreference {
    match std::env::var("DETOX_ORT_EP")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "cpu" => OrtExecutionPreference::Cpu,
        "dml" | "directml" => OrtExecutionPreference::DirectML,
        _ => OrtExecutionPreference::Auto,
    }
}

/// Build a session for `model_path` with the configured threading and EP.
pub(crate) fn create_session(model_path: &Path) -> Result<Session> {
    let pref = ort_execution_preference();
    let logical_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let intra_threads = std::env::var("DETOX_ORT_INTRA_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or_else(|| logical_cores.clamp(1, 8))
        .clamp(1, 32);

    let builder = SessionBuilder::new()
        .map_err(|e| DetoxError::OnnxSession(e.to_string()))?
        .with_intra_threads(intra_threads)
        .map_err(|e| DetoxError::OnnxSession(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::All)
        .map_err(|e| DetoxError::OnnxSession(e.to_string()))?;

    #[cfg(target_os = "windows")]
    let builder = match pref {
        OrtExecutionPreference::Cpu => builder
            .with_execution_providers([ep::CPU::default().build()])
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?,
        OrtExecutionPreference::DirectML => builder
            .with_execution_providers([
                ep::DirectML::default()
                    .with_device_id(0)
                    .build()
                    .error_on_failure(),
                ep::CPU::default().build(),
            ])
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?,
        OrtExecutionPreference::Auto => builder
            .with_execution_providers([
                ep::DirectML::default()
                    .with_device_id(0)
                    .build()
                    .fail_silently(),
                ep::CPU::default().build(),
            ])
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?,
    };

    #[cfg(not(target_os = "windows"))]
    let builder = {
        if pref == OrtExecutionPreference::DirectML {
            warn!("DETOX_ORT_EP=directml requested on non-Windows host; using CPU EP");
        }
        builder
            .with_execution_providers([ep::CPU::default().build()])
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?
    };

    let session = builder
        .commit_from_file(model_path)
        .map_err(|e| DetoxError::OnnxSession(e.to_string()))?;

    info!(
        model = %model_path.display(),
        intra_threads,
        logical_cores,
        ep = ?pref,
        "ONNX session created"
    );
    Ok(session)
}

/// Fail with `ModelNotFound` for the first missing path, logging sizes.
pub(crate) fn require_files(paths: &[&Path]) -> Result<()> {
    for path in paths {
        if !path.exists() {
            warn!("  {:?}: NOT FOUND", path);
            return Err(DetoxError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let size_mb = std::fs::metadata(path)
            .map(|m| m.len() as f64 / 1_048_576.0)
            .unwrap_or(0.0);
        info!("  {:?}: {:.2} MB", path, size_mb);
    }
    Ok(())
}

pub(crate) fn log_session_io(name: &str, session: &Session) {
    let inputs: Vec<&str> = session.inputs().iter().map(|i| i.name()).collect();
    let outputs: Vec<&str> = session.outputs().iter().map(|o| o.name()).collect();
    info!(model = name, ?inputs, ?outputs, "session io");
}
