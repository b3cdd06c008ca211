use thiserror::Error;

/// All errors produced by detox-core.
#[derive(Debug, Error)]
pub enum DetoxError {
    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("audio decode error: {0}")]
    AudioDecode(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("narration artifact not found: {0}")]
    NarrationNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DetoxError {
    /// True for failures that only affect turning audio into text.
    ///
    /// The pipeline downgrades these to "no recognised text" instead of
    /// failing the whole request.
    pub fn is_transcription_failure(&self) -> bool {
        matches!(
            self,
            DetoxError::Transcription(_) | DetoxError::AudioDecode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DetoxError>;
