//! Multi-label toxicity classifier on a HuggingFace sequence-classification
//! export.
//!
//! ## Model I/O
//!
//! | Name             | Shape    | DType | Direction |
//! |------------------|----------|-------|-----------|
//! | `input_ids`      | `[1, n]` | i64   | in        |
//! | `attention_mask` | `[1, n]` | i64   | in        |
//! | `token_type_ids` | `[1, n]` | i64   | in (BERT-style exports only) |
//! | `logits`         | `[1, 6]` | f32   | out       |
//!
//! `n` is capped at `max_tokens` by tokenizer truncation (first tokens kept).
//! Logits go through independent sigmoids, never a softmax.

use std::path::{Path, PathBuf};

use ort::session::{Session, SessionInputValue};
use ort::value::TensorRef;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::{create_session, log_session_io, models_dir, require_files, DEFAULT_CLASSIFIER_MODEL};
use crate::engine::DEFAULT_MAX_TOKENS;
use crate::error::{DetoxError, Result};
use crate::inference::Classifier;
use crate::scores::CategoryScores;

#[derive(Debug, Clone)]
pub struct OnnxClassifierConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    /// Maximum tokens fed to the model, special tokens included.
    pub max_tokens: usize,
}

impl OnnxClassifierConfig {
    /// Standard layout: `<dir>/model.onnx` + `<dir>/tokenizer.json`.
    pub fn from_dir(dir: &Path, max_tokens: usize) -> Self {
        Self {
            model_path: dir.join("model.onnx"),
            tokenizer_path: dir.join("tokenizer.json"),
            max_tokens,
        }
    }

    pub fn files_present(&self) -> bool {
        self.model_path.exists() && self.tokenizer_path.exists()
    }
}

impl Default for OnnxClassifierConfig {
    fn default() -> Self {
        Self::from_dir(
            &models_dir().join(DEFAULT_CLASSIFIER_MODEL),
            DEFAULT_MAX_TOKENS,
        )
    }
}

pub struct OnnxClassifier {
    config: OnnxClassifierConfig,
    session: Option<Session>,
    tokenizer: Option<Tokenizer>,
    /// Whether the graph declares a `token_type_ids` input.
    wants_token_type_ids: bool,
}

impl OnnxClassifier {
    pub fn new(config: OnnxClassifierConfig) -> Self {
        Self {
            config,
            session: None,
            tokenizer: None,
            wants_token_type_ids: false,
        }
    }

    fn load_tokenizer(&self) -> Result<Tokenizer> {
        let mut tokenizer = Tokenizer::from_file(&self.config.tokenizer_path)
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?;
        configure_tokenizer(&mut tokenizer, self.config.max_tokens)?;
        Ok(tokenizer)
    }
}

/// Keep the first `max_tokens` tokens of a single sequence, no padding.
fn configure_tokenizer(tokenizer: &mut Tokenizer, max_tokens: usize) -> Result<()> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_tokens.max(1),
            ..Default::default()
        }))
        .map_err(|e| DetoxError::OnnxSession(e.to_string()))?;
    tokenizer.with_padding(None);
    Ok(())
}

impl Classifier for OnnxClassifier {
    fn warm_up(&mut self) -> Result<()> {
        info!("=== Detox toxicity classifier startup ===");
        require_files(&[&self.config.model_path, &self.config.tokenizer_path])?;

        let session = create_session(&self.config.model_path)?;
        log_session_io("classifier", &session);
        self.wants_token_type_ids = session
            .inputs()
            .iter()
            .any(|i| i.name() == "token_type_ids");
        self.session = Some(session);

        let tokenizer = self.load_tokenizer()?;
        info!(
            vocab = tokenizer.get_vocab_size(true),
            max_tokens = self.config.max_tokens,
            token_type_ids = self.wants_token_type_ids,
            "classifier tokenizer loaded"
        );
        self.tokenizer = Some(tokenizer);

        self.classify("warm up")?;
        info!("=== classifier warm-up complete ===");
        Ok(())
    }

    fn classify(&mut self, text: &str) -> Result<CategoryScores> {
        let (Some(session), Some(tokenizer)) = (self.session.as_mut(), self.tokenizer.as_ref())
        else {
            return Err(DetoxError::Inference(
                "classifier not loaded — call warm_up()".into(),
            ));
        };

        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| DetoxError::Inference(e.to_string()))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&v| v as i64).collect();
        if ids.is_empty() {
            return Err(DetoxError::Inference("text produced no tokens".into()));
        }
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&v| v as i64)
            .collect();
        let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&v| v as i64).collect();
        let shape = [1_i64, ids.len() as i64];

        debug!(tokens = ids.len(), "classifier input encoded");

        let mut inputs: Vec<(String, SessionInputValue<'_>)> = Vec::with_capacity(3);
        let input_ids = TensorRef::from_array_view((shape, ids.as_slice()))
            .map_err(|e| DetoxError::Inference(e.to_string()))?;
        inputs.push(("input_ids".into(), SessionInputValue::from(input_ids)));
        let attention_mask = TensorRef::from_array_view((shape, mask.as_slice()))
            .map_err(|e| DetoxError::Inference(e.to_string()))?;
        inputs.push((
            "attention_mask".into(),
            SessionInputValue::from(attention_mask),
        ));
        if self.wants_token_type_ids {
            let token_type_ids = TensorRef::from_array_view((shape, type_ids.as_slice()))
                .map_err(|e| DetoxError::Inference(e.to_string()))?;
            inputs.push((
                "token_type_ids".into(),
                SessionInputValue::from(token_type_ids),
            ));
        }

        let outputs = session
            .run(inputs)
            .map_err(|e| DetoxError::Inference(e.to_string()))?;
        let (_, logits) = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetoxError::Inference(e.to_string()))?;

        CategoryScores::from_logits(logits)
    }
}
