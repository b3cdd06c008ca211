//! Whisper speech-to-text on split encoder/decoder ONNX exports.
//!
//! ## Model I/O
//!
//! | Session | Name                    | Shape             | Direction |
//! |---------|-------------------------|-------------------|-----------|
//! | encoder | `input_features`        | `[1, 80, 3000]`   | in        |
//! | encoder | `last_hidden_state`     | `[1, 1500, d]`    | out       |
//! | decoder | `input_ids`             | `[1, seq]` (i64)  | in        |
//! | decoder | `encoder_hidden_states` | `[1, 1500, d]`    | in        |
//! | decoder | `logits`                | `[1, seq, vocab]` | out       |
//!
//! Decoding is greedy without a KV cache: the whole token sequence is fed
//! back every step. Clips are English-only and truncated to 30 s.

use std::path::{Path, PathBuf};

use ndarray::Array3;
use ort::session::Session;
use ort::value::{TensorRef, Value};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::mel::{MelFrontend, N_FRAMES, N_MELS, WINDOW_SAMPLES};
use super::{create_session, log_session_io, models_dir, require_files, DEFAULT_TRANSCRIBER_MODEL};
use crate::audio::{load_wav, WHISPER_SAMPLE_RATE};
use crate::error::{DetoxError, Result};
use crate::inference::Transcriber;

/// Decoder length cap (Whisper's `max_target_positions / 2`).
const MAX_NEW_TOKENS: usize = 224;
/// Stop once the same token has been emitted this many times in a row.
const REPEAT_LIMIT: usize = 8;

// Fallback ids for the multilingual vocabulary.
const FALLBACK_SOT: i64 = 50_258;
const FALLBACK_EN: i64 = 50_259;
const FALLBACK_TRANSCRIBE: i64 = 50_359;
const FALLBACK_NO_TIMESTAMPS: i64 = 50_363;
const FALLBACK_EOT: i64 = 50_257;
/// BPE id of a lone space; never a useful first token.
const BLANK: i64 = 220;

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub encoder_path: PathBuf,
    pub decoder_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl WhisperConfig {
    /// `<dir>/encoder_model.onnx`, `<dir>/decoder_model.onnx`, `<dir>/tokenizer.json`.
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            encoder_path: dir.join("encoder_model.onnx"),
            decoder_path: dir.join("decoder_model.onnx"),
            tokenizer_path: dir.join("tokenizer.json"),
        }
    }

    pub fn files_present(&self) -> bool {
        self.encoder_path.exists() && self.decoder_path.exists() && self.tokenizer_path.exists()
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self::from_dir(&models_dir().join(DEFAULT_TRANSCRIBER_MODEL))
    }
}

/// Special token ids resolved from the tokenizer at warm-up.
#[derive(Debug, Clone)]
struct SpecialTokens {
    prompt: [i64; 4],
    eot: i64,
    /// First timestamp token (`<|0.00|>`); everything at or above is suppressed.
    timestamp_begin: Option<i64>,
}

impl SpecialTokens {
    fn resolve(tokenizer: &Tokenizer) -> Self {
        let id = |token: &str, fallback: i64| {
            tokenizer
                .token_to_id(token)
                .map(|id| id as i64)
                .unwrap_or(fallback)
        };
        Self {
            prompt: [
                id("<|startoftranscript|>", FALLBACK_SOT),
                id("<|en|>", FALLBACK_EN),
                id("<|transcribe|>", FALLBACK_TRANSCRIBE),
                id("<|notimestamps|>", FALLBACK_NO_TIMESTAMPS),
            ],
            eot: id("<|endoftext|>", FALLBACK_EOT),
            timestamp_begin: tokenizer.token_to_id("<|0.00|>").map(|id| id as i64),
        }
    }

    fn suppressed(&self, token: i64, step: usize) -> bool {
        if step == 0 && (token == BLANK || token == self.eot) {
            return true;
        }
        if self.timestamp_begin.is_some_and(|ts| token >= ts) {
            return true;
        }
        // Remaining specials sit between EOT and the first timestamp.
        token > self.eot && self.timestamp_begin.map_or(true, |ts| token < ts)
    }
}

pub struct WhisperTranscriber {
    config: WhisperConfig,
    encoder: Option<Session>,
    decoder: Option<Session>,
    tokenizer: Option<Tokenizer>,
    specials: Option<SpecialTokens>,
    mel: MelFrontend,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            config,
            encoder: None,
            decoder: None,
            tokenizer: None,
            specials: None,
            mel: MelFrontend::new(WHISPER_SAMPLE_RATE),
        }
    }

    fn greedy_decode(
        decoder: &mut Session,
        specials: &SpecialTokens,
        hidden: &[f32],
        hidden_shape: [i64; 3],
    ) -> Result<Vec<u32>> {
        let mut tokens: Vec<i64> = specials.prompt.to_vec();
        let mut emitted: Vec<u32> = Vec::new();
        let mut run = 0usize;

        for step in 0..MAX_NEW_TOKENS {
            let seq = tokens.len();
            let input_ids = TensorRef::from_array_view(([1_i64, seq as i64], tokens.as_slice()))
                .map_err(|e| DetoxError::Transcription(e.to_string()))?;
            let encoder_hidden_states = TensorRef::from_array_view((hidden_shape, hidden))
                .map_err(|e| DetoxError::Transcription(e.to_string()))?;
            let outputs = decoder
                .run(ort::inputs![
                    "input_ids"             => input_ids,
                    "encoder_hidden_states" => encoder_hidden_states,
                ])
                .map_err(|e| DetoxError::Transcription(e.to_string()))?;
            let (_, logits) = outputs["logits"]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetoxError::Transcription(e.to_string()))?;

            let vocab = logits.len() / seq;
            let last = &logits[(seq - 1) * vocab..seq * vocab];
            let Some(next) = last
                .iter()
                .enumerate()
                .filter(|(i, _)| !specials.suppressed(*i as i64, step))
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i as i64)
            else {
                break;
            };

            if next == specials.eot {
                break;
            }
            run = if tokens.last() == Some(&next) { run + 1 } else { 1 };
            if run >= REPEAT_LIMIT {
                debug!(token = next, "decoder stuck on a repeated token; stopping");
                break;
            }
            tokens.push(next);
            emitted.push(next as u32);
        }
        Ok(emitted)
    }
}

impl Transcriber for WhisperTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        info!("=== Detox Whisper transcriber startup ===");
        require_files(&[
            &self.config.encoder_path,
            &self.config.decoder_path,
            &self.config.tokenizer_path,
        ])?;

        let mut encoder = create_session(&self.config.encoder_path)?;
        log_session_io("whisper-encoder", &encoder);
        let decoder = create_session(&self.config.decoder_path)?;
        log_session_io("whisper-decoder", &decoder);

        let tokenizer = Tokenizer::from_file(&self.config.tokenizer_path)
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?;
        let specials = SpecialTokens::resolve(&tokenizer);
        info!(
            vocab = tokenizer.get_vocab_size(true),
            prompt = ?specials.prompt,
            eot = specials.eot,
            "whisper tokenizer loaded"
        );

        let dummy = Array3::<f32>::zeros((1, N_MELS, N_FRAMES));
        let dummy_val = Value::from_array(dummy)
            .map_err(|e: ort::Error| DetoxError::OnnxSession(e.to_string()))?;
        encoder
            .run(ort::inputs!["input_features" => dummy_val])
            .map_err(|e| DetoxError::OnnxSession(e.to_string()))?;

        self.encoder = Some(encoder);
        self.decoder = Some(decoder);
        self.tokenizer = Some(tokenizer);
        self.specials = Some(specials);
        info!("=== Whisper warm-up complete ===");
        Ok(())
    }

    fn transcribe(&mut self, audio: &Path) -> Result<String> {
        let clip = load_wav(audio, WHISPER_SAMPLE_RATE)?;
        if clip.samples.len() > WINDOW_SAMPLES {
            warn!(
                secs = clip.duration_secs(),
                "clip longer than 30 s; transcribing the first window only"
            );
        }
        let mel = self.mel.log_mel(&clip.samples);

        let (Some(encoder), Some(decoder), Some(tokenizer), Some(specials)) = (
            self.encoder.as_mut(),
            self.decoder.as_mut(),
            self.tokenizer.as_ref(),
            self.specials.as_ref(),
        ) else {
            return Err(DetoxError::Transcription(
                "transcriber not loaded — call warm_up()".into(),
            ));
        };

        let mel_val = Value::from_array(mel)
            .map_err(|e: ort::Error| DetoxError::Transcription(e.to_string()))?;
        let enc_out = encoder
            .run(ort::inputs!["input_features" => mel_val])
            .map_err(|e| DetoxError::Transcription(e.to_string()))?;
        let (shape, data) = enc_out["last_hidden_state"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetoxError::Transcription(e.to_string()))?;
        if shape.len() < 3 {
            return Err(DetoxError::Transcription(format!(
                "unexpected encoder output rank {}",
                shape.len()
            )));
        }
        let hidden_shape = [1_i64, shape[1], shape[2]];
        let hidden = data.to_vec();
        drop(enc_out);

        let ids = Self::greedy_decode(decoder, specials, &hidden, hidden_shape)?;
        let text = tokenizer
            .decode(&ids, true)
            .map_err(|e| DetoxError::Transcription(e.to_string()))?;
        let text = text.trim().to_string();
        debug!(tokens = ids.len(), chars = text.len(), "whisper transcript decoded");
        Ok(text)
    }
}
