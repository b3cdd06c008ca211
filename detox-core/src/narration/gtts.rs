//! Google Translate text-to-speech (the endpoint behind the "listen" button).
//!
//! Each chunk of at most 100 characters becomes one `batchexecute` RPC.
//! The response is a length-prefixed stream of JSON lines; the line that
//! carries the `jQ1olc` RPC id holds base64 MP3 data as a JSON string
//! nested inside another JSON string. MP3 frames are self-delimiting, so
//! chunk payloads are concatenated as-is.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, warn};

use super::{AudioFormat, Narrator, SynthesizedAudio};
use crate::error::{DetoxError, Result};

const RPC_ID: &str = "jQ1olc";
/// Longest chunk the endpoint accepts.
const MAX_CHUNK_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct GoogleTtsConfig {
    /// Spoken language (`en`, `fr`, ...).
    pub lang: String,
    /// Top-level domain of the Translate host (`com`, `co.uk`, ...).
    pub tld: String,
    pub timeout: Duration,
}

impl Default for GoogleTtsConfig {
    fn default() -> Self {
        Self {
            lang: "en".into(),
            tld: "com".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct GoogleTranslateTts {
    config: GoogleTtsConfig,
    client: reqwest::blocking::Client,
}

impl GoogleTranslateTts {
    pub fn new(config: GoogleTtsConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent("Mozilla/5.0 (detox narration)")
            .build()
            .map_err(|e| DetoxError::Synthesis(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://translate.google.{}/_/TranslateWebserverUi/data/batchexecute",
            self.config.tld
        )
    }

    fn synthesize_chunk(&self, chunk: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint())
            .form(&[("f.req", rpc_payload(chunk, &self.config.lang)?)])
            .send()
            .map_err(|e| DetoxError::Synthesis(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetoxError::Synthesis(format!(
                "endpoint returned {status}"
            )));
        }
        let body = response
            .text()
            .map_err(|e| DetoxError::Synthesis(e.to_string()))?;
        decode_response(&body)
    }
}

impl Narrator for GoogleTranslateTts {
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let chunks = split_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(DetoxError::Synthesis("nothing to speak".into()));
        }

        let mut bytes = Vec::new();
        for chunk in &chunks {
            match self.synthesize_chunk(chunk) {
                Ok(mut mp3) => bytes.append(&mut mp3),
                Err(e) => {
                    warn!(error = %e, chunk = %chunk, "narration chunk failed");
                    return Err(e);
                }
            }
        }
        debug!(chunks = chunks.len(), bytes = bytes.len(), "narration synthesized");

        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Mp3,
        })
    }

    fn name(&self) -> &'static str {
        "google-translate"
    }
}

fn rpc_payload(text: &str, lang: &str) -> Result<String> {
    let inner = serde_json::to_string(&serde_json::json!([text, lang, null, "null"]))
        .map_err(|e| DetoxError::Synthesis(e.to_string()))?;
    serde_json::to_string(&serde_json::json!([[[RPC_ID, inner, null, "generic"]]]))
        .map_err(|e| DetoxError::Synthesis(e.to_string()))
}

/// Extract the MP3 bytes from a `batchexecute` response body.
fn decode_response(body: &str) -> Result<Vec<u8>> {
    for line in body.lines().filter(|l| l.contains(RPC_ID)) {
        let Ok(outer) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        let Some(inner) = outer.pointer("/0/2").and_then(|v| v.as_str()) else {
            continue;
        };
        let inner: serde_json::Value = serde_json::from_str(inner)
            .map_err(|e| DetoxError::Synthesis(format!("malformed audio payload: {e}")))?;
        let Some(encoded) = inner.pointer("/0").and_then(|v| v.as_str()) else {
            return Err(DetoxError::Synthesis("response carried no audio".into()));
        };
        return BASE64
            .decode(encoded)
            .map_err(|e| DetoxError::Synthesis(format!("audio is not base64: {e}")));
    }
    Err(DetoxError::Synthesis("no audio stream in response".into()))
}

/// Split on whitespace into chunks of at most `max` characters.
///
/// A single word longer than `max` is hard-split.
fn split_chunks(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = word
                .char_indices()
                .nth(max)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            chunks.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }
        let needed =
            current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
