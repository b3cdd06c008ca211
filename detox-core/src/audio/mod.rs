//! Decoding of uploaded clips into model-ready mono PCM.
//!
//! The browser UI records or uploads a WAV file; everything downstream
//! (Whisper frontend, stub transcriber) works on a single mono `f32` channel at
//! a known sample rate.

pub mod resample;

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::{DetoxError, Result};

/// Sample rate expected by the Whisper frontend.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this clip in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Read a WAV file, downmix to mono and resample to `target_rate`.
///
/// # Errors
/// `DetoxError::AudioDecode` if the file is missing, not a WAV, or holds no
/// samples.
pub fn load_wav(path: &Path, target_rate: u32) -> Result<AudioClip> {
    let mut reader = WavReader::open(path)
        .map_err(|e| DetoxError::AudioDecode(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| DetoxError::AudioDecode(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| DetoxError::AudioDecode(e.to_string()))?
        }
    };

    let mono = downmix(&interleaved, channels);
    if mono.is_empty() {
        return Err(DetoxError::AudioDecode(format!(
            "{}: clip contains no samples",
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        channels,
        source_rate = spec.sample_rate,
        target_rate,
        frames = mono.len(),
        "decoded wav clip"
    );

    let samples = resample::resample_clip(&mono, spec.sample_rate, target_rate)?;
    Ok(AudioClip::new(samples, target_rate))
}

/// Average interleaved frames into a single channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
