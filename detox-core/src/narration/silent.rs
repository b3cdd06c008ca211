//! Offline narrator that emits a short silent WAV.
//!
//! Used when the network backend is disabled so the UI still receives a
//! playable artifact for every verdict.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::{AudioFormat, Narrator, SynthesizedAudio};
use crate::error::{DetoxError, Result};

const SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone)]
pub struct SilentNarrator {
    duration_ms: u32,
}

impl SilentNarrator {
    pub fn new(duration_ms: u32) -> Self {
        Self { duration_ms }
    }
}

impl Default for SilentNarrator {
    fn default() -> Self {
        Self::new(250)
    }
}

impl Narrator for SilentNarrator {
    fn synthesize(&self, _text: &str) -> Result<SynthesizedAudio> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let frames = SAMPLE_RATE as u64 * self.duration_ms as u64 / 1_000;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)
                .map_err(|e| DetoxError::Synthesis(e.to_string()))?;
            for _ in 0..frames {
                writer
                    .write_sample(0i16)
                    .map_err(|e| DetoxError::Synthesis(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| DetoxError::Synthesis(e.to_string()))?;
        }

        Ok(SynthesizedAudio {
            bytes: cursor.into_inner(),
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_readable_wav_of_the_requested_length() {
        let audio = SilentNarrator::new(100)
            .synthesize("Result is Toxic")
            .expect("synthesize");
        assert_eq!(audio.format, AudioFormat::Wav);

        let reader = hound::WavReader::new(Cursor::new(audio.bytes)).expect("wav header");
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.duration(), 1_600);
    }
}
