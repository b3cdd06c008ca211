//! Whole-clip sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Uploaded clips arrive at whatever rate the browser recorded (commonly
//! 44.1 or 48 kHz). The clip is pushed through rubato in fixed blocks, the
//! tail is flushed with a partial call, and the filter delay is trimmed so the
//! output lines up with the input.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{DetoxError, Result};

/// Input frames per rubato call.
const BLOCK: usize = 1_024;

/// Convert `samples` from `from_rate` to `to_rate`.
///
/// Returns a copy of the input when the rates already match.
pub fn resample_clip(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(DetoxError::AudioDecode(format!(
            "invalid sample rate conversion {from_rate} -> {to_rate}"
        )));
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, BLOCK, 1)
        .map_err(|e| DetoxError::AudioDecode(format!("resampler init: {e}")))?;

    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + resampler.output_frames_max());
    let mut block_out = vec![vec![0f32; resampler.output_frames_max()]; 1];

    let mut pos = 0usize;
    while samples.len() - pos >= BLOCK {
        let (consumed, produced) = resampler
            .process_into_buffer(&[&samples[pos..pos + BLOCK]], &mut block_out, None)
            .map_err(|e| DetoxError::AudioDecode(format!("resample: {e}")))?;
        out.extend_from_slice(&block_out[0][..produced]);
        pos += consumed;
    }

    if pos < samples.len() {
        let tail: [&[f32]; 1] = [&samples[pos..]];
        let (_, produced) = resampler
            .process_partial_into_buffer(Some(&tail[..]), &mut block_out, None)
            .map_err(|e| DetoxError::AudioDecode(format!("resample tail: {e}")))?;
        out.extend_from_slice(&block_out[0][..produced]);
    }

    // Drain the filter until the delayed tail has been emitted.
    while out.len() < expected + delay {
        let (_, produced) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut block_out, None)
            .map_err(|e| DetoxError::AudioDecode(format!("resample flush: {e}")))?;
        if produced == 0 {
            break;
        }
        out.extend_from_slice(&block_out[0][..produced]);
    }

    let start = delay.min(out.len());
    let end = (start + expected).min(out.len());
    Ok(out[start..end].to_vec())
}
