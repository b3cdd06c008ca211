//! Whisper log-mel frontend.
//!
//! | Parameter       | Value          |
//! |-----------------|----------------|
//! | Hann window     | 400 samples    |
//! | FFT size        | 400            |
//! | Frequency bins  | 201            |
//! | Hop length      | 160 (10 ms)    |
//! | Mel bands       | 80 (Slaney)    |
//! | Mel range       | 0–8 000 Hz     |
//! | Frames          | 3 000 (30 s)   |

use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::Array3;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub(super) const N_FFT: usize = 400;
const N_FREQS: usize = N_FFT / 2 + 1;
const HOP: usize = 160;
pub(super) const N_MELS: usize = 80;
pub(super) const N_FRAMES: usize = 3_000;
/// 30 s at 16 kHz.
pub(super) const WINDOW_SAMPLES: usize = 480_000;

pub(super) struct MelFrontend {
    window: Vec<f32>,
    filters: Vec<Vec<f32>>,
    fft: Arc<dyn Fft<f32>>,
}

impl MelFrontend {
    pub(super) fn new(sample_rate: u32) -> Self {
        Self {
            window: hann_window(N_FFT),
            filters: slaney_filterbank(sample_rate, 0.0, 8_000.0),
            fft: FftPlanner::<f32>::new().plan_fft_forward(N_FFT),
        }
    }

    /// Log-mel features `[1, 80, 3000]` for up to 30 s of 16 kHz audio.
    ///
    /// Frames past the end of the clip stay silent instead of being
    /// transformed.
    pub(super) fn log_mel(&self, samples: &[f32]) -> Array3<f32> {
        let active = samples.len().min(WINDOW_SAMPLES);
        let mut padded = samples[..active].to_vec();
        padded.resize(WINDOW_SAMPLES, 0.0);
        let centered = reflect_pad(&padded, N_FFT / 2);
        let active_frames = ((active + N_FFT + HOP - 1) / HOP).clamp(1, N_FRAMES);

        let mut mel = Array3::<f32>::zeros((1, N_MELS, N_FRAMES));
        let mut spectrum = vec![Complex::new(0.0f32, 0.0); N_FFT];
        let mut power = vec![0.0f32; N_FREQS];

        for frame in 0..active_frames {
            let offset = frame * HOP;
            for (i, slot) in spectrum.iter_mut().enumerate() {
                *slot = Complex::new(centered[offset + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut spectrum);
            for (p, c) in power.iter_mut().zip(&spectrum) {
                *p = c.norm_sqr();
            }
            for (m, filter) in self.filters.iter().enumerate() {
                mel[[0, m, frame]] = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
            }
        }

        mel.mapv_inplace(|v| v.max(1e-10).log10());
        let ceiling = mel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        mel.mapv_inplace(|v| (v.max(ceiling - 8.0) + 4.0) / 4.0);
        mel
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Triangular Slaney-normalised filters, `N_MELS` rows of `N_FREQS` weights.
fn slaney_filterbank(sample_rate: u32, fmin: f32, fmax: f32) -> Vec<Vec<f32>> {
    let (lo, hi) = (hz_to_mel(fmin), hz_to_mel(fmax));
    let edges: Vec<f32> = (0..N_MELS + 2)
        .map(|i| mel_to_hz(lo + (hi - lo) * i as f32 / (N_MELS + 1) as f32))
        .collect();
    let bin_hz = sample_rate as f32 / N_FFT as f32;

    edges
        .windows(3)
        .map(|edge| {
            let (left, center, right) = (edge[0], edge[1], edge[2]);
            let norm = 2.0 / (right - left).max(1e-10);
            (0..N_FREQS)
                .map(|k| {
                    let f = k as f32 * bin_hz;
                    let rising = (f - left) / (center - left).max(1e-10);
                    let falling = (right - f) / (right - center).max(1e-10);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1_000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

fn hz_to_mel(hz: f32) -> f32 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    }
}

/// Mirror `pad` samples on both ends (numpy `reflect` mode).
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let n = samples.len();
    if n < 2 {
        return vec![samples.first().copied().unwrap_or(0.0); n + 2 * pad];
    }
    let last = (n - 1) as isize;
    (-(pad as isize)..(n + pad) as isize)
        .map(|mut i| {
            while i < 0 || i > last {
                i = if i < 0 { -i } else { 2 * last - i };
            }
            samples[i as usize]
        })
        .collect()
}
