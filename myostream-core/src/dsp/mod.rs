//! On-demand signal conditioning.
//!
//! Pure functions over sample slices — no shared state, safe to call from
//! any number of reader threads concurrently. Consumers pick a
//! [`SignalKind`] and go through [`select`]; the buffer lock is never held
//! while any of this runs.

pub mod bandpass;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DspParams;

pub use bandpass::{bandpass, FilterApplied};

/// Which derived representation of a channel the consumer wants.
///
/// Held by the consumer (e.g. a plot widget), passed per call — the core
/// stores no selector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Samples exactly as buffered.
    Raw,
    /// Zero-phase band-pass filtered.
    Bandpass,
    /// Sliding-window RMS envelope.
    Rms,
}

/// Single entry point for consumers: dispatch to identity, band-pass, or
/// sliding RMS per `kind`.
pub fn select(data: Vec<f32>, kind: SignalKind, params: &DspParams) -> Vec<f32> {
    match kind {
        SignalKind::Raw => data,
        SignalKind::Bandpass => {
            match bandpass(
                &data,
                params.sample_rate_hz,
                params.low_cut_hz,
                params.high_cut_hz,
                params.filter_order,
            ) {
                FilterApplied::Filtered(out) => out,
                FilterApplied::Passthrough(_) => {
                    debug!(len = data.len(), "returning unfiltered samples");
                    data
                }
            }
        }
        SignalKind::Rms => sliding_rms(&data, params.rms_half_window),
    }
}

/// Sliding-window RMS envelope. Output length always equals input length.
///
/// Inputs shorter than one full window (`2 * half_window + 1`) collapse to
/// the whole-input RMS repeated at every position. Otherwise each output
/// sample is the RMS over `[i - half_window, i + half_window]` clipped to
/// the sequence bounds — edge windows are truncated, not padded, so edge
/// values aggregate fewer samples than interior ones.
pub fn sliding_rms(data: &[f32], half_window: usize) -> Vec<f32> {
    if data.is_empty() {
        return Vec::new();
    }

    if data.len() < 2 * half_window + 1 {
        let whole = rms(data);
        return vec![whole; data.len()];
    }

    let len = data.len();
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let start = i.saturating_sub(half_window);
        let end = (i + half_window + 1).min(len);
        out.push(rms(&data[start..end]));
    }
    out
}

fn rms(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = data.iter().map(|v| v * v).sum();
    (sum_sq / data.len() as f32).sqrt()
}

/// Summary statistics over one channel's raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalStats {
    pub mean: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub rms: f32,
    pub samples: usize,
}

impl SignalStats {
    /// `None` for empty input.
    pub fn from_samples(data: &[f32]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let n = data.len() as f32;
        let mean = data.iter().sum::<f32>() / n;
        let variance = data.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in data {
            min = min.min(v);
            max = max.max(v);
        }
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            rms: rms(data),
            samples: data.len(),
        })
    }
}
