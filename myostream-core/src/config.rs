//! Static process configuration.
//!
//! One immutable `StreamConfig` is built at startup and handed to the
//! constructors that need it — there are no process-wide globals. Runtime
//! code never mutates it.

use serde::{Deserialize, Serialize};

/// Parameters for the on-demand signal-conditioning transforms.
///
/// Shared read-only by every DSP invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DspParams {
    /// Sampling frequency of the incoming stream (Hz). Default: 1000.
    pub sample_rate_hz: f32,
    /// Band-pass low cutoff (Hz). Default: 1.0.
    pub low_cut_hz: f32,
    /// Band-pass high cutoff (Hz). Default: 100.0.
    pub high_cut_hz: f32,
    /// Band-pass filter order. Default: 4.
    pub filter_order: usize,
    /// Sliding-RMS half-window width in samples (full window is
    /// `2 * rms_half_window + 1`). Default: 25.
    pub rms_half_window: usize,
}

impl Default for DspParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: 1_000.0,
            low_cut_hz: 1.0,
            high_cut_hz: 100.0,
            filter_order: 4,
            rms_half_window: 25,
        }
    }
}

/// Top-level configuration for the stream backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Listen address for the ingestion service. Default: 127.0.0.1.
    pub host: String,
    /// Listen port. `0` binds an ephemeral port (useful in tests).
    /// Default: 12345.
    pub port: u16,
    /// Channels per frame. Default: 32.
    pub channels: usize,
    /// Samples per channel per frame. Default: 18.
    pub samples_per_chunk: usize,
    /// Retention: how many decoded chunks the rolling buffer keeps before
    /// overwriting the oldest. Default: 1000.
    pub capacity_chunks: usize,
    /// Signal-conditioning parameters.
    pub dsp: DspParams,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12_345,
            channels: 32,
            samples_per_chunk: 18,
            capacity_chunks: 1_000,
            dsp: DspParams::default(),
        }
    }
}

impl StreamConfig {
    /// Exact size of one wire frame in bytes: `channels * samples * 4`.
    pub fn frame_len(&self) -> usize {
        self.channels * self.samples_per_chunk * 4
    }
}
