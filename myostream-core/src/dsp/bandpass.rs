//! Zero-phase Butterworth band-pass filtering.
//!
//! The band-pass is realised as an order-`n` Butterworth high-pass at the low
//! cutoff cascaded with an order-`n` Butterworth low-pass at the high cutoff,
//! each a chain of biquad sections (transposed direct form II) with the
//! Butterworth pole Qs. Zero phase comes from running the cascade forward,
//! then backward over the reversed output with fresh section state.
//!
//! Every failure mode degrades to passthrough: the input is returned
//! unchanged and the degradation is logged, never surfaced as an error.
//! Coefficients and section state are kept in f64 — the default band
//! (1 Hz at a 1 kHz rate) sits at a normalized frequency where f32
//! recursion noise is audible in the output.

use std::f64::consts::PI;

use tracing::{debug, warn};

/// Outcome of one band-pass application.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterApplied {
    /// The filter ran and produced finite output.
    Filtered(Vec<f32>),
    /// Filtering was skipped or failed; the input is returned unchanged.
    Passthrough(Vec<f32>),
}

impl FilterApplied {
    pub fn into_samples(self) -> Vec<f32> {
        match self {
            FilterApplied::Filtered(v) | FilterApplied::Passthrough(v) => v,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, FilterApplied::Passthrough(_))
    }
}

#[derive(Clone, Copy, Debug)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

#[derive(Clone, Copy, Debug)]
struct BiquadSection {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadSection {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        // Transposed direct form II
        let y = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * y + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * y;
        y
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}

fn lowpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = (w0 / 2.0).sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 - cos_w0) * 0.5;
    let b1 = 1.0 - cos_w0;
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn highpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = (w0 / 2.0).sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 + cos_w0) * 0.5;
    let b1 = -(1.0 + cos_w0);
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

/// First-order section for odd filter orders, expressed as a degenerate
/// biquad (b2 = a2 = 0) so the cascade stays homogeneous.
fn first_order(freq_hz: f64, sample_rate_hz: f64, high_pass: bool) -> BiquadCoeffs {
    let k = (PI * freq_hz / sample_rate_hz).tan();
    let norm = 1.0 / (k + 1.0);
    let a1 = (k - 1.0) * norm;
    if high_pass {
        BiquadCoeffs {
            b0: norm,
            b1: -norm,
            b2: 0.0,
            a1,
            a2: 0.0,
        }
    } else {
        BiquadCoeffs {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1,
            a2: 0.0,
        }
    }
}

/// Butterworth section Qs for one order-`order` low- or high-pass:
/// conjugate pole pairs at angle phi from the negative real axis give
/// Q = 1 / (2 cos phi); odd orders leave one real pole for a first-order
/// section.
fn butterworth_sections(freq_hz: f64, sample_rate_hz: f64, order: usize, high_pass: bool) -> Vec<BiquadSection> {
    let n = order as f64;
    let pairs = order / 2;
    let mut sections = Vec::with_capacity(pairs + order % 2);

    for m in 0..pairs {
        let phi = if order % 2 == 0 {
            PI * (2.0 * m as f64 + 1.0) / (2.0 * n)
        } else {
            PI * (m as f64 + 1.0) / n
        };
        let q = 1.0 / (2.0 * phi.cos());
        let coeffs = if high_pass {
            highpass(freq_hz, sample_rate_hz, q)
        } else {
            lowpass(freq_hz, sample_rate_hz, q)
        };
        sections.push(BiquadSection::new(coeffs));
    }

    if order % 2 == 1 {
        sections.push(BiquadSection::new(first_order(
            freq_hz,
            sample_rate_hz,
            high_pass,
        )));
    }

    sections
}

fn run_cascade(sections: &mut [BiquadSection], input: impl Iterator<Item = f64>) -> Vec<f64> {
    input
        .map(|mut v| {
            for section in sections.iter_mut() {
                v = section.process(v);
            }
            v
        })
        .collect()
}

/// Apply a zero-phase Butterworth band-pass of the given order.
///
/// Degrades to [`FilterApplied::Passthrough`] (input unchanged, logged)
/// when the input is shorter than `2 * order`, when the cutoffs are not
/// `0 < low < high < Nyquist`, or when the output is not finite. None of
/// these are errors for the caller.
pub fn bandpass(
    data: &[f32],
    sample_rate_hz: f32,
    low_cut_hz: f32,
    high_cut_hz: f32,
    order: usize,
) -> FilterApplied {
    if order == 0 || data.len() < 2 * order {
        // Too little history to filter meaningfully; common right after a
        // stream starts, so keep it quiet.
        debug!(
            len = data.len(),
            order, "band-pass skipped: input shorter than 2x filter order"
        );
        return FilterApplied::Passthrough(data.to_vec());
    }

    let fs = sample_rate_hz as f64;
    let low = low_cut_hz as f64;
    let high = high_cut_hz as f64;
    let nyquist = fs / 2.0;
    if !(fs.is_finite() && fs > 0.0) || !(0.0 < low && low < high && high < nyquist) {
        warn!(
            sample_rate_hz,
            low_cut_hz, high_cut_hz, "band-pass degraded to passthrough: invalid cutoffs"
        );
        return FilterApplied::Passthrough(data.to_vec());
    }

    let mut sections = butterworth_sections(low, fs, order, true);
    sections.extend(butterworth_sections(high, fs, order, false));

    // Forward pass, then the reverse over the reversed forward output with
    // fresh section state; un-reversing yields the zero-phase result.
    let forward = run_cascade(&mut sections, data.iter().map(|&v| v as f64));
    for section in sections.iter_mut() {
        section.reset();
    }
    let mut backward = run_cascade(&mut sections, forward.into_iter().rev());
    backward.reverse();

    let out: Vec<f32> = backward.into_iter().map(|v| v as f32).collect();
    if out.iter().any(|v| !v.is_finite()) {
        warn!(
            len = data.len(),
            order, "band-pass degraded to passthrough: non-finite output"
        );
        return FilterApplied::Passthrough(data.to_vec());
    }

    FilterApplied::Filtered(out)
}
