//! IIR coefficient design for the equalizer's peak and cut stages
//!
//! Pure functions from `(parameters, sample rate)` to normalized biquad
//! coefficients. Peaking bands use the cookbook parametric-EQ form; the
//! cut filters decompose a Butterworth prototype of order
//! `2 * slope.sections()` into cascaded second-order sections, one Q per
//! conjugate pole pair. Identical inputs produce bit-identical output, so
//! the engine can compare snapshots instead of coefficients.
//!
//! Design runs on whichever thread asks for it; nothing here touches
//! filter state.

use crate::domain::params::{ranges, EqSnapshot, Slope};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::trace;

/// Section slots owned by each cut stage. Slopes select a prefix of them.
pub const MAX_CUT_SECTIONS: usize = 4;

/// Normalized transfer-function coefficients for one second-order section.
///
/// Direct Form I convention with `a0` divided out:
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

impl BiquadCoeffs {
    /// Parametric peaking EQ section.
    ///
    /// `gain_db = 0` produces the exact identity set, so a flat band is a
    /// true no-op rather than a filter that merely rounds to unity.
    #[must_use]
    pub fn peaking(sample_rate: f32, freq_hz: f32, q: f32, gain_db: f32) -> Self {
        let freq = design_freq(sample_rate, freq_hz);
        let q = clamp_q(q);
        let gain_db = gain_db.clamp(ranges::GAIN_MIN_DB, ranges::GAIN_MAX_DB);

        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Second-order high-pass section.
    #[must_use]
    pub fn highpass(sample_rate: f32, freq_hz: f32, q: f32) -> Self {
        let freq = design_freq(sample_rate, freq_hz);
        let q = clamp_q(q);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Second-order low-pass section.
    #[must_use]
    pub fn lowpass(sample_rate: f32, freq_hz: f32, q: f32) -> Self {
        let freq = design_freq(sample_rate, freq_hz);
        let q = clamp_q(q);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Coefficients for one variable-order cut stage: four section slots, of
/// which the first `active` are meaningful. Inactive slots hold identity
/// coefficients so a mistaken read still passes audio through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutCoefficients {
    pub sections: [BiquadCoeffs; MAX_CUT_SECTIONS],
    pub active: usize,
}

impl CutCoefficients {
    /// Flat set: no active sections.
    pub fn identity() -> Self {
        Self { sections: [BiquadCoeffs::default(); MAX_CUT_SECTIONS], active: 0 }
    }

    /// Butterworth high-pass of order `2 * slope.sections()`, decomposed
    /// into cascaded second-order sections.
    #[must_use]
    pub fn butterworth_highpass(sample_rate: f32, freq_hz: f32, slope: Slope) -> Self {
        Self::butterworth(sample_rate, freq_hz, slope, BiquadCoeffs::highpass)
    }

    /// Butterworth low-pass of order `2 * slope.sections()`.
    #[must_use]
    pub fn butterworth_lowpass(sample_rate: f32, freq_hz: f32, slope: Slope) -> Self {
        Self::butterworth(sample_rate, freq_hz, slope, BiquadCoeffs::lowpass)
    }

    fn butterworth(
        sample_rate: f32,
        freq_hz: f32,
        slope: Slope,
        section: fn(f32, f32, f32) -> BiquadCoeffs,
    ) -> Self {
        let pairs = slope.sections();
        let order = 2 * pairs;

        let mut sections = [BiquadCoeffs::default(); MAX_CUT_SECTIONS];
        for (pair, slot) in sections.iter_mut().take(pairs).enumerate() {
            *slot = section(sample_rate, freq_hz, butterworth_q(order, pair));
        }

        Self { sections, active: pairs }
    }
}

/// Q of the `pair`-th second-order section of an order-`order` Butterworth
/// cascade, from the analog prototype's pole angles. The product of all
/// pair Qs is 1/sqrt(2), which keeps the cascade at -3 dB at the corner.
fn butterworth_q(order: usize, pair: usize) -> f32 {
    let theta = PI * (2 * pair + 1) as f32 / (2 * order) as f32;
    1.0 / (2.0 * theta.sin())
}

/// Everything the five chain slots consume for one parameter generation.
///
/// `Clone` shares the underlying sets; both channels of the engine hold
/// the same `Arc`s, which is what makes their responses bit-identical.
#[derive(Debug, Clone)]
pub struct ChainCoefficients {
    pub low_cut: Arc<CutCoefficients>,
    pub peaks: [Arc<BiquadCoeffs>; 3],
    pub high_cut: Arc<CutCoefficients>,
}

impl ChainCoefficients {
    /// Flat chain, used before the first parameter-driven design.
    pub fn identity() -> Self {
        Self {
            low_cut: Arc::new(CutCoefficients::identity()),
            peaks: std::array::from_fn(|_| Arc::new(BiquadCoeffs::default())),
            high_cut: Arc::new(CutCoefficients::identity()),
        }
    }

    /// Design all five sets from a snapshot. Deterministic: equal
    /// snapshots yield bit-identical coefficients.
    #[must_use]
    pub fn design(snapshot: &EqSnapshot, sample_rate: f32) -> Self {
        let snapshot = snapshot.clamped();

        Self {
            low_cut: Arc::new(CutCoefficients::butterworth_highpass(
                sample_rate,
                snapshot.low_cut.freq_hz,
                snapshot.low_cut.slope,
            )),
            peaks: snapshot.peaks.map(|peak| {
                Arc::new(BiquadCoeffs::peaking(
                    sample_rate,
                    peak.freq_hz,
                    peak.q,
                    peak.gain_db,
                ))
            }),
            high_cut: Arc::new(CutCoefficients::butterworth_lowpass(
                sample_rate,
                snapshot.high_cut.freq_hz,
                snapshot.high_cut.slope,
            )),
        }
    }
}

/// Keep the design frequency strictly inside (0, Nyquist). A 20 kHz cut
/// at a sub-40-kHz sample rate would otherwise produce a degenerate
/// section.
fn design_freq(sample_rate: f32, freq_hz: f32) -> f32 {
    let nyquist_guard = sample_rate / 2.0 - 1.0;
    let clamped = freq_hz.clamp(ranges::FREQ_MIN_HZ, nyquist_guard.max(ranges::FREQ_MIN_HZ));
    if clamped != freq_hz {
        trace!(
            "Design frequency clamped: {} -> {} at {} Hz",
            freq_hz,
            clamped,
            sample_rate
        );
    }
    clamped
}

fn clamp_q(q: f32) -> f32 {
    if q.is_finite() {
        q.clamp(ranges::Q_MIN, ranges::Q_MAX)
    } else {
        1.0
    }
}
