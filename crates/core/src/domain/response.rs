//! Frequency-response evaluation for the analysis display
//!
//! Runs entirely on the control/UI context. The evaluator owns its own
//! copy of the chain's coefficient sets (Arc clones) and bypass flags, so
//! it never contends with the audio thread, and it reuses the exact
//! coefficients the audio path filters with instead of duplicating the
//! design math.

use crate::domain::chain::ChainBypass;
use crate::domain::filter::{BiquadCoeffs, ChainCoefficients, CutCoefficients};
use num_complex::Complex64;

/// Magnitude of one section's transfer function at `freq_hz`.
///
/// Evaluates `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
/// on the unit circle at `z = e^(j 2 pi f / fs)`.
fn section_magnitude(coeffs: &BiquadCoeffs, freq_hz: f64, sample_rate: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * freq_hz / sample_rate;
    let z1 = Complex64::from_polar(1.0, -w);
    let z2 = z1 * z1;

    let numerator = coeffs.b0 as f64 + coeffs.b1 as f64 * z1 + coeffs.b2 as f64 * z2;
    let denominator = Complex64::new(1.0, 0.0) + coeffs.a1 as f64 * z1 + coeffs.a2 as f64 * z2;

    (numerator / denominator).norm()
}

fn cut_magnitude(cut: &CutCoefficients, freq_hz: f64, sample_rate: f64) -> f64 {
    cut.sections[..cut.active.min(cut.sections.len())]
        .iter()
        .map(|section| section_magnitude(section, freq_hz, sample_rate))
        .product()
}

/// Read-only mirror of a chain's response.
#[derive(Debug, Clone)]
pub struct ResponseEvaluator {
    coeffs: ChainCoefficients,
    bypass: ChainBypass,
    sample_rate: f64,
}

impl ResponseEvaluator {
    pub fn new(coeffs: ChainCoefficients, bypass: ChainBypass, sample_rate: f32) -> Self {
        Self { coeffs, bypass, sample_rate: sample_rate as f64 }
    }

    /// Cascade magnitude at `freq_hz`, in dB: the gain product of every
    /// non-bypassed section converted through `20 log10`. A bypassed slot
    /// contributes a factor of 1, matching the processing path's
    /// pass-through contract.
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let mut gain = 1.0_f64;

        if !self.bypass.low_cut {
            gain *= cut_magnitude(&self.coeffs.low_cut, freq_hz, self.sample_rate);
        }
        for (band, peak) in self.coeffs.peaks.iter().enumerate() {
            if !self.bypass.peaks[band] {
                gain *= section_magnitude(peak, freq_hz, self.sample_rate);
            }
        }
        if !self.bypass.high_cut {
            gain *= cut_magnitude(&self.coeffs.high_cut, freq_hz, self.sample_rate);
        }

        20.0 * gain.max(1e-12).log10()
    }

    /// Lazy sweep over a caller-supplied axis, yielding `(freq_hz, db)`
    /// pairs. Restart by sweeping again; the axis is cheap to clone.
    pub fn sweep<'a>(&'a self, axis: &FrequencyAxis) -> impl Iterator<Item = (f64, f64)> + 'a {
        axis.clone().map(move |freq| (freq, self.magnitude_at(freq)))
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// Log-spaced frequency axis, typically 20 Hz to 20 kHz.
///
/// Implements `Iterator` directly; finite, and restartable by cloning
/// before iteration.
#[derive(Debug, Clone)]
pub struct FrequencyAxis {
    log_lo: f64,
    log_step: f64,
    points: usize,
    index: usize,
}

impl FrequencyAxis {
    pub fn log_spaced(lo_hz: f64, hi_hz: f64, points: usize) -> Self {
        let lo_hz = lo_hz.max(1e-3);
        let hi_hz = hi_hz.max(lo_hz);
        let log_lo = lo_hz.log10();
        let log_step = if points > 1 {
            (hi_hz.log10() - log_lo) / (points - 1) as f64
        } else {
            0.0
        };
        Self { log_lo, log_step, points, index: 0 }
    }

    pub fn points(&self) -> usize {
        self.points
    }
}

impl Iterator for FrequencyAxis {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.points {
            return None;
        }
        let freq = 10.0_f64.powf(self.log_lo + self.log_step * self.index as f64);
        self.index += 1;
        Some(freq)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.points - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrequencyAxis {}
