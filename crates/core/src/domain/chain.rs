//! The fixed five-slot filter cascade applied to one audio channel
//!
//! Processing order is LowCut -> Peak1 -> Peak2 -> Peak3 -> HighCut, fixed
//! at construction. Slots hold their coefficient sets behind `Arc` so the
//! two channels of the stereo engine can share one set per slot; replacing
//! a slot's `Arc` between `process` calls is the unit of atomic update.

use crate::domain::filter::{BiquadCoeffs, ChainCoefficients, CutCoefficients, MAX_CUT_SECTIONS};
use std::sync::Arc;

/// Direct Form I state for one second-order section.
///
/// Coefficients live outside the state on purpose: both channels run their
/// own `Biquad` against a shared coefficient set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    #[inline]
    pub fn run(&mut self, coeffs: &BiquadCoeffs, x: f32) -> f32 {
        let y = coeffs.b0 * x + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    pub fn process(&mut self, coeffs: &BiquadCoeffs, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.run(coeffs, *sample);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The five processing slots of one channel chain, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPosition {
    LowCut,
    Peak1,
    Peak2,
    Peak3,
    HighCut,
}

impl ChainPosition {
    pub const ALL: [ChainPosition; 5] = [
        ChainPosition::LowCut,
        ChainPosition::Peak1,
        ChainPosition::Peak2,
        ChainPosition::Peak3,
        ChainPosition::HighCut,
    ];
}

/// Per-slot bypass flags, mirrored by the response evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainBypass {
    pub low_cut: bool,
    pub peaks: [bool; 3],
    pub high_cut: bool,
}

/// Variable-order cut stage: four fixed section slots, the first
/// `coeffs.active` of which filter. The rest never run, so they are true
/// pass-throughs rather than degenerate filters accumulating state.
#[derive(Debug)]
pub struct CutStage {
    coeffs: Arc<CutCoefficients>,
    sections: [Biquad; MAX_CUT_SECTIONS],
    bypassed: bool,
}

impl CutStage {
    fn new() -> Self {
        Self {
            coeffs: Arc::new(CutCoefficients::identity()),
            sections: [Biquad::default(); MAX_CUT_SECTIONS],
            bypassed: false,
        }
    }

    /// Install a shared coefficient set; returns the displaced one so the
    /// caller can retire it off the audio thread.
    pub fn configure(&mut self, coeffs: Arc<CutCoefficients>) -> Arc<CutCoefficients> {
        debug_assert!(coeffs.active <= MAX_CUT_SECTIONS);
        std::mem::replace(&mut self.coeffs, coeffs)
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.bypassed {
            return;
        }
        let active = self.coeffs.active.min(MAX_CUT_SECTIONS);
        for (state, coeffs) in self.sections[..active]
            .iter_mut()
            .zip(&self.coeffs.sections[..active])
        {
            state.process(coeffs, buffer);
        }
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    pub fn coefficients(&self) -> &Arc<CutCoefficients> {
        &self.coeffs
    }
}

/// One peaking slot.
#[derive(Debug)]
pub struct PeakStage {
    coeffs: Arc<BiquadCoeffs>,
    section: Biquad,
    bypassed: bool,
}

impl PeakStage {
    fn new() -> Self {
        Self {
            coeffs: Arc::new(BiquadCoeffs::default()),
            section: Biquad::default(),
            bypassed: false,
        }
    }

    pub fn update(&mut self, coeffs: Arc<BiquadCoeffs>) -> Arc<BiquadCoeffs> {
        std::mem::replace(&mut self.coeffs, coeffs)
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.bypassed {
            return;
        }
        self.section.process(&self.coeffs, buffer);
    }

    pub fn reset(&mut self) {
        self.section.reset();
    }

    pub fn coefficients(&self) -> &Arc<BiquadCoeffs> {
        &self.coeffs
    }
}

/// The fixed cascade for one audio channel.
#[derive(Debug)]
pub struct FilterChain {
    low_cut: CutStage,
    peaks: [PeakStage; 3],
    high_cut: CutStage,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            low_cut: CutStage::new(),
            peaks: std::array::from_fn(|_| PeakStage::new()),
            high_cut: CutStage::new(),
        }
    }

    /// Run the whole cascade in place over one block. A set installed
    /// between calls applies to the next block in full; nothing swaps
    /// mid-block.
    pub fn process(&mut self, buffer: &mut [f32]) {
        self.low_cut.process(buffer);
        for peak in &mut self.peaks {
            peak.process(buffer);
        }
        self.high_cut.process(buffer);
    }

    pub fn set_low_cut(&mut self, coeffs: Arc<CutCoefficients>) -> Arc<CutCoefficients> {
        self.low_cut.configure(coeffs)
    }

    pub fn set_high_cut(&mut self, coeffs: Arc<CutCoefficients>) -> Arc<CutCoefficients> {
        self.high_cut.configure(coeffs)
    }

    /// Replace one peaking slot's set. `band` is 0..3; out of range is a
    /// programming error and saturates to the last band in release.
    pub fn set_peak(&mut self, band: usize, coeffs: Arc<BiquadCoeffs>) -> Arc<BiquadCoeffs> {
        debug_assert!(band < self.peaks.len());
        let band = band.min(self.peaks.len() - 1);
        self.peaks[band].update(coeffs)
    }

    pub fn set_bypassed(&mut self, position: ChainPosition, bypassed: bool) {
        match position {
            ChainPosition::LowCut => self.low_cut.bypassed = bypassed,
            ChainPosition::Peak1 => self.peaks[0].bypassed = bypassed,
            ChainPosition::Peak2 => self.peaks[1].bypassed = bypassed,
            ChainPosition::Peak3 => self.peaks[2].bypassed = bypassed,
            ChainPosition::HighCut => self.high_cut.bypassed = bypassed,
        }
    }

    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut.bypassed,
            ChainPosition::Peak1 => self.peaks[0].bypassed,
            ChainPosition::Peak2 => self.peaks[1].bypassed,
            ChainPosition::Peak3 => self.peaks[2].bypassed,
            ChainPosition::HighCut => self.high_cut.bypassed,
        }
    }

    pub fn bypass(&self) -> ChainBypass {
        ChainBypass {
            low_cut: self.low_cut.bypassed,
            peaks: [
                self.peaks[0].bypassed,
                self.peaks[1].bypassed,
                self.peaks[2].bypassed,
            ],
            high_cut: self.high_cut.bypassed,
        }
    }

    /// Shared view of the currently installed sets, for the response
    /// evaluator and for cross-channel consistency checks.
    pub fn coefficients(&self) -> ChainCoefficients {
        ChainCoefficients {
            low_cut: Arc::clone(self.low_cut.coefficients()),
            peaks: std::array::from_fn(|band| Arc::clone(self.peaks[band].coefficients())),
            high_cut: Arc::clone(self.high_cut.coefficients()),
        }
    }

    /// Zero all delay-line state without touching coefficients.
    pub fn reset(&mut self) {
        self.low_cut.reset();
        for peak in &mut self.peaks {
            peak.reset();
        }
        self.high_cut.reset();
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}
