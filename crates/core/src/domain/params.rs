//! User-facing equalizer parameters and the lock-free parameter store
//!
//! Thirteen tunable quantities: three peaking bands (frequency, gain, Q)
//! plus the low-cut and high-cut filters (frequency, slope). The
//! `ParameterStore` is the single-writer/single-reader handoff point
//! between the control context (CLI, presets, a future GUI) and the audio
//! callback: plain atomic cells plus a compare-and-clear change flag, no
//! locks anywhere.

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::trace;

/// Parameter domains shared by the store, the presets, and the coefficient
/// designers. Values outside these ranges are clamped, never rejected.
pub mod ranges {
    pub const FREQ_MIN_HZ: f32 = 20.0;
    pub const FREQ_MAX_HZ: f32 = 20_000.0;

    pub const GAIN_MIN_DB: f32 = -24.0;
    pub const GAIN_MAX_DB: f32 = 24.0;

    pub const Q_MIN: f32 = 0.1;
    pub const Q_MAX: f32 = 10.0;
}

/// Cut-filter steepness, in 12 dB/octave steps.
///
/// Each step adds one cascaded second-order section, so `Db48` runs four
/// sections. The set is closed by construction; there is no way to ask a
/// cut stage for more sections than it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slope {
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Number of active second-order sections for this slope.
    pub fn sections(self) -> usize {
        self as usize + 1
    }

    pub fn db_per_octave(self) -> u32 {
        12 * (self as u32 + 1)
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Clamping conversion from a stored choice index.
    pub fn from_index(index: u32) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }
}

impl Default for Slope {
    fn default() -> Self {
        Slope::Db12
    }
}

/// One peaking band: center frequency, boost/cut, bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    pub freq_hz: f32,
    pub gain_db: f32,
    pub q: f32,
}

impl PeakParams {
    pub fn new(freq_hz: f32, gain_db: f32, q: f32) -> Self {
        Self { freq_hz, gain_db, q }.clamped()
    }

    /// Saturate every field at its domain boundary.
    pub fn clamped(self) -> Self {
        Self {
            freq_hz: clamp_finite(self.freq_hz, ranges::FREQ_MIN_HZ, ranges::FREQ_MAX_HZ),
            gain_db: clamp_finite(self.gain_db, ranges::GAIN_MIN_DB, ranges::GAIN_MAX_DB),
            q: clamp_finite(self.q, ranges::Q_MIN, ranges::Q_MAX),
        }
    }
}

/// One cut filter: corner frequency plus slope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutParams {
    pub freq_hz: f32,
    pub slope: Slope,
}

impl CutParams {
    pub fn new(freq_hz: f32, slope: Slope) -> Self {
        Self { freq_hz, slope }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            freq_hz: clamp_finite(self.freq_hz, ranges::FREQ_MIN_HZ, ranges::FREQ_MAX_HZ),
            slope: self.slope,
        }
    }
}

/// Immutable value object capturing all tunable quantities at one instant.
///
/// Copied around freely; equality is used by the engine to skip redundant
/// coefficient redesigns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqSnapshot {
    pub low_cut: CutParams,
    pub peaks: [PeakParams; 3],
    pub high_cut: CutParams,
}

impl EqSnapshot {
    pub fn clamped(self) -> Self {
        Self {
            low_cut: self.low_cut.clamped(),
            peaks: self.peaks.map(PeakParams::clamped),
            high_cut: self.high_cut.clamped(),
        }
    }
}

impl Default for EqSnapshot {
    fn default() -> Self {
        Self {
            low_cut: CutParams { freq_hz: 20.0, slope: Slope::Db12 },
            peaks: [
                PeakParams { freq_hz: 350.0, gain_db: 0.0, q: 1.0 },
                PeakParams { freq_hz: 2_000.0, gain_db: 0.0, q: 1.0 },
                PeakParams { freq_hz: 5_000.0, gain_db: 0.0, q: 1.0 },
            ],
            high_cut: CutParams { freq_hz: 20_000.0, slope: Slope::Db12 },
        }
    }
}

/// Identifies one of the thirteen user-facing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    LowCutFreq,
    LowCutSlope,
    Peak1Freq,
    Peak1Gain,
    Peak1Q,
    Peak2Freq,
    Peak2Gain,
    Peak2Q,
    Peak3Freq,
    Peak3Gain,
    Peak3Q,
    HighCutFreq,
    HighCutSlope,
}

impl ParamId {
    pub const COUNT: usize = 13;

    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::LowCutFreq,
        ParamId::LowCutSlope,
        ParamId::Peak1Freq,
        ParamId::Peak1Gain,
        ParamId::Peak1Q,
        ParamId::Peak2Freq,
        ParamId::Peak2Gain,
        ParamId::Peak2Q,
        ParamId::Peak3Freq,
        ParamId::Peak3Gain,
        ParamId::Peak3Q,
        ParamId::HighCutFreq,
        ParamId::HighCutSlope,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParamId::LowCutFreq => "LowCut Freq",
            ParamId::LowCutSlope => "LowCut Slope",
            ParamId::Peak1Freq => "Peak1 Freq",
            ParamId::Peak1Gain => "Peak1 Gain",
            ParamId::Peak1Q => "Peak1 Quality",
            ParamId::Peak2Freq => "Peak2 Freq",
            ParamId::Peak2Gain => "Peak2 Gain",
            ParamId::Peak2Q => "Peak2 Quality",
            ParamId::Peak3Freq => "Peak3 Freq",
            ParamId::Peak3Gain => "Peak3 Gain",
            ParamId::Peak3Q => "Peak3 Quality",
            ParamId::HighCutFreq => "HighCut Freq",
            ParamId::HighCutSlope => "HighCut Slope",
        }
    }

    /// Declared numeric range and UI skew for this parameter.
    pub fn range(self) -> ParamRange {
        match self {
            ParamId::LowCutFreq => ParamRange::skewed(20.0, 20_000.0, 20.0, 0.25),
            ParamId::HighCutFreq => ParamRange::skewed(20.0, 20_000.0, 20_000.0, 0.25),
            ParamId::Peak1Freq => ParamRange::skewed(20.0, 20_000.0, 350.0, 0.25),
            ParamId::Peak2Freq => ParamRange::skewed(20.0, 20_000.0, 2_000.0, 0.25),
            ParamId::Peak3Freq => ParamRange::skewed(20.0, 20_000.0, 5_000.0, 0.25),
            ParamId::Peak1Gain | ParamId::Peak2Gain | ParamId::Peak3Gain => {
                ParamRange::linear(-24.0, 24.0, 0.0)
            }
            ParamId::Peak1Q | ParamId::Peak2Q | ParamId::Peak3Q => {
                ParamRange::linear(0.1, 10.0, 1.0)
            }
            ParamId::LowCutSlope | ParamId::HighCutSlope => ParamRange::linear(0.0, 3.0, 0.0),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Range metadata for one parameter.
///
/// `skew` shapes the normalized (0..1) UI mapping: values below 1 give the
/// lower end of the range more travel, which is how the frequency knobs
/// behave. The engine itself only ever consumes natural values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub skew: f32,
}

impl ParamRange {
    pub const fn linear(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default, skew: 1.0 }
    }

    pub const fn skewed(min: f32, max: f32, default: f32, skew: f32) -> Self {
        Self { min, max, default, skew }
    }

    /// Saturate into the declared domain. Non-finite input falls back to
    /// the default rather than poisoning downstream filter math.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }

    /// Natural value to normalized 0..1 position.
    pub fn normalize(&self, value: f32) -> f32 {
        let proportion = (self.clamp(value) - self.min) / (self.max - self.min);
        proportion.powf(self.skew)
    }

    /// Normalized 0..1 position back to a natural value.
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let proportion = normalized.clamp(0.0, 1.0).powf(1.0 / self.skew);
        self.min + (self.max - self.min) * proportion
    }
}

/// Wait-free parameter cell array shared between the control context and
/// the audio callback.
///
/// Writers clamp and store f32 bits with release ordering, then raise the
/// change flag; the audio context consumes the flag with
/// [`ParameterStore::take_changed`] (test-and-clear) and assembles an
/// [`EqSnapshot`] from acquire loads. With a single writer and a single
/// reader this gives the reader a consistent view of every write that
/// happened before the flag was raised.
pub struct ParameterStore {
    values: [CachePadded<AtomicU32>; ParamId::COUNT],
    changed: CachePadded<AtomicBool>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| {
                CachePadded::new(AtomicU32::new(ParamId::ALL[i].range().default.to_bits()))
            }),
            changed: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// Current natural value of one parameter.
    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Acquire))
    }

    /// Store a natural value, saturating at the declared range, and raise
    /// the change flag.
    pub fn set(&self, id: ParamId, value: f32) {
        let clamped = id.range().clamp(value);
        if clamped != value {
            trace!("Parameter '{}' clamped: {} -> {}", id.name(), value, clamped);
        }
        self.values[id.index()].store(clamped.to_bits(), Ordering::Release);
        self.changed.store(true, Ordering::Release);
    }

    /// Store from a normalized 0..1 position using the parameter's skew.
    pub fn set_normalized(&self, id: ParamId, normalized: f32) {
        self.set(id, id.range().denormalize(normalized));
    }

    /// Write a whole snapshot, raising the change flag once.
    pub fn apply_snapshot(&self, snapshot: &EqSnapshot) {
        let snapshot = snapshot.clamped();
        self.store(ParamId::LowCutFreq, snapshot.low_cut.freq_hz);
        self.store(ParamId::LowCutSlope, snapshot.low_cut.slope.index() as f32);
        self.store(ParamId::HighCutFreq, snapshot.high_cut.freq_hz);
        self.store(ParamId::HighCutSlope, snapshot.high_cut.slope.index() as f32);

        let freqs = [ParamId::Peak1Freq, ParamId::Peak2Freq, ParamId::Peak3Freq];
        let gains = [ParamId::Peak1Gain, ParamId::Peak2Gain, ParamId::Peak3Gain];
        let qs = [ParamId::Peak1Q, ParamId::Peak2Q, ParamId::Peak3Q];
        for (band, peak) in snapshot.peaks.iter().enumerate() {
            self.store(freqs[band], peak.freq_hz);
            self.store(gains[band], peak.gain_db);
            self.store(qs[band], peak.q);
        }

        self.changed.store(true, Ordering::Release);
    }

    /// Assemble the current values into a snapshot.
    pub fn snapshot(&self) -> EqSnapshot {
        EqSnapshot {
            low_cut: CutParams {
                freq_hz: self.get(ParamId::LowCutFreq),
                slope: Slope::from_index(self.get(ParamId::LowCutSlope) as u32),
            },
            peaks: [
                PeakParams {
                    freq_hz: self.get(ParamId::Peak1Freq),
                    gain_db: self.get(ParamId::Peak1Gain),
                    q: self.get(ParamId::Peak1Q),
                },
                PeakParams {
                    freq_hz: self.get(ParamId::Peak2Freq),
                    gain_db: self.get(ParamId::Peak2Gain),
                    q: self.get(ParamId::Peak2Q),
                },
                PeakParams {
                    freq_hz: self.get(ParamId::Peak3Freq),
                    gain_db: self.get(ParamId::Peak3Gain),
                    q: self.get(ParamId::Peak3Q),
                },
            ],
            high_cut: CutParams {
                freq_hz: self.get(ParamId::HighCutFreq),
                slope: Slope::from_index(self.get(ParamId::HighCutSlope) as u32),
            },
        }
    }

    /// Consume the change flag. Returns true at most once per raise; the
    /// audio context calls this every block to gate coefficient redesign.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Raise the change flag without touching any value.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }

    fn store(&self, id: ParamId, value: f32) {
        self.values[id.index()].store(id.range().clamp(value).to_bits(), Ordering::Release);
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}
