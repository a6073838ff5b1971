//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod engine;
pub mod filter;
pub mod params;
pub mod preset;
pub mod response;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, SampleRate, StreamConfig,
};
pub use chain::{Biquad, ChainBypass, ChainPosition, CutStage, FilterChain, PeakStage};
pub use engine::{CoefficientReclaimer, RetiredCoefficients, StereoEqEngine};
pub use filter::{BiquadCoeffs, ChainCoefficients, CutCoefficients, MAX_CUT_SECTIONS};
pub use params::{
    CutParams, EqSnapshot, ParamId, ParamRange, ParameterStore, PeakParams, Slope,
};
pub use preset::{AppConfig, ConfigError, EqPreset, PresetManager, PresetWatcher};
pub use response::{FrequencyAxis, ResponseEvaluator};
