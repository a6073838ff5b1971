//! End-to-end tests for the stereo engine
//!
//! Signals are pushed through the real chains and measured, and the same
//! settings are cross-checked against the analytic response evaluator.

use quinteq_core::domain::chain::{ChainBypass, ChainPosition};
use quinteq_core::domain::engine::StereoEqEngine;
use quinteq_core::domain::filter::ChainCoefficients;
use quinteq_core::domain::params::{
    CutParams, EqSnapshot, ParamId, ParameterStore, PeakParams, Slope,
};
use quinteq_core::domain::preset::EqPreset;
use quinteq_core::domain::response::{FrequencyAxis, ResponseEvaluator};
use std::sync::Arc;

const SAMPLE_RATE: f32 = 48_000.0;
const MEASURE_LEN: usize = 8_192;

fn sine(freq: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE).sin())
        .collect()
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn prepared_engine(snapshot: &EqSnapshot) -> StereoEqEngine {
    let params = Arc::new(ParameterStore::new());
    params.apply_snapshot(snapshot);
    let mut engine = StereoEqEngine::new(params);
    engine.prepare(SAMPLE_RATE, MEASURE_LEN).unwrap();
    engine
}

/// Steady-state gain of the engine at one frequency, in dB, measured on
/// the back half of a processed sine to let transients die out.
fn measured_gain_db(engine: &mut StereoEqEngine, freq: f32) -> f32 {
    let signal = sine(freq, MEASURE_LEN);
    let mut left = signal.clone();
    let mut right = signal.clone();
    engine.process_block(&mut left, &mut right);

    let tail = MEASURE_LEN / 2;
    20.0 * (rms(&left[tail..]) / rms(&signal[tail..])).log10()
}

fn evaluator(snapshot: &EqSnapshot) -> ResponseEvaluator {
    ResponseEvaluator::new(
        ChainCoefficients::design(snapshot, SAMPLE_RATE),
        ChainBypass::default(),
        SAMPLE_RATE,
    )
}

#[test]
fn flat_defaults_measure_unity_gain() {
    let mut engine = prepared_engine(&EqSnapshot::default());
    for freq in [100.0, 1_000.0, 5_000.0] {
        let db = measured_gain_db(&mut engine, freq);
        assert!(db.abs() < 0.2, "{freq} Hz measured {db} dB");
    }
}

#[test]
fn low_cut_slopes_roll_off_as_designed() {
    const CORNER: f64 = 1_000.0;
    for slope in Slope::ALL {
        let snapshot = EqSnapshot {
            low_cut: CutParams::new(CORNER as f32, slope),
            ..EqSnapshot::default()
        };
        let eval = evaluator(&snapshot);
        let db_per_octave = 12.0 * slope.sections() as f64;

        // Passband a decade above the corner is flat.
        assert!(eval.magnitude_at(CORNER * 10.0).abs() < 0.5, "{slope:?}");

        // Butterworth keeps the corner itself at -3 dB for every order.
        assert!((eval.magnitude_at(CORNER) + 3.01).abs() < 0.2, "{slope:?}");

        // One octave of stop band measures the nominal slope.
        let measured = eval.magnitude_at(CORNER / 2.0) - eval.magnitude_at(CORNER / 4.0);
        assert!(
            (measured - db_per_octave).abs() < 1.5,
            "{slope:?}: measured {measured} dB/oct, designed {db_per_octave}"
        );

        // A decade below the corner is attenuated well past the
        // single-octave figure.
        assert!(
            eval.magnitude_at(CORNER / 10.0) < -db_per_octave,
            "{slope:?}"
        );
    }
}

#[test]
fn low_cut_100hz_24db_per_octave_scenario() {
    let snapshot = EqSnapshot {
        low_cut: CutParams::new(100.0, Slope::Db24),
        ..EqSnapshot::default()
    };
    let eval = evaluator(&snapshot);

    assert!(eval.magnitude_at(1_000.0).abs() < 0.5);
    // Two octaves below a 4th-order corner: deep in the stop band.
    assert!(eval.magnitude_at(25.0) < -40.0);

    let octave = eval.magnitude_at(50.0) - eval.magnitude_at(25.0);
    assert!((octave - 24.0).abs() < 2.0, "measured {octave} dB/oct");
}

#[test]
fn peak_scenario_measured_through_the_chains() {
    let snapshot = EqSnapshot {
        peaks: [
            PeakParams::new(1_000.0, 12.0, 1.0),
            PeakParams::new(2_000.0, 0.0, 1.0),
            PeakParams::new(5_000.0, 0.0, 1.0),
        ],
        ..EqSnapshot::default()
    };
    let mut engine = prepared_engine(&snapshot);

    let at_center = measured_gain_db(&mut engine, 1_000.0);
    assert!((at_center - 12.0).abs() < 0.5, "center measured {at_center} dB");

    engine.prepare(SAMPLE_RATE, MEASURE_LEN).unwrap();
    let far_below = measured_gain_db(&mut engine, 100.0);
    assert!(far_below.abs() < 0.5, "100 Hz measured {far_below} dB");
}

#[test]
fn both_channels_process_identically() {
    let snapshot = EqSnapshot {
        low_cut: CutParams::new(80.0, Slope::Db36),
        peaks: [
            PeakParams::new(400.0, 6.0, 1.5),
            PeakParams::new(2_500.0, -9.0, 3.0),
            PeakParams::new(9_000.0, 3.0, 0.6),
        ],
        high_cut: CutParams::new(15_000.0, Slope::Db24),
    };
    let mut engine = prepared_engine(&snapshot);

    let signal = sine(440.0, 4_096);
    let mut left = signal.clone();
    let mut right = signal;
    engine.process_block(&mut left, &mut right);

    assert_eq!(left, right);

    let (l, r) = engine.chains();
    let lc = l.coefficients();
    let rc = r.coefficients();
    assert!(Arc::ptr_eq(&lc.low_cut, &rc.low_cut));
    assert!(Arc::ptr_eq(&lc.high_cut, &rc.high_cut));
    for band in 0..3 {
        assert!(Arc::ptr_eq(&lc.peaks[band], &rc.peaks[band]));
    }
}

#[test]
fn sharing_survives_parameter_churn() {
    let params = Arc::new(ParameterStore::new());
    let mut engine = StereoEqEngine::new(Arc::clone(&params));
    engine.prepare(SAMPLE_RATE, 512).unwrap();

    let mut left = vec![0.0f32; 512];
    let mut right = vec![0.0f32; 512];
    for step in 0..20 {
        params.set(ParamId::Peak1Gain, step as f32 - 10.0);
        params.set(ParamId::LowCutFreq, 40.0 + step as f32 * 30.0);
        engine.process_block(&mut left, &mut right);

        let (l, r) = engine.chains();
        let lc = l.coefficients();
        let rc = r.coefficients();
        assert!(Arc::ptr_eq(&lc.low_cut, &rc.low_cut), "step {step}");
        for band in 0..3 {
            assert!(Arc::ptr_eq(&lc.peaks[band], &rc.peaks[band]), "step {step}");
        }
    }
}

#[test]
fn all_slots_bypassed_is_the_identity_chain() {
    let snapshot = EqSnapshot {
        low_cut: CutParams::new(500.0, Slope::Db48),
        peaks: [
            PeakParams::new(1_000.0, 12.0, 1.0),
            PeakParams::new(2_000.0, -12.0, 1.0),
            PeakParams::new(5_000.0, 6.0, 1.0),
        ],
        high_cut: CutParams::new(8_000.0, Slope::Db48),
    };
    let mut engine = prepared_engine(&snapshot);
    for position in ChainPosition::ALL {
        engine.set_bypassed(position, true);
    }

    let signal = sine(440.0, 2_048);
    let mut left = signal.clone();
    let mut right = signal.clone();
    engine.process_block(&mut left, &mut right);
    assert_eq!(left, signal);
    assert_eq!(right, signal);

    let eval = ResponseEvaluator::new(engine.coefficients(), engine.bypass(), SAMPLE_RATE);
    let axis = FrequencyAxis::log_spaced(20.0, 20_000.0, 48);
    for (freq, db) in eval.sweep(&axis) {
        assert!(db.abs() < 1e-9, "{freq} Hz: {db} dB");
    }
}

#[test]
fn parameter_change_is_audible_within_one_block() {
    let params = Arc::new(ParameterStore::new());
    let mut engine = StereoEqEngine::new(Arc::clone(&params));
    engine.prepare(SAMPLE_RATE, 4_096).unwrap();

    let signal = sine(1_000.0, 4_096);

    let mut left = signal.clone();
    let mut right = signal.clone();
    engine.process_block(&mut left, &mut right);
    let flat = 20.0 * (rms(&left[2_048..]) / rms(&signal[2_048..])).log10();
    assert!(flat.abs() < 0.2);

    params.set(ParamId::Peak2Freq, 1_000.0);
    params.set(ParamId::Peak2Gain, 12.0);

    // The very next block must already carry the boost.
    let mut left = signal.clone();
    let mut right = signal.clone();
    engine.process_block(&mut left, &mut right);
    let boosted = 20.0 * (rms(&left[2_048..]) / rms(&signal[2_048..])).log10();
    assert!(boosted > 11.0, "next block measured {boosted} dB");
}

#[tokio::test]
async fn preset_file_reaches_the_audio_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warm.toml");

    let preset = EqPreset::new(
        "warm",
        EqSnapshot {
            peaks: [
                PeakParams::new(250.0, 4.5, 0.9),
                PeakParams::new(3_000.0, -3.0, 2.0),
                PeakParams::new(10_000.0, 2.0, 0.7),
            ],
            ..EqSnapshot::default()
        },
    );
    preset.save_to_file(&path).await.unwrap();

    let loaded = EqPreset::load_from_file(&path).await.unwrap();
    let params = Arc::new(ParameterStore::new());
    params.apply_snapshot(&loaded.eq);

    let mut engine = StereoEqEngine::new(Arc::clone(&params));
    engine.prepare(SAMPLE_RATE, 512).unwrap();

    let eval = ResponseEvaluator::new(engine.coefficients(), engine.bypass(), SAMPLE_RATE);
    assert!((eval.magnitude_at(250.0) - 4.5).abs() < 0.3);
    // The broad 10 kHz band's skirt reaches down here, hence the wider
    // tolerance.
    assert!((eval.magnitude_at(3_000.0) + 3.0).abs() < 0.6);
}
