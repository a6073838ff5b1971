//! The duplex data path without the device layer
//!
//! Replays what the CPAL callbacks do: interleaved frames go through the
//! SPSC ring, get split per channel, run through the engine, and come back
//! interleaved. Verifies ordering, channel separation, and that parameter
//! writes from the "control thread" land.

use quinteq_core::domain::chain::ChainPosition;
use quinteq_core::domain::engine::StereoEqEngine;
use quinteq_core::domain::params::{ParamId, ParameterStore};
use quinteq_infra::audio::spsc_ring;
use std::sync::Arc;

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK: usize = 256;

#[test]
fn interleaved_frames_survive_the_ring_and_engine() {
    let params = Arc::new(ParameterStore::new());
    let mut engine = StereoEqEngine::new(Arc::clone(&params));
    engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
    // Bypass every slot so the engine is a bit-exact identity and any
    // corruption must come from the transport.
    for position in ChainPosition::ALL {
        engine.set_bypassed(position, true);
    }

    let (mut producer, mut consumer) = spsc_ring(BLOCK * 2 * 4);

    // Distinct channel content: left ramps up, right ramps down.
    let mut captured = vec![0.0f32; BLOCK * 2];
    for frame in 0..BLOCK {
        captured[frame * 2] = frame as f32 / BLOCK as f32;
        captured[frame * 2 + 1] = -(frame as f32) / BLOCK as f32;
    }
    assert_eq!(producer.write(&captured), captured.len());

    let mut interleaved = vec![0.0f32; BLOCK * 2];
    assert_eq!(consumer.read(&mut interleaved), interleaved.len());

    let mut left = vec![0.0f32; BLOCK];
    let mut right = vec![0.0f32; BLOCK];
    for frame in 0..BLOCK {
        left[frame] = interleaved[frame * 2];
        right[frame] = interleaved[frame * 2 + 1];
    }

    engine.process_block(&mut left, &mut right);
    for frame in 0..BLOCK {
        assert_eq!(left[frame], frame as f32 / BLOCK as f32);
        assert_eq!(right[frame], -(frame as f32) / BLOCK as f32);
    }
}

#[test]
fn control_thread_writes_reach_the_callback_side() {
    let params = Arc::new(ParameterStore::new());
    let mut engine = StereoEqEngine::new(Arc::clone(&params));
    engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
    let reclaimer = engine.reclaimer();
    reclaimer.drain();

    let writer = {
        let params = Arc::clone(&params);
        std::thread::spawn(move || {
            params.set(ParamId::Peak1Gain, 9.0);
        })
    };
    writer.join().unwrap();

    let mut left = vec![0.25f32; BLOCK];
    let mut right = vec![0.25f32; BLOCK];
    engine.process_block(&mut left, &mut right);

    // The redesign happened inside the callback, and the displaced sets
    // are waiting for the control side.
    assert!(reclaimer.pending() > 0);
    assert_eq!(reclaimer.drain(), 10);
}
