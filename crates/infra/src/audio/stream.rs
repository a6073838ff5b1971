//! Stereo duplex stream: capture, equalize, play back
//!
//! The capture callback pushes interleaved frames into the SPSC ring; the
//! playback callback pulls them, splits into per-channel scratch, runs the
//! engine's cascade, and reinterleaves. The engine itself is moved into
//! the playback callback, so all chain mutation happens on the thread that
//! processes blocks. The control side keeps the parameter store and the
//! coefficient reclaimer.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use quinteq_core::domain::audio::{AudioError, Result, StreamConfig};
use quinteq_core::domain::engine::{CoefficientReclaimer, StereoEqEngine};
use quinteq_core::domain::params::ParameterStore;
use std::sync::Arc;
use tracing::{error, info, trace};

use super::cpal_backend::CpalEnumerator;
use super::ring::spsc_ring;

const CHANNELS: u16 = 2;

/// A running capture -> EQ -> playback loop.
///
/// Dropping this stops both streams.
pub struct DuplexEqStream {
    _input: Stream,
    _output: Stream,
    reclaimer: CoefficientReclaimer,
    config: StreamConfig,
}

impl DuplexEqStream {
    /// Open and start the duplex loop on the given devices (`None` picks
    /// the defaults).
    pub fn open(
        enumerator: &CpalEnumerator,
        input_name: Option<&str>,
        output_name: Option<&str>,
        config: &StreamConfig,
        params: Arc<ParameterStore>,
    ) -> Result<Self> {
        let input_device = enumerator.find_input_device(input_name)?;
        let output_device = enumerator.find_output_device(output_name)?;

        #[allow(deprecated)]
        let input_name = input_device.name().unwrap_or_default();
        #[allow(deprecated)]
        let output_name = output_device.name().unwrap_or_default();
        info!(
            "Opening duplex stream: '{}' -> '{}' at {} Hz, block {}",
            input_name,
            output_name,
            config.sample_rate.hz(),
            config.buffer_size
        );

        let block = config.buffer_size.max(32) as usize;
        // The backend may hand callbacks larger than requested; process in
        // bounded chunks so scratch buffers never grow on the audio thread.
        let max_frames = block * 4;

        let mut engine = StereoEqEngine::new(params);
        engine.prepare(config.sample_rate.hz() as f32, max_frames)?;
        let reclaimer = engine.reclaimer();

        let (mut producer, mut consumer) = spsc_ring(block * CHANNELS as usize * 8);
        // Prime the ring so the first playback callbacks do not underrun
        // while the capture side spins up.
        let primed = vec![0.0f32; block * CHANNELS as usize * 2];
        producer.write(&primed);

        let cpal_config = CpalStreamConfig {
            channels: CHANNELS,
            sample_rate: config.sample_rate.hz(),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let input = input_device
            .build_input_stream(
                &cpal_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let written = producer.write(data);
                    if written < data.len() {
                        trace!("Capture overrun, dropped {} samples", data.len() - written);
                    }
                },
                |err| error!("Input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build input stream: {}", e)))?;

        let mut left = vec![0.0f32; max_frames];
        let mut right = vec![0.0f32; max_frames];

        let output = output_device
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(max_frames * CHANNELS as usize) {
                        let got = consumer.read(chunk);
                        if got < chunk.len() {
                            // Underrun: the tail plays silence this round.
                            chunk[got..].fill(0.0);
                        }

                        let frames = chunk.len() / CHANNELS as usize;
                        for frame in 0..frames {
                            left[frame] = chunk[frame * 2];
                            right[frame] = chunk[frame * 2 + 1];
                        }

                        engine.process_block(&mut left[..frames], &mut right[..frames]);

                        for frame in 0..frames {
                            chunk[frame * 2] = left[frame];
                            chunk[frame * 2 + 1] = right[frame];
                        }
                    }
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))?;

        input
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start input stream: {}", e)))?;
        output
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start output stream: {}", e)))?;

        Ok(Self {
            _input: input,
            _output: output,
            reclaimer,
            config: config.clone(),
        })
    }

    /// Handle the control context uses to free retired coefficient sets.
    pub fn reclaimer(&self) -> CoefficientReclaimer {
        self.reclaimer.clone()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}
