//! Platform-specific audio backend implementations using CPAL
//!
//! CPAL abstracts the platform APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod cpal_backend;
pub mod ring;
pub mod stream;

pub use cpal_backend::*;
pub use ring::*;
pub use stream::*;
