//! Platform layer for Quinteq
//!
//! Device discovery and the CPAL duplex stream that drives the core
//! engine from a real audio callback.

pub mod audio;
