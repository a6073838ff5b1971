//! Quinteq core: the filter chain engine of a five-band parametric equalizer
//!
//! Everything in this crate is platform-agnostic. The CPAL backend that
//! feeds real audio through the engine lives in the `infra` crate.

pub mod domain;
