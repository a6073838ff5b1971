//! Integration tests for the filter chain engine
//!
//! These exercise the whole path: parameter store to coefficient design to
//! the stereo chains, cross-checked against the analytic response
//! evaluator and against measured signal levels.

#[cfg(test)]
mod duplex_path;

#[cfg(test)]
mod engine_integration;

#[cfg(test)]
mod spectral_checks;
