//! # DSP (Digital Signal Processing) Core
//!
//! Everything that runs on the audio thread, leaves first:
//!
//! - **`ring_buffer`**: the multi-channel circular delay history shared by
//!   both delay modes.
//! - **`gain`**: the per-block linear gain ramp.
//! - **`standard`**: the classic feedback delay (one read tap).
//! - **`grain`**: grains, the fixed-size grain pool and its scheduler.
//! - **`granular`**: the granular delay, grains played over the history.
//! - **`engine`**: [`DelayEngine`], which owns the history and picks a mode
//!   per block.
//!
//! Nothing in here allocates after `prepare()`.

pub mod engine;
pub mod gain;
pub mod grain;
pub mod granular;
pub mod ring_buffer;
pub mod standard;

pub use engine::{DelayEngine, DelayMode, DelayParams};

/// Convert a duration in seconds to a whole number of samples, rounding to
/// the nearest sample. Negative and NaN durations give 0.
pub fn seconds_to_samples(seconds: f64, sample_rate: f64) -> usize {
    (seconds * sample_rate).round().max(0.0) as usize
}

/// Same as [`seconds_to_samples`], for millisecond parameters.
pub fn ms_to_samples(ms: f32, sample_rate: f64) -> usize {
    seconds_to_samples(ms as f64 / 1000.0, sample_rate)
}
