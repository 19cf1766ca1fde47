//! # Delay Engine
//!
//! The entry point for hosts: owns the shared delay history, both
//! processing paths and the scratch memory they need, and picks a path
//! for every block.
//!
//! ```text
//!            ┌──────────────────────────────┐
//! block ───► │ clamp params                 │
//!            │ capacity = delay * rate      │──── changed? ──► clear history,
//!            │                              │                  retire grains
//!            │ mode ─┬─► StandardDelay ─────┤
//!            │       └─► GranularDelay ─────┤──► block (in place)
//!            └──────────────────────────────┘
//!                        ▲        │
//!                        └────────┘
//!                     RingBuffer (one, shared)
//! ```
//!
//! Long host blocks are processed in pieces no longer than the scratch
//! buffers or the ring, whichever is shorter. A delay shorter than the
//! block therefore still behaves like a delay.

use super::{
    gain::GainRamp,
    grain::{GrainPool, GrainSettings},
    granular::GranularDelay,
    ring_buffer::RingBuffer,
    seconds_to_samples,
    standard::StandardDelay,
};

/// Scratch size used by [`DelayEngine::prepare`] when the host doesn't say
/// how large its blocks get.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 4096;

/// Longest delay the plugin asks the engine to prepare for.
pub const MAX_DELAY_SECONDS: f32 = 10.0;

/// Which processing path handles a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DelayMode {
    /// Single read tap with feedback.
    #[default]
    Standard,
    /// Grain cloud over the same history.
    Granular,
}

impl From<bool> for DelayMode {
    /// `true` selects [`DelayMode::Granular`].
    fn from(granular: bool) -> Self {
        if granular {
            Self::Granular
        } else {
            Self::Standard
        }
    }
}

/// Snapshot of every parameter the engine reads, taken once per block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayParams {
    /// Delay time in seconds, `[0.01, 10.0]`.
    pub delay_seconds: f32,
    /// Share of the delayed signal fed back into the line, `[0, 1]`.
    pub feedback: f32,
    /// 0.0 = dry only, 1.0 = wet only.
    pub wet_dry: f32,
    /// Gain at the first sample of the block, `[0, 1]`.
    pub gain_begin: f32,
    /// Gain the ramp heads towards by the end of the block, `[0, 1]`.
    pub gain_end: f32,
    pub mode: DelayMode,
    /// Grain length in milliseconds, `[10, 500]`.
    pub grain_size_ms: f32,
    /// Grains triggered per second per channel, `[1, 50]`.
    pub grain_density_hz: f32,
    /// Grain playback speed, `[0.25, 4.0]`.
    pub grain_pitch_ratio: f32,
    /// Random placement jitter in milliseconds, `[0, 200]`.
    pub grain_spread_ms: f32,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            delay_seconds: 1.0,
            feedback: 0.5,
            wet_dry: 0.5,
            gain_begin: 1.0,
            gain_end: 1.0,
            mode: DelayMode::Standard,
            grain_size_ms: 100.0,
            grain_density_hz: 10.0,
            grain_pitch_ratio: 1.0,
            grain_spread_ms: 50.0,
        }
    }
}

impl DelayParams {
    /// A copy with every value forced into its range. NaN falls back to the
    /// default, so no input can leave the engine without a defined output.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        Self {
            delay_seconds: clamp_or(self.delay_seconds, 0.01, 10.0, defaults.delay_seconds),
            feedback: clamp_or(self.feedback, 0.0, 1.0, defaults.feedback),
            wet_dry: clamp_or(self.wet_dry, 0.0, 1.0, defaults.wet_dry),
            gain_begin: clamp_or(self.gain_begin, 0.0, 1.0, defaults.gain_begin),
            gain_end: clamp_or(self.gain_end, 0.0, 1.0, defaults.gain_end),
            mode: self.mode,
            grain_size_ms: clamp_or(self.grain_size_ms, 10.0, 500.0, defaults.grain_size_ms),
            grain_density_hz: clamp_or(self.grain_density_hz, 1.0, 50.0, defaults.grain_density_hz),
            grain_pitch_ratio: clamp_or(self.grain_pitch_ratio, 0.25, 4.0, defaults.grain_pitch_ratio),
            grain_spread_ms: clamp_or(self.grain_spread_ms, 0.0, 200.0, defaults.grain_spread_ms),
        }
    }

    pub fn grain_settings(&self) -> GrainSettings {
        GrainSettings {
            size_ms: self.grain_size_ms,
            density_hz: self.grain_density_hz,
            pitch_ratio: self.grain_pitch_ratio,
            spread_ms: self.grain_spread_ms,
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Two-mode delay effect: the standard feedback delay and the granular
/// delay, sharing one delay history.
#[derive(Debug, Default)]
pub struct DelayEngine {
    history: RingBuffer,
    standard: StandardDelay,
    granular: GranularDelay,
    max_block_size: usize,
}

impl DelayEngine {
    /// An engine whose grain randomness comes from OS entropy.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with reproducible grain placement.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            granular: GranularDelay::new(GrainPool::with_seed(seed)),
            ..Self::default()
        }
    }

    /// Allocate everything for `num_channels` channels and delays up to
    /// `max_delay_seconds`, with the default scratch size.
    pub fn prepare(&mut self, sample_rate: f64, num_channels: usize, max_delay_seconds: f32) {
        self.prepare_with_block_size(
            sample_rate,
            num_channels,
            max_delay_seconds,
            DEFAULT_MAX_BLOCK_SIZE,
        );
    }

    /// Like [`prepare`](Self::prepare), with scratch buffers sized for the
    /// host's largest block so it never has to be split.
    pub fn prepare_with_block_size(
        &mut self,
        sample_rate: f64,
        num_channels: usize,
        max_delay_seconds: f32,
        max_block_size: usize,
    ) {
        assert!(max_block_size > 0, "max block size must be > 0");

        self.history.prepare(sample_rate, num_channels, max_delay_seconds);
        self.standard.prepare(max_block_size);
        self.granular.prepare(num_channels, max_block_size);
        self.max_block_size = max_block_size;
    }

    pub fn is_prepared(&self) -> bool {
        self.history.is_prepared()
    }

    /// Silence the history and retire all grains, keeping the allocation.
    pub fn reset(&mut self) {
        self.history.clear();
        self.granular.reset();
    }

    pub fn history(&self) -> &RingBuffer {
        &self.history
    }

    pub fn grain_pool(&self) -> &GrainPool {
        self.granular.pool()
    }

    /// Process one block in place.
    ///
    /// `block` holds one slice per channel, all the same length. Channels
    /// past the prepared count are passed through untouched.
    ///
    /// # Panics
    ///
    /// If called before [`prepare`](Self::prepare).
    pub fn process(&mut self, block: &mut [&mut [f32]], params: &DelayParams, sample_rate: f64) {
        assert!(self.is_prepared(), "DelayEngine::process() called before prepare()");

        let Some(block_len) = block.first().map(|channel| channel.len()) else {
            return;
        };
        nih_plug::nih_debug_assert!(block.iter().all(|channel| channel.len() == block_len));
        if block_len == 0 {
            return;
        }

        let params = params.clamped();

        // The ring is exactly one delay long, so the delay time decides the
        // capacity. A new capacity starts from silence; grains placed in the
        // old history would read garbage.
        let delay_samples = seconds_to_samples(params.delay_seconds as f64, sample_rate)
            .clamp(1, self.history.max_capacity());
        if self.history.resize(delay_samples) {
            self.granular.reset();
        }

        let ramp = GainRamp::new(params.gain_begin, params.gain_end, block_len);
        let settings = params.grain_settings();
        let max_len = self.max_block_size.min(self.history.capacity());

        let mut offset = 0;
        while offset < block_len {
            let len = (block_len - offset).min(max_len);

            match params.mode {
                DelayMode::Standard => self.standard.process(
                    &mut self.history,
                    block,
                    offset,
                    len,
                    delay_samples,
                    params.feedback,
                    params.wet_dry,
                    ramp,
                ),
                DelayMode::Granular => self.granular.process(
                    &mut self.history,
                    block,
                    offset,
                    len,
                    params.feedback,
                    params.wet_dry,
                    &settings,
                    sample_rate,
                    ramp,
                ),
            }

            offset += len;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
