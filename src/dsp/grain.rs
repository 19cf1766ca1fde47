//! # Grains and the Grain Pool
//!
//! Granular mode doesn't play the delay history back as one continuous
//! stream. It keeps firing short, enveloped snippets ("grains") that each
//! start somewhere random in the history and play for a few tens or
//! hundreds of milliseconds, possibly faster or slower than real time.
//!
//! ## Scheduling
//!
//! A counter advances by one every sample. Whenever it passes
//! `sample_rate / density_hz` samples, one grain is started on every
//! channel. At 10 Hz and 48 kHz that's one grain per channel every 4800
//! samples.
//!
//! ## Placement
//!
//! ```text
//! start = (cursor + spread_jitter) - depth * capacity      (wrapped)
//!
//!   spread_jitter ∈ [-spread, +spread)   samples
//!   depth         ∈ [0.1, 0.9)           of the ring
//! ```
//!
//! The depth term keeps grains between "fairly recent" and "fairly old",
//! and well away from the samples being written this block.
//!
//! ## Rendering
//!
//! Every active grain contributes one sample per output sample:
//!
//! ```text
//! position = start + elapsed * pitch_ratio
//! value    = lerp(history[floor(position)], history[floor(position) + 1])
//! out     += value * hann(elapsed / size) * amplitude
//! ```
//!
//! A pitch ratio of 2.0 walks through the history twice as fast (an octave
//! up), 0.5 half as fast (an octave down).
//!
//! ## Pooling
//!
//! The audio thread can't allocate, so all [`MAX_GRAINS`] grains live in
//! one array for the lifetime of the engine. Free slots sit on a stack and
//! active ones in a list, so starting or retiring a grain is O(1) and never
//! scans the pool. A trigger that finds the stack empty is dropped.

use std::f32::consts::PI;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use super::{ms_to_samples, ring_buffer::RingBuffer};

/// Maximum number of grains alive at the same time, across all channels.
pub const MAX_GRAINS: usize = 1000;

/// Hann (raised cosine) window at `progress` ∈ [0, 1).
///
/// `0.5 * (1 - cos(2π * progress))`: silent at both ends, 1.0 in the
/// middle. Anything outside [0, 1) is silent.
#[inline]
pub fn hann_window(progress: f32) -> f32 {
    if !(0.0..1.0).contains(&progress) {
        return 0.0;
    }
    0.5 * (1.0 - (2.0 * PI * progress).cos())
}

/// One grain: a short playback voice reading from the delay history.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Grain {
    /// Fractional read origin inside the ring, in `[0, capacity)`.
    pub start_position: f64,
    /// Samples rendered since the grain was triggered.
    pub current_position: usize,
    /// Total lifetime in samples.
    pub grain_size: usize,
    /// Per-grain level in `[0.5, 1.0)`.
    pub amplitude: f32,
    pub is_active: bool,
    /// Channel the grain reads from and plays on.
    pub channel: usize,
}

impl Grain {
    /// Envelope value for the sample about to be rendered.
    pub fn envelope(&self) -> f32 {
        if self.grain_size == 0 {
            return 0.0;
        }
        hann_window(self.current_position as f32 / self.grain_size as f32)
    }

    /// Unwrapped read position for the sample about to be rendered.
    pub fn read_position(&self, pitch_ratio: f32) -> f64 {
        self.start_position + self.current_position as f64 * pitch_ratio as f64
    }

    /// Render one sample from `history` and step forward. Returns `None`
    /// (and leaves the grain alone) if the grain can't be rendered into a
    /// block of `num_channels` channels.
    fn next_sample(
        &mut self,
        history: &RingBuffer,
        num_channels: usize,
        pitch_ratio: f32,
    ) -> Option<f32> {
        if self.channel >= num_channels || self.grain_size == 0 {
            return None;
        }

        let value = history.read_interpolated(self.channel, self.read_position(pitch_ratio));
        let sample = value * self.envelope() * self.amplitude;
        self.current_position += 1;
        Some(sample)
    }

    fn is_finished(&self) -> bool {
        self.current_position >= self.grain_size
    }
}

/// Per-block granular settings, already clamped by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrainSettings {
    pub size_ms: f32,
    pub density_hz: f32,
    pub pitch_ratio: f32,
    pub spread_ms: f32,
}

impl GrainSettings {
    /// Samples between two trigger rounds, or `None` if no grains should be
    /// triggered at all (zero, negative or non-finite density).
    pub fn samples_per_grain(&self, sample_rate: f64) -> Option<f64> {
        let samples = sample_rate / self.density_hz as f64;
        (samples.is_finite() && samples > 0.0).then_some(samples)
    }
}

/// Fixed-capacity pool of grains plus the scheduler that triggers them.
#[derive(Debug)]
pub struct GrainPool {
    grains: Vec<Grain>,
    /// Indices of idle grains. Popped on trigger, pushed on retire.
    free: Vec<usize>,
    /// Indices of playing grains, in no particular order.
    active: Vec<usize>,
    /// Samples elapsed since the last trigger round, fractional.
    trigger_counter: f64,
    dropped_triggers: u64,
    rng: SmallRng,
}

impl Default for GrainPool {
    fn default() -> Self {
        Self::new()
    }
}

impl GrainPool {
    /// A pool seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    /// A pool whose grain placement and amplitudes are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        let mut pool = Self {
            grains: vec![Grain::default(); MAX_GRAINS],
            free: Vec::with_capacity(MAX_GRAINS),
            active: Vec::with_capacity(MAX_GRAINS),
            trigger_counter: 0.0,
            dropped_triggers: 0,
            rng,
        };
        pool.reset();
        pool
    }

    /// Retire every grain and restart the trigger counter.
    pub fn reset(&mut self) {
        for grain in &mut self.grains {
            grain.is_active = false;
        }
        self.active.clear();
        self.free.clear();
        // Reversed so the first trigger takes slot 0.
        self.free.extend((0..MAX_GRAINS).rev());
        self.trigger_counter = 0.0;
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Trigger requests dropped because the pool was full.
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers
    }

    pub fn active_grains(&self) -> impl Iterator<Item = &Grain> + '_ {
        self.active.iter().map(|&index| &self.grains[index])
    }

    /// Start a grain on `channel`, placed relative to `cursor` inside a ring
    /// of `capacity` samples. Returns `false` if the pool is full.
    pub fn trigger(
        &mut self,
        channel: usize,
        cursor: usize,
        capacity: usize,
        settings: &GrainSettings,
        sample_rate: f64,
    ) -> bool {
        let Some(index) = self.free.pop() else {
            self.dropped_triggers += 1;
            return false;
        };

        let grain_size = ms_to_samples(settings.size_ms, sample_rate);
        let amplitude = 0.5 + self.rng.random::<f32>() * 0.5;

        let spread = ms_to_samples(settings.spread_ms, sample_rate) as f64;
        let offset = (self.rng.random::<f64>() - 0.5) * 2.0 * spread;
        let depth = self.rng.random_range(0.1..0.9) * capacity as f64;

        let capacity = capacity as f64;
        let mut start_position = (cursor as f64 + offset - depth).rem_euclid(capacity);
        if start_position >= capacity {
            start_position = 0.0;
        }

        self.grains[index] = Grain {
            start_position,
            current_position: 0,
            grain_size,
            amplitude,
            is_active: true,
            channel,
        };
        self.active.push(index);
        true
    }

    /// Render `len` samples of grain output into `wet[..][..len]`, running
    /// the scheduler along the way.
    ///
    /// Trigger positions are measured from the history's write cursor, which
    /// marks the first sample of this block. The accumulator is cleared
    /// first; grains on channels beyond `wet.len()` are retired.
    pub fn render(
        &mut self,
        history: &RingBuffer,
        wet: &mut [Vec<f32>],
        len: usize,
        settings: &GrainSettings,
        sample_rate: f64,
    ) {
        let capacity = history.capacity();
        let num_channels = wet.len().min(history.num_channels());
        let samples_per_grain = settings.samples_per_grain(sample_rate);

        for channel in wet.iter_mut() {
            channel[..len].fill(0.0);
        }

        for i in 0..len {
            if let Some(samples_per_grain) = samples_per_grain {
                self.trigger_counter += 1.0;
                if self.trigger_counter >= samples_per_grain {
                    self.trigger_counter -= samples_per_grain;

                    let cursor = (history.write_position() + i) % capacity;
                    for channel in 0..num_channels {
                        self.trigger(channel, cursor, capacity, settings, sample_rate);
                    }
                }
            }

            let mut slot = 0;
            while slot < self.active.len() {
                let index = self.active[slot];
                let grain = &mut self.grains[index];

                let rendered = grain.next_sample(history, num_channels, settings.pitch_ratio);
                if let Some(sample) = rendered {
                    wet[grain.channel][i] += sample;
                }

                if rendered.is_none() || grain.is_finished() {
                    grain.is_active = false;
                    self.active.swap_remove(slot);
                    self.free.push(index);
                } else {
                    slot += 1;
                }
            }
        }
    }

    /// Render grains for `block[..][offset..offset + len]` and blend them
    /// with the dry signal already in the block:
    /// `out = dry * (1 - wet_dry) + grains * wet_dry`.
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &mut self,
        history: &RingBuffer,
        block: &mut [&mut [f32]],
        offset: usize,
        len: usize,
        wet: &mut [Vec<f32>],
        settings: &GrainSettings,
        sample_rate: f64,
        wet_dry: f32,
    ) {
        let num_channels = block.len().min(wet.len());
        let wet = &mut wet[..num_channels];
        self.render(history, wet, len, settings, sample_rate);

        for (samples, grains) in block.iter_mut().zip(wet.iter()) {
            for (sample, grain) in samples[offset..offset + len].iter_mut().zip(&grains[..len]) {
                *sample = *sample * (1.0 - wet_dry) + grain * wet_dry;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
