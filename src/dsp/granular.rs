//! # Granular Delay
//!
//! The granular path shares the delay history with the standard one but
//! plays it back through the grain pool instead of a single read tap.
//! Per block:
//!
//! 1. **Feed back** first: each channel writes
//!    `dry + (the block written one block ago) * feedback` at the cursor,
//!    so the grains can already pick up this block's input.
//! 2. **Render and mix** the grains against the updated history
//!    (`dry * (1 - wet_dry) + grains * wet_dry`, done by the pool).
//! 3. **Ramp** the mixed output by the block's gain ramp.
//! 4. **Advance** the write cursor.

use super::{
    gain::GainRamp,
    grain::{GrainPool, GrainSettings},
    ring_buffer::RingBuffer,
};

/// Granular delay over a shared [`RingBuffer`].
#[derive(Debug, Default)]
pub struct GranularDelay {
    pool: GrainPool,
    /// Feedback signal for one channel, rebuilt per channel.
    feedback: Vec<f32>,
    /// Grain accumulator, one vector per channel.
    wet: Vec<Vec<f32>>,
}

impl GranularDelay {
    pub fn new(pool: GrainPool) -> Self {
        Self {
            pool,
            feedback: Vec::new(),
            wet: Vec::new(),
        }
    }

    /// Allocate scratch space and retire any grains left from before.
    pub fn prepare(&mut self, num_channels: usize, max_block_size: usize) {
        self.feedback = vec![0.0; max_block_size];
        self.wet = vec![vec![0.0; max_block_size]; num_channels];
        self.pool.reset();
    }

    pub fn reset(&mut self) {
        self.pool.reset();
    }

    pub fn pool(&self) -> &GrainPool {
        &self.pool
    }

    /// Process `len` samples of every channel of `block`, starting at
    /// `offset`. Same slicing rules as the standard path: `len` fits both
    /// the scratch buffers and the ring.
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &mut self,
        history: &mut RingBuffer,
        block: &mut [&mut [f32]],
        offset: usize,
        len: usize,
        feedback: f32,
        wet_dry: f32,
        settings: &GrainSettings,
        sample_rate: f64,
        ramp: GainRamp,
    ) {
        nih_plug::nih_debug_assert!(len <= self.feedback.len());
        nih_plug::nih_debug_assert!(len <= history.capacity());

        let num_channels = block.len().min(history.num_channels());
        let capacity = history.capacity();
        let previous_block = (history.write_position() + capacity - len) % capacity;

        for (channel, samples) in block.iter().enumerate().take(num_channels) {
            let dry = &samples[offset..offset + len];
            let scratch = &mut self.feedback[..len];

            history.read_into(channel, previous_block, scratch);
            for (fed_back, dry) in scratch.iter_mut().zip(dry) {
                *fed_back = dry + *fed_back * feedback;
            }

            history.write(channel, scratch);
        }

        let block = &mut block[..num_channels];
        self.pool.process(
            history,
            block,
            offset,
            len,
            &mut self.wet,
            settings,
            sample_rate,
            wet_dry,
        );

        for samples in block.iter_mut() {
            for (i, sample) in samples[offset..offset + len].iter_mut().enumerate() {
                *sample *= ramp.gain_at(offset + i);
            }
        }

        history.advance(len);
    }
}
