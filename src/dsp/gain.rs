//! # Gain Ramp
//!
//! Jumping from one gain to another at a block boundary produces a click.
//! Instead, the gain travels in a straight line across the block:
//!
//! ```text
//! gain(i) = begin + (end - begin) * i / block_len
//! ```
//!
//! `i` is the sample index inside the *host* block, even when the engine
//! works through that block in smaller pieces, so the ramp looks the same
//! no matter how the block was split.

/// A linear gain ramp spanning one host block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainRamp {
    begin: f32,
    end: f32,
    block_len: usize,
}

impl GainRamp {
    pub fn new(begin: f32, end: f32, block_len: usize) -> Self {
        Self {
            begin,
            end,
            block_len,
        }
    }

    /// Gain to apply to sample `index` of the block.
    #[inline]
    pub fn gain_at(&self, index: usize) -> f32 {
        if self.block_len == 0 {
            return self.begin;
        }
        self.begin + (self.end - self.begin) * index as f32 / self.block_len as f32
    }
}
