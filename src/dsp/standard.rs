//! # Standard Feedback Delay
//!
//! The classic delay line, processed a block at a time:
//!
//! 1. **Read** `len` samples from `delay_samples` behind the write cursor,
//!    scaling them by the block's gain ramp as they are copied out.
//! 2. **Mix** dry and delayed: `out = dry * (1 - wet_dry) + delayed * wet_dry`.
//! 3. **Feed back**: `dry + delayed * feedback` goes back into the ring at
//!    the write cursor.
//! 4. **Advance** the cursor by `len` once every channel is done.
//!
//! Because the ring's capacity follows the delay time, the read tap sits
//! exactly on the samples that the feedback write is about to replace, so
//! step 1 must finish before step 3 touches the same channel.

use super::{gain::GainRamp, ring_buffer::RingBuffer};

/// Block-based feedback delay over a shared [`RingBuffer`].
#[derive(Debug, Default)]
pub struct StandardDelay {
    /// Holds the delayed signal while mixing, then the feedback signal
    /// that gets written back. Sized once in `prepare()`.
    scratch: Vec<f32>,
}

impl StandardDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate scratch space for blocks of up to `max_block_size` samples.
    pub fn prepare(&mut self, max_block_size: usize) {
        self.scratch = vec![0.0; max_block_size];
    }

    /// Process `len` samples of every channel of `block`, starting at
    /// `offset`.
    ///
    /// `len` must not exceed the scratch size or the ring's capacity; the
    /// dispatcher slices host blocks accordingly. Channels the ring doesn't
    /// have are left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &mut self,
        history: &mut RingBuffer,
        block: &mut [&mut [f32]],
        offset: usize,
        len: usize,
        delay_samples: usize,
        feedback: f32,
        wet_dry: f32,
        ramp: GainRamp,
    ) {
        nih_plug::nih_debug_assert!(len <= self.scratch.len());
        nih_plug::nih_debug_assert!(len <= history.capacity());

        let read_pos = history.delay_tap(delay_samples);
        let num_channels = block.len().min(history.num_channels());

        for (channel, samples) in block.iter_mut().enumerate().take(num_channels) {
            let samples = &mut samples[offset..offset + len];
            let scratch = &mut self.scratch[..len];

            history.read_into(channel, read_pos, scratch);

            for (i, (sample, delayed)) in samples.iter_mut().zip(scratch.iter_mut()).enumerate() {
                let dry = *sample;
                let wet = *delayed * ramp.gain_at(offset + i);

                *sample = dry * (1.0 - wet_dry) + wet * wet_dry;

                // The scratch now turns into the feedback signal. The
                // feedback amount is a plain scalar, only the delayed part
                // carries the ramp.
                *delayed = dry + wet * feedback;
            }

            history.write(channel, scratch);
        }

        history.advance(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 1000.0;

    /// A ring whose capacity is `delay` samples, as the dispatcher would
    /// leave it.
    fn history(delay: usize, num_channels: usize) -> RingBuffer {
        let mut rb = RingBuffer::new();
        rb.prepare(SAMPLE_RATE, num_channels, 1.0);
        rb.resize(delay);
        rb
    }

    fn run(
        delay: &mut StandardDelay,
        history: &mut RingBuffer,
        input: &mut [f32],
        delay_samples: usize,
        feedback: f32,
        wet_dry: f32,
        ramp: GainRamp,
    ) {
        let len = input.len();
        let mut block = [input];
        delay.process(history, &mut block, 0, len, delay_samples, feedback, wet_dry, ramp);
    }

    #[test]
    fn test_dry_passthrough() {
        let mut delay = StandardDelay::new();
        delay.prepare(16);
        let mut rb = history(8, 1);

        let mut input = [0.1, 0.2, 0.3, 0.4];
        run(&mut delay, &mut rb, &mut input, 8, 0.5, 0.0, GainRamp::new(1.0, 1.0, 4));

        assert_eq!(input, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(rb.write_position(), 4);
    }

    /// With feedback at zero the ring stores exactly the dry input, and it
    /// comes back `delay` samples later.
    #[test]
    fn test_block_comes_back_after_delay() {
        let mut delay = StandardDelay::new();
        delay.prepare(16);
        let mut rb = history(8, 1);
        let unity = GainRamp::new(1.0, 1.0, 4);

        let mut first = [1.0, 2.0, 3.0, 4.0];
        run(&mut delay, &mut rb, &mut first, 8, 0.0, 1.0, unity);
        assert_eq!(first, [0.0; 4], "nothing has been delayed yet");

        let mut second = [0.0; 4];
        run(&mut delay, &mut rb, &mut second, 8, 0.0, 1.0, unity);
        assert_eq!(second, [0.0; 4]);

        let mut third = [0.0; 4];
        run(&mut delay, &mut rb, &mut third, 8, 0.0, 1.0, unity);
        assert_eq!(third, [1.0, 2.0, 3.0, 4.0]);
    }

    /// Each trip around the loop multiplies the echo by `feedback`.
    #[test]
    fn test_feedback_repeats_decay() {
        let mut delay = StandardDelay::new();
        delay.prepare(16);
        let mut rb = history(4, 1);
        let unity = GainRamp::new(1.0, 1.0, 4);

        let mut block = [1.0; 4];
        run(&mut delay, &mut rb, &mut block, 4, 0.5, 1.0, unity);

        for expected in [1.0, 0.5, 0.25, 0.125] {
            let mut block = [0.0; 4];
            run(&mut delay, &mut rb, &mut block, 4, 0.5, 1.0, unity);
            assert!(
                block.iter().all(|s| (s - expected).abs() < 1e-6),
                "expected echoes of {expected}, got {block:?}"
            );
        }
    }

    /// A constant delayed signal comes out shaped exactly like the ramp.
    #[test]
    fn test_gain_ramp_shapes_delayed_signal() {
        let mut delay = StandardDelay::new();
        delay.prepare(128);
        let mut rb = history(100, 1);

        let mut fill = [1.0; 100];
        run(&mut delay, &mut rb, &mut fill, 100, 0.0, 1.0, GainRamp::new(1.0, 1.0, 100));

        let ramp = GainRamp::new(0.2, 0.8, 100);
        let mut block = [0.0; 100];
        run(&mut delay, &mut rb, &mut block, 100, 0.0, 1.0, ramp);

        for (i, sample) in block.iter().enumerate() {
            let expected = 0.2 + 0.6 * i as f32 / 100.0;
            assert!(
                (sample - expected).abs() < 1e-6,
                "sample {i}: expected {expected}, got {sample}"
            );
        }
    }

    /// The ramp index is taken relative to the host block, so processing a
    /// block in two halves gives the same result as doing it at once.
    #[test]
    fn test_ramp_follows_host_block_offset() {
        let mut delay = StandardDelay::new();
        delay.prepare(8);
        let mut rb = history(8, 1);

        let mut fill = [1.0; 8];
        run(&mut delay, &mut rb, &mut fill, 8, 0.0, 1.0, GainRamp::new(1.0, 1.0, 8));

        let ramp = GainRamp::new(0.0, 1.0, 8);
        let mut samples = [0.0; 8];
        {
            let mut block = [&mut samples[..]];
            delay.process(&mut rb, &mut block, 0, 4, 8, 0.0, 1.0, ramp);
            delay.process(&mut rb, &mut block, 4, 4, 8, 0.0, 1.0, ramp);
        }

        let expected: Vec<f32> = (0..8).map(|i| i as f32 / 8.0).collect();
        assert_eq!(samples.to_vec(), expected);
    }

    #[test]
    fn test_extra_channels_pass_through() {
        let mut delay = StandardDelay::new();
        delay.prepare(4);
        let mut rb = history(4, 1);

        let mut left = [1.0; 4];
        let mut right = [0.7; 4];
        {
            let mut block = [&mut left[..], &mut right[..]];
            delay.process(&mut rb, &mut block, 0, 4, 4, 0.0, 1.0, GainRamp::new(1.0, 1.0, 4));
        }

        assert_eq!(left, [0.0; 4]);
        assert_eq!(right, [0.7; 4]);
    }
}
