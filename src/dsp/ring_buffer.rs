//! # Ring Buffer (Shared Delay History)
//!
//! A multi-channel circular sample store. Both the standard feedback delay
//! and the granular engine read from and write into the same history, so
//! the ring buffer owns the one write cursor they share.
//!
//! ## Block Copies Instead of Per-Sample Writes
//!
//! The host hands us whole blocks, so everything here works on slices.
//! A block that starts near the end of the buffer has to be split in two:
//!
//! ```text
//! capacity = 10, write_pos = 7, block of 5 samples [a b c d e]
//!
//!   index:  0 1 2 3 4 5 6 7 8 9
//!   after:  d e . . . . . a b c
//!           └─┘           └───┘
//!          head copy    tail copy
//! ```
//!
//! Reads follow the same rule: a span that runs past the last index
//! continues at index 0. [`RingBuffer::read_span`] returns those two
//! contiguous pieces without copying anything.
//!
//! ## Active Capacity vs. Storage
//!
//! Storage is allocated once, in [`RingBuffer::prepare`], for the longest
//! delay the engine supports. The *active* capacity follows the delay time
//! and is always `<= max_capacity`, so changing the delay never allocates.
//! Changing it does wipe the history and the cursor is folded into the new
//! range.

/// A fixed-channel-count circular buffer of `f32` samples.
#[derive(Debug, Default)]
pub struct RingBuffer {
    /// One sample vector per channel, each `max_capacity` samples long.
    channels: Vec<Vec<f32>>,

    /// Number of samples currently in use per channel. Every index into
    /// `channels` is taken modulo this value.
    capacity: usize,

    /// Allocated length of each channel.
    max_capacity: usize,

    /// Where the next block will be written. Always `< capacity` once the
    /// buffer has been prepared.
    write_pos: usize,
}

impl RingBuffer {
    /// Create an empty, unprepared ring buffer. Call [`prepare`](Self::prepare)
    /// before using it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `round(sample_rate * max_delay_seconds)` samples for each
    /// channel, zero them and reset the write cursor.
    ///
    /// # Panics
    ///
    /// When the resulting capacity or the channel count is zero. Both are
    /// configuration bugs in the caller, not runtime conditions.
    pub fn prepare(&mut self, sample_rate: f64, num_channels: usize, max_delay_seconds: f32) {
        let max_capacity = super::seconds_to_samples(max_delay_seconds as f64, sample_rate);
        assert!(
            max_capacity > 0,
            "ring buffer capacity must be > 0 (sample rate {sample_rate}, max delay {max_delay_seconds}s)"
        );
        assert!(num_channels > 0, "ring buffer needs at least one channel");

        self.channels = (0..num_channels).map(|_| vec![0.0; max_capacity]).collect();
        self.capacity = max_capacity;
        self.max_capacity = max_capacity;
        self.write_pos = 0;
    }

    /// Whether [`prepare`](Self::prepare) has allocated storage.
    pub fn is_prepared(&self) -> bool {
        self.capacity > 0
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The active length of the ring, in samples per channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The allocated length of the ring, in samples per channel.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Index the next write will land on.
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Change the active capacity (clamped to `1..=max_capacity`).
    ///
    /// A change discards the whole history: the active region is zeroed and
    /// the write cursor is taken modulo the new capacity. Returns `true` if
    /// the capacity actually changed.
    pub fn resize(&mut self, capacity: usize) -> bool {
        assert!(self.is_prepared(), "RingBuffer::resize() called before prepare()");

        let capacity = capacity.clamp(1, self.max_capacity);
        if capacity == self.capacity {
            return false;
        }

        // Samples past `capacity` are unreachable until the ring grows
        // again, and growing clears that region first.
        for channel in &mut self.channels {
            channel[..capacity].fill(0.0);
        }
        self.capacity = capacity;
        self.write_pos %= capacity;
        true
    }

    /// Zero every channel and move the cursor back to the start. The active
    /// capacity is kept.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
        self.write_pos = 0;
    }

    /// Copy `data` into `channel`, starting at the write cursor.
    ///
    /// Like the per-sample delay line this replaces, writing does *not*
    /// move the cursor: every channel of a block is written at the same
    /// position and [`advance`](Self::advance) is called once afterwards.
    ///
    /// Data longer than the capacity wraps onto itself, so only its last
    /// `capacity` samples survive. We skip straight to those.
    pub fn write(&mut self, channel: usize, data: &[f32]) {
        let capacity = self.capacity;
        let skipped = data.len().saturating_sub(capacity);
        let data = &data[skipped..];
        let start = (self.write_pos + skipped) % capacity;

        let buffer = &mut self.channels[channel][..capacity];
        let tail_len = data.len().min(capacity - start);
        let (tail, head) = data.split_at(tail_len);

        buffer[start..start + tail_len].copy_from_slice(tail);
        buffer[..head.len()].copy_from_slice(head);
    }

    /// Borrow `len` samples of `channel` beginning at `start % capacity`.
    ///
    /// The first slice runs up to the end of the buffer, the second one
    /// (often empty) continues from index 0.
    ///
    /// # Panics
    ///
    /// When `len` exceeds the capacity; a span can't cover a sample twice.
    pub fn read_span(&self, channel: usize, start: usize, len: usize) -> (&[f32], &[f32]) {
        let capacity = self.capacity;
        assert!(
            len <= capacity,
            "span of {len} samples doesn't fit a ring of {capacity}"
        );

        let start = start % capacity;
        let buffer = &self.channels[channel][..capacity];
        let tail_len = len.min(capacity - start);

        (&buffer[start..start + tail_len], &buffer[..len - tail_len])
    }

    /// Copy `out.len()` samples of `channel` starting at `start` into `out`,
    /// wrapping as many times as needed.
    pub fn read_into(&self, channel: usize, start: usize, out: &mut [f32]) {
        let mut start = start;
        for chunk in out.chunks_mut(self.capacity) {
            let (tail, head) = self.read_span(channel, start, chunk.len());
            chunk[..tail.len()].copy_from_slice(tail);
            chunk[tail.len()..].copy_from_slice(head);
            start += chunk.len();
        }
    }

    /// Read `channel` at a fractional position using linear interpolation
    /// between `floor(position)` and the following sample. The position is
    /// wrapped into the ring first, and so is the "next" index, so reading
    /// at `capacity - 0.5` blends the last and the first sample.
    pub fn read_interpolated(&self, channel: usize, position: f64) -> f32 {
        let capacity = self.capacity;
        let position = position.rem_euclid(capacity as f64);

        // `rem_euclid` can round up to exactly `capacity` for tiny negative
        // inputs, hence the extra modulo.
        let index = position as usize % capacity;
        let frac = (position - position.floor()) as f32;
        let next = (index + 1) % capacity;

        let buffer = &self.channels[channel];
        let a = buffer[index];
        let b = buffer[next];
        a + frac * (b - a)
    }

    /// Index that lies `delay_samples` behind the write cursor.
    ///
    /// ```text
    /// tap = (write_pos + capacity - delay % capacity) % capacity
    /// ```
    ///
    /// When the delay equals the capacity (the normal case, since the
    /// capacity follows the delay time) the tap *is* the write cursor: the
    /// oldest sample in the ring, about to be overwritten.
    pub fn delay_tap(&self, delay_samples: usize) -> usize {
        let capacity = self.capacity;
        (self.write_pos + capacity - delay_samples % capacity) % capacity
    }

    /// Move the write cursor forward by `num_samples`, wrapping at the
    /// active capacity.
    pub fn advance(&mut self, num_samples: usize) {
        self.write_pos = (self.write_pos + num_samples) % self.capacity;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A ring with the given capacity, prepared at 1 Hz so that seconds
    /// and samples are the same number.
    fn ring(capacity: usize, num_channels: usize) -> RingBuffer {
        let mut rb = RingBuffer::new();
        rb.prepare(1.0, num_channels, capacity as f32);
        rb
    }

    fn collect_span(rb: &RingBuffer, channel: usize, start: usize, len: usize) -> Vec<f32> {
        let (tail, head) = rb.read_span(channel, start, len);
        tail.iter().chain(head).copied().collect()
    }

    #[test]
    fn test_prepare_sizes_and_zeroes() {
        let mut rb = RingBuffer::new();
        assert!(!rb.is_prepared());

        rb.prepare(48000.0, 2, 0.5);
        assert!(rb.is_prepared());
        assert_eq!(rb.capacity(), 24000);
        assert_eq!(rb.max_capacity(), 24000);
        assert_eq!(rb.num_channels(), 2);
        assert_eq!(rb.write_position(), 0);
        assert!(collect_span(&rb, 1, 0, 24000).iter().all(|s| *s == 0.0));
    }

    #[test]
    #[should_panic]
    fn test_prepare_rejects_zero_capacity() {
        RingBuffer::new().prepare(48000.0, 2, 0.0);
    }

    #[test]
    fn test_write_then_read_back() {
        let mut rb = ring(8, 1);
        rb.write(0, &[1.0, 2.0, 3.0]);

        // Writing doesn't move the cursor.
        assert_eq!(rb.write_position(), 0);
        assert_eq!(collect_span(&rb, 0, 0, 3), vec![1.0, 2.0, 3.0]);

        rb.advance(3);
        assert_eq!(rb.write_position(), 3);

        // Three samples behind the cursor is where the block started.
        assert_eq!(rb.delay_tap(3), 0);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut rb = ring(4, 2);
        rb.write(1, &[0.5, 0.5]);

        assert_eq!(collect_span(&rb, 0, 0, 2), vec![0.0, 0.0]);
        assert_eq!(collect_span(&rb, 1, 0, 2), vec![0.5, 0.5]);
    }

    /// Write a block across the end of the ring and compare the result
    /// against a plain (non-wrapping) buffer of twice the length, for every
    /// possible split point and block length.
    #[test]
    fn test_wraparound_matches_linear_reference() {
        const CAPACITY: usize = 7;

        for start in 0..CAPACITY {
            for len in 1..=CAPACITY {
                let mut rb = ring(CAPACITY, 1);
                rb.advance(start);

                let data: Vec<f32> = (0..len).map(|i| (i + 1) as f32).collect();
                rb.write(0, &data);

                // The reference is the ring "unrolled": index i and
                // i + CAPACITY are the same slot.
                let mut linear = vec![0.0; 2 * CAPACITY];
                linear[start..start + len].copy_from_slice(&data);
                let folded: Vec<f32> = (0..CAPACITY)
                    .map(|i| linear[i] + linear[i + CAPACITY])
                    .collect();

                assert_eq!(
                    collect_span(&rb, 0, 0, CAPACITY),
                    folded,
                    "storage mismatch for start {start}, len {len}"
                );
                assert_eq!(
                    collect_span(&rb, 0, start, len),
                    data,
                    "read-back mismatch for start {start}, len {len}"
                );

                let mut copied = vec![0.0; len];
                rb.read_into(0, start, &mut copied);
                assert_eq!(copied, data);
            }
        }
    }

    #[test]
    fn test_span_is_split_at_the_end() {
        let mut rb = ring(5, 1);
        rb.write(0, &[0.0, 1.0, 2.0, 3.0, 4.0]);

        let (tail, head) = rb.read_span(0, 3, 4);
        assert_eq!(tail, &[3.0, 4.0]);
        assert_eq!(head, &[0.0, 1.0]);

        // Start indices past the capacity are folded in first.
        let (tail, head) = rb.read_span(0, 8, 2);
        assert_eq!(tail, &[3.0, 4.0]);
        assert!(head.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_span_longer_than_capacity_panics() {
        let rb = ring(4, 1);
        let _ = rb.read_span(0, 0, 5);
    }

    /// Only the last `capacity` samples of an oversized write survive, and
    /// they end up where a sample-by-sample write would have put them.
    #[test]
    fn test_oversized_write_keeps_latest_samples() {
        let mut rb = ring(4, 1);
        rb.advance(1);
        rb.write(0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        // Sample k lands on (1 + k) % 4: 1→1, 2→2, 3→3, 4→0, 5→1, 6→2.
        assert_eq!(collect_span(&rb, 0, 0, 4), vec![4.0, 5.0, 6.0, 3.0]);
    }

    #[test]
    fn test_read_into_wraps_repeatedly() {
        let mut rb = ring(3, 1);
        rb.write(0, &[1.0, 2.0, 3.0]);

        let mut out = [0.0; 7];
        rb.read_into(0, 2, &mut out);
        assert_eq!(out, [3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_interpolated_read() {
        let mut rb = ring(4, 1);
        rb.write(0, &[0.0, 1.0, 2.0, 4.0]);

        assert!((rb.read_interpolated(0, 1.0) - 1.0).abs() < 1e-6);
        assert!((rb.read_interpolated(0, 1.5) - 1.5).abs() < 1e-6);
        assert!((rb.read_interpolated(0, 2.25) - 2.5).abs() < 1e-6);

        // Between the last and the first sample.
        assert!((rb.read_interpolated(0, 3.5) - 2.0).abs() < 1e-6);

        // Positions outside the ring are wrapped, negatives included.
        assert!((rb.read_interpolated(0, 5.5) - 1.5).abs() < 1e-6);
        assert!((rb.read_interpolated(0, -0.5) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_clears_history_and_folds_cursor() {
        let mut rb = ring(100, 2);
        rb.write(0, &[1.0; 10]);
        rb.advance(70);

        assert!(rb.resize(30));
        assert_eq!(rb.capacity(), 30);
        assert_eq!(rb.write_position(), 70 % 30);
        assert!(collect_span(&rb, 0, 0, 30).iter().all(|s| *s == 0.0));

        // Same capacity again is a no-op.
        assert!(!rb.resize(30));

        // Growing back clears the region that was out of reach.
        rb.write(1, &[0.25; 30]);
        assert!(rb.resize(100));
        assert!(collect_span(&rb, 1, 0, 100).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_resize_is_clamped_to_storage() {
        let mut rb = ring(50, 1);
        rb.advance(20);

        assert!(rb.resize(0));
        assert_eq!(rb.capacity(), 1);
        assert_eq!(rb.write_position(), 0);

        assert!(rb.resize(1000));
        assert_eq!(rb.capacity(), 50);
    }

    #[test]
    fn test_clear() {
        let mut rb = ring(10, 1);
        rb.write(0, &[0.5; 4]);
        rb.advance(4);
        rb.clear();

        assert_eq!(rb.write_position(), 0);
        assert!(collect_span(&rb, 0, 0, 10).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_advance_wraps() {
        let mut rb = ring(10, 1);
        rb.advance(7);
        rb.advance(7);
        assert_eq!(rb.write_position(), 4);
        assert_eq!(rb.delay_tap(10), 4);
        assert_eq!(rb.delay_tap(6), 8);
    }
}
