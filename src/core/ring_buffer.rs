//! Fixed-capacity single-producer/single-consumer sample ring buffer.

/// Fixed-capacity ring buffer.
///
/// One instance holds one channel. The buffer never allocates after
/// construction and never shifts memory; `read_space() + write_space()` is
/// always equal to `capacity()`.
///
/// Writing more than `write_space()` or skipping more than `read_space()` is
/// a caller bug. Debug builds assert on it, release builds clamp.
#[derive(Debug, Clone)]
pub struct RingBuffer<T>
where
    T: Copy + Default,
{
    data: Vec<T>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> RingBuffer<T>
where
    T: Copy + Default,
{
    /// Creates a ring buffer with fixed capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: vec![T::default(); cap],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of samples that can be read.
    #[inline]
    pub fn read_space(&self) -> usize {
        self.len
    }

    /// Number of samples that can be written.
    #[inline]
    pub fn write_space(&self) -> usize {
        self.capacity() - self.len
    }

    /// Returns true when no samples are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discards all content.
    #[inline]
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Appends all of `input`.
    ///
    /// The caller must have checked `write_space() >= input.len()`.
    pub fn write(&mut self, input: &[T]) {
        debug_assert!(
            input.len() <= self.write_space(),
            "ring buffer overrun: writing {} with {} free",
            input.len(),
            self.write_space()
        );
        let to_push = input.len().min(self.write_space());
        if to_push == 0 {
            return;
        }
        let first = to_push.min(self.capacity() - self.tail);
        self.data[self.tail..self.tail + first].copy_from_slice(&input[..first]);
        let second = to_push - first;
        if second > 0 {
            self.data[..second].copy_from_slice(&input[first..to_push]);
        }
        self.tail = (self.tail + to_push) % self.capacity();
        self.len += to_push;
    }

    /// Appends `count` default values (silence, for samples).
    pub fn zero(&mut self, count: usize) {
        debug_assert!(count <= self.write_space());
        let count = count.min(self.write_space());
        for _ in 0..count {
            self.data[self.tail] = T::default();
            self.tail = (self.tail + 1) % self.capacity();
        }
        self.len += count;
    }

    /// Copies samples from the read cursor into `out` without consuming them.
    ///
    /// Returns the number copied, which is less than `out.len()` only when
    /// fewer samples are stored.
    pub fn peek(&self, out: &mut [T]) -> usize {
        let to_copy = out.len().min(self.len);
        if to_copy == 0 {
            return 0;
        }
        let first = to_copy.min(self.capacity() - self.head);
        out[..first].copy_from_slice(&self.data[self.head..self.head + first]);
        let second = to_copy - first;
        if second > 0 {
            out[first..to_copy].copy_from_slice(&self.data[..second]);
        }
        to_copy
    }

    /// Advances the read cursor by `count` without copying.
    ///
    /// The caller must have checked `read_space() >= count`.
    pub fn skip(&mut self, count: usize) {
        debug_assert!(
            count <= self.len,
            "ring buffer underrun: skipping {} of {}",
            count,
            self.len
        );
        let count = count.min(self.len);
        if count == 0 {
            return;
        }
        self.head = (self.head + count) % self.capacity();
        self.len -= count;
        if self.len == 0 {
            self.head = 0;
            self.tail = 0;
        }
    }

    /// Copies up to `out.len()` samples out and consumes them.
    ///
    /// Returns the number read.
    pub fn read(&mut self, out: &mut [T]) -> usize {
        let got = self.peek(out);
        self.skip(got);
        got
    }

    /// Returns a buffer of `capacity` holding this buffer's unread content.
    ///
    /// Content beyond the new capacity is dropped from the end (the newest
    /// samples), with a debug assertion since callers size for it.
    pub fn resized(&self, capacity: usize) -> Self {
        debug_assert!(self.len <= capacity);
        let mut out = Self::with_capacity(capacity);
        let keep = self.len.min(capacity);
        let mut tmp = vec![T::default(); keep];
        self.peek(&mut tmp);
        out.write(&tmp);
        out
    }
}
