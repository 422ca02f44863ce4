//! A growable byte buffer with read/write cursor semantics.
//!
//! `FrameBuffer` is the buffer type decode/encode callbacks operate on. It
//! accumulates bytes pushed in from completed reads, lets `decode` peek at
//! and consume a prefix (`advance`), and lets `encode` append outgoing bytes.
//! Unlike a ring buffer, a fully-drained `FrameBuffer` reclaims its storage
//! (`BytesMut::clear` keeps the underlying allocation, so repeated
//! request/response cycles on a long-lived connection do not keep
//! reallocating).

use bytes::{Buf, Bytes, BytesMut};

/// Default reserve of writable capacity ensured before each socket read.
pub const DEFAULT_READ_RESERVE: usize = 4 * 1024;

/// A single accumulation buffer with a read cursor.
///
/// Bytes are appended at the back (`extend_from_slice` / `push`) and
/// consumed from the front (`advance`, `take_bytes`, `peek`). This is the
/// buffer type passed to `decode` (reading) and `encode` (writing).
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Ensure at least `n` bytes of spare writable capacity, growing if
    /// necessary.
    pub fn ensure_writable_size(&mut self, n: usize) {
        if self.buf.capacity() - self.buf.len() < n {
            self.buf.reserve(n);
        }
    }

    /// Append bytes produced by a completed read.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// View the unconsumed bytes without advancing the cursor.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Advance the read cursor by `n` bytes, dropping them from the front.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the buffered length — a `decode` implementation
    /// must never claim to have consumed more than was available.
    pub fn advance(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Take the first `n` bytes as an owned, refcounted `Bytes`, advancing
    /// the cursor. Returns `None` if fewer than `n` bytes are buffered.
    pub fn take_bytes(&mut self, n: usize) -> Option<Bytes> {
        if n > self.buf.len() {
            return None;
        }
        Some(self.buf.split_to(n).freeze())
    }

    /// Append bytes to be written out (used by `encode`).
    pub fn push(&mut self, data: impl AsRef<[u8]>) {
        self.buf.extend_from_slice(data.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_and_advance_round_trip() {
        let mut buf = FrameBuffer::new();
        buf.extend_from_slice(b"hello world");
        assert_eq!(buf.len(), 11);
        assert_eq!(buf.as_slice(), b"hello world");

        buf.advance(6);
        assert_eq!(buf.as_slice(), b"world");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn take_bytes_consumes_prefix() {
        let mut buf = FrameBuffer::new();
        buf.extend_from_slice(b"\x00\x00\x00\x03abcXYZ");
        let header = buf.take_bytes(4).unwrap();
        assert_eq!(&header[..], b"\x00\x00\x00\x03");
        let body = buf.take_bytes(3).unwrap();
        assert_eq!(&body[..], b"abc");
        assert_eq!(buf.as_slice(), b"XYZ");
    }

    #[test]
    fn take_bytes_short_returns_none_and_preserves_buffer() {
        let mut buf = FrameBuffer::new();
        buf.extend_from_slice(b"ab");
        assert!(buf.take_bytes(3).is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn encode_push_appends() {
        let mut buf = FrameBuffer::new();
        buf.push(b"\x00\x00\x00\x03");
        buf.push(b"abc");
        assert_eq!(buf.as_slice(), b"\x00\x00\x00\x03abc");
    }

    #[test]
    fn ensure_writable_size_grows_capacity() {
        let mut buf = FrameBuffer::with_capacity(4);
        buf.ensure_writable_size(DEFAULT_READ_RESERVE);
        assert!(buf.buf.capacity() >= DEFAULT_READ_RESERVE);
    }
}
