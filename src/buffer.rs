//! A growable byte buffer with streaming read/write cursors and random
//! peek/update, the data plane for async I/O.

use crate::error::{NetError, Result};

/// Default initial capacity: 4 KiB, enough for two typical MTUs.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4096;
/// Default upper bound on buffer footprint: 1 MiB.
pub const DEFAULT_LIMIT: usize = 1024 * 1024;

/// A contiguous byte region with a read cursor `r` and a write cursor `w`,
/// maintaining `0 <= r <= w <= capacity() <= limit`.
///
/// Readable span is `[r, w)`; writable span is `[w, capacity())`. The buffer
/// is not `Sync`; callers that need to hand it across threads (e.g. the
/// outbound buffer of an async TCP connection) guard it with an external
/// mutex rather than relying on any internal synchronization here.
#[derive(Clone)]
pub struct StreamBuffer {
    bytes: Vec<u8>,
    limit: usize,
    r: usize,
    w: usize,
}

impl StreamBuffer {
    /// A new, empty buffer with the given initial capacity and upper bound.
    pub fn with_capacity(initial_capacity: usize, limit: usize) -> StreamBuffer {
        StreamBuffer {
            bytes: vec![0u8; initial_capacity.min(limit)],
            limit,
            r: 0,
            w: 0,
        }
    }

    /// A new buffer with the initial byte range copied in; `w` is set to `n`.
    pub fn from_bytes(data: &[u8], initial_capacity: usize, limit: usize) -> StreamBuffer {
        let cap = initial_capacity.max(data.len()).min(limit.max(data.len()));
        let mut bytes = vec![0u8; cap];
        bytes[..data.len()].copy_from_slice(data);
        StreamBuffer {
            bytes,
            limit,
            r: 0,
            w: data.len(),
        }
    }

    /// The configured upper bound on footprint.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current allocated capacity (not all of it necessarily writable: `r`
    /// bytes at the front may be stale but not yet compacted away).
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of readable bytes, `w - r`.
    pub fn readable(&self) -> usize {
        self.w - self.r
    }

    /// Number of writable bytes without growing or compacting, `capacity - w`.
    pub fn writable(&self) -> usize {
        self.bytes.len() - self.w
    }

    /// True if there is nothing readable.
    pub fn is_empty(&self) -> bool {
        self.r == self.w
    }

    /// Reset both cursors to 0, discarding any readable data.
    pub fn clear(&mut self) {
        self.r = 0;
        self.w = 0;
    }

    /// Ensure at least `n` bytes are writable, compacting and/or growing as
    /// needed. Leaves the buffer unchanged and returns an overflow error if
    /// `n` cannot be satisfied within `limit`.
    pub fn reserve(&mut self, n: usize) -> Result<()> {
        if n == 0 || self.bytes.len() - self.w >= n {
            return Ok(());
        }
        if self.w - self.r + n > self.limit {
            return Err(NetError::logic(format!(
                "stream buffer overflow: readable={} requested={} limit={}",
                self.readable(),
                n,
                self.limit
            )));
        }
        if self.w + n > self.limit {
            self.compact();
        }
        self.bytes.resize(self.w + n, 0);
        Ok(())
    }

    /// Shift the readable span `[r, w)` to the front, resetting `r` to 0.
    fn compact(&mut self) {
        if self.r == 0 {
            return;
        }
        self.bytes.copy_within(self.r..self.w, 0);
        self.w -= self.r;
        self.r = 0;
    }

    /// Append `data`, growing/compacting as necessary. A zero-length write
    /// always succeeds without touching buffer state.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.reserve(data.len())?;
        let w = self.w;
        self.bytes[w..w + data.len()].copy_from_slice(data);
        self.w += data.len();
        Ok(())
    }

    /// Append `data` followed by a single delimiter byte.
    pub fn write_delimited(&mut self, data: &[u8], delim: u8) -> Result<()> {
        self.reserve(data.len() + 1)?;
        self.write(data)?;
        self.write(&[delim])
    }

    /// A slice over the writable span, for callers that want to write into
    /// the buffer without an intermediate copy (e.g. handing it to `recv`).
    pub fn writable_slice(&mut self) -> &mut [u8] {
        let w = self.w;
        &mut self.bytes[w..]
    }

    /// Advance the write cursor by `n` bytes already placed via
    /// [`StreamBuffer::writable_slice`]. Fails if fewer than `n` bytes are
    /// writable.
    pub fn advance_write(&mut self, n: usize) -> Result<()> {
        if self.bytes.len() - self.w < n {
            return Err(NetError::logic("advance_write beyond writable span"));
        }
        self.w += n;
        Ok(())
    }

    /// Copy the next `n` readable bytes out and advance the read cursor.
    /// Fails with underflow if fewer than `n` bytes are readable, leaving the
    /// buffer unchanged.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.readable() < n {
            return Err(NetError::logic(format!(
                "stream buffer underflow: readable={} requested={n}",
                self.readable()
            )));
        }
        let out = self.bytes[self.r..self.r + n].to_vec();
        self.advance_read(n);
        Ok(out)
    }

    /// Advance the read cursor by `n` without copying (the caller has
    /// already consumed the bytes via [`StreamBuffer::readable_slice`]).
    /// Snaps both cursors to 0 once drained, per the buffer's contract.
    pub fn advance_read(&mut self, n: usize) {
        debug_assert!(self.r + n <= self.w);
        self.r += n;
        if self.r == self.w {
            self.r = 0;
            self.w = 0;
        }
    }

    /// A slice over the readable span, for callers that want to hand the
    /// buffer to a syscall without copying (e.g. `send`).
    pub fn readable_slice(&self) -> &[u8] {
        &self.bytes[self.r..self.w]
    }

    /// Number of readable bytes up to, but excluding, the first occurrence of
    /// `delim` in the readable span, or `None` if `delim` does not occur.
    pub fn readable_to(&self, delim: u8) -> Option<usize> {
        self.readable_slice().iter().position(|&b| b == delim)
    }

    /// Like [`StreamBuffer::readable_to`], but starting `offset` bytes into
    /// the readable span instead of at `r`.
    pub fn readable_from(&self, offset: usize, delim: u8) -> Option<usize> {
        let slice = self.readable_slice();
        if offset > slice.len() {
            return None;
        }
        slice[offset..].iter().position(|&b| b == delim)
    }

    /// Read and consume the readable span up to (not including) the first
    /// occurrence of `delim`, also consuming the delimiter itself. Returns
    /// `None` (leaving the buffer unchanged) if `delim` does not occur.
    pub fn read_to(&mut self, delim: u8) -> Option<Vec<u8>> {
        let pos = self.readable_to(delim)?;
        let out = self.bytes[self.r..self.r + pos].to_vec();
        self.advance_read(pos + 1);
        Some(out)
    }

    /// Copy `n` bytes starting `offset` into the readable span, without
    /// moving either cursor. Fails with underflow if the range is out of
    /// bounds.
    pub fn peek(&self, offset: usize, n: usize) -> Result<Vec<u8>> {
        let slice = self.readable_slice();
        if offset + n > slice.len() {
            return Err(NetError::logic("peek beyond readable span"));
        }
        Ok(slice[offset..offset + n].to_vec())
    }

    /// Overwrite `n` bytes starting `offset` into the readable span with
    /// `data`, without moving either cursor.
    pub fn update(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let readable = self.readable();
        if offset + data.len() > readable {
            return Err(NetError::logic("update beyond readable span"));
        }
        let start = self.r + offset;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Read a big-endian `u8` (i.e. a single byte) and advance `r`.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    /// Write a `u8`.
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write(&[v])
    }

    /// Read a big-endian `u16` and advance `r`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Write a `u16` in network (big-endian) byte order.
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write(&v.to_be_bytes())
    }

    /// Read a big-endian `u32` and advance `r`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Write a `u32` in network (big-endian) byte order.
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write(&v.to_be_bytes())
    }
}

impl Default for StreamBuffer {
    fn default() -> StreamBuffer {
        StreamBuffer::with_capacity(DEFAULT_INITIAL_CAPACITY, DEFAULT_LIMIT)
    }
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("r", &self.r)
            .field("w", &self.w)
            .field("capacity", &self.bytes.len())
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut b = StreamBuffer::default();
        b.write(b"hello").unwrap();
        assert_eq!(b.read(5).unwrap(), b"hello");
        assert!(b.is_empty());
    }

    #[test]
    fn cursors_snap_to_zero_on_drain() {
        let mut b = StreamBuffer::default();
        b.write(b"abc").unwrap();
        b.read(3).unwrap();
        assert_eq!(b.readable(), 0);
        // internal cursors reset; writable span is the full capacity again
        assert_eq!(b.writable(), b.capacity());
    }

    #[test]
    fn delimited_read() {
        let mut b = StreamBuffer::default();
        b.write(b"XXX\nYYY").unwrap();
        let before = b.readable_to(b'\n').unwrap();
        assert_eq!(before, 3);
        let chunk = b.read_to(b'\n').unwrap();
        assert_eq!(chunk, b"XXX");
        assert_eq!(b.readable_slice(), b"YYY");
    }

    #[test]
    fn delimited_read_not_found() {
        let mut b = StreamBuffer::default();
        b.write(b"no delimiter here").unwrap();
        assert!(b.readable_to(b'\n').is_none());
        assert!(b.read_to(b'\n').is_none());
        assert_eq!(b.readable(), "no delimiter here".len());
    }

    #[test]
    fn zero_length_write_is_noop() {
        let mut b = StreamBuffer::default();
        let before = (b.readable(), b.writable(), b.capacity());
        b.write(b"").unwrap();
        assert_eq!(before, (b.readable(), b.writable(), b.capacity()));
    }

    #[test]
    fn peek_and_update_do_not_move_cursors() {
        let mut b = StreamBuffer::default();
        b.write(b"abcdef").unwrap();
        assert_eq!(b.peek(2, 3).unwrap(), b"cde");
        b.update(0, b"XY").unwrap();
        assert_eq!(b.readable_slice(), b"XYcdef");
        assert_eq!(b.readable(), 6);
    }

    #[test]
    fn overflow_and_underflow_leave_state_unchanged() {
        let mut b = StreamBuffer::with_capacity(4, 4);
        b.write(b"abcd").unwrap();
        let err = b.write(b"e").unwrap_err();
        assert!(err.is_logic());
        assert_eq!(b.readable(), 4);

        let err = b.read(10).unwrap_err();
        assert!(err.is_logic());
        assert_eq!(b.readable(), 4);
    }

    #[test]
    fn compaction_on_reserve() {
        // limit=8: write(4), read(2), write(6) must succeed via compaction,
        // leaving r=0, w=8; a further write(1) must fail with overflow.
        let mut b = StreamBuffer::with_capacity(4, 8);
        b.write(b"abcd").unwrap();
        b.read(2).unwrap();
        assert_eq!(b.readable(), 2);
        b.write(b"ABCDEF").unwrap();
        assert_eq!(b.readable(), 8);
        assert_eq!(b.readable_slice(), b"cdABCDEF");
        assert_eq!(b.writable(), 0);

        let before = b.readable_slice().to_vec();
        let err = b.write(b"!").unwrap_err();
        assert!(err.is_logic());
        assert_eq!(b.readable_slice(), before.as_slice());
    }

    #[test]
    fn initial_bytes_constructor() {
        let b = StreamBuffer::from_bytes(b"seed", 16, 64);
        assert_eq!(b.readable(), 4);
        assert_eq!(b.readable_slice(), b"seed");
    }

    #[test]
    fn integer_helpers_round_trip() {
        let mut b = StreamBuffer::default();
        b.write_u8(7).unwrap();
        b.write_u16(300).unwrap();
        b.write_u32(70_000).unwrap();
        assert_eq!(b.read_u8().unwrap(), 7);
        assert_eq!(b.read_u16().unwrap(), 300);
        assert_eq!(b.read_u32().unwrap(), 70_000);
    }
}
