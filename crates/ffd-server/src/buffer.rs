//! Bounded accumulation of a request head.
//!
//! A [`RequestBuffer`] reads from a connection until the blank line that
//! ends an HTTP request head appears, the buffer reaches its capacity, or
//! the peer closes. The buffer grows on demand but every read is limited
//! to the space left below capacity, so the cursor can never pass it.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Sequence that ends a request head.
pub const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Bytes of the previous fill re-scanned after each read, so a terminator
/// split across two reads is still found.
const SCAN_OVERLAP: usize = 3;

/// Result of [`RequestBuffer::fill_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// A terminator was found; the head is the first `head_len` bytes,
    /// terminator included.
    Complete {
        /// Length of the request head.
        head_len: usize,
    },
    /// Capacity was reached without a terminator.
    Overflow,
    /// The peer closed before a terminator arrived.
    Closed {
        /// Whether any bytes were received first.
        partial: bool,
    },
}

/// A growable byte region with a fixed capacity.
#[derive(Debug)]
pub struct RequestBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl RequestBuffer {
    /// Create an empty buffer that will hold at most `capacity` bytes.
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }

    /// Bytes received so far (the write cursor).
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been received.
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of bytes this buffer will accept.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Everything received so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The first `len` received bytes, clamped to what was received.
    pub fn head(&self, len: usize) -> &[u8] {
        self.data.get(..len).unwrap_or(&self.data)
    }

    /// Read from `reader` until a terminator is buffered, the buffer is
    /// full, or the peer closes.
    ///
    /// # Errors
    ///
    /// Propagates read errors from `reader`.
    pub async fn fill_from<R>(&mut self, reader: &mut R) -> std::io::Result<FillOutcome>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut scan_from = 0;
        loop {
            if let Some(head_len) = self.find_terminator(scan_from) {
                return Ok(FillOutcome::Complete { head_len });
            }

            let remaining = self.capacity.saturating_sub(self.data.len());
            if remaining == 0 {
                return Ok(FillOutcome::Overflow);
            }

            scan_from = self.data.len().saturating_sub(SCAN_OVERLAP);
            let limit = u64::try_from(remaining).unwrap_or(u64::MAX);
            let read = (&mut *reader).take(limit).read_buf(&mut self.data).await?;
            if read == 0 {
                return Ok(FillOutcome::Closed {
                    partial: !self.data.is_empty(),
                });
            }
        }
    }

    /// End offset of the first terminator at or after `from`.
    fn find_terminator(&self, from: usize) -> Option<usize> {
        let tail = self.data.get(from..)?;
        tail.windows(TERMINATOR.len())
            .position(|window| window == TERMINATOR)
            .and_then(|pos| from.checked_add(pos))
            .and_then(|start| start.checked_add(TERMINATOR.len()))
    }
}
