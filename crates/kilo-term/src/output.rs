// SPDX-License-Identifier: MIT
//
// Frame accumulation for single-write output.
//
// Every byte of a frame (cursor hide, rows, clears, final cursor position,
// cursor show) goes into a `FrameBuffer` first. Nothing reaches the
// terminal until the frame is complete, and then it all goes out in one
// `write_bytes` call. A terminal never sees half an escape sequence or a
// cursor caught mid-frame.

use std::io::{self, Write};

use crate::device::ByteSink;
use crate::error::Result;

/// Starting capacity. A full 80×24 frame of placeholders is well under this.
const DEFAULT_CAPACITY: usize = 4096;

/// An append-only byte buffer holding exactly one frame.
///
/// Built fresh for every refresh and consumed by [`flush_to`](Self::flush_to).
/// There is no way to clear or partially drain it.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty frame with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been appended yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Append a byte slice.
    #[inline]
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `byte` repeated `count` times.
    pub fn push_repeated(&mut self, byte: u8, count: usize) {
        self.buf.resize(self.buf.len() + count, byte);
    }

    /// Write the whole frame to `sink` in one call and discard it.
    ///
    /// # Errors
    ///
    /// Propagates the sink's write error. The frame is gone either way.
    pub fn flush_to<S: ByteSink + ?Sized>(self, sink: &mut S) -> Result<()> {
        sink.write_bytes(&self.buf)
    }
}

impl Write for FrameBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // No-op. The only real flush is `flush_to`.
        Ok(())
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
