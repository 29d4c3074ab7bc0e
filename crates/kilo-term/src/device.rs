// SPDX-License-Identifier: MIT
//
// The byte-level seam between the terminal and everything above it.
//
// The decoder only needs to pull bytes, the renderer only needs to push
// them, and the driving loop additionally needs the viewport size and a
// resize notification. Splitting these into traits lets the real
// `Terminal` and the in-memory virtual terminal used by tests stand in
// for each other.

use crate::error::Result;
use crate::terminal::Size;

/// A source of raw input bytes with a bounded wait per read.
pub trait ByteSource {
    /// Read exactly one byte.
    ///
    /// Returns `Ok(None)` when no byte arrived within the read timeout.
    /// That is the normal "nothing pressed yet" case, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) on a genuine device error.
    fn read_byte(&mut self) -> Result<Option<u8>>;
}

/// A sink that accepts output in single, indivisible writes.
pub trait ByteSink {
    /// Write all of `data` to the terminal as one logical operation.
    ///
    /// Nothing else is written in between, even if the device takes the
    /// bytes in several pieces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) on a genuine device error.
    /// Interruption by a signal is not one.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;
}

/// A full terminal device: input, output, and geometry.
pub trait Device: ByteSource + ByteSink {
    /// Current viewport size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeUnavailable`](crate::Error::SizeUnavailable)
    /// if the size cannot be determined.
    fn viewport_size(&mut self) -> Result<Size>;

    /// Whether the viewport changed size since the last call.
    ///
    /// Clears the pending notification.
    fn take_resize(&mut self) -> bool {
        false
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_bytes(data)
    }
}

impl<T: Device + ?Sized> Device for &mut T {
    fn viewport_size(&mut self) -> Result<Size> {
        (**self).viewport_size()
    }

    fn take_resize(&mut self) -> bool {
        (**self).take_resize()
    }
}
