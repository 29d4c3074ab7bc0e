// SPDX-License-Identifier: MIT
//
// kilo-term: terminal session layer for kilo.
//
// Owns everything that touches the terminal device directly: raw-mode
// entry and guaranteed restoration, byte-at-a-time reads with a bounded
// wait, single-write frame output, viewport size queries, and the
// escape-sequence decoder that turns the raw byte stream into keys.
//
// No TUI framework sits in between. Raw termios in, ANSI bytes out.

#[cfg(not(unix))]
compile_error!("kilo-term drives the terminal through termios and requires a Unix target");

pub mod ansi;
pub mod device;
pub mod error;
pub mod input;
pub mod output;
pub mod terminal;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use device::{ByteSink, ByteSource, Device};
pub use error::{Error, Result};
pub use input::KeyEvent;
pub use terminal::{RawModeConfig, Size, Terminal};
