// SPDX-License-Identifier: MIT
//
// Error taxonomy for the terminal session.
//
// Every variant here is fatal to an interactive program: once the
// terminal cannot be configured, measured, read, or written, there is
// nothing sensible left to do but restore it and exit. Malformed escape
// sequences are absent: the decoder recovers from those
// locally and never reports them.

use std::io;

use thiserror::Error;

/// A fatal terminal session failure.
#[derive(Error, Debug)]
pub enum Error {
    /// The device could not be queried at startup (e.g. not a TTY).
    #[error("terminal unavailable: {0}")]
    TerminalUnavailable(#[source] io::Error),

    /// Raw mode could not be applied, or the original mode restored.
    #[error("failed to configure terminal: {0}")]
    TerminalConfigFailed(#[source] io::Error),

    /// Neither `TIOCGWINSZ` nor the cursor probe produced a usable size.
    #[error("unable to determine window size")]
    SizeUnavailable,

    /// A read or write failed for a reason other than a timeout.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
