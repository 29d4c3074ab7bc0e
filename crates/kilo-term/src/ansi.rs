// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation and the one report we parse back.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit. The renderer decides what a frame
// contains; this module only knows the byte-level encoding.
//
// Cursor positions are 0-indexed in our API and converted to 1-indexed
// for the terminal (ANSI CUP uses 1-based coordinates).
//
// All functions return `io::Result` propagated from the underlying writer.
// Writing into a `FrameBuffer` (backed by a Vec) never fails.

use std::io::{self, Write};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using CUP.
///
/// Our coordinates are 0-indexed; CUP is 1-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(row) + 1, u32::from(col) + 1)
}

/// Move the cursor to the top-left corner (CUP with no parameters).
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Move the cursor right by `n` columns (CUF). Stops at the right edge.
#[inline]
pub fn cursor_forward(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}C")
}

/// Move the cursor down by `n` rows (CUD). Stops at the bottom edge.
#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}B")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Clear from the cursor to the end of the line (EL 0).
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

// ─── Size Probe ──────────────────────────────────────────────────────────────

/// How far the probe pushes the cursor. The terminal clamps it to its edge.
pub const PROBE_DISTANCE: u16 = 999;

/// Push the cursor toward the bottom-right corner.
///
/// CUF and CUD are specified to stop at the screen edge, unlike CUP whose
/// behavior for out-of-range values is less consistent across terminals.
pub fn probe_bottom_right(w: &mut impl Write) -> io::Result<()> {
    cursor_forward(w, PROBE_DISTANCE)?;
    cursor_down(w, PROBE_DISTANCE)
}

/// Ask the terminal to report the cursor position (DSR 6).
///
/// The answer arrives on the input stream as `ESC [ row ; col R`.
#[inline]
pub fn request_cursor_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

/// Parse a cursor position report `ESC [ row ; col R`.
///
/// Returns the 1-based `(row, col)` exactly as the terminal sent it. The
/// trailing `R` is optional so callers can pass either the whole report or
/// the bytes collected before it. Zero coordinates are rejected since a
/// real terminal never reports them.
#[must_use]
pub fn parse_cursor_report(report: &[u8]) -> Option<(u16, u16)> {
    let body = report.strip_prefix(b"\x1b[")?;
    let body = body.strip_suffix(b"R").unwrap_or(body);

    let sep = body.iter().position(|&b| b == b';')?;
    let row = parse_u16(&body[..sep])?;
    let col = parse_u16(&body[sep + 1..])?;

    (row > 0 && col > 0).then_some((row, col))
}

/// Parse a non-empty run of ASCII digits without going through `str`.
fn parse_u16(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u16, |acc, &b| {
        if b.is_ascii_digit() {
            acc.checked_mul(10)?.checked_add(u16::from(b - b'0'))
        } else {
            None
        }
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
