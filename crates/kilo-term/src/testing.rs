// SPDX-License-Identifier: MIT
//
// An in-memory terminal for tests.
//
// Input is a script of bytes and simulated timeouts. Output is recorded
// verbatim, and cursor-movement sequences are interpreted just far enough
// to answer a cursor position request the way a real emulator would:
// CUF/CUD clamp at the edges, CUP sets the position, DSR 6 queues a
// `ESC [ row ; col R` report on the input side.

use std::collections::VecDeque;
use std::io;

use crate::device::{ByteSink, ByteSource, Device};
use crate::error::{Error, Result};
use crate::terminal::{Size, resolve_viewport_size};

/// A scripted, size-aware fake terminal.
///
/// Reading past the end of the script is an I/O error rather than an
/// endless stream of timeouts, so a test that under-feeds its input fails
/// instead of hanging.
#[derive(Debug)]
pub struct VirtualTerminal {
    size: Size,
    reported: Option<Size>,
    cursor: (u16, u16),
    input: VecDeque<Option<u8>>,
    output: Vec<u8>,
    writes: usize,
    resized: bool,
    answer_probes: bool,
}

impl VirtualTerminal {
    /// A terminal of `size` whose window-size query reports the truth.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            size,
            reported: Some(size),
            cursor: (0, 0),
            input: VecDeque::new(),
            output: Vec::new(),
            writes: 0,
            resized: false,
            answer_probes: true,
        }
    }

    /// Override what the direct window-size query returns.
    ///
    /// `None` simulates a failing ioctl; a zero dimension simulates a
    /// driver that answers but doesn't know.
    #[must_use]
    pub fn with_reported(mut self, reported: Option<Size>) -> Self {
        self.reported = reported;
        self
    }

    /// Whether DSR 6 requests get an automatic answer (default: yes).
    pub fn answer_probes(&mut self, answer: bool) {
        self.answer_probes = answer;
    }

    /// Queue input bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied().map(Some));
    }

    /// Queue one read timeout.
    pub fn feed_timeout(&mut self) {
        self.input.push_back(None);
    }

    /// Change the true size, as a window resize would, and raise the
    /// resize notification.
    pub fn resize(&mut self, size: Size) {
        self.size = size;
        self.reported = Some(size);
        self.cursor = (
            self.cursor.0.min(size.rows.saturating_sub(1)),
            self.cursor.1.min(size.cols.saturating_sub(1)),
        );
        self.resized = true;
    }

    /// Everything written so far.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Number of `write_bytes` calls made.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// Current 0-based `(row, col)` of the virtual cursor.
    #[must_use]
    pub const fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    /// Input entries (bytes and timeouts) not yet read.
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    // ── Output interpretation ───────────────────────────────────────

    fn interpret(&mut self, data: &[u8]) {
        let mut i = 0;
        while i < data.len() {
            if data[i] == 0x1B && data.get(i + 1) == Some(&b'[') {
                let start = i + 2;
                let mut end = start;
                while end < data.len() && !(0x40..=0x7E).contains(&data[end]) {
                    end += 1;
                }
                if end == data.len() {
                    return;
                }
                self.csi(&data[start..end], data[end]);
                i = end + 1;
                continue;
            }
            self.glyph(data[i]);
            i += 1;
        }
    }

    fn csi(&mut self, params: &[u8], final_byte: u8) {
        let last_row = self.size.rows.saturating_sub(1);
        let last_col = self.size.cols.saturating_sub(1);
        let mut nums = params
            .split(|&b| b == b';')
            .map(|p| std::str::from_utf8(p).ok().and_then(|s| s.parse::<u16>().ok()));
        let first = nums.next().flatten();

        match final_byte {
            b'C' => self.cursor.1 = self.cursor.1.saturating_add(first.unwrap_or(1)).min(last_col),
            b'B' => self.cursor.0 = self.cursor.0.saturating_add(first.unwrap_or(1)).min(last_row),
            b'H' => {
                let row = first.unwrap_or(1).max(1) - 1;
                let col = nums.next().flatten().unwrap_or(1).max(1) - 1;
                self.cursor = (row.min(last_row), col.min(last_col));
            }
            b'n' if params == b"6" && self.answer_probes => {
                let report = format!("\x1b[{};{}R", self.cursor.0 + 1, self.cursor.1 + 1);
                self.feed(report.as_bytes());
            }
            _ => {}
        }
    }

    fn glyph(&mut self, byte: u8) {
        match byte {
            b'\r' => self.cursor.1 = 0,
            b'\n' => self.cursor.0 = (self.cursor.0 + 1).min(self.size.rows.saturating_sub(1)),
            0x20..=0x7E => {
                self.cursor.1 = (self.cursor.1 + 1).min(self.size.cols.saturating_sub(1));
            }
            _ => {}
        }
    }
}

impl ByteSource for VirtualTerminal {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.input.pop_front().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "virtual terminal input exhausted",
            ))
        })
    }
}

impl ByteSink for VirtualTerminal {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writes += 1;
        self.output.extend_from_slice(data);
        self.interpret(data);
        Ok(())
    }
}

impl Device for VirtualTerminal {
    fn viewport_size(&mut self) -> Result<Size> {
        let reported = self.reported;
        resolve_viewport_size(self, reported)
    }

    fn take_resize(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }
}
