// SPDX-License-Identifier: MIT
//
// Terminal session: raw mode, timed byte I/O, viewport size and cleanup.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), sigaction, and raw fd reads/writes.
// These are the standard POSIX interfaces for terminal control; there is
// no safe alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// A `Terminal` captures the device's attributes once when it opens and
// holds them until it is dropped. Raw mode is derived from that snapshot
// and applied in one `tcsetattr`. Restoration reapplies the snapshot
// verbatim, so it can run any number of times.
//
// Three paths restore the terminal:
//
//   1. `Drop`. Normal return and `?`-propagated errors both unwind
//      through the session's scope before `main` returns its exit code.
//   2. The panic hook. Writes a pre-built restore sequence with a raw
//      `write(2)` (no stdout lock to deadlock on), reapplies the backed-up
//      termios, then hands over to the original hook so the message lands
//      on a working terminal.
//   3. An explicit `restore_mode()` call, for callers that want to report
//      something on a cooked terminal before the session goes out of scope.
//
// Reads use VMIN = 0 / VTIME = n: `read()` returns after at most n tenths
// of a second even with nothing typed. That bounded wait is the only
// suspension point in the program.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::ansi;
use crate::device::{ByteSink, ByteSource, Device};
use crate::error::{Error, Result};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Whether both dimensions are non-zero.
    #[inline]
    #[must_use]
    pub const fn is_usable(self) -> bool {
        self.cols > 0 && self.rows > 0
    }
}

/// Query the window size of `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Returns the raw answer, zeros included; some terminals (serial lines,
/// a few emulators under odd multiplexers) report `0×0`. Returns `None`
/// if the ioctl itself fails.
#[must_use]
pub fn get_size(fd: RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    (result == 0).then_some(Size {
        cols: ws.ws_col,
        rows: ws.ws_row,
    })
}

/// Upper bound on the length of a cursor position report.
const REPORT_MAX: usize = 32;

/// Consecutive read timeouts tolerated while waiting for a report byte.
const PROBE_PATIENCE: u32 = 10;

/// Measure the viewport by moving the cursor to the bottom-right corner and
/// asking where it ended up.
///
/// The terminal clamps the cursor to its real edges, so the reported
/// position is the size. The report is read straight from the input stream.
///
/// # Errors
///
/// Returns [`Error::SizeUnavailable`] if the report is missing or malformed,
/// and propagates I/O errors from the device.
pub fn probe_viewport_size<D: ByteSource + ByteSink + ?Sized>(dev: &mut D) -> Result<Size> {
    let mut request = Vec::with_capacity(16);
    ansi::probe_bottom_right(&mut request)?;
    dev.write_bytes(&request)?;

    request.clear();
    ansi::request_cursor_position(&mut request)?;
    dev.write_bytes(&request)?;

    let mut report = Vec::with_capacity(REPORT_MAX);
    let mut idle = 0;
    while report.len() < REPORT_MAX {
        match dev.read_byte()? {
            Some(byte) => {
                idle = 0;
                report.push(byte);
                if byte == b'R' {
                    break;
                }
            }
            None if idle < PROBE_PATIENCE => idle += 1,
            None => break,
        }
    }

    trace!(report = ?String::from_utf8_lossy(&report), "cursor position report");

    let (row, col) = ansi::parse_cursor_report(&report).ok_or(Error::SizeUnavailable)?;
    Ok(Size {
        cols: col,
        rows: row,
    })
}

/// Pick the directly reported size if it is usable, otherwise probe.
///
/// # Errors
///
/// Returns [`Error::SizeUnavailable`] if both paths fail.
pub fn resolve_viewport_size<D: ByteSource + ByteSink + ?Sized>(
    dev: &mut D,
    reported: Option<Size>,
) -> Result<Size> {
    if let Some(size) = reported.filter(|s| s.is_usable()) {
        return Ok(size);
    }

    debug!(?reported, "direct size query unusable, probing cursor position");
    probe_viewport_size(dev).map_err(|e| {
        debug!(error = %e, "cursor probe failed");
        Error::SizeUnavailable
    })
}

// ─── Raw Mode ───────────────────────────────────────────────────────────────

/// The original terminal attributes, captured once when the session opens.
///
/// Private to the session: never cloned out, never handed to callers.
struct ModeSnapshot {
    termios: libc::termios,
}

/// Settings for the raw input mode.
///
/// Everything except the read timeout is fixed: no echo, no line
/// buffering, no signals from Ctrl-C/Ctrl-Z, no Ctrl-V literal escapes,
/// no XON/XOFF, no CR→NL translation, no parity check, no 8th-bit strip,
/// no output post-processing, 8-bit characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawModeConfig {
    /// `VTIME`: how long a read waits for a byte, in tenths of a second.
    pub read_timeout_ds: u8,
}

impl RawModeConfig {
    /// Build a config from a timeout in milliseconds.
    ///
    /// Rounds up to the next tenth of a second and clamps to `1..=255`,
    /// the range `VTIME` can express without turning into a blocking read.
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        let ds = ms.div_ceil(100).clamp(1, u64::from(u8::MAX));
        Self {
            read_timeout_ds: u8::try_from(ds).unwrap_or(u8::MAX),
        }
    }

    /// The read timeout as a `Duration`.
    #[must_use]
    pub fn read_timeout(self) -> Duration {
        Duration::from_millis(u64::from(self.read_timeout_ds) * 100)
    }

    /// Derive raw-mode attributes from the original ones.
    fn derive(self, original: &libc::termios) -> libc::termios {
        let mut raw = *original;

        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        raw.c_oflag &= !libc::OPOST;
        raw.c_cflag &= !libc::CSIZE;
        raw.c_cflag |= libc::CS8;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);

        // VMIN=0, VTIME=n: read() returns as soon as one byte is available,
        // or with 0 bytes after n deciseconds.
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = self.read_timeout_ds;

        raw
    }
}

impl Default for RawModeConfig {
    fn default() -> Self {
        Self { read_timeout_ds: 1 }
    }
}

fn get_attrs(fd: RawFd) -> io::Result<libc::termios> {
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &raw mut termios) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(termios)
    }
}

fn set_attrs(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    unsafe {
        if libc::tcsetattr(fd, libc::TCSAFLUSH, termios) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// What the panic hook needs to put a raw terminal back.
#[derive(Clone, Copy)]
struct Backup {
    input: RawFd,
    output: RawFd,
    termios: libc::termios,
}

/// Global backup of the original termios for panic recovery.
///
/// The [`Terminal`] owns its own snapshot, but the panic hook can't reach
/// it. This copy, behind a [`Mutex`], is set while raw mode is active and
/// cleared once the session restores normally.
static TERMIOS_BACKUP: Mutex<Option<Backup>> = Mutex::new(None);

/// Bytes written before restoring termios after a panic: show the cursor.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[?25h";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before printing the error.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();
            original(info);
        }));
    });
}

/// Restore from the global backup. Best-effort, ignores errors.
///
/// Uses `try_lock` so a panic raised while the backup lock is held can't
/// deadlock the hook.
fn emergency_restore() {
    let Ok(mut guard) = TERMIOS_BACKUP.try_lock() else {
        return;
    };
    if let Some(backup) = guard.take() {
        unsafe {
            let _ = libc::write(
                backup.output,
                EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                EMERGENCY_RESTORE.len(),
            );
            let _ = libc::tcsetattr(backup.input, libc::TCSAFLUSH, &raw const backup.termios);
        }
    }
}

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

/// Set by the SIGWINCH handler, cleared by [`Terminal::take_resize`].
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

static SIGWINCH_INSTALLED: Once = Once::new();

/// Install a SIGWINCH handler that only flips [`SIGWINCH_RECEIVED`].
///
/// Storing to an atomic is async-signal-safe. `SA_RESTART` keeps a resize
/// from failing a frame write blocked on a slow reader. Reads still come
/// back within one VTIME, so the driving loop sees the flag promptly.
fn install_sigwinch_handler() {
    SIGWINCH_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    });
}

extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Exclusive handle on a terminal device's mode.
///
/// Opening captures the current attributes; dropping restores them.
///
/// # Example
///
/// ```no_run
/// use kilo_term::terminal::{RawModeConfig, Terminal};
///
/// let mut term = Terminal::open()?;
/// term.enter_raw_mode(RawModeConfig::default())?;
/// let size = term.query_viewport_size()?;
/// // ... draw frames, read keys ...
/// // Original mode is restored automatically on drop.
/// # Ok::<(), kilo_term::Error>(())
/// ```
pub struct Terminal {
    input: RawFd,
    output: RawFd,
    snapshot: ModeSnapshot,
    raw: bool,
}

impl Terminal {
    /// Open the session on stdin/stdout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalUnavailable`] if stdin is not a terminal.
    pub fn open() -> Result<Self> {
        Self::from_fds(libc::STDIN_FILENO, libc::STDOUT_FILENO)
    }

    /// Open the session on arbitrary descriptors.
    ///
    /// Attributes are read from and applied to `input`; frames and probes
    /// are written to `output`. The descriptors stay owned by the caller and
    /// must outlive the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalUnavailable`] if `input` is not a terminal.
    pub fn from_fds(input: RawFd, output: RawFd) -> Result<Self> {
        let termios = get_attrs(input).map_err(Error::TerminalUnavailable)?;
        install_panic_hook();

        debug!(input, output, "terminal session opened");
        Ok(Self {
            input,
            output,
            snapshot: ModeSnapshot { termios },
            raw: false,
        })
    }

    /// Whether raw mode is currently applied.
    #[inline]
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.raw
    }

    /// Switch the terminal to raw mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalConfigFailed`] if `tcsetattr` fails. There
    /// is no degraded mode; callers should treat this as fatal.
    pub fn enter_raw_mode(&mut self, config: RawModeConfig) -> Result<()> {
        let raw = config.derive(&self.snapshot.termios);

        // Back up before applying, so a panic between here and `raw = true`
        // still restores.
        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = Some(Backup {
                input: self.input,
                output: self.output,
                termios: self.snapshot.termios,
            });
        }

        set_attrs(self.input, &raw).map_err(Error::TerminalConfigFailed)?;
        install_sigwinch_handler();
        self.raw = true;

        info!(read_timeout_ms = config.read_timeout().as_millis(), "raw mode enabled");
        Ok(())
    }

    /// Reapply the original attributes verbatim.
    ///
    /// Idempotent: safe to call repeatedly, or without ever entering raw
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalConfigFailed`] if `tcsetattr` fails.
    pub fn restore_mode(&mut self) -> Result<()> {
        set_attrs(self.input, &self.snapshot.termios).map_err(Error::TerminalConfigFailed)?;

        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            if guard.as_ref().is_some_and(|b| b.input == self.input) {
                *guard = None;
            }
        }

        if self.raw {
            info!("terminal mode restored");
        }
        self.raw = false;
        Ok(())
    }

    /// Current viewport size: `TIOCGWINSZ`, falling back to the cursor probe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeUnavailable`] if neither path yields a size.
    pub fn query_viewport_size(&mut self) -> Result<Size> {
        let reported = get_size(self.output);
        resolve_viewport_size(self, reported)
    }
}

impl ByteSource for Terminal {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.input, (&raw mut byte).cast::<libc::c_void>(), 1) };

        match n {
            1 => Ok(Some(byte)),
            0 => Ok(None),
            _ => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
                    _ => Err(Error::Io(err)),
                }
            }
        }
    }
}

impl ByteSink for Terminal {
    /// One logical write of `data`.
    ///
    /// A signal can cut a blocked `write(2)` short or interrupt it outright;
    /// the rest of the frame is sent before returning. Only a device error,
    /// or a device that accepts zero bytes, fails the write.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            let n = unsafe {
                libc::write(
                    self.output,
                    rest.as_ptr().cast::<libc::c_void>(),
                    rest.len(),
                )
            };

            match usize::try_from(n) {
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!(
                            "terminal accepted no bytes ({} of {} left)",
                            rest.len(),
                            data.len()
                        ),
                    )));
                }
                Ok(written) => {
                    if written < rest.len() {
                        trace!(written, left = rest.len() - written, "partial write, resuming");
                    }
                    rest = &rest[written.min(rest.len())..];
                }
                Err(_) => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(Error::Io(err));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Device for Terminal {
    fn viewport_size(&mut self) -> Result<Size> {
        self.query_viewport_size()
    }

    fn take_resize(&mut self) -> bool {
        SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.raw {
            let _ = self.restore_mode();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
