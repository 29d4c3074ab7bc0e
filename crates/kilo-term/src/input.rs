// SPDX-License-Identifier: MIT
//
// Key decoding.
//
// Turns the terminal's raw byte stream into logical keys. Single bytes map
// directly; the escape byte starts a small state machine that recognizes
// the legacy CSI and SS3 encodings of the navigation keys:
//
//   ESC [ A/B/C/D        arrows
//   ESC [ H/F  ESC O H/F Home / End
//   ESC [ 1~ 7~          Home
//   ESC [ 4~ 8~          End
//   ESC [ 3~             Delete
//   ESC [ 5~ 6~          PageUp / PageDown
//
// # Design
//
// `Decoder` is a pure state machine: feed it one byte, it answers with a
// key or asks for more. `timeout` tells it the next byte didn't arrive in
// time. `poll_key` and `read_key` drive it from a `ByteSource`.
//
// Resolution is strictly prefix-driven. A byte that has been accepted into
// a sequence is never reinterpreted as a key of its own, and a sequence
// that stops matching is discarded whole and reported as a bare Escape.
// The stream is always left positioned right after the last byte the
// decoder looked at.

use tracing::debug;

use crate::device::ByteSource;
use crate::error::Result;

/// The escape byte that introduces every multi-byte sequence.
pub const ESC: u8 = 0x1B;

// ─── Key Events ─────────────────────────────────────────────────────────────

/// A decoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    /// Any byte that isn't a control character or the start of an escape
    /// sequence, `0x7F` (Backspace on most terminals) included.
    Printable(u8),
    /// A control character, carried as the key it is typed with: `0x11` is
    /// `Ctrl(b'q')`, `0x00` is `Ctrl(b'@')`, `0x1C` is `Ctrl(b'\\')`.
    ///
    /// Enter and Tab arrive as `Ctrl(b'm')` and `Ctrl(b'i')`.
    Ctrl(u8),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    /// A bare Escape keypress, or an escape sequence that was not recognized.
    Escape,
}

impl KeyEvent {
    /// Decode a byte that does not start an escape sequence.
    ///
    /// Pure and total: every byte maps to exactly one key. `ESC` itself
    /// maps to [`Escape`](Self::Escape).
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            ESC => Self::Escape,
            0x00..=0x1F => Self::Ctrl(byte | 0x40).lowercase_ctrl(),
            _ => Self::Printable(byte),
        }
    }

    /// The key for `Ctrl` + `base`.
    ///
    /// Letters are case-insensitive: `ctrl(b'Q') == ctrl(b'q')`.
    #[must_use]
    pub const fn ctrl(base: u8) -> Self {
        Self::from_byte(base & 0x1F)
    }

    /// Whether this is one of the cursor-motion keys.
    #[must_use]
    pub const fn is_motion(self) -> bool {
        matches!(
            self,
            Self::ArrowUp
                | Self::ArrowDown
                | Self::ArrowLeft
                | Self::ArrowRight
                | Self::Home
                | Self::End
                | Self::PageUp
                | Self::PageDown
        )
    }

    /// `Ctrl` letters are carried lowercase (`0x01..=0x1A` → `a..=z`).
    const fn lowercase_ctrl(self) -> Self {
        match self {
            Self::Ctrl(base @ b'A'..=b'Z') => Self::Ctrl(base.to_ascii_lowercase()),
            other => other,
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Where the decoder is inside an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between keys.
    Ground,
    /// Saw `ESC`.
    Escape,
    /// Saw `ESC [`.
    Csi,
    /// Saw `ESC [ <digit>`.
    CsiNumeric(u8),
    /// Saw `ESC O`.
    Ss3,
}

/// The bytes of the sequence currently in flight. Never more than four.
#[derive(Debug, Clone, Copy, Default)]
struct InFlight {
    bytes: [u8; 4],
    len: usize,
}

impl InFlight {
    fn push(&mut self, byte: u8) {
        if self.len < self.bytes.len() {
            self.bytes[self.len] = byte;
            self.len += 1;
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

/// Outcome of feeding one byte to the [`Decoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The byte completed a key.
    Key(KeyEvent),
    /// The byte was accepted into a sequence; feed the next one.
    Pending,
}

/// Escape-sequence state machine.
///
/// # Example
///
/// ```
/// use kilo_term::input::{Decoder, KeyEvent, Step};
///
/// let mut decoder = Decoder::new();
/// assert_eq!(decoder.feed(0x1B), Step::Pending);
/// assert_eq!(decoder.feed(b'['), Step::Pending);
/// assert_eq!(decoder.feed(b'A'), Step::Key(KeyEvent::ArrowUp));
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    state: State,
    in_flight: InFlight,
}

impl Decoder {
    /// A decoder between keys.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            in_flight: InFlight::default(),
        }
    }

    /// Whether a sequence is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state != State::Ground
    }

    /// Feed one byte.
    pub fn feed(&mut self, byte: u8) -> Step {
        match self.state {
            State::Ground if byte == ESC => self.advance(State::Escape, byte),
            State::Ground => Step::Key(KeyEvent::from_byte(byte)),

            State::Escape => match byte {
                b'[' => self.advance(State::Csi, byte),
                b'O' => self.advance(State::Ss3, byte),
                _ => self.discard(byte),
            },

            State::Csi => match byte {
                b'A' => self.finish(KeyEvent::ArrowUp),
                b'B' => self.finish(KeyEvent::ArrowDown),
                b'C' => self.finish(KeyEvent::ArrowRight),
                b'D' => self.finish(KeyEvent::ArrowLeft),
                b'H' => self.finish(KeyEvent::Home),
                b'F' => self.finish(KeyEvent::End),
                b'0'..=b'9' => self.advance(State::CsiNumeric(byte - b'0'), byte),
                _ => self.discard(byte),
            },

            State::CsiNumeric(digit) => match (digit, byte) {
                (1 | 7, b'~') => self.finish(KeyEvent::Home),
                (3, b'~') => self.finish(KeyEvent::Delete),
                (4 | 8, b'~') => self.finish(KeyEvent::End),
                (5, b'~') => self.finish(KeyEvent::PageUp),
                (6, b'~') => self.finish(KeyEvent::PageDown),
                _ => self.discard(byte),
            },

            State::Ss3 => match byte {
                b'H' => self.finish(KeyEvent::Home),
                b'F' => self.finish(KeyEvent::End),
                _ => self.discard(byte),
            },
        }
    }

    /// The next byte did not arrive in time.
    ///
    /// Commits a pending sequence to a bare Escape. Returns `None` when
    /// nothing was in flight.
    pub fn timeout(&mut self) -> Option<KeyEvent> {
        if !self.is_pending() {
            return None;
        }
        debug!(sequence = ?self.in_flight.as_bytes(), "escape sequence timed out");
        self.in_flight.clear();
        self.state = State::Ground;
        Some(KeyEvent::Escape)
    }

    fn advance(&mut self, next: State, byte: u8) -> Step {
        self.in_flight.push(byte);
        self.state = next;
        Step::Pending
    }

    fn finish(&mut self, key: KeyEvent) -> Step {
        self.in_flight.clear();
        self.state = State::Ground;
        Step::Key(key)
    }

    /// Drop a sequence that stopped matching, offending byte included.
    fn discard(&mut self, byte: u8) -> Step {
        self.in_flight.push(byte);
        debug!(sequence = ?self.in_flight.as_bytes(), "discarding unrecognized escape sequence");
        self.finish(KeyEvent::Escape)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Reading Keys ───────────────────────────────────────────────────────────

/// Try to read one key.
///
/// Returns `Ok(None)` if no byte arrived within one read timeout. Once a
/// first byte is in, keeps reading until the key is complete; a timeout
/// inside an escape sequence resolves it to [`KeyEvent::Escape`].
///
/// # Errors
///
/// Propagates device errors from the source.
pub fn poll_key<S: ByteSource + ?Sized>(source: &mut S) -> Result<Option<KeyEvent>> {
    let Some(first) = source.read_byte()? else {
        return Ok(None);
    };

    let mut decoder = Decoder::new();
    let mut step = decoder.feed(first);
    loop {
        match step {
            Step::Key(key) => return Ok(Some(key)),
            Step::Pending => match source.read_byte()? {
                Some(byte) => step = decoder.feed(byte),
                None => return Ok(decoder.timeout()),
            },
        }
    }
}

/// Block until a key is available.
///
/// Waits cooperatively: each read returns after the source's timeout, and
/// an empty read just means "try again".
///
/// # Errors
///
/// Propagates device errors from the source.
pub fn read_key<S: ByteSource + ?Sized>(source: &mut S) -> Result<KeyEvent> {
    loop {
        if let Some(key) = poll_key(source)? {
            return Ok(key);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Size;
    use crate::testing::VirtualTerminal;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Helper: a virtual terminal with `input` queued.
    fn term_with(input: &[u8]) -> VirtualTerminal {
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });
        term.feed(input);
        term
    }

    /// Helper: decode one key from `input`, returning it and how many
    /// input entries were left unread.
    fn decode(input: &[u8]) -> (KeyEvent, usize) {
        let mut term = term_with(input);
        let key = read_key(&mut term).unwrap();
        (key, term.pending_input())
    }

    /// Helper: run bytes through a bare decoder, collecting keys.
    fn feed_all(bytes: &[u8]) -> Vec<KeyEvent> {
        let mut decoder = Decoder::new();
        bytes
            .iter()
            .filter_map(|&b| match decoder.feed(b) {
                Step::Key(k) => Some(k),
                Step::Pending => None,
            })
            .collect()
    }

    // ── Single bytes ────────────────────────────────────────────────

    #[test]
    fn printable_ascii() {
        assert_eq!(KeyEvent::from_byte(b'a'), KeyEvent::Printable(b'a'));
        assert_eq!(KeyEvent::from_byte(b' '), KeyEvent::Printable(b' '));
        assert_eq!(KeyEvent::from_byte(b'~'), KeyEvent::Printable(b'~'));
    }

    #[test]
    fn high_bytes_and_del_are_printable() {
        assert_eq!(KeyEvent::from_byte(0x7F), KeyEvent::Printable(0x7F));
        assert_eq!(KeyEvent::from_byte(0xE9), KeyEvent::Printable(0xE9));
    }

    #[test]
    fn ctrl_letters_are_lowercase() {
        assert_eq!(KeyEvent::from_byte(0x01), KeyEvent::Ctrl(b'a'));
        assert_eq!(KeyEvent::from_byte(0x11), KeyEvent::Ctrl(b'q'));
        assert_eq!(KeyEvent::from_byte(0x1A), KeyEvent::Ctrl(b'z'));
    }

    #[test]
    fn ctrl_symbols() {
        assert_eq!(KeyEvent::from_byte(0x00), KeyEvent::Ctrl(b'@'));
        assert_eq!(KeyEvent::from_byte(0x1C), KeyEvent::Ctrl(b'\\'));
        assert_eq!(KeyEvent::from_byte(0x1D), KeyEvent::Ctrl(b']'));
        assert_eq!(KeyEvent::from_byte(0x1E), KeyEvent::Ctrl(b'^'));
        assert_eq!(KeyEvent::from_byte(0x1F), KeyEvent::Ctrl(b'_'));
    }

    #[test]
    fn enter_and_tab_are_ctrl_combos() {
        assert_eq!(KeyEvent::from_byte(b'\r'), KeyEvent::Ctrl(b'm'));
        assert_eq!(KeyEvent::from_byte(b'\t'), KeyEvent::Ctrl(b'i'));
    }

    #[test]
    fn ctrl_constructor_ignores_case() {
        assert_eq!(KeyEvent::ctrl(b'q'), KeyEvent::Ctrl(b'q'));
        assert_eq!(KeyEvent::ctrl(b'Q'), KeyEvent::Ctrl(b'q'));
    }

    #[test]
    fn ctrl_base_masks_back_to_the_raw_byte() {
        for byte in (0x00..=0x1F).filter(|&b| b != ESC) {
            match KeyEvent::from_byte(byte) {
                KeyEvent::Ctrl(base) => assert_eq!(base & 0x1F, byte, "byte {byte:#04x}"),
                other => panic!("byte {byte:#04x} decoded to {other:?}"),
            }
        }
    }

    #[test]
    fn motion_keys() {
        assert!(KeyEvent::ArrowLeft.is_motion());
        assert!(KeyEvent::PageDown.is_motion());
        assert!(!KeyEvent::Delete.is_motion());
        assert!(!KeyEvent::Printable(b'h').is_motion());
    }

    // ── Decoder transitions ─────────────────────────────────────────

    #[test]
    fn escape_is_pending_until_resolved() {
        let mut d = Decoder::new();
        assert!(!d.is_pending());
        assert_eq!(d.feed(ESC), Step::Pending);
        assert!(d.is_pending());
        assert_eq!(d.timeout(), Some(KeyEvent::Escape));
        assert!(!d.is_pending());
    }

    #[test]
    fn timeout_in_ground_is_nothing() {
        assert_eq!(Decoder::new().timeout(), None);
    }

    #[test]
    fn timeout_mid_csi_is_escape() {
        let mut d = Decoder::new();
        d.feed(ESC);
        d.feed(b'[');
        assert_eq!(d.timeout(), Some(KeyEvent::Escape));
        d.feed(ESC);
        d.feed(b'[');
        d.feed(b'5');
        assert_eq!(d.timeout(), Some(KeyEvent::Escape));
    }

    #[test]
    fn csi_letters() {
        assert_eq!(feed_all(b"\x1b[A"), [KeyEvent::ArrowUp]);
        assert_eq!(feed_all(b"\x1b[B"), [KeyEvent::ArrowDown]);
        assert_eq!(feed_all(b"\x1b[C"), [KeyEvent::ArrowRight]);
        assert_eq!(feed_all(b"\x1b[D"), [KeyEvent::ArrowLeft]);
        assert_eq!(feed_all(b"\x1b[H"), [KeyEvent::Home]);
        assert_eq!(feed_all(b"\x1b[F"), [KeyEvent::End]);
    }

    #[test]
    fn csi_tilde_digits() {
        assert_eq!(feed_all(b"\x1b[1~"), [KeyEvent::Home]);
        assert_eq!(feed_all(b"\x1b[3~"), [KeyEvent::Delete]);
        assert_eq!(feed_all(b"\x1b[4~"), [KeyEvent::End]);
        assert_eq!(feed_all(b"\x1b[5~"), [KeyEvent::PageUp]);
        assert_eq!(feed_all(b"\x1b[6~"), [KeyEvent::PageDown]);
        assert_eq!(feed_all(b"\x1b[7~"), [KeyEvent::Home]);
        assert_eq!(feed_all(b"\x1b[8~"), [KeyEvent::End]);
    }

    #[test]
    fn ss3_home_end() {
        assert_eq!(feed_all(b"\x1bOH"), [KeyEvent::Home]);
        assert_eq!(feed_all(b"\x1bOF"), [KeyEvent::End]);
    }

    #[test]
    fn unknown_digits_discard() {
        assert_eq!(feed_all(b"\x1b[0~"), [KeyEvent::Escape]);
        assert_eq!(feed_all(b"\x1b[2~"), [KeyEvent::Escape]);
        assert_eq!(feed_all(b"\x1b[9~"), [KeyEvent::Escape]);
    }

    #[test]
    fn wrong_terminator_after_digit_discards() {
        assert_eq!(feed_all(b"\x1b[1;"), [KeyEvent::Escape]);
        assert_eq!(feed_all(b"\x1b[5x"), [KeyEvent::Escape]);
    }

    #[test]
    fn unknown_csi_final_discards() {
        assert_eq!(feed_all(b"\x1b[Z"), [KeyEvent::Escape]);
    }

    #[test]
    fn unknown_ss3_final_discards() {
        assert_eq!(feed_all(b"\x1bOP"), [KeyEvent::Escape]);
        assert_eq!(feed_all(b"\x1bOA"), [KeyEvent::Escape]);
    }

    #[test]
    fn unknown_introducer_discards_both_bytes() {
        assert_eq!(feed_all(b"\x1bx"), [KeyEvent::Escape]);
        assert_eq!(feed_all(b"\x1b\x1b"), [KeyEvent::Escape]);
    }

    #[test]
    fn decoder_resets_between_sequences() {
        assert_eq!(
            feed_all(b"\x1b[Zq\x1b[Aa"),
            [
                KeyEvent::Escape,
                KeyEvent::Printable(b'q'),
                KeyEvent::ArrowUp,
                KeyEvent::Printable(b'a'),
            ]
        );
    }

    // ── Reading from a source ───────────────────────────────────────

    #[test]
    fn documented_sequences_consume_exactly_their_bytes() {
        let cases: [(&[u8], KeyEvent); 9] = [
            (b"\x1b[A", KeyEvent::ArrowUp),
            (b"\x1b[B", KeyEvent::ArrowDown),
            (b"\x1b[C", KeyEvent::ArrowRight),
            (b"\x1b[D", KeyEvent::ArrowLeft),
            (b"\x1b[H", KeyEvent::Home),
            (b"\x1b[F", KeyEvent::End),
            (b"\x1b[3~", KeyEvent::Delete),
            (b"\x1b[5~", KeyEvent::PageUp),
            (b"\x1bOF", KeyEvent::End),
        ];
        for (bytes, expected) in cases {
            let mut input = bytes.to_vec();
            input.push(b'z');
            assert_eq!(decode(&input), (expected, 1), "sequence {bytes:?}");
        }
    }

    #[test]
    fn home_end_variants() {
        assert_eq!(decode(b"\x1b[1~").0, KeyEvent::Home);
        assert_eq!(decode(b"\x1b[4~").0, KeyEvent::End);
        assert_eq!(decode(b"\x1bOH").0, KeyEvent::Home);
    }

    #[test]
    fn malformed_sequence_leaves_stream_after_it() {
        let mut term = term_with(b"\x1b[9~x\x1b[Zy");
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Escape);
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Printable(b'x'));
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Escape);
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Printable(b'y'));
        assert_eq!(term.pending_input(), 0);
    }

    #[test]
    fn lone_escape_resolves_on_timeout() {
        let mut term = term_with(b"\x1b");
        term.feed_timeout();
        term.feed(b"[");
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Escape);
        // The `[` after the timeout is a key of its own.
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Printable(b'['));
    }

    #[test]
    fn timeout_after_csi_prefix_is_escape() {
        let mut term = term_with(b"\x1b[");
        term.feed_timeout();
        term.feed(b"A");
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Escape);
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Printable(b'A'));
    }

    #[test]
    fn read_key_waits_through_idle_timeouts() {
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });
        term.feed_timeout();
        term.feed_timeout();
        term.feed(b"\x11");
        assert_eq!(read_key(&mut term).unwrap(), KeyEvent::Ctrl(b'q'));
    }

    #[test]
    fn poll_key_reports_idle() {
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });
        term.feed_timeout();
        assert_eq!(poll_key(&mut term).unwrap(), None);
    }

    #[test]
    fn device_errors_propagate() {
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });
        assert!(read_key(&mut term).is_err());
    }

    // ── Properties ──────────────────────────────────────────────────

    proptest! {
        #[test]
        fn non_escape_byte_decodes_to_itself(byte in any::<u8>().prop_filter("not ESC", |&b| b != ESC)) {
            let (key, left) = decode(&[byte, b'z']);
            prop_assert_eq!(key, KeyEvent::from_byte(byte));
            prop_assert_eq!(left, 1);
            prop_assert!(matches!(key, KeyEvent::Printable(_) | KeyEvent::Ctrl(_)));
        }

        #[test]
        fn escape_sequences_never_consume_more_than_four_bytes(
            tail in proptest::collection::vec(any::<u8>(), 3..8),
        ) {
            let mut input = vec![ESC];
            input.extend_from_slice(&tail);
            let mut term = term_with(&input);
            let _ = read_key(&mut term).unwrap();
            let consumed = input.len() - term.pending_input();
            prop_assert!((2..=4).contains(&consumed));
        }

        #[test]
        fn any_stream_decodes_without_losing_bytes(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            // Every byte ends up in exactly one key: the stream is fully
            // drained once the decoder has had a timeout at the end.
            let mut term = term_with(&bytes);
            term.feed_timeout();
            loop {
                if term.pending_input() == 0 {
                    break;
                }
                let _ = poll_key(&mut term).unwrap();
            }
            prop_assert_eq!(term.pending_input(), 0);
        }
    }
}
