//! Screen: composes and flushes one frame per refresh.
//!
//! Every refresh builds a fresh [`FrameBuffer`] and sends it in one write:
//!
//! ```text
//! ESC[?25l ESC[H                 hide cursor, go home
//! ~ ESC[K \r\n                   one line per row; placeholder or banner,
//! ~ ESC[K \r\n                   then clear to end of line
//! ...
//! ~ ESC[K                        no line break after the last row
//! ESC[<row>;<col>H ESC[?25h      place and show the cursor
//! ```
//!
//! Clearing each line instead of the whole screen keeps unchanged rows
//! from flickering.

use std::io::Write;

use kilo_term::ByteSink;
use kilo_term::Result;
use kilo_term::ansi;
use kilo_term::output::FrameBuffer;
use tracing::trace;

use crate::options::Options;
use crate::view::ViewState;

/// Renders [`ViewState`]s as frames.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    options: Options,
}

impl Screen {
    /// A screen with the given display options.
    #[must_use]
    pub const fn new(options: Options) -> Self {
        Self { options }
    }

    /// The row the banner goes on, if this viewport shows one.
    ///
    /// A viewport shorter than three rows has no room for it.
    #[must_use]
    pub const fn banner_row(&self, rows: u16) -> Option<u16> {
        if self.options.show_banner && rows >= 3 {
            Some(rows / 3)
        } else {
            None
        }
    }

    /// Build the frame for `view` without sending it.
    ///
    /// # Errors
    ///
    /// Only if writing into the buffer fails, which a `Vec` never does.
    pub fn compose(&self, view: &ViewState) -> Result<FrameBuffer> {
        let mut frame = FrameBuffer::new();
        ansi::cursor_hide(&mut frame)?;
        ansi::cursor_home(&mut frame)?;

        let banner_row = self.banner_row(view.rows());
        for y in 0..view.rows() {
            if banner_row == Some(y) {
                self.draw_banner(&mut frame, view.cols());
            } else {
                frame.push(self.options.placeholder);
            }

            ansi::clear_line(&mut frame)?;
            if y + 1 < view.rows() {
                frame.write_all(b"\r\n")?;
            }
        }

        ansi::cursor_to(&mut frame, view.cursor_row(), view.cursor_col())?;
        ansi::cursor_show(&mut frame)?;
        Ok(frame)
    }

    /// Draw the current frame to `sink` in exactly one write.
    ///
    /// # Errors
    ///
    /// Propagates the sink's write error.
    pub fn refresh<S: ByteSink + ?Sized>(&self, sink: &mut S, view: &ViewState) -> Result<()> {
        let frame = self.compose(view)?;
        trace!(bytes = frame.len(), "refresh");
        frame.flush_to(sink)
    }

    /// Clear the whole screen and home the cursor, in one write.
    ///
    /// Used on the way out, so the shell prompt comes back on a clean
    /// screen.
    ///
    /// # Errors
    ///
    /// Propagates the sink's write error.
    pub fn clear<S: ByteSink + ?Sized>(sink: &mut S) -> Result<()> {
        let mut frame = FrameBuffer::new();
        ansi::clear_screen(&mut frame)?;
        ansi::cursor_home(&mut frame)?;
        frame.flush_to(sink)
    }

    /// Banner centered in `cols`, truncated if it doesn't fit.
    ///
    /// The first cell of the left padding still shows the placeholder, so
    /// column 0 looks the same on every row.
    fn draw_banner(&self, frame: &mut FrameBuffer, cols: u16) {
        let banner = self.options.banner.as_bytes();
        let width = usize::from(cols);
        let shown = &banner[..banner.len().min(width)];

        let mut padding = (width - shown.len()) / 2;
        if padding > 0 {
            frame.push(self.options.placeholder);
            padding -= 1;
        }
        frame.push_repeated(b' ', padding);
        frame.push_bytes(shown);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kilo_term::input::KeyEvent;
    use kilo_term::terminal::Size;
    use kilo_term::testing::VirtualTerminal;
    use pretty_assertions::assert_eq;

    fn screen_with_banner(banner: &str) -> Screen {
        Screen::new(Options {
            banner: banner.to_string(),
            ..Options::default()
        })
    }

    fn frame_text(screen: &Screen, view: &ViewState) -> String {
        String::from_utf8(screen.compose(view).unwrap().as_bytes().to_vec()).unwrap()
    }

    /// Helper: the row contents of a frame, escape codes stripped.
    fn rows_of(frame: &str) -> Vec<String> {
        let body = frame
            .strip_prefix("\x1b[?25l\x1b[H")
            .unwrap()
            .rsplit_once("\x1b[K")
            .map(|(rows, _)| rows)
            .unwrap();
        body.split("\x1b[K\r\n").map(str::to_string).collect()
    }

    #[test]
    fn frame_for_80x24_after_right_and_down() {
        let screen = Screen::default();
        let mut view = ViewState::new(Size { cols: 80, rows: 24 });
        view.move_cursor(KeyEvent::ArrowRight);
        view.move_cursor(KeyEvent::ArrowDown);

        let frame = frame_text(&screen, &view);

        assert!(frame.starts_with("\x1b[?25l\x1b[H"));
        assert!(frame.ends_with("\x1b[2;2H\x1b[?25h"));
        assert_eq!(frame.matches("\x1b[K").count(), 24);
        assert_eq!(frame.matches("\r\n").count(), 23);
    }

    #[test]
    fn exact_frame_without_banner() {
        let screen = Screen::new(Options {
            show_banner: false,
            ..Options::default()
        });
        let view = ViewState::new(Size { cols: 10, rows: 3 });

        assert_eq!(
            frame_text(&screen, &view),
            "\x1b[?25l\x1b[H~\x1b[K\r\n~\x1b[K\r\n~\x1b[K\x1b[1;1H\x1b[?25h"
        );
    }

    #[test]
    fn banner_is_centered_on_a_third_of_the_height() {
        let screen = screen_with_banner("hello");
        let view = ViewState::new(Size { cols: 11, rows: 6 });

        let rows = rows_of(&frame_text(&screen, &view));
        assert_eq!(rows.len(), 6);
        // padding (11 - 5) / 2 = 3, the first cell being the placeholder.
        assert_eq!(rows[2], "~  hello");
        for (i, row) in rows.iter().enumerate() {
            if i != 2 {
                assert_eq!(row, "~", "row {i}");
            }
        }
    }

    #[test]
    fn banner_is_truncated_to_width() {
        let screen = screen_with_banner("abcdefghij");
        let view = ViewState::new(Size { cols: 4, rows: 3 });
        assert_eq!(rows_of(&frame_text(&screen, &view))[1], "abcd");
    }

    #[test]
    fn banner_with_one_cell_of_padding_is_just_the_placeholder() {
        let screen = screen_with_banner("abc");
        let view = ViewState::new(Size { cols: 5, rows: 3 });
        assert_eq!(rows_of(&frame_text(&screen, &view))[1], "~abc");
    }

    #[test]
    fn default_banner_row_on_80x24() {
        let screen = Screen::default();
        let view = ViewState::new(Size { cols: 80, rows: 24 });
        let rows = rows_of(&frame_text(&screen, &view));

        let banner = Options::default_banner();
        let padding = (80 - banner.len()) / 2;
        let expected = format!("~{}{banner}", " ".repeat(padding - 1));
        assert_eq!(rows[8], expected);
    }

    #[test]
    fn no_banner_below_three_rows() {
        let screen = Screen::default();
        assert_eq!(screen.banner_row(2), None);
        assert_eq!(screen.banner_row(3), Some(1));

        let view = ViewState::new(Size { cols: 80, rows: 2 });
        assert_eq!(rows_of(&frame_text(&screen, &view)), ["~", "~"]);
    }

    #[test]
    fn single_row_frame_has_no_line_break() {
        let screen = Screen::default();
        let view = ViewState::new(Size { cols: 80, rows: 1 });
        assert_eq!(
            frame_text(&screen, &view),
            "\x1b[?25l\x1b[H~\x1b[K\x1b[1;1H\x1b[?25h"
        );
    }

    #[test]
    fn custom_placeholder() {
        let screen = Screen::new(Options {
            placeholder: b'.',
            show_banner: false,
            ..Options::default()
        });
        let view = ViewState::new(Size { cols: 5, rows: 2 });
        assert_eq!(rows_of(&frame_text(&screen, &view)), [".", "."]);
    }

    #[test]
    fn refresh_is_one_write() {
        let screen = Screen::default();
        let view = ViewState::new(Size { cols: 80, rows: 24 });
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });

        screen.refresh(&mut term, &view).unwrap();
        screen.refresh(&mut term, &view).unwrap();

        assert_eq!(term.writes(), 2);
        assert_eq!(term.cursor(), (0, 0));
    }

    #[test]
    fn clear_is_erase_then_home_in_one_write() {
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });
        term.write_bytes(b"\x1b[5;5H").unwrap();
        Screen::clear(&mut term).unwrap();

        assert_eq!(term.writes(), 2);
        assert!(term.output().ends_with(b"\x1b[2J\x1b[H"));
        assert_eq!(term.cursor(), (0, 0));
    }

    #[test]
    fn refresh_leaves_terminal_cursor_on_view_cursor() {
        let screen = Screen::default();
        let mut view = ViewState::new(Size { cols: 80, rows: 24 });
        view.move_cursor(KeyEvent::PageDown);
        view.move_cursor(KeyEvent::End);
        let mut term = VirtualTerminal::new(Size { cols: 80, rows: 24 });

        screen.refresh(&mut term, &view).unwrap();
        assert_eq!(term.cursor(), (23, 79));
    }
}
