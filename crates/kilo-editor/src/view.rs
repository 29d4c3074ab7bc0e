//! View state: cursor position within the viewport.
//!
//! The cursor is always on a cell: `col < cols` and `row < rows`. Every
//! method that changes the cursor or the viewport re-establishes that, so
//! the renderer can place the cursor without checking.
//!
//! A zero-sized viewport is treated as 1×1. `Size::is_usable` rejects such
//! sizes before they get here; the clamp only keeps the invariant total.

use kilo_term::input::KeyEvent;
use kilo_term::terminal::Size;
use tracing::trace;

/// Cursor and viewport dimensions, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    cursor_row: u16,
    cursor_col: u16,
    rows: u16,
    cols: u16,
}

impl ViewState {
    /// A view of `size` with the cursor at the top-left corner.
    #[must_use]
    pub const fn new(size: Size) -> Self {
        Self {
            cursor_row: 0,
            cursor_col: 0,
            rows: if size.rows == 0 { 1 } else { size.rows },
            cols: if size.cols == 0 { 1 } else { size.cols },
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// Cursor row, 0-based.
    #[inline]
    #[must_use]
    pub const fn cursor_row(&self) -> u16 {
        self.cursor_row
    }

    /// Cursor column, 0-based.
    #[inline]
    #[must_use]
    pub const fn cursor_col(&self) -> u16 {
        self.cursor_col
    }

    /// Viewport height.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Viewport width.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    #[inline]
    const fn last_row(&self) -> u16 {
        self.rows - 1
    }

    #[inline]
    const fn last_col(&self) -> u16 {
        self.cols - 1
    }

    // -- Movement -----------------------------------------------------------

    /// Apply a motion key. Returns `true` if the cursor moved.
    ///
    /// Arrows move one cell and stop at the edges. Home and End jump to the
    /// first and last column; PageUp and PageDown to the top and bottom row.
    /// Any other key is ignored.
    pub fn move_cursor(&mut self, key: KeyEvent) -> bool {
        let before = (self.cursor_row, self.cursor_col);

        match key {
            KeyEvent::ArrowLeft => self.cursor_col = self.cursor_col.saturating_sub(1),
            KeyEvent::ArrowRight => {
                if self.cursor_col < self.last_col() {
                    self.cursor_col += 1;
                }
            }
            KeyEvent::ArrowUp => self.cursor_row = self.cursor_row.saturating_sub(1),
            KeyEvent::ArrowDown => {
                if self.cursor_row < self.last_row() {
                    self.cursor_row += 1;
                }
            }
            KeyEvent::Home => self.cursor_col = 0,
            KeyEvent::End => self.cursor_col = self.last_col(),
            KeyEvent::PageUp => self.cursor_row = 0,
            KeyEvent::PageDown => self.cursor_row = self.last_row(),
            _ => return false,
        }

        (self.cursor_row, self.cursor_col) != before
    }

    /// Adopt a new viewport size, pulling the cursor back inside it.
    pub fn resize(&mut self, size: Size) {
        *self = Self {
            cursor_row: self.cursor_row,
            cursor_col: self.cursor_col,
            ..Self::new(size)
        };
        self.cursor_row = self.cursor_row.min(self.last_row());
        self.cursor_col = self.cursor_col.min(self.last_col());
        trace!(
            rows = self.rows,
            cols = self.cols,
            row = self.cursor_row,
            col = self.cursor_col,
            "view resized"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
