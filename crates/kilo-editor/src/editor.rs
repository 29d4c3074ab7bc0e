//! Editor: key handling and the driving loop.
//!
//! The loop is strictly sequential: refresh, wait for a key, update the
//! view, repeat. Every decoded key is one cycle and gets a fresh frame,
//! whether or not it moved the cursor. A read that times out with nothing
//! typed is not a cycle and draws nothing, unless the window was resized.
//!
//! The only place the loop blocks is the bounded read inside [`poll_key`],
//! so a resize is picked up within one read timeout even when nothing is
//! typed.
//!
//! ```text
//!        ┌──────────── resized? ── re-query size, clamp cursor
//!        ▼
//!   refresh (one write) ──▶ poll_key ──▶ process_key ──▶ Quit? ── clear, return
//!        ▲                                   │
//!        └───────────────────────────────────┘
//! ```

use kilo_term::input::{KeyEvent, poll_key};
use kilo_term::terminal::Size;
use kilo_term::{ByteSink, Device, Result};
use tracing::{debug, info};

use crate::options::Options;
use crate::screen::Screen;
use crate::view::ViewState;

/// Key that ends the session.
pub const QUIT_KEY: KeyEvent = KeyEvent::ctrl(b'q');

/// What the loop should do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep going.
    Continue,
    /// Leave the loop.
    Quit,
}

/// The editor: a view, a screen, and whether the screen is stale.
#[derive(Debug)]
pub struct Editor {
    view: ViewState,
    screen: Screen,
    dirty: bool,
}

impl Editor {
    /// An editor for a viewport of `size`, cursor at the origin.
    #[must_use]
    pub const fn new(size: Size, options: Options) -> Self {
        Self {
            view: ViewState::new(size),
            screen: Screen::new(options),
            dirty: true,
        }
    }

    /// The current view.
    #[must_use]
    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    /// Whether the next loop iteration will redraw.
    #[must_use]
    pub const fn needs_refresh(&self) -> bool {
        self.dirty
    }

    // -- Input --------------------------------------------------------------

    /// Apply one key. The screen is stale afterwards either way.
    pub fn process_key(&mut self, key: KeyEvent) -> Action {
        if key == QUIT_KEY {
            debug!("quit requested");
            return Action::Quit;
        }

        if !self.view.move_cursor(key) && !key.is_motion() {
            debug!(?key, "key ignored");
        }
        self.dirty = true;
        Action::Continue
    }

    /// Adopt a new viewport size.
    pub fn resize(&mut self, size: Size) {
        info!(cols = size.cols, rows = size.rows, "viewport resized");
        self.view.resize(size);
        self.dirty = true;
    }

    // -- Output -------------------------------------------------------------

    /// Draw the current view in one write.
    ///
    /// # Errors
    ///
    /// Propagates the sink's write error.
    pub fn refresh<S: ByteSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        self.screen.refresh(sink, &self.view)?;
        self.dirty = false;
        Ok(())
    }

    // -- Loop ---------------------------------------------------------------

    /// Run until the quit key, then clear the screen.
    ///
    /// The terminal's mode is the caller's business: this only reads keys
    /// and writes frames.
    ///
    /// # Errors
    ///
    /// Any device error ends the loop and is returned as-is. The screen is
    /// left as it was; clearing it is up to the caller.
    pub fn run<D: Device + ?Sized>(&mut self, dev: &mut D) -> Result<()> {
        info!(
            cols = self.view.cols(),
            rows = self.view.rows(),
            "editor loop started"
        );

        loop {
            if dev.take_resize() {
                let size = dev.viewport_size()?;
                self.resize(size);
            }

            if self.dirty {
                self.refresh(dev)?;
            }

            let Some(key) = poll_key(dev)? else {
                continue;
            };

            if self.process_key(key) == Action::Quit {
                break;
            }
        }

        Screen::clear(dev)?;
        info!("editor loop finished");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
