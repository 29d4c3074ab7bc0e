//! # kilo-editor: editor core for kilo
//!
//! Everything above the byte level:
//!
//! - **[`options`]**: `Options`: placeholder glyph and welcome banner
//! - **[`view`]**: `ViewState`: cursor and viewport, always in bounds
//! - **[`screen`]**: `Screen`: composes one frame per refresh, one write each
//! - **[`editor`]**: `Editor`: key handling and the driving loop
//!
//! The terminal itself (raw mode, key decoding, frame buffers) lives in
//! `kilo-term`.

pub mod editor;
pub mod options;
pub mod screen;
pub mod view;

pub use editor::{Action, Editor};
pub use options::Options;
pub use screen::Screen;
pub use view::ViewState;
