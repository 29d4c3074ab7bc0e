//! Editor options.
//!
//! What the screen shows when there is no text: a placeholder in the first
//! cell of each empty row, and a welcome banner a third of the way down.

/// Display options for the [`Screen`](crate::screen::Screen).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Byte drawn in column 0 of every row without content.
    pub placeholder: u8,

    /// Whether to draw the welcome banner.
    pub show_banner: bool,

    /// The welcome banner text. Treated as bytes, one per cell.
    pub banner: String,
}

impl Options {
    /// Default banner: the program name and version.
    #[must_use]
    pub fn default_banner() -> String {
        format!("Kilo editor -- version {}", env!("CARGO_PKG_VERSION"))
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            placeholder: b'~',
            show_banner: true,
            banner: Self::default_banner(),
        }
    }
}
