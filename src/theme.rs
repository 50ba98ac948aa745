//! Terminal colors for operator output
//!
//! A single place for the handful of colors the runner uses, plus detection
//! of whether the attached terminal should receive ANSI escapes at all.
//!
//! # Usage
//! ```rust
//! use fedora_postinstall::theme::{Palette, Tone};
//!
//! let palette = Palette::plain();
//! assert_eq!(palette.paint("done", Tone::Success), "done");
//! ```

use crossterm::style::{self, Color, Stylize};
use std::io::IsTerminal;

/// Semantic color roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Banners and completion messages
    Success,
    /// Subprocess output and skip notices
    Warning,
    /// Dry-run banner
    Danger,
    /// Command lines about to run
    Info,
}

impl Tone {
    pub const fn color(self) -> Color {
        match self {
            Self::Success => Color::Green,
            Self::Warning => Color::Yellow,
            Self::Danger => Color::Red,
            Self::Info => Color::Blue,
        }
    }
}

/// Decides whether text gets colored and applies the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    /// Colors only when stdout is a terminal with a usable `TERM`.
    pub fn detect() -> Self {
        let term = std::env::var("TERM").ok();
        Self {
            enabled: ansi_supported(term.as_deref(), std::io::stdout().is_terminal()),
        }
    }

    /// Never color.
    pub const fn plain() -> Self {
        Self { enabled: false }
    }

    /// Always color.
    pub const fn colored() -> Self {
        Self { enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        if self.enabled {
            style::style(text).with(tone.color()).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::plain()
    }
}

/// ANSI escapes are only worth emitting to a real terminal that is not `dumb`.
pub fn ansi_supported(term: Option<&str>, is_terminal: bool) -> bool {
    is_terminal && matches!(term, Some(t) if !t.is_empty() && t != "dumb")
}
