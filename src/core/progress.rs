//! In-place progress bar for section and transfer reception
//!
//! Purely presentational: rendering (or disabling rendering entirely) has no
//! effect on what is captured or written. The bar is suppressed when stdout
//! is not a TTY, mirroring how piped output is handled elsewhere.

use std::io::{self, Write};

const DEFAULT_WIDTH: usize = 30;

/// Fixed-width, single-line progress bar updated in place.
pub struct ProgressBar {
    width: usize,
    enabled: bool,
    active: bool,
}

impl ProgressBar {
    /// Create a bar; rendering is enabled only when stdout is a TTY.
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            enabled: atty::is(atty::Stream::Stdout),
            active: false,
        }
    }

    /// Override the bar width in characters.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Enable or disable rendering.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Redraw the bar for `current` of `expected` units.
    ///
    /// An `expected` of 0 renders an empty bar rather than dividing by zero.
    pub fn update(&mut self, current: usize, expected: usize, label: &str) {
        if !self.enabled {
            return;
        }
        self.active = true;
        let line = render(current, expected, self.width, label);
        let mut out = io::stdout();
        let _ = write!(out, "\r  {line}    ");
        let _ = out.flush();
    }

    /// Complete the bar, annotating the actual count received.
    ///
    /// Under- or over-run relative to `expected` is display-only.
    pub fn finish(&mut self, label: &str, expected: usize, actual: usize) {
        if !self.enabled {
            return;
        }
        self.active = false;
        let bar = "#".repeat(self.width);
        let mut out = io::stdout();
        let _ = writeln!(out, "\r  {label}: [{bar}] {actual}/{expected} OK    ");
        let _ = out.flush();
    }

    /// Terminate an interrupted bar with a newline so later output starts
    /// on a clean line.
    pub fn abandon(&mut self) {
        if self.enabled && self.active {
            self.active = false;
            let mut out = io::stdout();
            let _ = writeln!(out);
            let _ = out.flush();
        }
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the bar body. Proportion is clamped to [0, 1].
fn render(current: usize, expected: usize, width: usize, label: &str) -> String {
    let fraction = if expected == 0 {
        0.0
    } else {
        (current as f64 / expected as f64).clamp(0.0, 1.0)
    };
    let filled = (width as f64 * fraction) as usize;
    let bar: String = "#".repeat(filled) + &"-".repeat(width - filled);
    format!("{label}: [{bar}] {current}/{expected}")
}
