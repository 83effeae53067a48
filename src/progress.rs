//! Operator-facing progress lines.
//!
//! Completed steps print as `✓ <step>` on stdout and the final failure as
//! `✗ <message>` on stderr. Every line is mirrored to `tracing` below the
//! default `warn` filter, so the terminal failure stays a single line unless
//! debug logging is requested.

use std::fmt::Display;

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    /// Print to the terminal
    pub fn stdout() -> Self {
        Self { enabled: true }
    }

    /// Log only (tests)
    pub fn silent() -> Self {
        Self { enabled: false }
    }

    /// A completed step
    pub fn step(&self, message: impl Display) {
        tracing::info!(step = %message);
        if self.enabled {
            println!("✓ {}", message);
        }
    }

    /// An informational line that is not a completed step
    pub fn detail(&self, message: impl Display) {
        tracing::debug!(detail = %message);
        if self.enabled {
            println!("{}", message);
        }
    }

    /// The terminal failure line
    pub fn failure(&self, message: impl Display) {
        tracing::debug!(error = %message, "failure");
        if self.enabled {
            eprintln!("✗ {}", message);
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::stdout()
    }
}
