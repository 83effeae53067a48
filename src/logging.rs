//! Logging
//!
//! Diagnostic logging through `tracing`, written to stderr so stdout keeps
//! the operator progress lines.
//!
//! ## Environment Variables
//!
//! * `XCSHOTS_LOG` - filter directive (e.g. `debug`, `xcshots=trace`)
//! * `RUST_LOG` - fallback filter when `XCSHOTS_LOG` is unset
//! * `XCSHOTS_LOG_FORMAT` - `json` for structured output, anything else for text

use std::io::{self, IsTerminal};
use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "XCSHOTS_LOG";
pub const LOG_FORMAT_ENV: &str = "XCSHOTS_LOG_FORMAT";

const DEFAULT_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Output format for log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `json` selects JSON; every other value falls back to text
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    /// Explicit format if given, else `XCSHOTS_LOG_FORMAT`, else text
    pub fn resolve(explicit: Option<&str>) -> Self {
        let env_format = std::env::var(LOG_FORMAT_ENV).ok();
        explicit
            .or(env_format.as_deref())
            .map(Self::parse)
            .unwrap_or(LogFormat::Text)
    }
}

/// Initialize the global subscriber. Later calls are no-ops.
pub fn init(format: Option<&str>) {
    INIT.call_once(|| {
        let filter = create_env_filter(std::env::var(LOG_ENV).ok().as_deref());
        let format = LogFormat::resolve(format);

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
                    .with(filter)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_ansi(io::stderr().is_terminal())
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!(?format, "logging initialized");
    });
}

/// `XCSHOTS_LOG` if set and valid, else `RUST_LOG`, else `warn`
fn create_env_filter(spec: Option<&str>) -> EnvFilter {
    match spec {
        Some(spec) => EnvFilter::try_new(spec).unwrap_or_else(|_| {
            eprintln!(
                "Invalid {} specification '{}', using default '{}'",
                LOG_ENV, spec, DEFAULT_FILTER
            );
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}
