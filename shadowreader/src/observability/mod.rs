//! Logging setup for hosts embedding the reader.
//!
//! The library only emits `tracing` events and spans. Hosts that have no
//! subscriber of their own can install one here.

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::errors::ReaderError;

/// Directive used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "shadowreader=info";

/// Output format of installed subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ReaderError::InvalidConfig(format!("unknown log format '{other}'"))),
        }
    }
}

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a global subscriber writing to stderr.
///
/// Returns false if a global subscriber was already set.
pub fn init_tracing(format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.is_ok()
}
