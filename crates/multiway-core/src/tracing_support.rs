//! Log output for programs built on multiway
//!
//! The library crates only emit `tracing` events: `debug` for restart and
//! component progress and numerical fallbacks, `info` when a build ends,
//! `warn` for ignored settings. A program that wants to see them installs
//! a subscriber once with [`init_tracing`].
//!
//! ```ignore
//! use multiway_core::tracing_support::{init_tracing, LogFormat, TracingConfig};
//!
//! init_tracing(
//!     TracingConfig::default()
//!         .with_format(LogFormat::Json)
//!         .with_filter("multiway_algorithms=debug"),
//! )?;
//! ```
//!
//! Without the `subscriber` feature [`init_tracing`] does nothing.
//! `RUST_LOG` and `MULTIWAY_LOG_FORMAT` seed the default configuration.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human oriented
    #[default]
    Pretty,
    /// One line per event
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Unknown log format '{}', expected pretty, compact or json", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives
    pub filter: String,
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let format = std::env::var("MULTIWAY_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "multiway_algorithms=info,warn".into());
        Self {
            format,
            filter,
            ansi: true,
        }
    }
}

impl TracingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails on a malformed filter, or when a global subscriber is already set.
#[cfg(feature = "subscriber")]
pub fn init_tracing(config: TracingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let filter = EnvFilter::try_new(&config.filter)?;
    let layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_ansi(config.ansi).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_ansi(config.ansi).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()?;
    tracing::debug!(format = ?config.format, filter = %config.filter, "tracing initialized");
    Ok(())
}

#[cfg(not(feature = "subscriber"))]
pub fn init_tracing(_config: TracingConfig) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_builder() {
        let config = TracingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("multiway_kernels=trace")
            .with_ansi(false);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filter, "multiway_kernels=trace");
        assert!(!config.ansi);
    }

    #[cfg(feature = "subscriber")]
    #[test]
    fn test_second_install_fails() {
        let config = TracingConfig::default().with_filter("warn").with_ansi(false);
        init_tracing(config.clone()).unwrap();
        assert!(init_tracing(config).is_err());
    }

    #[cfg(feature = "subscriber")]
    #[test]
    fn test_bad_filter_is_rejected() {
        let config = TracingConfig::default().with_filter("=[");
        assert!(init_tracing(config).is_err());
    }
}
