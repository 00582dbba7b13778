//! # Structured Logging
//!
//! Sets up the `tracing` subscriber for the service: pretty output for a
//! terminal, JSON lines for a log shipper, filtered through `RUST_LOG`.
//!
//! Everything goes to stderr. The one-shot subcommands print their result on
//! stdout, so `qris-node payload ... | qrencode` keeps working with logging on.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "qris_node=info,qris_protocol=info,tower_http=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, colored output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once, early in `main()`. A second call returns an error instead of
/// replacing the installed subscriber.
///
/// `RUST_LOG` overrides `default_filter` when set, using the usual
/// `EnvFilter` directive syntax:
///
/// ```text
/// RUST_LOG=qris_node=debug,qris_protocol=debug,tower_http=debug
/// ```
pub fn init_logging(
    default_filter: &str,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()?,
    }

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
