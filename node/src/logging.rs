//! # Node Logging
//!
//! Settlement, rejection and admin-change events from the contract crate are
//! emitted as `tracing` events; this module installs the subscriber that
//! renders them. `--log-format` picks the renderer and `RUST_LOG` narrows or
//! widens the filter.
//!
//! Everything goes to stderr. Stdout belongs to `sign`, which prints the
//! encoded payload, and `settle`, which prints one JSON line per transfer.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: settlement crates at info, request
/// spans from the HTTP layer at debug.
pub const DEFAULT_FILTER: &str =
    "prosynergy_node=info,prosynergy_contracts=info,prosynergy_protocol=info,tower_http=debug";

/// Renderer selected by `--log-format` / `PROSYNERGY_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored lines with source locations, for a terminal.
    Pretty,
    /// One JSON object per event, carrying the `from`, `to`, `nonce` and
    /// `reason` fields as keys.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects [`LogFormat::Json`]; anything else falls
    /// back to [`LogFormat::Pretty`] so a typo never stops the node.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber for the node process.
///
/// `main` calls this once before dispatching a subcommand; a second call
/// panics. To trace nonce consumption and ledger postings:
///
/// ```text
/// RUST_LOG=prosynergy_contracts=debug,prosynergy_protocol=debug prosynergy-node run
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    }

    tracing::debug!(?format, "node logging ready");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_lenient() {
        assert_eq!(LogFormat::from_str_lossy("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("logfmt"), LogFormat::Pretty);
    }

    #[test]
    fn default_filter_covers_every_settlement_crate() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        for target in ["prosynergy_node", "prosynergy_contracts", "prosynergy_protocol"] {
            assert!(DEFAULT_FILTER.contains(&format!("{target}=info")));
        }
    }
}
