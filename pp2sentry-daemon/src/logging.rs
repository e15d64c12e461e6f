//! Logging initialization for pp2sentry-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `Pp2SentryConfig`. `RUST_LOG` takes precedence over `log_level`.
//!
//! Without `RUST_LOG`, the admin HTTP client, webhook and Docker crates are
//! capped at `warn` so per-request chatter does not drown the chat log lines.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pp2sentry_core::config::GeneralConfig;

/// Client crates capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "bollard"];

/// Filter directives for `log_level` with noisy client crates capped.
fn default_directives(log_level: &str) -> String {
    QUIET_DEPENDENCIES
        .iter()
        .fold(log_level.to_owned(), |mut acc, krate| {
            acc.push_str(&format!(",{krate}=warn"));
            acc
        })
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default for production)
/// * `"pretty"` - Human-readable colored output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}
