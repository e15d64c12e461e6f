//! CLI argument definitions for pp2sentry-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use pp2sentry_core::config::Pp2SentryConfig;

/// PP2 game server log monitor.
///
/// Tails the chat and join logs of every configured server, correlates
/// players with their connection data and hands violations to moderation.
#[derive(Parser, Debug)]
#[command(name = "pp2sentry-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to pp2sentry.toml configuration file.
    #[arg(short, long, default_value = "pp2sentry.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply CLI overrides on top of file and environment configuration.
    pub fn apply_overrides(&self, config: &mut Pp2SentryConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}
