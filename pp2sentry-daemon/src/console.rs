//! Operator console -- review decisions and server commands from stdin.
//!
//! Each input line is one of:
//!
//! - `!confirm <review-id> [LEVEL]` -- enforce a pending review
//! - `!reject <review-id>` -- close a pending review without action
//! - `!stats`, `!recent [LEVEL]`, `!history <player>` -- violation history
//! - anything else -- routed through [`CommandRouter`], response is logged

use std::sync::Arc;

use pp2sentry_core::error::StorageError;
use pp2sentry_core::types::ViolationLevel;
use pp2sentry_moderation::{
    ModerationDispatcher, ReviewDecision, SqliteViolationStore, StoredViolation,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::router::CommandRouter;

/// Rows shown by `!recent` and `!history`.
const HISTORY_LIMIT: usize = 10;

/// Everything a console line can act on.
#[derive(Clone)]
pub struct ConsoleContext {
    /// Server command routing.
    pub router: CommandRouter,
    /// Review decisions.
    pub dispatcher: ModerationDispatcher,
    /// Violation history.
    pub store: Arc<SqliteViolationStore>,
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Decision on a pending review.
    Review {
        /// Review id as announced.
        id: String,
        /// Confirm or reject.
        decision: ReviewDecision,
    },
    /// Violation counts by level and top players.
    Stats,
    /// Latest violations, optionally of one level.
    Recent(Option<ViolationLevel>),
    /// Latest violations of one player.
    History(String),
    /// Text command for a game server.
    Server(String),
    /// Blank line.
    Empty,
}

/// Parse one console line.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }

    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().unwrap_or_default().to_ascii_lowercase();
    match keyword.as_str() {
        "!confirm" => {
            let id = tokens
                .next()
                .ok_or_else(|| "usage: !confirm <review-id> [LEVEL]".to_owned())?;
            let level = tokens
                .next()
                .map(str::parse::<ViolationLevel>)
                .transpose()?;
            Ok(ConsoleCommand::Review {
                id: id.to_owned(),
                decision: ReviewDecision::Confirm(level),
            })
        }
        "!reject" => {
            let id = tokens
                .next()
                .ok_or_else(|| "usage: !reject <review-id>".to_owned())?;
            Ok(ConsoleCommand::Review {
                id: id.to_owned(),
                decision: ReviewDecision::Reject,
            })
        }
        "!stats" => Ok(ConsoleCommand::Stats),
        "!recent" => {
            let level = tokens
                .next()
                .map(str::parse::<ViolationLevel>)
                .transpose()?;
            Ok(ConsoleCommand::Recent(level))
        }
        "!history" => {
            let name = tokens
                .next()
                .ok_or_else(|| "usage: !history <player>".to_owned())?;
            Ok(ConsoleCommand::History(name.to_owned()))
        }
        _ => Ok(ConsoleCommand::Server(line.to_owned())),
    }
}

/// Handle one console line.
pub async fn handle_line(line: &str, ctx: &ConsoleContext) {
    match parse_line(line) {
        Ok(ConsoleCommand::Empty) => {}
        Ok(ConsoleCommand::Review { id, decision }) => {
            if let Err(e) = ctx.dispatcher.submit_review(&id, decision).await {
                tracing::error!(review_id = %id, error = %e, "failed to submit review decision");
            }
        }
        Ok(ConsoleCommand::Stats) => {
            let store = Arc::clone(&ctx.store);
            match tokio::task::spawn_blocking(move || store.stats()).await {
                Ok(Ok(stats)) => tracing::info!(
                    total = stats.total,
                    by_level = ?stats.by_level,
                    top_violators = ?stats.top_violators,
                    "violation stats"
                ),
                Ok(Err(e)) => tracing::error!(error = %e, "failed to read violation stats"),
                Err(e) => tracing::error!(error = %e, "violation stats task failed"),
            }
        }
        Ok(ConsoleCommand::Recent(level)) => {
            let store = Arc::clone(&ctx.store);
            let rows =
                tokio::task::spawn_blocking(move || store.recent_violations(level, HISTORY_LIMIT))
                    .await;
            log_history(rows, "recent violation");
        }
        Ok(ConsoleCommand::History(name)) => {
            let store = Arc::clone(&ctx.store);
            let rows =
                tokio::task::spawn_blocking(move || store.player_violations(&name, HISTORY_LIMIT))
                    .await;
            log_history(rows, "player violation");
        }
        Ok(ConsoleCommand::Server(command)) => match ctx.router.route(&command).await {
            Ok(Some(response)) => tracing::info!(command = %command, response = %response, "server response"),
            Ok(None) => tracing::warn!(command = %command, "admin interface not configured, command not sent"),
            Err(e) => tracing::error!(command = %command, error = %e, "command failed"),
        },
        Err(usage) => tracing::warn!(input = line, "{usage}"),
    }
}

fn log_history(
    rows: Result<
        Result<Vec<StoredViolation>, StorageError>,
        tokio::task::JoinError,
    >,
    label: &str,
) {
    match rows {
        Ok(Ok(rows)) if rows.is_empty() => tracing::info!("no violations recorded"),
        Ok(Ok(rows)) => {
            for row in rows {
                tracing::info!(
                    id = row.id,
                    at = %row.timestamp,
                    player = %row.player_name,
                    level = %row.level,
                    kind = %row.violation_type,
                    content = %row.content,
                    "{label}"
                );
            }
        }
        Ok(Err(e)) => tracing::error!(error = %e, "failed to read violation history"),
        Err(e) => tracing::error!(error = %e, "violation history task failed"),
    }
}

/// Read lines from `input` until EOF or shutdown.
pub async fn run_console<R>(input: R, ctx: ConsoleContext, mut shutdown_rx: broadcast::Receiver<()>) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&line, &ctx).await,
                Ok(None) => {
                    tracing::debug!("console input closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read console input");
                    break;
                }
            },
            _ = shutdown_rx.recv() => {
                tracing::debug!("console shutting down");
                break;
            }
        }
    }
}

/// Spawn the console on the process stdin.
pub fn spawn_console(
    ctx: ConsoleContext,
    shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_console(
        BufReader::new(tokio::io::stdin()),
        ctx,
        shutdown_rx,
    ))
}
