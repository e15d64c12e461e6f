//! Text command routing -- `<server> <command>` to that server's admin interface.
//!
//! The first whitespace-separated token is matched case-insensitively against
//! the configured server names. On a match the remainder is sent to that
//! server; otherwise the whole command goes to the first server.

use std::sync::Arc;

use pp2sentry_core::error::ActionError;
use pp2sentry_core::pipeline::CommandExecutor;

/// A named command target.
#[derive(Clone)]
pub struct CommandTarget {
    /// Server name as configured.
    pub name: String,
    /// Admin interface of the server.
    pub executor: Arc<dyn CommandExecutor>,
}

/// Routes operator commands to game servers.
#[derive(Clone, Default)]
pub struct CommandRouter {
    targets: Arc<Vec<CommandTarget>>,
}

impl CommandRouter {
    /// Create a router. The first target receives unaddressed commands.
    pub fn new(targets: Vec<CommandTarget>) -> Self {
        Self {
            targets: Arc::new(targets),
        }
    }

    /// Names of all routable servers, in configuration order.
    pub fn server_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }

    /// Pick the target and the text to send for `command`.
    pub fn resolve<'a>(&self, command: &'a str) -> Result<(&CommandTarget, &'a str), ActionError> {
        let Some(first) = self.targets.first() else {
            return Err(ActionError::Routing(
                "no servers configured, cannot route command".to_owned(),
            ));
        };

        let command = command.trim();
        if let Some((token, rest)) = command.split_once(char::is_whitespace)
            && let Some(target) = self
                .targets
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(token))
        {
            return Ok((target, rest.trim_start()));
        }

        // a bare server name leaves nothing to send
        if let Some(target) = self
            .targets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(command))
        {
            return Ok((target, ""));
        }

        Ok((first, command))
    }

    /// Route `command` and return the server's response text.
    pub async fn route(&self, command: &str) -> Result<Option<String>, ActionError> {
        let (target, text) = self.resolve(command)?;
        if text.is_empty() {
            return Err(ActionError::Routing(format!(
                "empty command for server '{}'",
                target.name
            )));
        }

        tracing::info!(server = %target.name, command = text, "routing operator command");
        target.executor.execute_command(text).await
    }
}
