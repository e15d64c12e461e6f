//! Daemon orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] builds one [`ServerMonitor`] per configured server,
//! the shared moderation stack (rule classifier, violation store, action
//! executor), and the command router used by the operator console.
//!
//! # Startup Order
//!
//! 1. Action executor (consumer of moderation commands)
//! 2. Server monitors (producers, all started concurrently)
//! 3. Operator console and uptime updater
//!
//! # Shutdown
//!
//! Monitor tasks are aborted without draining; the executor is stopped last.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use pp2sentry_core::config::{ClassifierConfig, Pp2SentryConfig, ServerConfig};
use pp2sentry_core::pipeline::CommandExecutor;
use pp2sentry_log_pipeline::{MonitorSettings, ServerMonitor, ServerMonitorBuilder};
use pp2sentry_moderation::discovery::{DEFAULT_ATTEMPTS, DEFAULT_RETRY_DELAY};
use pp2sentry_moderation::{
    ActionExecutor, ActionExecutorBuilder, AdminClient, BollardContainerLogs, ContainerLogs,
    ModerationDispatcher, RuleClassifier, SqliteViolationStore, WebhookNotifier,
    discover_admin_password,
};

use crate::console::{self, ConsoleContext};
use crate::metrics_server;
use crate::router::{CommandRouter, CommandTarget};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: Pp2SentryConfig,
    /// One monitor per configured server, in configuration order.
    monitors: Vec<ServerMonitor>,
    /// Operator command routing (same order as `monitors`).
    router: CommandRouter,
    /// Single moderation action task.
    executor: ActionExecutor,
    /// Entry point into the action task.
    dispatcher: ModerationDispatcher,
    /// Violation history.
    store: Arc<SqliteViolationStore>,
    /// Shutdown broadcast sender (signals console and uptime tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Background tasks started by `start`.
    tasks: Vec<tokio::task::JoinHandle<()>>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = Pp2SentryConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Admin passwords left empty are looked up from the server's container
    /// logs when `admin_container` is set.
    pub async fn build_from_config(mut config: Pp2SentryConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        if needs_password_discovery(&config.servers) {
            match BollardContainerLogs::connect_local() {
                Ok(docker) => {
                    discover_passwords(
                        &docker,
                        &mut config.servers,
                        DEFAULT_ATTEMPTS,
                        DEFAULT_RETRY_DELAY,
                    )
                    .await;
                }
                Err(e) => tracing::warn!(
                    error = %e,
                    "docker not available, admin password discovery skipped"
                ),
            }
        }

        let classifier = Arc::new(load_classifier(&config.classifier).await?);
        let store = Arc::new(
            SqliteViolationStore::open(&config.storage.database_path)
                .map_err(|e| anyhow::anyhow!("failed to open violation store: {}", e))?,
        );

        let timeout = Duration::from_secs(config.moderation.request_timeout_secs);
        let notifier = WebhookNotifier::new(&config.discord, timeout)
            .map_err(|e| anyhow::anyhow!("failed to build webhook notifier: {}", e))?;
        if !notifier.is_enabled() {
            tracing::info!("discord notifications disabled");
        }

        let mut builder = ActionExecutorBuilder::new()
            .config(config.moderation.clone())
            .notifier(Arc::new(notifier));
        let mut targets = Vec::with_capacity(config.servers.len());
        for server in &config.servers {
            let admin = AdminClient::new(server, timeout)
                .map_err(|e| anyhow::anyhow!("failed to build admin client: {}", e))?;
            if !admin.is_enabled() {
                tracing::warn!(
                    server = %server.name,
                    "admin url or password missing, admin commands disabled"
                );
            }
            let admin: Arc<dyn CommandExecutor> = Arc::new(admin);
            builder = builder.server_executor(&server.name, Arc::clone(&admin));
            targets.push(CommandTarget {
                name: server.name.clone(),
                executor: admin,
            });
        }
        let (executor, dispatcher) = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build action executor: {}", e))?;

        let settings = MonitorSettings::from_core(&config);
        let mut monitors = Vec::with_capacity(config.servers.len());
        for server in &config.servers {
            let monitor = ServerMonitorBuilder::new(server.clone())
                .settings(settings.clone())
                .classifier(classifier.clone())
                .store(store.clone())
                .actions(Arc::new(dispatcher.clone()))
                .build()
                .map_err(|e| {
                    anyhow::anyhow!("failed to build monitor for '{}': {}", server.name, e)
                })?;
            monitors.push(monitor);
        }

        tracing::info!(servers = monitors.len(), "orchestrator initialized");
        if config.metrics.enabled {
            record_daemon_metrics(monitors.len());
        }

        let (shutdown_tx, _) = broadcast::channel(16);
        Ok(Self {
            config,
            monitors,
            router: CommandRouter::new(targets),
            executor,
            dispatcher,
            store,
            shutdown_tx,
            tasks: Vec::new(),
            start_time: Instant::now(),
        })
    }

    /// Start the action executor and every server monitor.
    pub fn start(&mut self) -> Result<()> {
        self.executor
            .start()
            .map_err(|e| anyhow::anyhow!("failed to start action executor: {}", e))?;

        for monitor in &mut self.monitors {
            monitor
                .start()
                .map_err(|e| anyhow::anyhow!("failed to start monitor '{}': {}", monitor.name(), e))?;
        }

        if self.config.metrics.enabled {
            self.tasks.push(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ));
        }

        tracing::info!(servers = ?self.router.server_names(), "all monitors started");
        Ok(())
    }

    /// Start everything, read operator input, and block until SIGINT/SIGTERM.
    pub async fn run(&mut self) -> Result<()> {
        let pid_file = self.config.general.pid_file.clone();
        if !pid_file.is_empty() {
            write_pid_file(Path::new(&pid_file))?;
        }

        if let Err(e) = self.start() {
            self.shutdown().await;
            if !pid_file.is_empty() {
                remove_pid_file(Path::new(&pid_file));
            }
            return Err(e);
        }

        self.tasks.push(console::spawn_console(
            self.console_context(),
            self.shutdown_tx.subscribe(),
        ));

        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await;
        if !pid_file.is_empty() {
            remove_pid_file(Path::new(&pid_file));
        }
        Ok(())
    }

    /// Abort monitors and background tasks, then stop the action executor.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(());

        for monitor in &mut self.monitors {
            monitor.stop();
        }
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        if let Err(e) = self.executor.stop().await {
            tracing::debug!(error = %e, "action executor was not running");
        }
        tracing::info!("pp2sentry-daemon shut down");
    }

    /// Route an operator text command to a server's admin interface.
    pub async fn route_command(&self, command: &str) -> Result<Option<String>> {
        self.router
            .route(command)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }

    /// Everything the operator console needs.
    pub fn console_context(&self) -> ConsoleContext {
        ConsoleContext {
            router: self.router.clone(),
            dispatcher: self.dispatcher.clone(),
            store: Arc::clone(&self.store),
        }
    }

    /// Server monitors in configuration order.
    pub fn monitors(&self) -> &[ServerMonitor] {
        &self.monitors
    }

    /// Command router shared with the console.
    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Entry point for review decisions.
    pub fn dispatcher(&self) -> &ModerationDispatcher {
        &self.dispatcher
    }

    /// Violation history.
    pub fn store(&self) -> &Arc<SqliteViolationStore> {
        &self.store
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &Pp2SentryConfig {
        &self.config
    }
}

async fn load_classifier(config: &ClassifierConfig) -> Result<RuleClassifier> {
    if config.rules_path.trim().is_empty() {
        tracing::warn!("no rules path configured, every message classifies as OK");
        return Ok(RuleClassifier::default());
    }
    RuleClassifier::load(&config.rules_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load moderation rules: {}", e))
}

fn needs_password_discovery(servers: &[ServerConfig]) -> bool {
    servers.iter().any(wants_discovery)
}

fn wants_discovery(server: &ServerConfig) -> bool {
    !server.admin_url.is_empty()
        && server.admin_password.is_empty()
        && !server.admin_container.is_empty()
}

/// Fill empty admin passwords from container logs.
///
/// Servers whose password cannot be found keep admin commands disabled.
pub async fn discover_passwords<C: ContainerLogs>(
    docker: &C,
    servers: &mut [ServerConfig],
    attempts: u32,
    delay: Duration,
) {
    for server in servers.iter_mut().filter(|s| wants_discovery(s)) {
        match discover_admin_password(docker, &server.admin_container, attempts, delay).await {
            Ok(Some(password)) => {
                server.admin_password = password;
                tracing::info!(
                    server = %server.name,
                    container = %server.admin_container,
                    "admin password discovered"
                );
            }
            Ok(None) => tracing::warn!(
                server = %server.name,
                container = %server.admin_container,
                "admin password not found, admin commands disabled"
            ),
            Err(e) => tracing::warn!(
                server = %server.name,
                error = %e,
                "admin password discovery failed, admin commands disabled"
            ),
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file
/// - Verifies the created file is a regular file
/// - Creates the parent directory with restrictive permissions (0o700)
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record daemon-level metrics (build info, servers monitored).
fn record_daemon_metrics(server_count: usize) {
    use pp2sentry_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_SERVERS_MONITORED).set(server_count as f64);
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use pp2sentry_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
