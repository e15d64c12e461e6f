//! 조치 실행 태스크 -- 위반 알림, 운영자 검토, 관리 명령 집행
//!
//! [`ActionExecutor`]는 [`ModerationCommand`]를 채널로 받아 처리하는 단일 태스크입니다.
//! 검토 대기 목록은 이 태스크만 소유하며, 네트워크 호출(관리 명령, 웹훅)은
//! 각각 별도 태스크로 실행되어 채널 처리를 막지 않습니다.
//!
//! # 내부 아키텍처
//! ```text
//! ModerationDispatcher ──mpsc──> ActionExecutor
//!                                    |
//!                  pending reviews (id -> report, expire after timeout)
//!                                    |
//!                    JoinSet ──> CommandExecutor / Notifier
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::gauge;
use pp2sentry_core::config::ModerationConfig;
use pp2sentry_core::error::{ActionError, PipelineError, Pp2SentryError};
use pp2sentry_core::metrics as m;
use pp2sentry_core::pipeline::CommandExecutor;
use pp2sentry_core::types::{HelpRequest, ViolationLevel, ViolationReport};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::command::{
    EnforcementPlan, KICK_TEMPLATE, ModerationCommand, ReviewDecision, TemplateVars, needs_index,
    render_template,
};
use crate::dispatcher::ModerationDispatcher;
use crate::error::ModerationError;
use crate::webhook::{Notification, Notifier, WebhookNotifier};

/// 서버 이름(소문자) -> 관리 명령 실행기
pub type ExecutorMap = HashMap<String, Arc<dyn CommandExecutor>>;

/// 실행 태스크 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutorState {
    Initialized,
    Running,
    Stopped,
}

/// 실행 정책 (설정에서 추출)
#[derive(Debug, Clone)]
struct Policy {
    review_mode: bool,
    auto_enforce_levels: Vec<ViolationLevel>,
    welcome_template: String,
    welcome_delay: Duration,
    welcome_attempts: u32,
    review_timeout: Duration,
}

impl Policy {
    fn from_config(config: &ModerationConfig) -> Self {
        Self {
            review_mode: config.review_mode,
            auto_enforce_levels: config.auto_enforce_levels.clone(),
            welcome_template: config.welcome_template.clone(),
            welcome_delay: Duration::from_secs(config.welcome_delay_secs),
            welcome_attempts: config.welcome_attempts,
            review_timeout: Duration::from_secs(config.review_timeout_secs),
        }
    }
}

/// 조치 실행 태스크
pub struct ActionExecutor {
    state: ExecutorState,
    policy: Arc<Policy>,
    executors: Arc<ExecutorMap>,
    notifier: Arc<dyn Notifier>,
    command_rx: Option<mpsc::Receiver<ModerationCommand>>,
    task: Option<JoinHandle<()>>,
    commands_processed: Arc<AtomicU64>,
}

impl ActionExecutor {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            ExecutorState::Initialized => "initialized",
            ExecutorState::Running => "running",
            ExecutorState::Stopped => "stopped",
        }
    }

    /// 처리한 명령 수
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    /// 관리 명령 실행기가 등록된 서버 수
    pub fn server_count(&self) -> usize {
        self.executors.len()
    }

    /// 처리 태스크를 시작합니다.
    ///
    /// 수신 채널은 첫 시작에서 소비되므로 재시작하려면 빌더로 다시 만들어야 합니다.
    pub fn start(&mut self) -> Result<(), Pp2SentryError> {
        if self.state == ExecutorState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let command_rx = self.command_rx.take().ok_or_else(|| {
            Pp2SentryError::Pipeline(PipelineError::InitFailed(
                "command receiver already consumed, rebuild the executor to restart".to_owned(),
            ))
        })?;

        let worker = Worker {
            policy: Arc::clone(&self.policy),
            executors: Arc::clone(&self.executors),
            notifier: Arc::clone(&self.notifier),
            pending: HashMap::new(),
            jobs: JoinSet::new(),
            processed: Arc::clone(&self.commands_processed),
        };
        self.task = Some(tokio::spawn(worker.run(command_rx)));
        self.state = ExecutorState::Running;
        info!(servers = self.executors.len(), "action executor started");
        Ok(())
    }

    /// 처리 태스크를 중단합니다. 진행 중인 네트워크 호출도 함께 중단됩니다.
    pub async fn stop(&mut self) -> Result<(), Pp2SentryError> {
        if self.state != ExecutorState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.state = ExecutorState::Stopped;
        info!("action executor stopped");
        Ok(())
    }

    /// 모든 송신자가 닫힌 뒤 남은 명령과 네트워크 호출이 끝날 때까지 기다립니다.
    pub async fn drain(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await
                && e.is_panic()
            {
                error!("action executor task panicked");
            }
            self.state = ExecutorState::Stopped;
        }
    }
}

impl Drop for ActionExecutor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─── Worker ─────────────────────────────────────────────────────────

/// 운영자 결정을 기다리는 위반
struct PendingReview {
    report: ViolationReport,
    created_at: Instant,
}

struct Worker {
    policy: Arc<Policy>,
    executors: Arc<ExecutorMap>,
    notifier: Arc<dyn Notifier>,
    pending: HashMap<String, PendingReview>,
    jobs: JoinSet<()>,
    processed: Arc<AtomicU64>,
}

impl Worker {
    async fn run(mut self, mut command_rx: mpsc::Receiver<ModerationCommand>) {
        loop {
            tokio::select! {
                Some(command) = command_rx.recv() => {
                    self.processed.fetch_add(1, Ordering::Relaxed);
                    debug!(kind = command.kind(), "moderation command received");
                    self.handle(command);
                }
                Some(result) = self.jobs.join_next(), if !self.jobs.is_empty() => {
                    if let Err(e) = result
                        && e.is_panic()
                    {
                        error!("moderation job panicked");
                    }
                }
                else => {
                    info!("command channel closed, stopping action executor");
                    break;
                }
            }
        }
    }

    fn handle(&mut self, command: ModerationCommand) {
        match command {
            ModerationCommand::Violation(report) => self.on_violation(report),
            ModerationCommand::Review { id, decision } => self.on_review(id, decision),
            ModerationCommand::HelpRequest(request) => self.on_help_request(request),
            ModerationCommand::Welcome {
                server_name,
                player_name,
            } => self.on_welcome(&server_name, player_name),
        }
    }

    /// 검토 제한 시간이 지난 항목을 제거합니다.
    fn prune_expired(&mut self) {
        let timeout = self.policy.review_timeout;
        let before = self.pending.len();
        self.pending.retain(|id, review| {
            let alive = review.created_at.elapsed() < timeout;
            if !alive {
                info!(review_id = %id, player = %review.report.player_name, "review expired");
            }
            alive
        });
        if self.pending.len() != before {
            gauge!(m::MODERATION_PENDING_REVIEWS).set(self.pending.len() as f64);
        }
    }

    fn executor_for(&self, server_name: &str) -> Option<Arc<dyn CommandExecutor>> {
        self.executors.get(&server_name.to_lowercase()).cloned()
    }

    fn on_violation(&mut self, report: ViolationReport) {
        self.prune_expired();
        let level = report.analysis.level;
        info!(
            server = %report.server.name,
            player = %report.player_name,
            kind = %report.kind,
            level = %level,
            reason = %report.analysis.reason,
            "violation received"
        );

        let auto_enforce = self.policy.auto_enforce_levels.contains(&level);
        let review_id = if !auto_enforce && self.policy.review_mode && level != ViolationLevel::Ok
        {
            let id = new_review_id();
            info!(
                review_id = %id,
                player = %report.player_name,
                level = %level,
                "review pending: !confirm {id} [LEVEL] or !reject {id}"
            );
            self.pending.insert(
                id.clone(),
                PendingReview {
                    report: report.clone(),
                    created_at: Instant::now(),
                },
            );
            gauge!(m::MODERATION_PENDING_REVIEWS).set(self.pending.len() as f64);
            Some(id)
        } else {
            None
        };

        if auto_enforce {
            let executor = self.executor_for(&report.server.name);
            let report = report.clone();
            self.jobs.spawn(async move {
                match executor {
                    Some(executor) => {
                        if let Err(e) = enforce(executor.as_ref(), &report, level).await {
                            error!(player = %report.player_name, error = %e, "automatic enforcement failed");
                        }
                    }
                    None => warn!(
                        server = %report.server.name,
                        "no admin client for server, automatic enforcement skipped"
                    ),
                }
            });
        }

        self.spawn_notification(Notification::Violation {
            report,
            review_id,
            enforced: auto_enforce,
        });
    }

    fn on_review(&mut self, id: String, decision: ReviewDecision) {
        self.prune_expired();
        let Some(PendingReview { report, .. }) = self.pending.remove(&id) else {
            warn!(review_id = %id, "unknown, expired or already handled review id");
            return;
        };
        gauge!(m::MODERATION_PENDING_REVIEWS).set(self.pending.len() as f64);
        info!(review_id = %id, player = %report.player_name, decision = %decision, "review decided");

        let executor = self.executor_for(&report.server.name);
        let notifier = Arc::clone(&self.notifier);
        self.jobs.spawn(async move {
            let response = match (decision, executor) {
                (ReviewDecision::Confirm(level), Some(executor)) => {
                    let level = level.unwrap_or(report.analysis.level);
                    match enforce(executor.as_ref(), &report, level).await {
                        Ok(response) => response,
                        Err(e) => {
                            error!(review_id = %id, error = %e, "enforcement failed");
                            None
                        }
                    }
                }
                (ReviewDecision::Confirm(_), None) => {
                    warn!(
                        server = %report.server.name,
                        "no admin client for server, enforcement skipped"
                    );
                    None
                }
                (ReviewDecision::Reject, _) => {
                    info!(review_id = %id, player = %report.player_name, "action rejected");
                    None
                }
            };

            let outcome = Notification::ReviewOutcome {
                id,
                server_name: report.server.name.clone(),
                player_name: report.player_name.clone(),
                decision,
                response,
            };
            if let Err(e) = notifier.notify(&outcome).await {
                warn!(error = %e, "review outcome notification failed");
            }
        });
    }

    fn on_help_request(&mut self, request: HelpRequest) {
        info!(
            server = %request.server_name,
            player = %request.player_name,
            ip = request.ip_address.as_deref().unwrap_or(""),
            message = %request.content,
            "help request"
        );
        self.spawn_notification(Notification::HelpRequest(request));
    }

    fn on_welcome(&mut self, server_name: &str, player_name: String) {
        let Some(executor) = self.executor_for(server_name) else {
            debug!(server = server_name, "no admin client for server, welcome skipped");
            return;
        };
        let policy = Arc::clone(&self.policy);
        self.jobs.spawn(async move {
            welcome(executor.as_ref(), &policy, &player_name).await;
        });
    }

    fn spawn_notification(&mut self, notification: Notification) {
        let notifier = Arc::clone(&self.notifier);
        self.jobs.spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(error = %e, "notification failed");
            }
        });
    }
}

/// 짧은 검토 ID (uuid v4 앞 8자리)
fn new_review_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

async fn resolve_index(executor: &dyn CommandExecutor, player_name: &str) -> Option<String> {
    match executor.resolve_live_player_id(player_name).await {
        Ok(index) => index,
        Err(e) => {
            warn!(player = player_name, error = %e, "live player lookup failed");
            None
        }
    }
}

/// 심각도에 맞는 명령을 실행하고 첫 명령의 서버 응답을 반환합니다.
async fn enforce(
    executor: &dyn CommandExecutor,
    report: &ViolationReport,
    level: ViolationLevel,
) -> Result<Option<String>, ActionError> {
    let Some(plan) = EnforcementPlan::for_level(report, level) else {
        debug!(player = %report.player_name, level = %level, "no command for level");
        return Ok(None);
    };

    let index = if needs_index(&plan.template) {
        resolve_index(executor, &report.player_name).await
    } else {
        None
    };
    let vars = TemplateVars {
        name: &report.player_name,
        full_name: report.name_with_ids.as_deref(),
        ip: report.ip_address.as_deref(),
        index: index.as_deref(),
    };
    let Some(command) = render_template(&plan.template, &vars) else {
        warn!(
            player = %report.player_name,
            level = %level,
            "player IP unknown, command skipped"
        );
        return Ok(None);
    };

    let response = executor.execute_command(&command).await?;

    if plan.follow_up_kick {
        let index = resolve_index(executor, &report.player_name).await;
        let kick_vars = TemplateVars {
            name: &report.player_name,
            index: index.as_deref(),
            ..TemplateVars::default()
        };
        if let Some(kick) = render_template(KICK_TEMPLATE, &kick_vars)
            && let Err(e) = executor.execute_command(&kick).await
        {
            warn!(player = %report.player_name, error = %e, "follow-up kick failed");
        }
    }
    Ok(response)
}

/// 플레이어가 서버 목록에 나타나면 환영 명령을 보냅니다.
async fn welcome(executor: &dyn CommandExecutor, policy: &Policy, player_name: &str) {
    let attempts = policy.welcome_attempts.max(1);
    let template = &policy.welcome_template;

    for attempt in 1..=attempts {
        tokio::time::sleep(policy.welcome_delay).await;

        let index = if needs_index(template) {
            match resolve_index(executor, player_name).await {
                Some(index) => Some(index),
                None => {
                    debug!(player = player_name, attempt, "player not in live list yet");
                    continue;
                }
            }
        } else {
            None
        };

        let vars = TemplateVars {
            name: player_name,
            index: index.as_deref(),
            ..TemplateVars::default()
        };
        match render_template(template, &vars) {
            Some(command) => {
                if let Err(e) = executor.execute_command(&command).await {
                    warn!(player = player_name, error = %e, "welcome message failed");
                }
            }
            None => warn!(player = player_name, "welcome template needs an IP, skipped"),
        }
        return;
    }
    debug!(player = player_name, attempts, "player never appeared, welcome skipped");
}

// ─── Builder ────────────────────────────────────────────────────────

/// 조치 실행 태스크 빌더
///
/// 실행 태스크와, 모니터에 넘길 [`ModerationDispatcher`]를 함께 생성합니다.
pub struct ActionExecutorBuilder {
    config: ModerationConfig,
    executors: ExecutorMap,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ActionExecutorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ModerationConfig::default(),
            executors: HashMap::new(),
            notifier: None,
        }
    }

    /// 모더레이션 설정을 지정합니다.
    pub fn config(mut self, config: ModerationConfig) -> Self {
        self.config = config;
        self
    }

    /// 서버의 관리 명령 실행기를 등록합니다. 이름은 대소문자를 구분하지 않습니다.
    pub fn server_executor(
        mut self,
        server_name: &str,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        self.executors.insert(server_name.to_lowercase(), executor);
        self
    }

    /// 알림 전송기를 설정합니다. 설정하지 않으면 알림을 보내지 않습니다.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 실행 태스크와 디스패처를 빌드합니다.
    pub fn build(self) -> Result<(ActionExecutor, ModerationDispatcher), ModerationError> {
        if self.config.channel_capacity == 0 {
            return Err(ModerationError::Config {
                field: "moderation.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let dispatcher = ModerationDispatcher::new(tx, self.config.welcome_enabled);
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(WebhookNotifier::disabled()));

        let executor = ActionExecutor {
            state: ExecutorState::Initialized,
            policy: Arc::new(Policy::from_config(&self.config)),
            executors: Arc::new(self.executors),
            notifier,
            command_rx: Some(rx),
            task: None,
            commands_processed: Arc::new(AtomicU64::new(0)),
        };
        Ok((executor, dispatcher))
    }
}

impl Default for ActionExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
