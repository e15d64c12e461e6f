//! 서버 모니터 -- 게임 서버 하나의 채팅 로그와 접속 로그를 처리합니다.
//!
//! [`ServerMonitor`]는 LineSource 두 개, ChatReconstructor, SessionStore,
//! DedupGuard 두 개(메시지, 접속)를 묶어 서로 독립된 처리 루프 두 개를 실행합니다.
//!
//! # 내부 아키텍처
//! ```text
//! chatlog.txt -> LineSource -> ChatReconstructor -> dedup -> 발신자 필터 -> SessionStore 보강
//!                                                   -> 도움 요청 | Classifier -> ViolationStore + ActionHandler
//!
//! playlog.txt -> LineSource -> JoinEventParser -> SessionStore 갱신 -> 환영 메시지
//!                                                -> dedup -> 닉네임 Classifier -> ViolationStore + ActionHandler
//! ```
//!
//! 서버 모니터끼리는 상태를 공유하지 않습니다.

use std::sync::Arc;

use metrics::counter;
use pp2sentry_core::config::ServerConfig;
use pp2sentry_core::metrics as m;
use pp2sentry_core::pipeline::{ActionHandler, Classifier, ViolationStore};
use pp2sentry_core::types::{
    Analysis, ChatMessage, HelpRequest, PlayerJoinEvent, Session, ViolationKind, ViolationLevel,
    ViolationRecord, ViolationReport,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::collector::{LineSource, StartPosition};
use crate::config::MonitorSettings;
use crate::dedup::DedupGuard;
use crate::error::LogPipelineError;
use crate::parser::{ChatReconstructor, ChatStep, JoinEventParser};
use crate::session::SessionStore;

/// 전체 검토 모드에서 OK 메시지를 MINOR로 올릴 때의 사유
pub const VERIFY_ALL_REASON: &str = "Manuaalinen tarkastus (kaikki viestit)";

/// 로그에 남길 메시지 최대 길이 (문자)
const LOG_PREVIEW_CHARS: usize = 100;

/// 모니터가 사용하는 외부 협력자 묶음
#[derive(Clone)]
pub struct Collaborators {
    /// 텍스트 분류기
    pub classifier: Arc<dyn Classifier>,
    /// 위반 기록 저장소
    pub store: Arc<dyn ViolationStore>,
    /// 조치 계층
    pub actions: Arc<dyn ActionHandler>,
}

/// 채팅 라인 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// 아직 완성된 메시지 없음 (헤더 대기, 잡음, 빈 라인)
    Incomplete,
    /// 이미 처리한 메시지
    Duplicate,
    /// 분석 대상이 아닌 발신자
    Ignored,
    /// 도움 요청으로 전달됨
    HelpRequest,
    /// 분류 결과 문제 없음
    Clean,
    /// 위반(또는 검토 대상)으로 기록되고 전달됨
    Flagged(ViolationLevel),
}

/// 접속 라인 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// 접속 라인이 아님
    NoMatch,
    /// 세션은 갱신했지만 이미 처리한 (이름, IP) 조합
    Duplicate,
    /// 닉네임 문제 없음
    Clean,
    /// 닉네임 위반으로 기록되고 전달됨
    Flagged(ViolationLevel),
}

// ─── 채팅 처리 ─────────────────────────────────────────────────────

/// 채팅 로그 라인 처리기
pub struct ChatProcessor {
    server: Arc<ServerConfig>,
    settings: Arc<MonitorSettings>,
    reconstructor: ChatReconstructor,
    dedup: DedupGuard<ChatMessage>,
    sessions: Arc<SessionStore>,
    collaborators: Collaborators,
}

impl ChatProcessor {
    /// 원본 라인 하나를 처리합니다.
    pub async fn process_line(&mut self, raw: &str) -> ChatOutcome {
        match self.reconstructor.push(raw) {
            ChatStep::Emitted(message) => self.process_message(message).await,
            ChatStep::Replaced => {
                debug!(server = %self.server.name, "chat header without body discarded");
                ChatOutcome::Incomplete
            }
            ChatStep::Pending | ChatStep::Noise | ChatStep::Skipped => ChatOutcome::Incomplete,
        }
    }

    /// 완성된 채팅 메시지를 처리합니다.
    pub async fn process_message(&mut self, message: ChatMessage) -> ChatOutcome {
        let server = self.server.name.clone();

        if !self.dedup.check_and_mark(message.clone()) {
            counter!(m::CHAT_DUPLICATES_TOTAL, m::LABEL_SERVER => server.clone()).increment(1);
            debug!(server = %server, player = %message.player_name, "duplicate chat message skipped");
            return ChatOutcome::Duplicate;
        }
        counter!(m::CHAT_MESSAGES_TOTAL, m::LABEL_SERVER => server.clone()).increment(1);

        if self.settings.is_ignored_sender(&message.player_name) {
            return ChatOutcome::Ignored;
        }

        let session = self.sessions.lookup(&message.player_name).await;
        if session.is_none() {
            debug!(server = %server, player = %message.player_name, "no session found for player");
        }

        if self.settings.is_help_request(&message.message) {
            info!(server = %server, player = %message.player_name, "help request received");
            counter!(m::CHAT_HELP_REQUESTS_TOTAL, m::LABEL_SERVER => server.clone()).increment(1);
            self.collaborators.actions.handle_help_request(HelpRequest {
                server_name: server,
                player_name: message.player_name,
                content: message.message,
                ip_address: session.map(|s| s.ip).filter(|ip| !ip.is_empty()),
            });
            return ChatOutcome::HelpRequest;
        }

        info!(
            server = %server,
            player = %message.player_name,
            message = %preview(&message.message),
            "analyzing chat message"
        );

        let mut analysis = self
            .collaborators
            .classifier
            .classify_message(&message.player_name, &message.message);

        if analysis.level == ViolationLevel::Ok {
            if !self.settings.verify_all {
                return ChatOutcome::Clean;
            }
            analysis.level = ViolationLevel::Minor;
            analysis.reason = VERIFY_ALL_REASON.to_owned();
        }

        let level = analysis.level;
        report_violation(
            &self.server,
            &self.collaborators,
            Detection {
                kind: ViolationKind::Message,
                timestamp: message.timestamp,
                player_name: message.player_name,
                content: message.message,
                analysis,
                session,
            },
        )
        .await;
        ChatOutcome::Flagged(level)
    }
}

// ─── 접속 처리 ─────────────────────────────────────────────────────

/// 접속 로그 라인 처리기
pub struct JoinProcessor {
    server: Arc<ServerConfig>,
    parser: JoinEventParser,
    dedup: DedupGuard<(String, String)>,
    sessions: Arc<SessionStore>,
    collaborators: Collaborators,
}

impl JoinProcessor {
    /// 원본 라인 하나를 처리합니다.
    pub async fn process_line(&mut self, raw: &str) -> JoinOutcome {
        match self.parser.parse(raw) {
            Some(event) => self.process_event(event).await,
            None => JoinOutcome::NoMatch,
        }
    }

    /// 접속 이벤트를 처리합니다.
    ///
    /// 세션 갱신과 환영 메시지는 중복 여부와 관계없이 항상 수행됩니다.
    pub async fn process_event(&mut self, event: PlayerJoinEvent) -> JoinOutcome {
        let server = self.server.name.clone();
        counter!(m::JOIN_EVENTS_TOTAL, m::LABEL_SERVER => server.clone()).increment(1);

        self.sessions
            .update(&event.player_name, event.session())
            .await;
        self.collaborators
            .actions
            .welcome_player(&self.server, &event.player_name);

        let identity = (event.player_name.clone(), event.ip_address.clone());
        if !self.dedup.check_and_mark(identity) {
            counter!(m::JOIN_DUPLICATES_TOTAL, m::LABEL_SERVER => server.clone()).increment(1);
            debug!(server = %server, player = %event.player_name, "duplicate join skipped");
            return JoinOutcome::Duplicate;
        }

        info!(
            server = %server,
            player = %event.player_name,
            ip = %event.ip_address,
            "analyzing nickname"
        );
        let analysis = self
            .collaborators
            .classifier
            .classify_nickname(&event.player_name);
        if analysis.level == ViolationLevel::Ok {
            return JoinOutcome::Clean;
        }

        let level = analysis.level;
        let session = event.session();
        report_violation(
            &self.server,
            &self.collaborators,
            Detection {
                kind: ViolationKind::Nickname,
                timestamp: event.timestamp,
                content: event.player_name.clone(),
                player_name: event.player_name,
                analysis,
                session: Some(session),
            },
        )
        .await;
        JoinOutcome::Flagged(level)
    }
}

/// 기록/전달 대상 감지 결과
struct Detection {
    kind: ViolationKind,
    timestamp: String,
    player_name: String,
    content: String,
    analysis: Analysis,
    session: Option<Session>,
}

/// 위반을 저장소에 기록하고 조치 계층에 전달합니다.
///
/// 저장은 blocking 스레드에서 수행합니다. 저장 실패는 기록만 하고 전달은 계속합니다.
async fn report_violation(
    server: &Arc<ServerConfig>,
    collaborators: &Collaborators,
    detection: Detection,
) {
    let Detection {
        kind,
        timestamp,
        player_name,
        content,
        analysis,
        session,
    } = detection;

    warn!(
        server = %server.name,
        player = %player_name,
        kind = %kind,
        level = %analysis.level,
        reason = %analysis.reason,
        "violation detected"
    );
    counter!(
        m::MODERATION_VIOLATIONS_TOTAL,
        m::LABEL_SERVER => server.name.clone(),
        m::LABEL_KIND => kind.as_str(),
        m::LABEL_LEVEL => analysis.level.as_str()
    )
    .increment(1);

    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
    let (ip_address, ban_command, name_with_ids) = match session {
        Some(s) => (non_empty(s.ip), non_empty(s.ban_command), non_empty(s.name_with_ids)),
        None => (None, None, None),
    };

    let record = ViolationRecord {
        timestamp,
        player_name: player_name.clone(),
        kind,
        content: content.clone(),
        analysis: analysis.clone(),
        ip_address: ip_address.clone(),
    };
    let store = Arc::clone(&collaborators.store);
    match tokio::task::spawn_blocking(move || store.record_violation(&record)).await {
        Ok(Ok(id)) => debug!(server = %server.name, record_id = id, "violation recorded"),
        Ok(Err(e)) => error!(server = %server.name, error = %e, "failed to record violation"),
        Err(e) => error!(server = %server.name, error = %e, "violation store task failed"),
    }

    collaborators.actions.handle_violation(ViolationReport {
        server: Arc::clone(server),
        player_name,
        kind,
        content,
        analysis,
        ip_address,
        ban_command,
        name_with_ids,
    });
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}

// ─── 서버 모니터 ───────────────────────────────────────────────────

/// 모니터 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum MonitorState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨 (재시작 불가)
    Stopped,
}

/// 게임 서버 하나의 로그 모니터
///
/// # 사용 예시
/// ```ignore
/// use pp2sentry_log_pipeline::ServerMonitorBuilder;
///
/// let mut monitor = ServerMonitorBuilder::new(server_config)
///     .settings(settings)
///     .classifier(classifier)
///     .store(store)
///     .actions(actions)
///     .build()?;
///
/// monitor.start()?;
/// ```
pub struct ServerMonitor {
    server: Arc<ServerConfig>,
    settings: Arc<MonitorSettings>,
    sessions: Arc<SessionStore>,
    chat: Option<ChatProcessor>,
    join: Option<JoinProcessor>,
    state: MonitorState,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerMonitor {
    /// 서버 이름
    pub fn name(&self) -> &str {
        &self.server.name
    }

    /// 서버 설정
    pub fn server(&self) -> &Arc<ServerConfig> {
        &self.server
    }

    /// 세션 저장소
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            MonitorState::Initialized => "initialized",
            MonitorState::Running => "running",
            MonitorState::Stopped => "stopped",
        }
    }

    /// 실행 중인지 여부
    pub fn is_running(&self) -> bool {
        self.state == MonitorState::Running
    }

    /// 두 처리 루프가 모두 끝났는지 여부 (파일 없음 등)
    pub fn loops_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// 채팅 루프와 접속 루프를 각각 별도 태스크로 시작합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn start(&mut self) -> Result<(), LogPipelineError> {
        match self.state {
            MonitorState::Running => {
                return Err(LogPipelineError::AlreadyRunning(self.server.name.clone()));
            }
            MonitorState::Stopped => {
                return Err(LogPipelineError::Stopped(self.server.name.clone()));
            }
            MonitorState::Initialized => {}
        }

        let (Some(chat), Some(join)) = (self.chat.take(), self.join.take()) else {
            return Err(LogPipelineError::Stopped(self.server.name.clone()));
        };

        info!(
            server = %self.server.name,
            chatlog = %self.server.chatlog_path,
            playlog = %self.server.playlog_path,
            "starting server monitor"
        );

        let start = self.settings.start_position();
        self.tasks.push(tokio::spawn(run_chat_loop(
            chat,
            Arc::clone(&self.server),
            Arc::clone(&self.settings),
            start,
        )));
        self.tasks.push(tokio::spawn(run_join_loop(
            join,
            Arc::clone(&self.server),
            Arc::clone(&self.settings),
            start,
        )));

        self.state = MonitorState::Running;
        Ok(())
    }

    /// 처리 루프를 즉시 중단합니다. 남은 상태는 버려집니다.
    pub fn stop(&mut self) {
        if self.state != MonitorState::Running {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state = MonitorState::Stopped;
        info!(server = %self.server.name, "server monitor stopped");
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_chat_loop(
    mut processor: ChatProcessor,
    server: Arc<ServerConfig>,
    settings: Arc<MonitorSettings>,
    start: StartPosition,
) {
    let mut source = match LineSource::open(
        &server.chatlog_path,
        server.name.clone(),
        "chat",
        start,
        settings.tail.clone(),
    )
    .await
    {
        Ok(source) => source,
        Err(e) => {
            error!(server = %server.name, error = %e, "chat log unavailable, chat monitoring stopped");
            return;
        }
    };

    loop {
        let line = source.next_line().await;
        processor.process_line(&line).await;
    }
}

async fn run_join_loop(
    mut processor: JoinProcessor,
    server: Arc<ServerConfig>,
    settings: Arc<MonitorSettings>,
    start: StartPosition,
) {
    let mut source = match LineSource::open(
        &server.playlog_path,
        server.name.clone(),
        "play",
        start,
        settings.tail.clone(),
    )
    .await
    {
        Ok(source) => source,
        Err(e) => {
            error!(server = %server.name, error = %e, "join log unavailable, join monitoring stopped");
            return;
        }
    };

    loop {
        let line = source.next_line().await;
        processor.process_line(&line).await;
    }
}

/// 서버 모니터 빌더
pub struct ServerMonitorBuilder {
    server: ServerConfig,
    settings: MonitorSettings,
    classifier: Option<Arc<dyn Classifier>>,
    store: Option<Arc<dyn ViolationStore>>,
    actions: Option<Arc<dyn ActionHandler>>,
}

impl ServerMonitorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            settings: MonitorSettings::default(),
            classifier: None,
            store: None,
            actions: None,
        }
    }

    /// 모니터 설정을 지정합니다.
    pub fn settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 분류기를 지정합니다.
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 위반 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<dyn ViolationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 조치 계층을 지정합니다.
    pub fn actions(mut self, actions: Arc<dyn ActionHandler>) -> Self {
        self.actions = Some(actions);
        self
    }

    /// 모니터를 빌드합니다.
    pub fn build(self) -> Result<ServerMonitor, LogPipelineError> {
        self.settings.validate()?;

        let missing = |field: &str| LogPipelineError::Config {
            field: field.to_owned(),
            reason: format!("{field} is required for server '{}'", self.server.name),
        };
        let collaborators = Collaborators {
            classifier: self.classifier.clone().ok_or_else(|| missing("classifier"))?,
            store: self.store.clone().ok_or_else(|| missing("store"))?,
            actions: self.actions.clone().ok_or_else(|| missing("actions"))?,
        };

        let server = Arc::new(self.server);
        let settings = Arc::new(self.settings);
        let parser = JoinEventParser::new()?;
        let sessions = Arc::new(SessionStore::new(
            server.name.clone(),
            &server.playlog_path,
            parser.clone(),
        ));

        let chat = ChatProcessor {
            server: Arc::clone(&server),
            settings: Arc::clone(&settings),
            reconstructor: ChatReconstructor::new()?,
            dedup: DedupGuard::with_capacity(settings.dedup_capacity),
            sessions: Arc::clone(&sessions),
            collaborators: collaborators.clone(),
        };
        let join = JoinProcessor {
            server: Arc::clone(&server),
            parser,
            dedup: DedupGuard::with_capacity(settings.dedup_capacity),
            sessions: Arc::clone(&sessions),
            collaborators,
        };

        Ok(ServerMonitor {
            server,
            settings,
            sessions,
            chat: Some(chat),
            join: Some(join),
            state: MonitorState::Initialized,
            tasks: Vec::new(),
        })
    }

    /// 처리기만 빌드합니다 (태스크 없이 라인을 직접 넣을 때 사용).
    pub fn build_processors(self) -> Result<(ChatProcessor, JoinProcessor), LogPipelineError> {
        let mut monitor = self.build()?;
        match (monitor.chat.take(), monitor.join.take()) {
            (Some(chat), Some(join)) => Ok((chat, join)),
            _ => Err(LogPipelineError::Stopped(monitor.server.name.clone())),
        }
    }
}
