//! 통합 테스트 -- 실제 로그 파일을 tail하는 서버 모니터 전체 흐름 검증
//!
//! 임시 디렉토리에 chatlog/playlog를 만들고 모니터를 실행한 뒤,
//! 기록용 협력자가 받은 결과를 확인합니다.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pp2sentry_core::config::ServerConfig;
use pp2sentry_core::error::StorageError;
use pp2sentry_core::pipeline::{ActionHandler, Classifier, ViolationStore};
use pp2sentry_core::types::{
    Analysis, HelpRequest, ViolationKind, ViolationLevel, ViolationRecord, ViolationReport,
};
use pp2sentry_log_pipeline::{
    MonitorSettings, MonitorSettingsBuilder, ServerMonitor, ServerMonitorBuilder, StartPosition,
};

// ─── 테스트 협력자 ─────────────────────────────────────────────────

/// "badword"를 포함한 메시지만 SEVERE로 분류
struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify_message(&self, _player_name: &str, text: &str) -> Analysis {
        if text.contains("badword") {
            Analysis {
                level: ViolationLevel::Severe,
                reason: "keyword match".to_owned(),
                suggested_action: "/banaddress {ip} 9999999 {full_name}".to_owned(),
            }
        } else {
            Analysis::ok("clean")
        }
    }

    fn classify_nickname(&self, _nickname: &str) -> Analysis {
        Analysis::ok("clean")
    }
}

#[derive(Default)]
struct Recorder {
    records: Mutex<Vec<ViolationRecord>>,
    reports: Mutex<Vec<ViolationReport>>,
    help: Mutex<Vec<HelpRequest>>,
    welcomes: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    fn reports(&self) -> Vec<ViolationReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ViolationStore for Recorder {
    fn record_violation(&self, record: &ViolationRecord) -> Result<i64, StorageError> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(records.len() as i64)
    }
}

impl ActionHandler for Recorder {
    fn handle_violation(&self, report: ViolationReport) {
        self.reports.lock().unwrap().push(report);
    }

    fn handle_help_request(&self, request: HelpRequest) {
        self.help.lock().unwrap().push(request);
    }

    fn welcome_player(&self, server: &ServerConfig, player_name: &str) {
        self.welcomes
            .lock()
            .unwrap()
            .push((server.name.clone(), player_name.to_owned()));
    }
}

// ─── 헬퍼 ──────────────────────────────────────────────────────────

struct LogDir {
    dir: tempfile::TempDir,
}

impl LogDir {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn server(&self, name: &str, chat: &str, play: &str) -> ServerConfig {
        let chatlog = self.dir.path().join(format!("{name}-chatlog.txt"));
        let playlog = self.dir.path().join(format!("{name}-playlog.txt"));
        std::fs::write(&chatlog, chat).unwrap();
        std::fs::write(&playlog, play).unwrap();
        ServerConfig {
            name: name.to_owned(),
            chatlog_path: chatlog.display().to_string(),
            playlog_path: playlog.display().to_string(),
            ..ServerConfig::default()
        }
    }
}

fn settings(start: StartPosition) -> MonitorSettings {
    MonitorSettingsBuilder::new()
        .poll_interval_ms(10)
        .start_position(start)
        .build()
        .unwrap()
}

fn monitor(server: ServerConfig, settings: MonitorSettings, recorder: &Arc<Recorder>) -> ServerMonitor {
    ServerMonitorBuilder::new(server)
        .settings(settings)
        .classifier(Arc::new(KeywordClassifier))
        .store(recorder.clone())
        .actions(recorder.clone())
        .build()
        .unwrap()
}

/// 조건이 참이 될 때까지 대기합니다. 시간 초과 시 `false`.
async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn append(path: &str, content: &str) {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

const FOO_JOIN: &str = "--> Foo joined the game (ip: 1.2.3.4). [01.01.2025 10:00] [/banaddress 1.2.3.4 60 Foo 999] [v1.0]\n";
const FOO_CHAT: &str = "Foo:   [01.01.2025 10:01]\nyou badword\n";
const WAIT: Duration = Duration::from_secs(5);

// ─── 시나리오 ──────────────────────────────────────────────────────

#[tokio::test]
async fn join_then_flagged_chat_reaches_actions_with_session() {
    // Given: 접속 로그에 Foo, 채팅 로그에 위반 메시지
    let logs = LogDir::new();
    let server = logs.server("Main", FOO_CHAT, FOO_JOIN);
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::Beginning), &recorder);

    // When
    monitor.start().unwrap();
    assert!(wait_until(WAIT, || recorder.report_count() == 1).await);

    // Then: 세션 정보가 붙어서 전달되고 저장됨
    let report = &recorder.reports()[0];
    assert_eq!(report.server.name, "Main");
    assert_eq!(report.player_name, "Foo");
    assert_eq!(report.kind, ViolationKind::Message);
    assert_eq!(report.content, "you badword");
    assert_eq!(report.analysis.level, ViolationLevel::Severe);
    assert_eq!(report.ip_address.as_deref(), Some("1.2.3.4"));
    assert_eq!(
        report.ban_command.as_deref(),
        Some("/banaddress 1.2.3.4 9999999 Foo 999")
    );

    let records = recorder.records.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip_address.as_deref(), Some("1.2.3.4"));

    monitor.stop();
}

#[tokio::test]
async fn lines_appended_after_start_are_picked_up() {
    // Given: 기존 내용은 건너뜀 (파일 끝에서 시작)
    let logs = LogDir::new();
    let server = logs.server("Main", FOO_CHAT, "");
    let chatlog = server.chatlog_path.clone();
    let playlog = server.playlog_path.clone();
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::End), &recorder);
    monitor.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // When
    append(&playlog, FOO_JOIN);
    append(&chatlog, "Foo:   [01.01.2025 10:05]\nanother badword\n");

    // Then: 새로 추가된 메시지만 처리됨
    assert!(wait_until(WAIT, || recorder.report_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].content, "another badword");
    assert_eq!(recorder.welcomes.lock().unwrap().len(), 1);

    monitor.stop();
}

#[tokio::test]
async fn same_message_twice_in_log_is_reported_once() {
    let logs = LogDir::new();
    let chat = format!("{FOO_CHAT}{FOO_CHAT}Bar:   [01.01.2025 10:02]\nbadword too\n");
    let server = logs.server("Main", &chat, "");
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::Beginning), &recorder);

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || recorder.report_count() == 2).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let names: Vec<String> = recorder.reports().into_iter().map(|r| r.player_name).collect();
    assert_eq!(names, vec!["Foo".to_owned(), "Bar".to_owned()]);
    monitor.stop();
}

#[tokio::test]
async fn monitors_for_different_servers_do_not_share_dedup_state() {
    // Given: 두 서버에 같은 메시지
    let logs = LogDir::new();
    let recorder = Arc::new(Recorder::default());
    let mut main = monitor(
        logs.server("Main", FOO_CHAT, FOO_JOIN),
        settings(StartPosition::Beginning),
        &recorder,
    );
    let mut rookie = monitor(
        logs.server("Rookie", FOO_CHAT, ""),
        settings(StartPosition::Beginning),
        &recorder,
    );

    // When
    main.start().unwrap();
    rookie.start().unwrap();

    // Then: 서버마다 한 번씩
    assert!(wait_until(WAIT, || recorder.report_count() == 2).await);
    let reports = recorder.reports();
    let main_report = reports.iter().find(|r| r.server.name == "Main").unwrap();
    let rookie_report = reports.iter().find(|r| r.server.name == "Rookie").unwrap();

    // 세션도 서버별로 분리됨
    assert_eq!(main_report.ip_address.as_deref(), Some("1.2.3.4"));
    assert!(rookie_report.ip_address.is_none());
    assert!(rookie_report.ban_command.is_none());

    main.stop();
    rookie.stop();
}

#[tokio::test]
async fn rotated_chat_log_is_reread_without_duplicate_reports() {
    // Given: 두 메시지가 처리된 상태
    let logs = LogDir::new();
    let initial = format!(
        "{FOO_CHAT}Bar:   [01.01.2025 10:02]\nbadword in a considerably longer message body than the others\n"
    );
    let server = logs.server("Main", &initial, "");
    let chatlog = server.chatlog_path.clone();
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::Beginning), &recorder);
    monitor.start().unwrap();
    assert!(wait_until(WAIT, || recorder.report_count() == 2).await);

    // When: 더 짧은 내용으로 교체 (이전 메시지 + 새 메시지)
    let rotated = format!("{FOO_CHAT}Baz:   [01.01.2025 10:09]\nbadword\n");
    assert!(rotated.len() < initial.len());
    std::fs::write(&chatlog, rotated).unwrap();

    // Then: 새 메시지만 추가로 보고됨
    assert!(wait_until(WAIT, || recorder.report_count() == 3).await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    let names: Vec<String> = recorder.reports().into_iter().map(|r| r.player_name).collect();
    assert_eq!(names, vec!["Foo".to_owned(), "Bar".to_owned(), "Baz".to_owned()]);

    monitor.stop();
}

#[tokio::test]
async fn header_followed_by_header_loses_first_entry() {
    let logs = LogDir::new();
    let chat = "Foo:   [01.01.2025 10:01]\nBar:   [01.01.2025 10:02]\nbadword\n";
    let server = logs.server("Main", chat, "");
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::Beginning), &recorder);

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || recorder.report_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].player_name, "Bar");
    monitor.stop();
}

#[tokio::test]
async fn duplicate_joins_welcome_every_time() {
    let logs = LogDir::new();
    let play = format!("{FOO_JOIN}{FOO_JOIN}");
    let server = logs.server("Main", "", &play);
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::Beginning), &recorder);

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || recorder.welcomes.lock().unwrap().len() == 2).await);
    assert_eq!(monitor.sessions().len().await, 1);
    monitor.stop();
}

#[tokio::test]
async fn missing_log_files_end_loops_without_panicking() {
    let logs = LogDir::new();
    let server = ServerConfig {
        name: "Ghost".to_owned(),
        chatlog_path: logs.dir.path().join("nope-chat.txt").display().to_string(),
        playlog_path: logs.dir.path().join("nope-play.txt").display().to_string(),
        ..ServerConfig::default()
    };
    let recorder = Arc::new(Recorder::default());
    let mut monitor = monitor(server, settings(StartPosition::End), &recorder);

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.loops_finished()).await);
    assert_eq!(recorder.report_count(), 0);
}
