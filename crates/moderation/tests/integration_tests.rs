//! 통합 테스트 -- 규칙 로딩, 위반 기록, 조치 실행 태스크 전체 흐름 검증
//!
//! 실제 YAML 규칙 디렉토리와 SQLite 파일을 사용하고,
//! 관리 인터페이스와 웹훅만 기록용 협력자로 대체합니다.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pp2sentry_core::config::{ModerationConfig, ServerConfig};
use pp2sentry_core::error::ActionError;
use pp2sentry_core::pipeline::{ActionHandler, BoxFuture, Classifier, CommandExecutor, ViolationStore};
use pp2sentry_core::types::{
    HelpRequest, ViolationKind, ViolationLevel, ViolationRecord, ViolationReport,
};
use pp2sentry_moderation::{
    ActionExecutor, ActionExecutorBuilder, ModerationDispatcher, ModerationError, Notification,
    Notifier, ReviewDecision, RuleClassifier, SqliteViolationStore,
};

// ─── 테스트 협력자 ─────────────────────────────────────────────────

/// 명령을 기록하는 관리 인터페이스
struct FakeAdmin {
    commands: Mutex<Vec<String>>,
    index: Option<String>,
}

impl FakeAdmin {
    fn new(index: Option<&str>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            index: index.map(str::to_owned),
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandExecutor for FakeAdmin {
    fn execute_command<'a>(
        &'a self,
        command: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
        self.commands.lock().unwrap().push(command.to_owned());
        Box::pin(async { Ok(Some("Command executed.".to_owned())) })
    }

    fn resolve_live_player_id<'a>(
        &'a self,
        _player_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
        let index = self.index.clone();
        Box::pin(async move { Ok(index) })
    }
}

#[derive(Default)]
struct Inbox {
    sent: Mutex<Vec<Notification>>,
}

impl Inbox {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for Inbox {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), ModerationError>> {
        self.sent.lock().unwrap().push(notification.clone());
        Box::pin(async { Ok(()) })
    }
}

// ─── 헬퍼 ──────────────────────────────────────────────────────────

const RULES: &str = r#"
rules:
  - id: threats
    title: Uhkailu
    level: SEVERE
    scope: message
    patterns:
      - 'tapan sut'
  - id: profanity
    title: Kiroilu
    level: MODERATE
    patterns:
      - '\bperkele\b'
"#;

fn server() -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        name: "Main".to_owned(),
        ..ServerConfig::default()
    })
}

fn report(classifier: &RuleClassifier, text: &str) -> ViolationReport {
    ViolationReport {
        server: server(),
        player_name: "Foo".to_owned(),
        kind: ViolationKind::Message,
        content: text.to_owned(),
        analysis: classifier.classify_message("Foo", text),
        ip_address: Some("1.2.3.4".to_owned()),
        ban_command: Some("/banaddress 1.2.3.4 9999999 Foo 999".to_owned()),
        name_with_ids: Some("Foo 999".to_owned()),
    }
}

fn executor(
    config: ModerationConfig,
    admin: &Arc<FakeAdmin>,
    inbox: &Arc<Inbox>,
) -> (ActionExecutor, ModerationDispatcher) {
    let (mut executor, dispatcher) = ActionExecutorBuilder::new()
        .config(config)
        .server_executor("Main", admin.clone())
        .notifier(inbox.clone())
        .build()
        .unwrap();
    executor.start().unwrap();
    (executor, dispatcher)
}

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

// ─── 테스트 ────────────────────────────────────────────────────────

#[tokio::test]
async fn rules_directory_drives_classification_and_storage() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chat.yml"), RULES).unwrap();
    std::fs::write(dir.path().join("broken.yml"), "rules: [not: valid").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let classifier = RuleClassifier::load(dir.path()).await.unwrap();
    assert_eq!(classifier.rule_count(), 2);

    let store = SqliteViolationStore::open(dir.path().join("db").join("violations.db")).unwrap();
    for text in ["tapan sut", "perkele", "moi kaikki"] {
        let analysis = classifier.classify_message("Foo", text);
        if analysis.level == ViolationLevel::Ok {
            continue;
        }
        store
            .record_violation(&ViolationRecord {
                timestamp: "01.01.2025 10:01".to_owned(),
                player_name: "Foo".to_owned(),
                kind: ViolationKind::Message,
                content: text.to_owned(),
                analysis,
                ip_address: Some("1.2.3.4".to_owned()),
            })
            .unwrap();
    }

    let history = store.player_violations("Foo", 10).unwrap();
    assert_eq!(history.len(), 2);
    let stats = store.stats().unwrap();
    assert_eq!(stats.by_level.get("SEVERE"), Some(&1));
    assert_eq!(stats.by_level.get("MODERATE"), Some(&1));
}

#[tokio::test]
async fn confirmed_severe_review_bans_and_kicks() {
    let classifier = RuleClassifier::new(RuleClassifier::parse_yaml(RULES, "test").unwrap()).unwrap();
    let admin = Arc::new(FakeAdmin::new(Some("5")));
    let inbox = Arc::new(Inbox::default());
    let (mut executor, dispatcher) = executor(ModerationConfig::default(), &admin, &inbox);

    dispatcher.handle_violation(report(&classifier, "tapan sut"));
    assert!(wait_until(Duration::from_secs(2), || !inbox.sent().is_empty()).await);

    let review_id = inbox
        .sent()
        .into_iter()
        .find_map(|n| match n {
            Notification::Violation { review_id, .. } => review_id,
            _ => None,
        })
        .unwrap();
    assert!(admin.commands().is_empty(), "nothing runs before confirmation");

    dispatcher
        .submit_review(&review_id, ReviewDecision::Confirm(None))
        .await
        .unwrap();
    drop(dispatcher);
    executor.drain().await;

    assert_eq!(
        admin.commands(),
        vec!["/banaddress 1.2.3.4 9999999 Foo 999", "/kick 5"]
    );
}

#[tokio::test]
async fn auto_enforced_moderate_kicks_by_name_when_not_listed() {
    let classifier = RuleClassifier::new(RuleClassifier::parse_yaml(RULES, "test").unwrap()).unwrap();
    let admin = Arc::new(FakeAdmin::new(None));
    let inbox = Arc::new(Inbox::default());
    let config = ModerationConfig {
        auto_enforce_levels: vec![ViolationLevel::Moderate],
        ..ModerationConfig::default()
    };
    let (mut executor, dispatcher) = executor(config, &admin, &inbox);

    dispatcher.handle_violation(report(&classifier, "perkele"));
    drop(dispatcher);
    executor.drain().await;

    assert_eq!(admin.commands(), vec!["/kick Foo"]);
}

#[tokio::test]
async fn help_request_is_notified() {
    let admin = Arc::new(FakeAdmin::new(None));
    let inbox = Arc::new(Inbox::default());
    let (mut executor, dispatcher) = executor(ModerationConfig::default(), &admin, &inbox);

    dispatcher.handle_help_request(HelpRequest {
        server_name: "Main".to_owned(),
        player_name: "Foo".to_owned(),
        content: "!yllapitaja joku huijaa".to_owned(),
        ip_address: Some("1.2.3.4".to_owned()),
    });
    drop(dispatcher);
    executor.drain().await;

    let sent = inbox.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], Notification::HelpRequest(r) if r.player_name == "Foo"));
    assert!(admin.commands().is_empty());
}

#[tokio::test]
async fn welcome_sent_for_each_join() {
    let admin = Arc::new(FakeAdmin::new(Some("2")));
    let inbox = Arc::new(Inbox::default());
    let config = ModerationConfig {
        welcome_enabled: true,
        welcome_delay_secs: 0,
        ..ModerationConfig::default()
    };
    let (mut executor, dispatcher) = executor(config, &admin, &inbox);

    // 같은 접속 이벤트가 두 번 들어와도 환영은 매번 보냄
    dispatcher.welcome_player(&server(), "Foo");
    dispatcher.welcome_player(&server(), "Foo");
    drop(dispatcher);
    executor.drain().await;

    let commands = admin.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| c.contains("Tervetuloa")));
}

#[tokio::test]
async fn unknown_server_skips_enforcement() {
    let classifier = RuleClassifier::new(RuleClassifier::parse_yaml(RULES, "test").unwrap()).unwrap();
    let admin = Arc::new(FakeAdmin::new(Some("1")));
    let inbox = Arc::new(Inbox::default());
    let config = ModerationConfig {
        auto_enforce_levels: vec![ViolationLevel::Severe],
        ..ModerationConfig::default()
    };
    let (mut executor, dispatcher) = executor(config, &admin, &inbox);

    let mut other = report(&classifier, "tapan sut");
    other.server = Arc::new(ServerConfig {
        name: "Rookie".to_owned(),
        ..ServerConfig::default()
    });
    dispatcher.handle_violation(other);
    drop(dispatcher);
    executor.drain().await;

    assert!(admin.commands().is_empty());
    assert_eq!(inbox.sent().len(), 1);
}
