//! # pp2sentry-moderation
//!
//! 로그 파이프라인이 넘겨준 위반과 도움 요청을 처리하는 모더레이션 계층입니다.
//!
//! - [`RuleClassifier`]: YAML 규칙 기반 메시지/닉네임 분류기 (core `Classifier`)
//! - [`SqliteViolationStore`]: 위반 기록 저장소 (core `ViolationStore`)
//! - [`AdminClient`]: 게임 서버 웹 관리 인터페이스 (core `CommandExecutor`)
//! - [`WebhookNotifier`]: Discord 웹훅 알림
//! - [`ActionExecutor`] / [`ModerationDispatcher`]: 단일 조치 실행 태스크와
//!   그 입구 (core `ActionHandler`)
//! - [`discover_admin_password`]: 게임 서버 컨테이너 로그에서 관리 비밀번호 탐색
//!
//! # 흐름
//! ```text
//! ServerMonitor ──ActionHandler──> ModerationDispatcher ──mpsc──> ActionExecutor
//!                                                                    │
//!                                          AdminClient <─────────────┤
//!                                          WebhookNotifier <─────────┘
//! ```

pub mod admin;
pub mod classifier;
pub mod command;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod store;
pub mod webhook;

pub use admin::{AdminClient, find_player_index};
pub use classifier::{ModerationRule, RuleClassifier, RuleScope, suggested_action};
pub use command::{
    EnforcementPlan, ModerationCommand, ReviewDecision, TemplateVars, render_template,
};
pub use discovery::{BollardContainerLogs, ContainerLogs, discover_admin_password};
pub use dispatcher::ModerationDispatcher;
pub use error::ModerationError;
pub use executor::{ActionExecutor, ActionExecutorBuilder, ExecutorMap};
pub use store::{SqliteViolationStore, StoredViolation, ViolationStats};
pub use webhook::{Notification, Notifier, WebhookNotifier};
