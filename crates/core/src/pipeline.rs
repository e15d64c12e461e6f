//! 협력자 trait -- 로그 파이프라인이 외부 계층과 통신하는 확장 포인트
//!
//! 로그 파이프라인은 분류기, 위반 저장소, 조치 계층, 관리 명령 실행기를
//! 아래 trait으로만 사용합니다. 실제 구현은 `pp2sentry-moderation`에 있고,
//! 테스트에서는 기록용 mock을 사용합니다.
//!
//! ```text
//! ServerMonitor ──> Classifier        (동기, CPU 전용)
//!               ──> ViolationStore    (동기, 로컬 DB)
//!               ──> ActionHandler     (fire-and-forget)
//! Orchestrator  ──> CommandExecutor   (비동기, 네트워크)
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::config::ServerConfig;
use crate::error::{ActionError, StorageError};
use crate::types::{Analysis, HelpRequest, ViolationRecord, ViolationReport};

/// dyn-compatible 비동기 반환 타입
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 텍스트 분류기
///
/// 메시지와 닉네임에 심각도를 매깁니다. 여러 모니터 태스크에서 동시에 호출됩니다.
pub trait Classifier: Send + Sync {
    /// 채팅 메시지를 분류합니다.
    fn classify_message(&self, player_name: &str, text: &str) -> Analysis;

    /// 닉네임을 분류합니다.
    fn classify_nickname(&self, nickname: &str) -> Analysis;
}

/// 위반 기록 저장소
pub trait ViolationStore: Send + Sync {
    /// 위반을 기록하고 레코드 ID를 반환합니다.
    fn record_violation(&self, record: &ViolationRecord) -> Result<i64, StorageError>;
}

/// 조치 계층
///
/// 모든 메서드는 즉시 반환해야 합니다 (fire-and-forget).
/// 느린 네트워크 호출이 로그 수집 루프를 멈추게 해서는 안 됩니다.
pub trait ActionHandler: Send + Sync {
    /// 위반을 처리합니다 (알림, 검토 요청, 자동 집행 등).
    fn handle_violation(&self, report: ViolationReport);

    /// 도움 요청을 처리합니다.
    fn handle_help_request(&self, request: HelpRequest);

    /// 접속한 플레이어에게 환영 메시지를 보냅니다 (best-effort).
    fn welcome_player(&self, server: &ServerConfig, player_name: &str);
}

/// 서버 관리 명령 실행기
///
/// 서버 하나에 대응하며 네트워크 I/O를 수행합니다.
/// 호출자는 로그 수집 루프 밖(별도 태스크)에서 호출해야 합니다.
pub trait CommandExecutor: Send + Sync {
    /// 관리 명령을 실행하고 서버 응답 텍스트를 반환합니다.
    ///
    /// 관리 인터페이스가 설정되지 않은 경우 `Ok(None)`을 반환합니다.
    fn execute_command<'a>(
        &'a self,
        command: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>>;

    /// 현재 접속 중인 플레이어의 인게임 인덱스를 조회합니다.
    fn resolve_live_player_id<'a>(
        &'a self,
        player_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>>;
}
