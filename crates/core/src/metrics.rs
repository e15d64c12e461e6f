//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `pp2sentry_`
//! - 모듈명: `tail_`, `chat_`, `join_`, `moderation_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(pp2sentry_core::metrics::CHAT_MESSAGES_TOTAL, "server" => "Main").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 서버 이름 레이블 키
pub const LABEL_SERVER: &str = "server";

/// 로그 파일 종류 레이블 키 (chat, play)
pub const LABEL_LOG: &str = "log";

/// 심각도 레이블 키 (minor, moderate, severe)
pub const LABEL_LEVEL: &str = "level";

/// 위반 대상 레이블 키 (message, nickname)
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Tail 메트릭 ───────────────────────────────────────────────────

/// Tail: 읽은 완성 라인 수 (counter, labels: server, log)
pub const TAIL_LINES_READ_TOTAL: &str = "pp2sentry_tail_lines_read_total";

/// Tail: 잘림(로테이션) 감지 횟수 (counter, labels: server, log)
pub const TAIL_TRUNCATIONS_TOTAL: &str = "pp2sentry_tail_truncations_total";

/// Tail: cp1252 대체 디코딩 횟수 (counter, labels: server, log)
pub const TAIL_DECODE_FALLBACKS_TOTAL: &str = "pp2sentry_tail_decode_fallbacks_total";

/// Tail: 읽기 에러 수 (counter, labels: server, log)
pub const TAIL_READ_ERRORS_TOTAL: &str = "pp2sentry_tail_read_errors_total";

// ─── Chat 메트릭 ───────────────────────────────────────────────────

/// Chat: 재구성된 채팅 메시지 수 (counter, label: server)
pub const CHAT_MESSAGES_TOTAL: &str = "pp2sentry_chat_messages_total";

/// Chat: 중복으로 무시된 메시지 수 (counter, label: server)
pub const CHAT_DUPLICATES_TOTAL: &str = "pp2sentry_chat_duplicates_total";

/// Chat: 도움 요청 수 (counter, label: server)
pub const CHAT_HELP_REQUESTS_TOTAL: &str = "pp2sentry_chat_help_requests_total";

// ─── Join 메트릭 ───────────────────────────────────────────────────

/// Join: 파싱된 접속 이벤트 수 (counter, label: server)
pub const JOIN_EVENTS_TOTAL: &str = "pp2sentry_join_events_total";

/// Join: 중복으로 무시된 접속 이벤트 수 (counter, label: server)
pub const JOIN_DUPLICATES_TOTAL: &str = "pp2sentry_join_duplicates_total";

/// Join: 추적 중인 세션 수 (gauge, label: server)
pub const JOIN_SESSIONS_TRACKED: &str = "pp2sentry_join_sessions_tracked";

// ─── Moderation 메트릭 ─────────────────────────────────────────────

/// Moderation: 감지된 위반 수 (counter, labels: server, kind, level)
pub const MODERATION_VIOLATIONS_TOTAL: &str = "pp2sentry_moderation_violations_total";

/// Moderation: 실행된 관리 명령 수 (counter, labels: server, result)
pub const MODERATION_COMMANDS_TOTAL: &str = "pp2sentry_moderation_commands_total";

/// Moderation: 웹훅 전송 수 (counter, label: result)
pub const MODERATION_WEBHOOKS_TOTAL: &str = "pp2sentry_moderation_webhooks_total";

/// Moderation: 채널이 가득 차 버려진 명령 수 (counter)
pub const MODERATION_DROPPED_TOTAL: &str = "pp2sentry_moderation_dropped_total";

/// Moderation: 검토 대기 중인 위반 수 (gauge)
pub const MODERATION_PENDING_REVIEWS: &str = "pp2sentry_moderation_pending_reviews";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "pp2sentry_daemon_uptime_seconds";

/// Daemon: 모니터링 중인 서버 수 (gauge)
pub const DAEMON_SERVERS_MONITORED: &str = "pp2sentry_daemon_servers_monitored";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "pp2sentry_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `pp2sentry-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Tail
    describe_counter!(
        TAIL_LINES_READ_TOTAL,
        "Total number of complete lines read from tailed log files"
    );
    describe_counter!(
        TAIL_TRUNCATIONS_TOTAL,
        "Total number of detected log truncations or rotations"
    );
    describe_counter!(
        TAIL_DECODE_FALLBACKS_TOTAL,
        "Total number of reads decoded with the legacy 8-bit fallback"
    );
    describe_counter!(
        TAIL_READ_ERRORS_TOTAL,
        "Total number of I/O errors while tailing log files"
    );

    // Chat
    describe_counter!(
        CHAT_MESSAGES_TOTAL,
        "Total number of reconstructed chat messages"
    );
    describe_counter!(
        CHAT_DUPLICATES_TOTAL,
        "Total number of chat messages skipped as duplicates"
    );
    describe_counter!(
        CHAT_HELP_REQUESTS_TOTAL,
        "Total number of player help requests"
    );

    // Join
    describe_counter!(JOIN_EVENTS_TOTAL, "Total number of parsed join events");
    describe_counter!(
        JOIN_DUPLICATES_TOTAL,
        "Total number of join events skipped as duplicates"
    );
    describe_gauge!(
        JOIN_SESSIONS_TRACKED,
        "Number of player sessions currently tracked"
    );

    // Moderation
    describe_counter!(
        MODERATION_VIOLATIONS_TOTAL,
        "Total number of detected violations"
    );
    describe_counter!(
        MODERATION_COMMANDS_TOTAL,
        "Total number of admin commands sent to game servers"
    );
    describe_counter!(
        MODERATION_WEBHOOKS_TOTAL,
        "Total number of webhook notifications sent"
    );
    describe_counter!(
        MODERATION_DROPPED_TOTAL,
        "Total number of moderation commands dropped on a full channel"
    );
    describe_gauge!(
        MODERATION_PENDING_REVIEWS,
        "Number of violations awaiting operator review"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "pp2sentry daemon uptime in seconds");
    describe_gauge!(
        DAEMON_SERVERS_MONITORED,
        "Number of game servers being monitored"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
