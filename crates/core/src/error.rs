//! 에러 타입 -- 도메인별 에러 정의

/// pp2sentry 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum Pp2SentryError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 수집/처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 위반 기록 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 관리 명령 / 알림 전송 에러
    #[error("action error: {0}")]
    Action(#[from] ActionError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 로그 수집/처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 감시 대상 파일이 없음
    #[error("log file not found: {0}")]
    FileNotFound(String),

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 모니터 초기화 실패
    #[error("monitor init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("monitor is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("monitor is not running")]
    NotRunning,
}

/// 위반 기록 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결(열기) 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}

/// 관리 명령 / 알림 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// 관리 인터페이스가 설정되지 않음 (URL 또는 비밀번호 없음)
    #[error("admin interface not configured for server '{0}'")]
    NotConfigured(String),

    /// HTTP 요청 실패
    #[error("http request failed: {0}")]
    Http(String),

    /// 명령 라우팅 실패
    #[error("command routing failed: {0}")]
    Routing(String),
}
