//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for Pp2SentryError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 형식이 맞지 않는 라인은 에러가 아닙니다. 파서는 `None`을 반환하고 라인은 버려집니다.

use pp2sentry_core::error::{PipelineError, Pp2SentryError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 감시 대상 파일이 없음 (모니터 시작 시점)
    #[error("log file not found: {path}")]
    FileNotFound {
        /// 파일 경로
        path: String,
    },

    /// tail 중 I/O 에러 (일시적, 재시도 대상)
    #[error("tail error: {path} at offset {offset}: {reason}")]
    Tail {
        /// 파일 경로
        path: String,
        /// 마지막으로 확인된 오프셋
        offset: u64,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 모니터가 이미 실행 중
    #[error("monitor '{0}' is already running")]
    AlreadyRunning(String),

    /// 정지된 모니터는 다시 시작할 수 없음
    #[error("monitor '{0}' has been stopped and cannot be restarted")]
    Stopped(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for Pp2SentryError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::FileNotFound { path } => {
                Pp2SentryError::Pipeline(PipelineError::FileNotFound(path))
            }
            LogPipelineError::AlreadyRunning(_) => {
                Pp2SentryError::Pipeline(PipelineError::AlreadyRunning)
            }
            LogPipelineError::Io(e) => Pp2SentryError::Io(e),
            other => Pp2SentryError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
