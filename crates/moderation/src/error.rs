//! 모더레이션 에러 타입
//!
//! [`ModerationError`]는 모더레이션 계층 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<ModerationError> for Pp2SentryError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use pp2sentry_core::error::{
    ActionError, ConfigError, PipelineError, Pp2SentryError, StorageError,
};

/// 모더레이션 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// SQLite 에러
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// 관리 인터페이스 또는 웹훅 HTTP 에러
    #[error("http error: {0}")]
    Http(String),

    /// Docker API 에러
    #[error("docker error: {0}")]
    Docker(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<reqwest::Error> for ModerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<ModerationError> for Pp2SentryError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::RuleLoad { path, reason } => {
                Pp2SentryError::Config(ConfigError::ParseFailed {
                    reason: format!("{path}: {reason}"),
                })
            }
            ModerationError::RuleValidation { rule_id, reason } => {
                Pp2SentryError::Config(ConfigError::InvalidValue {
                    field: format!("rule '{rule_id}'"),
                    reason,
                })
            }
            ModerationError::Config { field, reason } => {
                Pp2SentryError::Config(ConfigError::InvalidValue { field, reason })
            }
            ModerationError::Database(e) => {
                Pp2SentryError::Storage(StorageError::Query(e.to_string()))
            }
            ModerationError::Http(msg) | ModerationError::Docker(msg) => {
                Pp2SentryError::Action(ActionError::Http(msg))
            }
            ModerationError::Channel(msg) => {
                Pp2SentryError::Pipeline(PipelineError::ChannelSend(msg))
            }
        }
    }
}
