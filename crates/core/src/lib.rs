//! pp2sentry 공통 크레이트
//!
//! 모든 pp2sentry 크레이트가 공유하는 도메인 타입, 협력자 trait, 에러, 설정,
//! 메트릭 이름을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ActionError, ConfigError, PipelineError, Pp2SentryError, StorageError};

// 설정
pub use config::{Pp2SentryConfig, ServerConfig};

// 협력자 trait
pub use pipeline::{ActionHandler, BoxFuture, Classifier, CommandExecutor, ViolationStore};

// 도메인 타입
pub use types::{
    Analysis, ChatMessage, HelpRequest, PlayerJoinEvent, Session, ViolationKind, ViolationLevel,
    ViolationRecord, ViolationReport,
};
