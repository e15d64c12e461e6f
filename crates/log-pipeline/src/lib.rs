//! # pp2sentry-log-pipeline
//!
//! PP2 게임 서버 호스트 로그를 tail하여 채팅 메시지와 접속 이벤트를 만들고,
//! 플레이어 세션과 연결한 뒤 분류기/저장소/조치 계층으로 넘깁니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 로그 파일 tail ([`LineSource`]), 인코딩 폴백
//! - [`parser`]: 접속 라인 파서, 채팅 헤더/본문 재구성기
//! - [`session`]: 플레이어별 최신 접속 메타데이터 저장소
//! - [`dedup`]: 처리한 식별자 기억 (로테이션 후 재처리 방지)
//! - [`monitor`]: 서버 하나의 채팅/접속 처리 루프 ([`ServerMonitor`])
//! - [`config`]: 모니터 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! chatlog.txt -> LineSource -> ChatReconstructor -> DedupGuard -> SessionStore -> Classifier
//! playlog.txt -> LineSource -> JoinEventParser  -> SessionStore -> DedupGuard  -> Classifier
//!                                                                                 |
//!                                                               ViolationStore + ActionHandler
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod monitor;
pub mod session;

pub mod collector;
pub mod parser;

// --- 주요 타입 re-export ---

// 모니터
pub use monitor::{
    ChatOutcome, ChatProcessor, Collaborators, JoinOutcome, JoinProcessor, ServerMonitor,
    ServerMonitorBuilder,
};

// 설정
pub use config::{MonitorSettings, MonitorSettingsBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{ChatLine, ChatReconstructor, ChatStep, JoinEventParser};

// 수집기
pub use collector::{LineSource, StartPosition, decode_text};

// 상관/중복 제거
pub use dedup::DedupGuard;
pub use session::SessionStore;
