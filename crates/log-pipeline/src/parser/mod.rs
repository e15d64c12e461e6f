//! 로그 파싱 모듈 -- PP2 호스트 로그 형식별 파서
//!
//! # 지원 형식
//! - 접속 로그 `playlog.txt` ([`JoinEventParser`], 상태 없음)
//! - 채팅 로그 `chatlog.txt` ([`ChatReconstructor`], 헤더/본문 상태 기계)
//!
//! 두 파서 모두 형식이 맞지 않는 라인을 에러 없이 버립니다.
//!
//! # 사용 예시
//! ```ignore
//! use pp2sentry_log_pipeline::parser::{ChatReconstructor, ChatStep, JoinEventParser};
//!
//! let joins = JoinEventParser::new()?;
//! let event = joins.parse("--> Foo joined the game (ip: 1.2.3.4). [...] [...] [v1.0]");
//!
//! let mut chat = ChatReconstructor::new()?;
//! chat.push("Foo:   [01.01.2025 10:01]");
//! if let ChatStep::Emitted(message) = chat.push("hello there") { /* ... */ }
//! ```

pub mod chat;
pub mod join;

pub use chat::{ChatLine, ChatReconstructor, ChatStep};
pub use join::JoinEventParser;
