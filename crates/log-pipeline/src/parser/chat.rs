//! 채팅 로그 재구성 (chatlog.txt)
//!
//! # 형식
//! ```text
//! Pelaaja:        [25.01.2026 07:30]
//! moro mitä
//! ```
//!
//! 헤더 라인 다음의 첫 번째 비어 있지 않은 라인이 메시지 본문입니다.
//!
//! # 상태 전이
//! | 상태 | 입력 | 결과 |
//! |---|---|---|
//! | AwaitingHeader | 헤더 | AwaitingBody, `Pending` |
//! | AwaitingHeader | 텍스트 | 그대로, `Noise` |
//! | AwaitingBody | 헤더 | AwaitingBody (교체), `Replaced` |
//! | AwaitingBody | 텍스트 | AwaitingHeader, `Emitted` |
//! | 모든 상태 | 빈 라인 | 그대로, `Skipped` |

use pp2sentry_core::types::ChatMessage;
use regex::Regex;

use crate::error::LogPipelineError;

/// 헤더 라인 정규식 (`이름:<공백>[DD.MM.YYYY HH:MM]<공백>`)
const HEADER_PATTERN: &str = r"^(.+?):\s+\[(\d{2}\.\d{2}\.\d{4}\s+\d{2}:\d{2})\]\s*$";

/// 분류된 채팅 라인
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine<'a> {
    /// 발신자 + 시각 헤더
    Header {
        /// 발신자 이름
        player_name: &'a str,
        /// 시각
        timestamp: &'a str,
    },
    /// 헤더가 아닌 텍스트 (본문 후보)
    Text(&'a str),
}

/// 라인 하나를 처리한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStep {
    /// 새 헤더를 보관함
    Pending,
    /// 본문 없이 이전 헤더를 새 헤더로 교체함
    Replaced,
    /// 헤더 + 본문으로 메시지 완성
    Emitted(ChatMessage),
    /// 대기 중인 헤더 없이 들어온 텍스트 (버림)
    Noise,
    /// 빈 라인 (상태 변화 없음)
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingHeader {
    player_name: String,
    timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatState {
    AwaitingHeader,
    AwaitingBody(PendingHeader),
}

/// 채팅 메시지 재구성기
///
/// 라인을 하나씩 받아 헤더와 다음 본문 라인을 하나의 [`ChatMessage`]로 합칩니다.
#[derive(Debug, Clone)]
pub struct ChatReconstructor {
    header: Regex,
    state: ChatState,
}

impl ChatReconstructor {
    /// 새 재구성기를 생성합니다 (초기 상태: 헤더 대기).
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            header: Regex::new(HEADER_PATTERN)?,
            state: ChatState::AwaitingHeader,
        })
    }

    /// 라인을 분류합니다. 빈 라인은 `None`입니다.
    pub fn classify<'a>(&self, raw: &'a str) -> Option<ChatLine<'a>> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        match self.header.captures(line) {
            Some(caps) => match (caps.get(1), caps.get(2)) {
                (Some(name), Some(ts)) => Some(ChatLine::Header {
                    player_name: name.as_str().trim(),
                    timestamp: ts.as_str(),
                }),
                _ => Some(ChatLine::Text(line)),
            },
            None => Some(ChatLine::Text(line)),
        }
    }

    /// 원본 라인 하나를 처리합니다.
    pub fn push(&mut self, raw: &str) -> ChatStep {
        let Some(line) = self.classify(raw) else {
            return ChatStep::Skipped;
        };

        match line {
            ChatLine::Header {
                player_name,
                timestamp,
            } => {
                let header = PendingHeader {
                    player_name: player_name.to_owned(),
                    timestamp: timestamp.to_owned(),
                };
                let previous = std::mem::replace(&mut self.state, ChatState::AwaitingBody(header));
                match previous {
                    ChatState::AwaitingHeader => ChatStep::Pending,
                    ChatState::AwaitingBody(_) => ChatStep::Replaced,
                }
            }
            ChatLine::Text(body) => {
                match std::mem::replace(&mut self.state, ChatState::AwaitingHeader) {
                    ChatState::AwaitingBody(header) => ChatStep::Emitted(ChatMessage::new(
                        header.timestamp,
                        header.player_name,
                        body,
                    )),
                    ChatState::AwaitingHeader => ChatStep::Noise,
                }
            }
        }
    }

    /// 본문을 기다리는 헤더가 있는지 여부
    pub fn has_pending_header(&self) -> bool {
        matches!(self.state, ChatState::AwaitingBody(_))
    }
}
