//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 로그 파이프라인이 생성하고 모더레이션 계층이 소비하는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;

/// 영구 밴을 의미하는 기간(분) 값
///
/// 접속 로그에 포함된 ban 명령 템플릿의 기간 필드는 항상 이 값으로 교체됩니다.
pub const PERMANENT_BAN_MINUTES: &str = "9999999";

/// 채팅 메시지
///
/// 헤더 라인(`이름:   [DD.MM.YYYY HH:MM]`)과 다음 본문 라인을 합쳐 만든 불변 레코드입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// 서버 로컬 시각 (`DD.MM.YYYY HH:MM`)
    pub timestamp: String,
    /// 발신자 이름
    pub player_name: String,
    /// 메시지 본문
    pub message: String,
}

impl ChatMessage {
    /// 새 채팅 메시지를 생성합니다.
    pub fn new(
        timestamp: impl Into<String>,
        player_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            player_name: player_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.player_name, self.message)
    }
}

/// 플레이어 접속 이벤트
///
/// 접속 로그의 `--> 이름 joined the game ...` 라인에서 추출됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinEvent {
    /// 서버 로컬 시각 (`DD.MM.YYYY HH:MM`)
    pub timestamp: String,
    /// 플레이어 이름
    pub player_name: String,
    /// 접속 IPv4 주소
    pub ip_address: String,
    /// 클라이언트 버전 (예: `v2.0.7`)
    pub client_version: String,
    /// 기간 필드가 영구 값으로 교체된 ban 명령
    pub ban_command: String,
    /// ban 명령에서 기간 필드 뒤의 토큰들 (이름 + ID)
    pub name_with_ids: String,
    /// 마지막 숫자 토큰 (없으면 빈 문자열)
    pub player_id: String,
}

impl PlayerJoinEvent {
    /// 이 이벤트로부터 세션 정보를 만듭니다.
    pub fn session(&self) -> Session {
        Session {
            ip: self.ip_address.clone(),
            ban_command: self.ban_command.clone(),
            name_with_ids: self.name_with_ids.clone(),
        }
    }
}

/// 플레이어별 최신 접속 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// 접속 IP
    pub ip: String,
    /// 영구 ban 명령
    pub ban_command: String,
    /// 이름 + ID 토큰
    pub name_with_ids: String,
}

/// 위반 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViolationLevel {
    /// 문제 없음
    Ok,
    /// 경미 (경고)
    Minor,
    /// 중간 (kick)
    Moderate,
    /// 심각 (ban)
    Severe,
}

impl ViolationLevel {
    /// 대문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Minor => "MINOR",
            Self::Moderate => "MODERATE",
            Self::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for ViolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "MINOR" => Ok(Self::Minor),
            "MODERATE" => Ok(Self::Moderate),
            "SEVERE" => Ok(Self::Severe),
            other => Err(format!("unknown violation level: {other}")),
        }
    }
}

/// 위반 대상 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// 채팅 메시지
    Message,
    /// 닉네임
    Nickname,
}

impl ViolationKind {
    /// 저장소에 기록되는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Nickname => "nickname",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분류기 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// 심각도
    pub level: ViolationLevel,
    /// 판단 사유
    pub reason: String,
    /// 권장 조치 (명령 템플릿 또는 설명)
    pub suggested_action: String,
}

impl Analysis {
    /// 위반 없음 결과
    pub fn ok(reason: impl Into<String>) -> Self {
        Self {
            level: ViolationLevel::Ok,
            reason: reason.into(),
            suggested_action: "Ei toimenpiteitä".to_owned(),
        }
    }
}

/// 저장소에 기록되는 위반 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// 로그상의 시각
    pub timestamp: String,
    /// 플레이어 이름
    pub player_name: String,
    /// 위반 대상 유형
    pub kind: ViolationKind,
    /// 위반 내용 (메시지 본문 또는 닉네임)
    pub content: String,
    /// 분류기 결과
    pub analysis: Analysis,
    /// 접속 IP (세션 상관 실패 시 None)
    pub ip_address: Option<String>,
}

/// 모더레이션 계층으로 전달되는 위반 보고
#[derive(Debug, Clone)]
pub struct ViolationReport {
    /// 서버 설정 (이름과 관리 인터페이스 정보 포함)
    pub server: Arc<ServerConfig>,
    /// 플레이어 이름
    pub player_name: String,
    /// 위반 대상 유형
    pub kind: ViolationKind,
    /// 위반 내용
    pub content: String,
    /// 분류기 결과
    pub analysis: Analysis,
    /// 접속 IP
    pub ip_address: Option<String>,
    /// 영구 ban 명령
    pub ban_command: Option<String>,
    /// 이름 + ID 토큰
    pub name_with_ids: Option<String>,
}

/// 도움 요청 (`!yllapitaja`)
#[derive(Debug, Clone)]
pub struct HelpRequest {
    /// 요청이 들어온 서버 이름
    pub server_name: String,
    /// 플레이어 이름
    pub player_name: String,
    /// 메시지 본문
    pub content: String,
    /// 접속 IP
    pub ip_address: Option<String>,
}
