//! 모더레이션 명령 -- 조치 실행 태스크로 전달되는 메시지와 명령 템플릿
//!
//! 모든 조치 요청(위반, 운영자 검토 결정, 도움 요청, 환영 메시지)은
//! [`ModerationCommand`] 값으로 채널을 통해 단일 실행 태스크에 전달됩니다.

use std::fmt;

use pp2sentry_core::types::{HelpRequest, ViolationLevel, ViolationReport};

/// SEVERE 조치에 ban 명령이 없을 때 쓰는 기본 템플릿
pub const DEFAULT_BAN_TEMPLATE: &str = "/banaddress {ip} 9999999 {full_name}";

/// MODERATE 조치 템플릿
pub const KICK_TEMPLATE: &str = "/kick {index}";

/// 운영자 검토 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    /// 집행 (심각도 지정 시 그 심각도로, 아니면 분류 결과대로)
    Confirm(Option<ViolationLevel>),
    /// 조치 없이 종료
    Reject,
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirm(Some(level)) => write!(f, "confirm({level})"),
            Self::Confirm(None) => write!(f, "confirm"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// 조치 실행 태스크가 처리하는 명령
#[derive(Debug, Clone)]
pub enum ModerationCommand {
    /// 감지된 위반
    Violation(ViolationReport),
    /// 대기 중인 검토에 대한 운영자 결정
    Review {
        /// 검토 ID
        id: String,
        /// 결정
        decision: ReviewDecision,
    },
    /// 플레이어 도움 요청
    HelpRequest(HelpRequest),
    /// 접속한 플레이어 환영
    Welcome {
        /// 서버 이름
        server_name: String,
        /// 플레이어 이름
        player_name: String,
    },
}

impl ModerationCommand {
    /// 로그/메트릭용 명령 유형 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Violation(_) => "violation",
            Self::Review { .. } => "review",
            Self::HelpRequest(_) => "help_request",
            Self::Welcome { .. } => "welcome",
        }
    }
}

/// 명령 템플릿 치환 값
#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    /// `{name}`: 플레이어 이름
    pub name: &'a str,
    /// `{full_name}`: 이름 + ID 토큰 (없으면 이름)
    pub full_name: Option<&'a str>,
    /// `{ip}`: 접속 IP
    pub ip: Option<&'a str>,
    /// `{index}`: 서버의 현재 플레이어 번호 (없으면 이름)
    pub index: Option<&'a str>,
}

/// 템플릿에 `{index}`가 있는지 여부
pub fn needs_index(template: &str) -> bool {
    template.contains("{index}")
}

/// 템플릿을 치환합니다.
///
/// `{ip}`가 필요하지만 IP를 모르면 `None`을 반환합니다.
pub fn render_template(template: &str, vars: &TemplateVars<'_>) -> Option<String> {
    if template.contains("{ip}") && vars.ip.is_none() {
        return None;
    }

    let mut rendered = template.replace("{name}", vars.name);
    rendered = rendered.replace("{full_name}", vars.full_name.unwrap_or(vars.name));
    rendered = rendered.replace("{index}", vars.index.unwrap_or(vars.name));
    if let Some(ip) = vars.ip {
        rendered = rendered.replace("{ip}", ip);
    }
    Some(rendered)
}

/// 집행 계획 -- 심각도에 따라 실행할 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementPlan {
    /// 첫 명령 템플릿
    pub template: String,
    /// 첫 명령 후 `/kick`으로 서버에서 내보낼지 여부 (ban의 경우)
    pub follow_up_kick: bool,
}

impl EnforcementPlan {
    /// 보고와 집행 심각도로 계획을 만듭니다. MINOR/OK는 명령이 없습니다.
    pub fn for_level(report: &ViolationReport, level: ViolationLevel) -> Option<Self> {
        match level {
            ViolationLevel::Severe => {
                let template = report
                    .ban_command
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BAN_TEMPLATE.to_owned());
                Some(Self {
                    follow_up_kick: template.trim_start().starts_with("/banaddress"),
                    template,
                })
            }
            ViolationLevel::Moderate => Some(Self {
                template: KICK_TEMPLATE.to_owned(),
                follow_up_kick: false,
            }),
            ViolationLevel::Minor | ViolationLevel::Ok => None,
        }
    }
}
