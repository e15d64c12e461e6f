//! 알림 전송 -- Discord 웹훅
//!
//! [`Notifier`]는 조치 실행 태스크가 운영자에게 알림을 보내는 확장 포인트입니다.
//! [`WebhookNotifier`]는 Discord 웹훅 embed 형식으로 전송하며,
//! URL이 없거나 비활성화되어 있으면 아무것도 하지 않습니다.

use std::time::Duration;

use metrics::counter;
use pp2sentry_core::config::DiscordConfig;
use pp2sentry_core::metrics as m;
use pp2sentry_core::pipeline::BoxFuture;
use pp2sentry_core::types::{HelpRequest, ViolationKind, ViolationLevel, ViolationReport};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::command::ReviewDecision;
use crate::error::ModerationError;

const FOOTER: &str = "PP2 Suspicious Detector";
const HELP_COLOR: u32 = 0x00FF00;
const NEUTRAL_COLOR: u32 = 0x808080;
const MAX_CONTENT_CHARS: usize = 1000;

/// 운영자 알림
#[derive(Debug, Clone)]
pub enum Notification {
    /// 감지된 위반
    Violation {
        /// 위반 보고
        report: ViolationReport,
        /// 검토 대기 중이면 검토 ID
        review_id: Option<String>,
        /// 자동 집행되었는지 여부
        enforced: bool,
    },
    /// 도움 요청
    HelpRequest(HelpRequest),
    /// 검토 결정 결과
    ReviewOutcome {
        /// 검토 ID
        id: String,
        /// 서버 이름
        server_name: String,
        /// 플레이어 이름
        player_name: String,
        /// 결정
        decision: ReviewDecision,
        /// 서버 응답 (명령이 실행된 경우)
        response: Option<String>,
    },
}

/// 알림 전송기
pub trait Notifier: Send + Sync {
    /// 알림을 전송합니다.
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), ModerationError>>;
}

/// Discord 웹훅 알림 전송기
pub struct WebhookNotifier {
    url: Option<String>,
    http: reqwest::Client,
}

impl WebhookNotifier {
    /// 설정으로 전송기를 생성합니다.
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self, ModerationError> {
        let url = (config.enabled && !config.webhook_url.is_empty())
            .then(|| config.webhook_url.clone());
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http })
    }

    /// 알림을 보내지 않는 전송기
    pub fn disabled() -> Self {
        Self {
            url: None,
            http: reqwest::Client::new(),
        }
    }

    /// 웹훅이 설정되어 있는지 여부
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn post(&self, notification: &Notification) -> Result<(), ModerationError> {
        let Some(url) = &self.url else {
            debug!("webhook disabled, notification skipped");
            return Ok(());
        };

        let payload = build_payload(notification);
        let result = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        let label = if result.is_ok() { "success" } else { "failure" };
        counter!(m::MODERATION_WEBHOOKS_TOTAL, m::LABEL_RESULT => label).increment(1);

        if let Err(e) = &result {
            warn!(error = %e, "webhook notification failed");
        }
        result.map(|_| ()).map_err(ModerationError::from)
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), ModerationError>> {
        Box::pin(self.post(notification))
    }
}

// ─── Embed payload ─────────────────────────────────────────────────

/// 알림을 웹훅 JSON 본문으로 변환합니다.
pub fn build_payload(notification: &Notification) -> Value {
    let embed = match notification {
        Notification::Violation {
            report,
            review_id,
            enforced,
        } => violation_embed(report, review_id.as_deref(), *enforced),
        Notification::HelpRequest(request) => help_embed(request),
        Notification::ReviewOutcome {
            id,
            server_name,
            player_name,
            decision,
            response,
        } => review_embed(id, server_name, player_name, *decision, response.as_deref()),
    };
    json!({ "embeds": [embed] })
}

fn violation_embed(report: &ViolationReport, review_id: Option<&str>, enforced: bool) -> Value {
    let level = report.analysis.level;
    let kind = match report.kind {
        ViolationKind::Message => "Chat-viesti",
        ViolationKind::Nickname => "Nimimerkki",
    };

    let mut fields = vec![
        field("Pelaaja", &report.player_name, true),
        field("Tyyppi", kind, true),
        field("Palvelin", &report.server.name, true),
    ];
    if let Some(ip) = &report.ip_address {
        fields.push(field("IP-osoite", &format!("`{ip}`"), true));
    }
    fields.push(field(
        "Sisältö",
        &format!("```{}```", truncate_chars(&report.content, MAX_CONTENT_CHARS)),
        false,
    ));
    fields.push(field("Perustelu", &report.analysis.reason, false));
    fields.push(field(
        "Ehdotettu toimenpide",
        &format!("`{}`", report.analysis.suggested_action),
        false,
    ));
    if level == ViolationLevel::Severe
        && let Some(ban) = &report.ban_command
    {
        fields.push(field("Ban-komento", &format!("```{ban}```"), false));
    }
    if let Some(id) = review_id {
        fields.push(field(
            "Tarkastus",
            &format!("`!confirm {id} [TASO]` / `!reject {id}`"),
            false,
        ));
    }
    if enforced {
        fields.push(field("Tila", "Toimenpide suoritettu automaattisesti", false));
    }

    json!({
        "title": violation_title(level),
        "color": level_color(level),
        "fields": fields,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "footer": { "text": FOOTER },
    })
}

fn help_embed(request: &HelpRequest) -> Value {
    let mut fields = vec![
        field("Pelaaja", &request.player_name, true),
        field("Tyyppi", "🆘 Avunpyyntö", true),
        field("Palvelin", &request.server_name, true),
    ];
    if let Some(ip) = &request.ip_address {
        fields.push(field("IP-osoite", &format!("`{ip}`"), true));
    }
    fields.push(field(
        "Viesti",
        &format!("```{}```", truncate_chars(&request.content, MAX_CONTENT_CHARS)),
        false,
    ));

    json!({
        "title": "🆘 APUA TARVITAAN",
        "color": HELP_COLOR,
        "fields": fields,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "footer": { "text": FOOTER },
    })
}

fn review_embed(
    id: &str,
    server_name: &str,
    player_name: &str,
    decision: ReviewDecision,
    response: Option<&str>,
) -> Value {
    let (title, color) = match decision {
        ReviewDecision::Confirm(level) => (
            "✅ TOIMENPIDE HYVÄKSYTTY",
            level.map_or(NEUTRAL_COLOR, level_color),
        ),
        ReviewDecision::Reject => ("🚫 TOIMENPIDE HYLÄTTY", NEUTRAL_COLOR),
    };

    let mut fields = vec![
        field("Tarkastus", &format!("`{id}`"), true),
        field("Pelaaja", player_name, true),
        field("Palvelin", server_name, true),
        field("Päätös", &decision.to_string(), true),
    ];
    if let Some(text) = response.filter(|t| !t.is_empty()) {
        fields.push(field(
            "Palvelimen vastaus",
            &format!("```{}```", truncate_chars(text, MAX_CONTENT_CHARS)),
            false,
        ));
    }

    json!({
        "title": title,
        "color": color,
        "fields": fields,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "footer": { "text": FOOTER },
    })
}

fn field(name: &str, value: &str, inline: bool) -> Value {
    json!({ "name": name, "value": value, "inline": inline })
}

fn violation_title(level: ViolationLevel) -> &'static str {
    match level {
        ViolationLevel::Severe => "🚨 VAKAVA RIKKOMUS",
        ViolationLevel::Moderate => "⚠️ KESKIVAKAVA RIKKOMUS",
        ViolationLevel::Minor => "📝 LIEVÄ RIKKOMUS",
        ViolationLevel::Ok => "❓ Rikkomus",
    }
}

fn level_color(level: ViolationLevel) -> u32 {
    match level {
        ViolationLevel::Severe => 0xFF0000,
        ViolationLevel::Moderate => 0xFFA500,
        ViolationLevel::Minor => 0xFFFF00,
        ViolationLevel::Ok => NEUTRAL_COLOR,
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
