//! 게임 서버 웹 관리 인터페이스 클라이언트
//!
//! [`AdminClient`]는 core의 [`CommandExecutor`]를 구현합니다.
//!
//! - 명령 실행: 관리 URL에 `c=<명령>` 폼을 POST (basic auth, `Referer` 헤더)
//! - 응답: HTML의 `<textarea>` 내용 (엔티티 복원, "Command executed." 제거)
//! - 플레이어 번호: 관리 페이지에서 `[<번호>] <이름>` 검색 (대소문자 무시)
//!
//! 관리 URL이나 비밀번호가 없으면 모든 호출이 `Ok(None)`을 반환합니다.

use std::time::Duration;

use metrics::counter;
use pp2sentry_core::config::ServerConfig;
use pp2sentry_core::error::ActionError;
use pp2sentry_core::metrics as m;
use pp2sentry_core::pipeline::{BoxFuture, CommandExecutor};
use regex::{Regex, RegexBuilder};
use reqwest::StatusCode;
use reqwest::header::REFERER;
use tracing::{debug, error, info, warn};

use crate::error::ModerationError;

/// 플레이어 목록 조회 타임아웃
const INDEX_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const TEXTAREA_PATTERN: &str = r"(?is)<textarea[^>]*>(.*?)</textarea>";
const EXECUTED_MARKER: &str = "Command executed";

/// 게임 서버 관리 클라이언트
pub struct AdminClient {
    server: String,
    url: String,
    user: String,
    password: String,
    http: reqwest::Client,
    textarea: Regex,
}

impl AdminClient {
    /// 서버 설정으로 클라이언트를 생성합니다.
    pub fn new(server: &ServerConfig, timeout: Duration) -> Result<Self, ModerationError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let textarea = Regex::new(TEXTAREA_PATTERN).map_err(|e| ModerationError::Config {
            field: "admin.response_pattern".to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            server: server.name.clone(),
            url: server.admin_url.clone(),
            user: server.admin_user.clone(),
            password: server.admin_password.clone(),
            http,
            textarea,
        })
    }

    /// 관리 명령을 보낼 수 있는지 여부
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty() && !self.password.is_empty()
    }

    /// 서버 이름
    pub fn server(&self) -> &str {
        &self.server
    }

    /// 관리 페이지 HTML에서 사람이 읽을 응답을 꺼냅니다.
    pub fn parse_response(&self, html: &str) -> String {
        if let Some(content) = self.textarea.captures(html).and_then(|caps| caps.get(1)) {
            return unescape_entities(content.as_str())
                .replace("Command executed.", "")
                .trim()
                .to_owned();
        }

        if html.contains(EXECUTED_MARKER) {
            return "Komento suoritettu onnistuneesti.".to_owned();
        }
        "Komento lähetetty, mutta vastausta ei voitu jäsentää.".to_owned()
    }

    async fn post_command(&self, command: &str) -> Result<Option<String>, ActionError> {
        if !self.is_enabled() {
            debug!(server = %self.server, "admin interface not configured, command skipped");
            return Ok(None);
        }

        info!(server = %self.server, command, "executing admin command");
        let result = self.send_command(command).await;

        let label = if result.is_ok() { "success" } else { "failure" };
        counter!(
            m::MODERATION_COMMANDS_TOTAL,
            m::LABEL_SERVER => self.server.clone(),
            m::LABEL_RESULT => label
        )
        .increment(1);

        match &result {
            Ok(_) => info!(server = %self.server, command, "admin command executed"),
            Err(e) => error!(server = %self.server, command, error = %e, "admin command failed"),
        }
        result.map(Some)
    }

    async fn send_command(&self, command: &str) -> Result<String, ActionError> {
        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .header(REFERER, &self.url)
            .form(&[("c", command)])
            .send()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ActionError::Http(format!(
                "server responded with status {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;
        Ok(self.parse_response(&body))
    }

    async fn fetch_player_index(&self, player_name: &str) -> Result<Option<String>, ActionError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let response = self
            .http
            .get(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .timeout(INDEX_LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;

        if response.status() != StatusCode::OK {
            warn!(
                server = %self.server,
                status = response.status().as_u16(),
                "player list request failed"
            );
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;
        let index = find_player_index(&body, player_name);
        debug!(
            server = %self.server,
            player = player_name,
            found = index.is_some(),
            "resolved live player index"
        );
        Ok(index)
    }
}

impl CommandExecutor for AdminClient {
    fn execute_command<'a>(
        &'a self,
        command: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
        Box::pin(self.post_command(command))
    }

    fn resolve_live_player_id<'a>(
        &'a self,
        player_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
        Box::pin(self.fetch_player_index(player_name))
    }
}

/// 관리 페이지에서 플레이어의 현재 번호를 찾습니다.
///
/// `[<번호>] <이름>`을 먼저 찾고, 없으면 번호와 이름 사이에 다른 텍스트
/// (태그 제외)가 끼어 있는 경우도 찾습니다.
pub fn find_player_index(html: &str, player_name: &str) -> Option<String> {
    let name = regex::escape(player_name);
    let patterns = [
        format!(r"\[(\d+)\]\s+{name}"),
        format!(r"\[(\d+)\]\s+[^<]*{name}"),
    ];

    patterns.iter().find_map(|pattern| {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .ok()?;
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    })
}

/// 관리 페이지에 나오는 HTML 엔티티를 복원합니다.
fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
