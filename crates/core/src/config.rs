//! 설정 관리 -- pp2sentry.toml 파싱 및 런타임 설정
//!
//! [`Pp2SentryConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`PP2SENTRY_TAIL_POLL_INTERVAL_MS=500` 형식)
//! 3. 설정 파일 (`pp2sentry.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), pp2sentry_core::error::Pp2SentryError> {
//! use pp2sentry_core::config::Pp2SentryConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = Pp2SentryConfig::load("pp2sentry.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = Pp2SentryConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, Pp2SentryError};
use crate::types::ViolationLevel;

/// pp2sentry 통합 설정
///
/// `pp2sentry.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pp2SentryConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파일 tail 설정 (모든 서버 공통)
    #[serde(default)]
    pub tail: TailConfig,
    /// 모니터링 대상 게임 서버 목록
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    /// 채팅 처리 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 분류기 설정
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 위반 기록 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// Discord 웹훅 설정
    #[serde(default)]
    pub discord: DiscordConfig,
    /// 모더레이션 조치 설정
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Pp2SentryConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Pp2SentryError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, Pp2SentryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Pp2SentryError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                Pp2SentryError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, Pp2SentryError> {
        toml::from_str(toml_str).map_err(|e| {
            Pp2SentryError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PP2SENTRY_{SECTION}_{FIELD}`
    /// 예외: `PP2SENTRY_ADMIN_PASSWORD`는 비밀번호가 비어 있는 모든 서버에 적용됩니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PP2SENTRY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PP2SENTRY_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "PP2SENTRY_GENERAL_PID_FILE");

        // Tail
        override_u64(
            &mut self.tail.poll_interval_ms,
            "PP2SENTRY_TAIL_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.tail.heartbeat_interval_secs,
            "PP2SENTRY_TAIL_HEARTBEAT_INTERVAL_SECS",
        );
        override_u64(
            &mut self.tail.error_backoff_secs,
            "PP2SENTRY_TAIL_ERROR_BACKOFF_SECS",
        );
        override_bool(&mut self.tail.start_at_end, "PP2SENTRY_TAIL_START_AT_END");

        // Monitor
        override_bool(&mut self.monitor.verify_all, "PP2SENTRY_MONITOR_VERIFY_ALL");
        override_string(&mut self.monitor.help_prefix, "PP2SENTRY_MONITOR_HELP_PREFIX");
        override_csv(
            &mut self.monitor.ignored_senders,
            "PP2SENTRY_MONITOR_IGNORED_SENDERS",
        );
        override_usize(
            &mut self.monitor.dedup_capacity,
            "PP2SENTRY_MONITOR_DEDUP_CAPACITY",
        );

        // Classifier / Storage
        override_string(
            &mut self.classifier.rules_path,
            "PP2SENTRY_CLASSIFIER_RULES_PATH",
        );
        override_string(
            &mut self.storage.database_path,
            "PP2SENTRY_STORAGE_DATABASE_PATH",
        );

        // Discord
        override_bool(&mut self.discord.enabled, "PP2SENTRY_DISCORD_ENABLED");
        override_string(&mut self.discord.webhook_url, "PP2SENTRY_DISCORD_WEBHOOK_URL");

        // Moderation
        override_bool(
            &mut self.moderation.review_mode,
            "PP2SENTRY_MODERATION_REVIEW_MODE",
        );
        override_bool(
            &mut self.moderation.welcome_enabled,
            "PP2SENTRY_MODERATION_WELCOME_ENABLED",
        );
        override_string(
            &mut self.moderation.welcome_template,
            "PP2SENTRY_MODERATION_WELCOME_TEMPLATE",
        );
        override_u64(
            &mut self.moderation.review_timeout_secs,
            "PP2SENTRY_MODERATION_REVIEW_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "PP2SENTRY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "PP2SENTRY_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "PP2SENTRY_METRICS_PORT");

        // 서버 공통 관리자 비밀번호
        if let Ok(password) = std::env::var("PP2SENTRY_ADMIN_PASSWORD") {
            for server in &mut self.servers {
                if server.admin_password.is_empty() {
                    server.admin_password = password.clone();
                }
            }
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), Pp2SentryError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.tail.validate()?;
        self.validate_servers()?;

        if self.discord.enabled && self.discord.webhook_url.trim().is_empty() {
            return Err(invalid(
                "discord.webhook_url",
                "webhook url must not be empty when discord is enabled",
            ));
        }

        if self.moderation.channel_capacity == 0 {
            return Err(invalid(
                "moderation.channel_capacity",
                "must be greater than 0",
            ));
        }

        if self.moderation.review_timeout_secs == 0 {
            return Err(invalid(
                "moderation.review_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.moderation.request_timeout_secs == 0 {
            return Err(invalid(
                "moderation.request_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self
            .moderation
            .auto_enforce_levels
            .contains(&ViolationLevel::Ok)
        {
            return Err(invalid(
                "moderation.auto_enforce_levels",
                "OK is not an enforceable level",
            ));
        }

        if self.moderation.welcome_enabled {
            if self.moderation.welcome_attempts == 0 {
                return Err(invalid(
                    "moderation.welcome_attempts",
                    "must be greater than 0 when welcome messages are enabled",
                ));
            }
            if self.moderation.welcome_template.trim().is_empty() {
                return Err(invalid(
                    "moderation.welcome_template",
                    "must not be empty when welcome messages are enabled",
                ));
            }
        }

        Ok(())
    }

    fn validate_servers(&self) -> Result<(), Pp2SentryError> {
        if self.servers.is_empty() {
            return Err(invalid("servers", "at least one server must be configured"));
        }

        let mut seen = HashSet::new();
        for (idx, server) in self.servers.iter().enumerate() {
            let field = |name: &str| format!("servers[{idx}].{name}");

            if server.name.trim().is_empty() {
                return Err(invalid(field("name"), "server name must not be empty"));
            }
            // 명령 라우팅은 첫 번째 공백 구분 토큰으로 서버를 찾으므로 공백을 허용하지 않음
            if server.name.chars().any(char::is_whitespace) {
                return Err(invalid(
                    field("name"),
                    format!("server name '{}' must not contain whitespace", server.name),
                ));
            }
            if !seen.insert(server.name.to_lowercase()) {
                return Err(invalid(
                    field("name"),
                    format!("duplicate server name '{}'", server.name),
                ));
            }
            if server.chatlog_path.trim().is_empty() {
                return Err(invalid(field("chatlog_path"), "path must not be empty"));
            }
            if server.playlog_path.trim().is_empty() {
                return Err(invalid(field("playlog_path"), "path must not be empty"));
            }
        }

        Ok(())
    }

    /// 이름으로 서버 설정을 찾습니다 (대소문자 무시).
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Pp2SentryError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용 안 함)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 파일 tail 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// 파일 크기 재확인 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 활동이 없을 때 heartbeat 로그 주기 (초)
    pub heartbeat_interval_secs: u64,
    /// I/O 에러 후 재시도 대기 (초)
    pub error_backoff_secs: u64,
    /// 한 번의 poll에서 읽을 최대 바이트 수
    pub max_read_bytes: usize,
    /// 시작 시 파일 끝에서부터 읽을지 여부
    pub start_at_end: bool,
}

impl TailConfig {
    /// 파일 크기 재확인 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// heartbeat 주기
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// I/O 에러 후 재시도 대기
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    fn validate(&self) -> Result<(), Pp2SentryError> {
        if self.poll_interval_ms == 0 {
            return Err(invalid("tail.poll_interval_ms", "must be greater than 0"));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(invalid(
                "tail.heartbeat_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.error_backoff_secs == 0 {
            return Err(invalid("tail.error_backoff_secs", "must be greater than 0"));
        }
        if self.max_read_bytes < 1024 {
            return Err(invalid("tail.max_read_bytes", "must be at least 1024"));
        }
        Ok(())
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            heartbeat_interval_secs: 120,
            error_backoff_secs: 5,
            max_read_bytes: 1024 * 1024, // 1MB
            start_at_end: true,
        }
    }
}

/// 게임 서버 하나의 설정
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 서버 이름 (명령 라우팅에 사용, 공백 불가)
    pub name: String,
    /// 채팅 로그 경로 (chatlog.txt)
    pub chatlog_path: String,
    /// 접속 로그 경로 (playlog.txt)
    pub playlog_path: String,
    /// 웹 관리 인터페이스 URL (빈 문자열이면 관리 명령 비활성)
    pub admin_url: String,
    /// 웹 관리 사용자
    pub admin_user: String,
    /// 웹 관리 비밀번호
    pub admin_password: String,
    /// 비밀번호가 비어 있을 때 생성된 비밀번호를 찾을 Docker 컨테이너 이름 (빈 문자열이면 사용 안 함)
    pub admin_container: String,
}

impl ServerConfig {
    /// 관리 명령을 보낼 수 있는지 여부
    pub fn admin_enabled(&self) -> bool {
        !self.admin_url.is_empty() && !self.admin_password.is_empty()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "main".to_owned(),
            chatlog_path: "chatlog.txt".to_owned(),
            playlog_path: "playlog.txt".to_owned(),
            admin_url: String::new(),
            admin_user: "admin".to_owned(),
            admin_password: String::new(),
            admin_container: String::new(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("chatlog_path", &self.chatlog_path)
            .field("playlog_path", &self.playlog_path)
            .field("admin_url", &self.admin_url)
            .field("admin_user", &self.admin_user)
            .field("admin_password", &"<redacted>")
            .field("admin_container", &self.admin_container)
            .finish()
    }
}

/// 채팅 처리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 분석하지 않는 발신자 (서버/관리자/시스템)
    pub ignored_senders: Vec<String>,
    /// 도움 요청 명령 접두어
    pub help_prefix: String,
    /// 문제 없는 메시지도 모두 검토 대상으로 보낼지 여부
    pub verify_all: bool,
    /// 중복 제거 식별자 최대 보관 수 (0이면 무제한)
    pub dedup_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ignored_senders: vec!["Server".to_owned(), "ADMIN".to_owned(), "system".to_owned()],
            help_prefix: "!yllapitaja".to_owned(),
            verify_all: false,
            dedup_capacity: 0,
        }
    }
}

/// 분류기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// YAML 규칙 파일 또는 디렉토리 경로
    pub rules_path: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules_path: "rules".to_owned(),
        }
    }
}

/// 위반 기록 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite 데이터베이스 파일 경로
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/violations.db".to_owned(),
        }
    }
}

/// Discord 웹훅 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 웹훅 URL
    pub webhook_url: String,
}

/// 모더레이션 조치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// 조치 명령 채널 용량
    pub channel_capacity: usize,
    /// 위반을 검토 대기열에 올려 운영자 확인 후 집행할지 여부
    pub review_mode: bool,
    /// 검토 없이 즉시 집행할 심각도 목록
    pub auto_enforce_levels: Vec<ViolationLevel>,
    /// 환영 메시지 활성화 여부
    pub welcome_enabled: bool,
    /// 환영 메시지 명령 템플릿 (`{index}`, `{name}` 치환)
    pub welcome_template: String,
    /// 접속 후 첫 인덱스 조회까지 대기 (초)
    pub welcome_delay_secs: u64,
    /// 인덱스 조회 최대 시도 횟수
    pub welcome_attempts: u32,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 검토 대기 항목의 유효 시간 (초). 지나면 확인/거부할 수 없음
    pub review_timeout_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            review_mode: true,
            auto_enforce_levels: Vec::new(),
            welcome_enabled: false,
            welcome_template: "/pm {index} Tervetuloa palvelimelle, {name}!".to_owned(),
            welcome_delay_secs: 5,
            welcome_attempts: 3,
            request_timeout_secs: 10,
            review_timeout_secs: 3600,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 엔드포인트
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn one_server_toml() -> &'static str {
        r#"
[[servers]]
name = "Main"
chatlog_path = "/srv/pp2/chatlog.txt"
playlog_path = "/srv/pp2/playlog.txt"
"#
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = Pp2SentryConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.tail.poll_interval_ms, 1000);
        assert_eq!(config.tail.heartbeat_interval_secs, 120);
        assert_eq!(config.tail.error_backoff_secs, 5);
        assert!(config.tail.start_at_end);
        assert_eq!(config.monitor.help_prefix, "!yllapitaja");
        assert_eq!(config.monitor.ignored_senders, vec!["Server", "ADMIN", "system"]);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn default_config_fails_validation_without_servers() {
        let err = Pp2SentryConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("servers"));
    }

    #[test]
    fn minimal_server_config_passes_validation() {
        let config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].admin_user, "admin");
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
pid_file = "/run/pp2sentry.pid"

[tail]
poll_interval_ms = 250
heartbeat_interval_secs = 60
error_backoff_secs = 2
max_read_bytes = 65536
start_at_end = false

[[servers]]
name = "Main"
chatlog_path = "/srv/main/chatlog.txt"
playlog_path = "/srv/main/playlog.txt"
admin_url = "http://127.0.0.1:8080/admin"
admin_password = "secret"

[[servers]]
name = "Rookie"
chatlog_path = "/srv/rookie/chatlog.txt"
playlog_path = "/srv/rookie/playlog.txt"

[monitor]
verify_all = true
dedup_capacity = 5000

[discord]
enabled = true
webhook_url = "https://discord.example/webhook"

[moderation]
review_mode = false
auto_enforce_levels = ["SEVERE"]
welcome_enabled = true
"#;
        let config = Pp2SentryConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.tail.poll_interval(), Duration::from_millis(250));
        assert!(!config.tail.start_at_end);
        assert_eq!(config.servers.len(), 2);
        assert!(config.servers[0].admin_enabled());
        assert!(!config.servers[1].admin_enabled());
        assert!(config.monitor.verify_all);
        assert_eq!(config.moderation.auto_enforce_levels, vec![ViolationLevel::Severe]);
        assert!(config.server("rookie").is_some());
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = Pp2SentryConfig::parse("invalid = [[[toml");
        assert!(matches!(
            result.unwrap_err(),
            Pp2SentryError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_server_names() {
        let toml = r#"
[[servers]]
name = "Main"
chatlog_path = "a"
playlog_path = "b"

[[servers]]
name = "MAIN"
chatlog_path = "c"
playlog_path = "d"
"#;
        let err = Pp2SentryConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn validate_rejects_server_name_with_whitespace() {
        let mut config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        config.servers[0].name = "Main Server".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        config.tail.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn validate_rejects_discord_without_webhook() {
        let mut config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        config.discord.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("webhook_url"));
    }

    #[test]
    fn review_timeout_defaults_to_one_hour_and_must_be_positive() {
        let mut config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        assert_eq!(config.moderation.review_timeout_secs, 3600);

        config.moderation.review_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("review_timeout_secs"));
    }

    #[test]
    fn validate_rejects_auto_enforcing_ok() {
        let mut config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        config.moderation.auto_enforce_levels = vec![ViolationLevel::Ok];
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_debug_redacts_password() {
        let server = ServerConfig {
            admin_password: "hunter2".to_owned(),
            ..ServerConfig::default()
        };
        let debug = format!("{server:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn env_override_admin_password_fills_empty_passwords_only() {
        let toml = r#"
[[servers]]
name = "A"
chatlog_path = "a"
playlog_path = "b"

[[servers]]
name = "B"
chatlog_path = "c"
playlog_path = "d"
admin_password = "own"
"#;
        let mut config = Pp2SentryConfig::parse(toml).unwrap();
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("PP2SENTRY_ADMIN_PASSWORD", "shared") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("PP2SENTRY_ADMIN_PASSWORD") };

        assert_eq!(config.servers[0].admin_password, "shared");
        assert_eq!(config.servers[1].admin_password, "own");
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_PP2SENTRY_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_PP2SENTRY_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_PP2SENTRY_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_PP2SENTRY_CSV", "Server, Bot") };
        override_csv(&mut val, "TEST_PP2SENTRY_CSV");
        assert_eq!(val, vec!["Server", "Bot"]);
        unsafe { std::env::remove_var("TEST_PP2SENTRY_CSV") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = Pp2SentryConfig::parse(one_server_toml()).unwrap();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = Pp2SentryConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.servers[0].name, "Main");
        assert_eq!(parsed.tail.max_read_bytes, config.tail.max_read_bytes);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = Pp2SentryConfig::from_file("/nonexistent/path/pp2sentry.toml").await;
        assert!(matches!(
            result.unwrap_err(),
            Pp2SentryError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
