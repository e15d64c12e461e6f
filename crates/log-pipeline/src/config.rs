//! 모니터 설정
//!
//! [`MonitorSettings`]는 core의 [`Pp2SentryConfig`]에서 `[tail]`과 `[monitor]`
//! 섹션을 모아 서버 모니터 하나가 사용하는 설정을 제공합니다.
//! 모든 서버 모니터가 같은 설정을 공유합니다.
//!
//! # 사용 예시
//! ```ignore
//! use pp2sentry_core::config::Pp2SentryConfig;
//! use pp2sentry_log_pipeline::config::MonitorSettings;
//!
//! let core_config = Pp2SentryConfig::load("pp2sentry.toml").await?;
//! let settings = MonitorSettings::from_core(&core_config);
//! ```

use pp2sentry_core::config::{Pp2SentryConfig, TailConfig};

use crate::collector::StartPosition;
use crate::error::LogPipelineError;

/// 서버 모니터 설정
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// 파일 tail 설정
    pub tail: TailConfig,
    /// 분석하지 않는 발신자 (정확히 일치)
    pub ignored_senders: Vec<String>,
    /// 도움 요청 명령 접두어
    pub help_prefix: String,
    /// 문제 없는 메시지도 MINOR로 올려 검토 대상으로 보낼지 여부
    pub verify_all: bool,
    /// 중복 제거 식별자 최대 보관 수 (`None`이면 무제한)
    pub dedup_capacity: Option<usize>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let core = pp2sentry_core::config::MonitorConfig::default();
        Self {
            tail: TailConfig::default(),
            ignored_senders: core.ignored_senders,
            help_prefix: core.help_prefix,
            verify_all: core.verify_all,
            dedup_capacity: None,
        }
    }
}

impl MonitorSettings {
    /// core 설정에서 모니터 설정을 생성합니다.
    pub fn from_core(core: &Pp2SentryConfig) -> Self {
        Self {
            tail: core.tail.clone(),
            ignored_senders: core.monitor.ignored_senders.clone(),
            help_prefix: core.monitor.help_prefix.clone(),
            verify_all: core.monitor.verify_all,
            dedup_capacity: match core.monitor.dedup_capacity {
                0 => None,
                n => Some(n),
            },
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.tail.poll_interval_ms == 0 {
            return Err(LogPipelineError::Config {
                field: "tail.poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.tail.max_read_bytes < 1024 {
            return Err(LogPipelineError::Config {
                field: "tail.max_read_bytes".to_owned(),
                reason: "must be at least 1024".to_owned(),
            });
        }

        if self.help_prefix.trim().is_empty() {
            return Err(LogPipelineError::Config {
                field: "monitor.help_prefix".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.dedup_capacity == Some(0) {
            return Err(LogPipelineError::Config {
                field: "monitor.dedup_capacity".to_owned(),
                reason: "use None for an unbounded guard".to_owned(),
            });
        }

        Ok(())
    }

    /// 모니터 시작 시 파일 읽기 위치
    pub fn start_position(&self) -> StartPosition {
        if self.tail.start_at_end {
            StartPosition::End
        } else {
            StartPosition::Beginning
        }
    }

    /// 분석 대상이 아닌 발신자인지 확인합니다.
    pub fn is_ignored_sender(&self, player_name: &str) -> bool {
        player_name.trim().is_empty() || self.ignored_senders.iter().any(|s| s == player_name)
    }

    /// 메시지 본문이 도움 요청인지 확인합니다.
    pub fn is_help_request(&self, message: &str) -> bool {
        message.trim().starts_with(self.help_prefix.as_str())
    }
}

/// 모니터 설정 빌더
#[derive(Default)]
pub struct MonitorSettingsBuilder {
    settings: MonitorSettings,
}

impl MonitorSettingsBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// tail 설정을 지정합니다.
    pub fn tail(mut self, tail: TailConfig) -> Self {
        self.settings.tail = tail;
        self
    }

    /// 시작 위치를 지정합니다.
    pub fn start_position(mut self, position: StartPosition) -> Self {
        self.settings.tail.start_at_end = position == StartPosition::End;
        self
    }

    /// 폴링 주기(밀리초)를 지정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.settings.tail.poll_interval_ms = ms;
        self
    }

    /// 무시할 발신자 목록을 지정합니다.
    pub fn ignored_senders(mut self, senders: Vec<String>) -> Self {
        self.settings.ignored_senders = senders;
        self
    }

    /// 도움 요청 접두어를 지정합니다.
    pub fn help_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.help_prefix = prefix.into();
        self
    }

    /// 전체 검토 모드를 지정합니다.
    pub fn verify_all(mut self, verify_all: bool) -> Self {
        self.settings.verify_all = verify_all;
        self
    }

    /// 중복 제거 용량을 지정합니다.
    pub fn dedup_capacity(mut self, capacity: Option<usize>) -> Self {
        self.settings.dedup_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `MonitorSettings`를 생성합니다.
    pub fn build(self) -> Result<MonitorSettings, LogPipelineError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
