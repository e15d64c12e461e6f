//! 모니터 → 조치 실행 태스크 연결
//!
//! [`ModerationDispatcher`]는 core의 [`ActionHandler`]를 구현합니다.
//! 로그 수집 루프는 절대 기다리지 않아야 하므로 `try_send`만 사용하고,
//! 채널이 가득 차면 경고 후 명령을 버립니다.

use metrics::counter;
use pp2sentry_core::config::ServerConfig;
use pp2sentry_core::metrics as m;
use pp2sentry_core::pipeline::ActionHandler;
use pp2sentry_core::types::{HelpRequest, ViolationReport};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, warn};

use crate::command::{ModerationCommand, ReviewDecision};
use crate::error::ModerationError;

/// 조치 명령 송신기
#[derive(Clone)]
pub struct ModerationDispatcher {
    tx: mpsc::Sender<ModerationCommand>,
    welcome_enabled: bool,
}

impl ModerationDispatcher {
    pub(crate) fn new(tx: mpsc::Sender<ModerationCommand>, welcome_enabled: bool) -> Self {
        Self {
            tx,
            welcome_enabled,
        }
    }

    /// 운영자 검토 결정을 전달합니다. 채널에 자리가 날 때까지 기다립니다.
    pub async fn submit_review(
        &self,
        id: &str,
        decision: ReviewDecision,
    ) -> Result<(), ModerationError> {
        self.tx
            .send(ModerationCommand::Review {
                id: id.to_owned(),
                decision,
            })
            .await
            .map_err(|e| ModerationError::Channel(e.to_string()))
    }

    fn dispatch(&self, command: ModerationCommand) {
        let kind = command.kind();
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                counter!(m::MODERATION_DROPPED_TOTAL).increment(1);
                warn!(kind, "moderation channel full, command dropped");
            }
            Err(TrySendError::Closed(_)) => {
                error!(kind, "action executor is not running, command dropped");
            }
        }
    }
}

impl ActionHandler for ModerationDispatcher {
    fn handle_violation(&self, report: ViolationReport) {
        self.dispatch(ModerationCommand::Violation(report));
    }

    fn handle_help_request(&self, request: HelpRequest) {
        self.dispatch(ModerationCommand::HelpRequest(request));
    }

    fn welcome_player(&self, server: &ServerConfig, player_name: &str) {
        if !self.welcome_enabled {
            return;
        }
        self.dispatch(ModerationCommand::Welcome {
            server_name: server.name.clone(),
            player_name: player_name.to_owned(),
        });
    }
}
