//! 세션 저장소 -- 플레이어별 최신 접속 메타데이터
//!
//! 채팅 메시지를 같은 이름의 마지막 접속 정보(IP, ban 명령)와 연결하는 데 사용됩니다.
//!
//! # 조회 순서
//! 1. 메모리 캐시
//! 2. 캐시에 없으면 접속 로그 전체를 처음부터 스캔하여 해당 이름의 마지막 접속을 찾음
//!    (모니터가 파일 끝에서 시작하기 전에 접속한 플레이어 복구용)
//! 3. 스캔 결과는 캐시에 저장되어 이후 조회는 O(1). 찾지 못한 이름도 기억하며
//!    해당 플레이어의 새 접속이 `update`로 들어오면 지워짐
//!
//! 같은 모니터의 채팅 루프와 접속 루프가 동시에 접근하므로 맵은 mutex로 보호합니다.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use metrics::gauge;
use pp2sentry_core::metrics as m;
use pp2sentry_core::types::Session;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use crate::collector::decode_text;
use crate::error::LogPipelineError;
use crate::parser::JoinEventParser;

/// 플레이어 세션 저장소 (서버 하나 전용)
pub struct SessionStore {
    /// 서버 이름 (로그/메트릭 레이블)
    server: String,
    /// 이력 스캔 대상 접속 로그 경로
    playlog_path: PathBuf,
    /// 접속 라인 파서
    parser: JoinEventParser,
    /// 이름 -> 최신 세션
    sessions: Mutex<HashMap<String, Session>>,
    /// 이력 스캔에서 찾지 못한 이름
    misses: Mutex<HashSet<String>>,
}

impl SessionStore {
    /// 새 세션 저장소를 생성합니다.
    pub fn new(
        server: impl Into<String>,
        playlog_path: impl AsRef<Path>,
        parser: JoinEventParser,
    ) -> Self {
        Self {
            server: server.into(),
            playlog_path: playlog_path.as_ref().to_path_buf(),
            parser,
            sessions: Mutex::new(HashMap::new()),
            misses: Mutex::new(HashSet::new()),
        }
    }

    /// 플레이어의 최신 세션을 조회합니다.
    ///
    /// 캐시에 없으면 접속 로그를 스캔합니다. 찾지 못하면 `None`이며,
    /// 이후 `update` 전까지 같은 이름으로 다시 스캔하지 않습니다.
    pub async fn lookup(&self, player_name: &str) -> Option<Session> {
        if let Some(session) = self.sessions.lock().await.get(player_name) {
            return Some(session.clone());
        }
        if self.misses.lock().await.contains(player_name) {
            return None;
        }

        let found = match self.scan_history(player_name).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                self.misses.lock().await.insert(player_name.to_owned());
                return None;
            }
            Err(e) => {
                debug!(
                    server = %self.server,
                    player = player_name,
                    error = %e,
                    "session history scan failed"
                );
                return None;
            }
        };

        // 스캔 중 접속 루프가 더 최신 세션을 넣었다면 그 값을 유지
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(player_name.to_owned())
            .or_insert(found)
            .clone();
        self.report_size(sessions.len());
        Some(session)
    }

    /// 플레이어의 세션을 덮어씁니다 (가장 최근 접속 우선, 이력 없음).
    pub async fn update(&self, player_name: &str, session: Session) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(player_name.to_owned(), session);
        self.report_size(sessions.len());
        drop(sessions);
        self.misses.lock().await.remove(player_name);
    }

    /// 캐시된 세션 수
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// 캐시가 비어 있는지 여부
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// 접속 로그 전체에서 해당 이름의 마지막 접속을 찾습니다.
    async fn scan_history(&self, player_name: &str) -> Result<Option<Session>, LogPipelineError> {
        let file = tokio::fs::File::open(&self.playlog_path).await?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut latest = None;
        let mut scanned = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            scanned += 1;

            let (line, _) = decode_text(&buf);
            if !line.contains(player_name) {
                continue;
            }
            if let Some(event) = self.parser.parse(&line)
                && event.player_name == player_name
            {
                latest = Some(event.session());
            }
        }

        debug!(
            server = %self.server,
            player = player_name,
            lines = scanned,
            found = latest.is_some(),
            "scanned join history"
        );
        Ok(latest)
    }

    fn report_size(&self, size: usize) {
        gauge!(m::JOIN_SESSIONS_TRACKED, m::LABEL_SERVER => self.server.clone()).set(size as f64);
    }
}
