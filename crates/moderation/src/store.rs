//! 위반 기록 저장소 (SQLite)
//!
//! 모든 위반(및 검토 대상)을 `violations` 테이블에 기록합니다.
//! 연결은 하나를 mutex로 감싸 공유하며, 기록은 짧은 단일 INSERT입니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use pp2sentry_core::error::StorageError;
use pp2sentry_core::pipeline::ViolationStore;
use pp2sentry_core::types::{ViolationLevel, ViolationRecord};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::info;

use crate::error::ModerationError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS violations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    player_name TEXT NOT NULL,
    ip_address TEXT,
    violation_type TEXT NOT NULL,
    content TEXT NOT NULL,
    level TEXT NOT NULL,
    reason TEXT NOT NULL,
    suggested_action TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_player_name ON violations(player_name);
CREATE INDEX IF NOT EXISTS idx_level ON violations(level);
"#;

const SELECT_COLUMNS: &str = "id, timestamp, player_name, ip_address, violation_type, content, level, reason, suggested_action, created_at";

/// 저장된 위반 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredViolation {
    /// 행 ID
    pub id: i64,
    /// 로그상의 시각
    pub timestamp: String,
    /// 플레이어 이름
    pub player_name: String,
    /// 접속 IP
    pub ip_address: Option<String>,
    /// `message` 또는 `nickname`
    pub violation_type: String,
    /// 위반 내용
    pub content: String,
    /// 심각도
    pub level: String,
    /// 판단 사유
    pub reason: String,
    /// 권장 조치
    pub suggested_action: String,
    /// 기록 시각 (로컬, RFC 3339)
    pub created_at: String,
}

/// 위반 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViolationStats {
    /// 전체 기록 수
    pub total: u64,
    /// 심각도별 기록 수
    pub by_level: BTreeMap<String, u64>,
    /// 기록이 많은 플레이어 (최대 10명, 많은 순)
    pub top_violators: Vec<(String, u64)>,
}

/// SQLite 위반 저장소
pub struct SqliteViolationStore {
    conn: Mutex<Connection>,
}

impl SqliteViolationStore {
    /// 데이터베이스 파일을 열고 스키마를 준비합니다. 상위 디렉토리가 없으면 만듭니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ModerationError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ModerationError::Config {
                field: "storage.database_path".to_owned(),
                reason: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let store = Self::with_schema(Connection::open(path)?)?;
        info!(path = %path.display(), "violation store opened");
        Ok(store)
    }

    /// 메모리 데이터베이스를 엽니다.
    pub fn open_in_memory() -> Result<Self, ModerationError> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, ModerationError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Connection("connection mutex poisoned".to_owned()))?;
        f(&conn).map_err(|e| StorageError::Query(e.to_string()))
    }

    /// 플레이어의 최근 위반을 최신순으로 조회합니다.
    pub fn player_violations(
        &self,
        player_name: &str,
        limit: usize,
    ) -> Result<Vec<StoredViolation>, StorageError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM violations WHERE player_name = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![player_name, limit as i64], row_to_violation)?;
            rows.collect()
        })
    }

    /// 최근 위반을 최신순으로 조회합니다. 심각도로 거를 수 있습니다.
    pub fn recent_violations(
        &self,
        level: Option<ViolationLevel>,
        limit: usize,
    ) -> Result<Vec<StoredViolation>, StorageError> {
        self.with_conn(|conn| match level {
            Some(level) => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM violations WHERE level = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    stmt.query_map(params![level.as_str(), limit as i64], row_to_violation)?;
                rows.collect()
            }
            None => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM violations ORDER BY created_at DESC, id DESC LIMIT ?1"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit as i64], row_to_violation)?;
                rows.collect()
            }
        })
    }

    /// 전체 통계를 계산합니다.
    pub fn stats(&self) -> Result<ViolationStats, StorageError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM violations", [], |row| row.get(0))?;

            let mut by_level = BTreeMap::new();
            let mut stmt = conn.prepare("SELECT level, COUNT(*) FROM violations GROUP BY level")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
            for row in rows {
                let (level, count) = row?;
                by_level.insert(level, count.max(0) as u64);
            }

            let mut stmt = conn.prepare(
                "SELECT player_name, COUNT(*) AS count FROM violations GROUP BY player_name ORDER BY count DESC, player_name ASC LIMIT 10",
            )?;
            let top_violators = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .map(|row| row.map(|(name, count)| (name, count.max(0) as u64)))
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(ViolationStats {
                total: total.max(0) as u64,
                by_level,
                top_violators,
            })
        })
    }
}

impl ViolationStore for SqliteViolationStore {
    fn record_violation(&self, record: &ViolationRecord) -> Result<i64, StorageError> {
        let created_at = chrono::Local::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO violations (
                    timestamp, player_name, ip_address, violation_type,
                    content, level, reason, suggested_action, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.timestamp,
                    record.player_name,
                    record.ip_address,
                    record.kind.as_str(),
                    record.content,
                    record.analysis.level.as_str(),
                    record.analysis.reason,
                    record.analysis.suggested_action,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn row_to_violation(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredViolation> {
    Ok(StoredViolation {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        player_name: row.get(2)?,
        ip_address: row.get(3)?,
        violation_type: row.get(4)?,
        content: row.get(5)?,
        level: row.get(6)?,
        reason: row.get(7)?,
        suggested_action: row.get(8)?,
        created_at: row.get(9)?,
    })
}
