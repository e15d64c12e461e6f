//! 파일 기반 로그 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 수집합니다.
//! `tail -f`와 유사한 동작을 비동기 폴링 방식으로 구현합니다.
//!
//! # 로테이션 감지
//! - 파일 크기가 마지막 오프셋보다 작아지면 잘림(truncation) 또는 교체로 간주
//! - 오프셋을 0으로 되돌려 새 내용을 처음부터 읽음
//!
//! # 부분 쓰기
//! 줄바꿈으로 끝나지 않은 마지막 라인은 소비하지 않고 다음 폴링에서 다시 읽습니다.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use metrics::counter;
use pp2sentry_core::config::TailConfig;
use pp2sentry_core::metrics as m;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::{StartPosition, decode_text};
use crate::error::LogPipelineError;

/// 파일 하나에 대한 재시작 불가능한 라인 스트림
///
/// 마지막으로 소비한 바이트 오프셋을 추적하며, 반환하는 라인은
/// 줄바꿈 문자를 포함한 원본 그대로입니다 (정리는 소비자 책임).
pub struct LineSource {
    /// 파일 경로
    path: PathBuf,
    /// 서버 이름 (로그/메트릭 레이블)
    server: String,
    /// 로그 종류 (chat, play)
    log: &'static str,
    /// 다음에 읽을 바이트 오프셋
    offset: u64,
    /// 읽었지만 아직 반환하지 않은 라인
    pending: VecDeque<String>,
    /// tail 설정
    config: TailConfig,
    /// 마지막으로 새 라인을 읽었거나 heartbeat를 기록한 시각
    last_activity: Instant,
}

impl LineSource {
    /// 파일을 열고 시작 위치를 정합니다.
    ///
    /// 파일이 없으면 [`LogPipelineError::FileNotFound`]를 반환합니다.
    pub async fn open(
        path: impl AsRef<Path>,
        server: impl Into<String>,
        log: &'static str,
        start: StartPosition,
        config: TailConfig,
    ) -> Result<Self, LogPipelineError> {
        let path = path.as_ref().to_path_buf();
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LogPipelineError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => metadata.len(),
        };

        let server = server.into();
        info!(
            server = %server,
            log,
            path = %path.display(),
            offset,
            "tailing log file"
        );

        Ok(Self {
            path,
            server,
            log,
            offset,
            pending: VecDeque::new(),
            config,
            last_activity: Instant::now(),
        })
    }

    /// 다음 라인을 반환합니다. 새 라인이 생길 때까지 대기합니다.
    ///
    /// 이 스트림은 스스로 끝나지 않습니다. I/O 에러는 기록 후 대기했다가
    /// 같은 오프셋에서 재시도합니다.
    pub async fn next_line(&mut self) -> String {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return line;
            }

            match self.poll().await {
                Ok(lines) if lines.is_empty() => {
                    self.heartbeat();
                    sleep(self.config.poll_interval()).await;
                }
                Ok(lines) => {
                    self.last_activity = Instant::now();
                    self.pending.extend(lines);
                }
                Err(e) => {
                    counter!(
                        m::TAIL_READ_ERRORS_TOTAL,
                        m::LABEL_SERVER => self.server.clone(),
                        m::LABEL_LOG => self.log
                    )
                    .increment(1);
                    warn!(
                        server = %self.server,
                        log = self.log,
                        error = %e,
                        backoff_secs = self.config.error_backoff_secs,
                        "log read failed, backing off"
                    );
                    sleep(self.config.error_backoff()).await;
                }
            }
        }
    }

    /// 한 번의 읽기 사이클을 수행하고 완성된 라인들을 반환합니다.
    ///
    /// 새 내용이 없으면 빈 벡터를 반환합니다. 에러가 나면 오프셋은 바뀌지 않습니다.
    pub async fn poll(&mut self) -> Result<Vec<String>, LogPipelineError> {
        let len = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.tail_error(e))?
            .len();

        if len < self.offset {
            warn!(
                server = %self.server,
                log = self.log,
                previous_offset = self.offset,
                size = len,
                "log truncated or rotated, reading from the beginning"
            );
            counter!(
                m::TAIL_TRUNCATIONS_TOTAL,
                m::LABEL_SERVER => self.server.clone(),
                m::LABEL_LOG => self.log
            )
            .increment(1);
            self.offset = 0;
        }

        if len == self.offset {
            return Ok(Vec::new());
        }

        let to_read = (len - self.offset).min(self.config.max_read_bytes as u64);
        let buf = self.read_at(self.offset, to_read).await?;

        let consumed = match buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            // 줄바꿈 없이 읽기 한도를 채운 경우 통째로 한 라인으로 소비
            None if buf.len() >= self.config.max_read_bytes => buf.len(),
            None => return Ok(Vec::new()),
        };

        let (text, fallback) = decode_text(&buf[..consumed]);
        if fallback {
            debug!(
                server = %self.server,
                log = self.log,
                offset = self.offset,
                "invalid utf-8, decoded as cp1252"
            );
            counter!(
                m::TAIL_DECODE_FALLBACKS_TOTAL,
                m::LABEL_SERVER => self.server.clone(),
                m::LABEL_LOG => self.log
            )
            .increment(1);
        }

        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();
        self.offset += consumed as u64;

        counter!(
            m::TAIL_LINES_READ_TOTAL,
            m::LABEL_SERVER => self.server.clone(),
            m::LABEL_LOG => self.log
        )
        .increment(lines.len() as u64);

        Ok(lines)
    }

    async fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>, LogPipelineError> {
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| self.tail_error(e))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.tail_error(e))?;

        let mut buf = Vec::with_capacity(len as usize);
        file.take(len)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| self.tail_error(e))?;
        Ok(buf)
    }

    fn heartbeat(&mut self) {
        if self.last_activity.elapsed() >= self.config.heartbeat_interval() {
            info!(
                server = %self.server,
                log = self.log,
                offset = self.offset,
                "still tailing, no new lines"
            );
            self.last_activity = Instant::now();
        }
    }

    fn tail_error(&self, e: std::io::Error) -> LogPipelineError {
        LogPipelineError::Tail {
            path: self.path.display().to_string(),
            offset: self.offset,
            reason: e.to_string(),
        }
    }

    /// 다음에 읽을 바이트 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn fast_config() -> TailConfig {
        TailConfig {
            poll_interval_ms: 10,
            error_backoff_secs: 1,
            ..TailConfig::default()
        }
    }

    fn append(path: &Path, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(bytes).unwrap();
    }

    async fn open_source(path: &Path, start: StartPosition) -> LineSource {
        LineSource::open(path, "test", "chat", start, fast_config())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = LineSource::open(
            dir.path().join("missing.txt"),
            "test",
            "chat",
            StartPosition::End,
            fast_config(),
        )
        .await;
        assert!(matches!(result, Err(LogPipelineError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn start_at_end_skips_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "old line\n").unwrap();

        let mut source = open_source(&path, StartPosition::End).await;
        assert_eq!(source.offset(), 9);
        assert!(source.poll().await.unwrap().is_empty());

        append(&path, b"new line\n");
        assert_eq!(source.poll().await.unwrap(), vec!["new line\n"]);
    }

    #[tokio::test]
    async fn start_at_beginning_reads_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "first\nsecond\r\n").unwrap();

        let mut source = open_source(&path, StartPosition::Beginning).await;
        let lines = source.poll().await.unwrap();
        assert_eq!(lines, vec!["first\n", "second\r\n"]);
        assert_eq!(source.offset(), 14);
    }

    #[tokio::test]
    async fn partial_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "complete\npart").unwrap();

        let mut source = open_source(&path, StartPosition::Beginning).await;
        assert_eq!(source.poll().await.unwrap(), vec!["complete\n"]);
        assert_eq!(source.offset(), 9);

        // 나머지가 쓰이기 전에는 아무것도 반환하지 않음
        assert!(source.poll().await.unwrap().is_empty());

        append(&path, b"ial\n");
        assert_eq!(source.poll().await.unwrap(), vec!["partial\n"]);
    }

    #[tokio::test]
    async fn truncation_resets_offset_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "a long line before rotation\n").unwrap();

        let mut source = open_source(&path, StartPosition::Beginning).await;
        source.poll().await.unwrap();

        std::fs::write(&path, "fresh\n").unwrap();
        assert_eq!(source.poll().await.unwrap(), vec!["fresh\n"]);
        assert_eq!(source.offset(), 6);
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_as_cp1252() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, b"P\xe4iv\xe4\n").unwrap();

        let mut source = open_source(&path, StartPosition::Beginning).await;
        assert_eq!(source.poll().await.unwrap(), vec!["Päivä\n"]);
    }

    #[tokio::test]
    async fn encoding_is_chosen_per_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, b"\xe4\n").unwrap();

        let mut source = open_source(&path, StartPosition::Beginning).await;
        assert_eq!(source.poll().await.unwrap(), vec!["ä\n"]);

        append(&path, "ö\n".as_bytes());
        assert_eq!(source.poll().await.unwrap(), vec!["ö\n"]);
    }

    #[tokio::test]
    async fn oversized_line_is_consumed_at_read_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "x".repeat(40)).unwrap();

        let config = TailConfig {
            max_read_bytes: 16,
            ..fast_config()
        };
        let mut source = LineSource::open(&path, "test", "chat", StartPosition::Beginning, config)
            .await
            .unwrap();
        let lines = source.poll().await.unwrap();
        assert_eq!(lines, vec!["x".repeat(16)]);
        assert_eq!(source.offset(), 16);
    }

    #[tokio::test]
    async fn poll_error_keeps_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "line\n").unwrap();

        let mut source = open_source(&path, StartPosition::End).await;
        std::fs::remove_file(&path).unwrap();

        let err = source.poll().await.unwrap_err();
        assert!(matches!(err, LogPipelineError::Tail { offset: 5, .. }));
        assert_eq!(source.offset(), 5);
    }

    #[tokio::test]
    async fn next_line_waits_for_appended_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "").unwrap();

        let mut source = open_source(&path, StartPosition::End).await;
        let writer_path = path.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            append(&writer_path, b"one\ntwo\n");
        });

        let first = tokio::time::timeout(Duration::from_secs(5), source.next_line())
            .await
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), source.next_line())
            .await
            .unwrap();
        assert_eq!(first, "one\n");
        assert_eq!(second, "two\n");
    }

    #[tokio::test]
    async fn next_line_recovers_after_file_reappears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "").unwrap();

        let mut source = open_source(&path, StartPosition::End).await;
        std::fs::remove_file(&path).unwrap();

        let writer_path = path.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            std::fs::write(&writer_path, "back\n").unwrap();
        });

        let line = tokio::time::timeout(Duration::from_secs(5), source.next_line())
            .await
            .unwrap();
        assert_eq!(line, "back\n");
    }
}
