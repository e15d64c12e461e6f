//! 관리 비밀번호 탐색 -- 게임 서버 컨테이너 로그
//!
//! 관리 비밀번호가 설정되지 않은 서버는 게임 서버 컨테이너가 시작 시 출력하는
//! `Generated password: <비밀번호>` 줄에서 비밀번호를 찾습니다.
//!
//! [`ContainerLogs`] trait으로 Docker API를 추상화하여 테스트에서는
//! `MockContainerLogs`를 사용합니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use regex::Regex;
use tracing::{info, warn};

use crate::error::ModerationError;

/// 기본 게임 서버 컨테이너 이름
pub const DEFAULT_CONTAINER: &str = "pp2host";

/// 기본 시도 횟수
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// 기본 재시도 간격
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

const MAX_CONTAINER_NAME_LEN: usize = 128;
const PASSWORD_PATTERN: &str = r"Generated password: (\w+)";

/// 컨테이너 이름을 검증합니다.
///
/// Docker 이름 규칙 `[A-Za-z0-9][A-Za-z0-9_.-]*`, 최대 128자.
fn validate_container_name(name: &str) -> Result<(), ModerationError> {
    if name.is_empty() || name.len() > MAX_CONTAINER_NAME_LEN {
        return Err(ModerationError::Docker(format!(
            "invalid container name: length {} (must be 1-{MAX_CONTAINER_NAME_LEN})",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(ModerationError::Docker(format!(
            "invalid container name: '{name}'"
        )));
    }
    Ok(())
}

/// 컨테이너 로그 조회 추상화
pub trait ContainerLogs: Send + Sync + 'static {
    /// 컨테이너의 전체 로그(stdout + stderr)를 반환합니다.
    fn fetch_logs(
        &self,
        container: &str,
    ) -> impl Future<Output = Result<String, ModerationError>> + Send;
}

/// `bollard` 기반 구현
pub struct BollardContainerLogs {
    docker: Arc<bollard::Docker>,
}

impl BollardContainerLogs {
    /// 로컬 기본 소켓으로 Docker에 연결합니다.
    pub fn connect_local() -> Result<Self, ModerationError> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| ModerationError::Docker(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

impl ContainerLogs for BollardContainerLogs {
    async fn fetch_logs(&self, container: &str) -> Result<String, ModerationError> {
        use bollard::container::LogsOptions;

        validate_container_name(container)?;

        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: "all".to_owned(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(container, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.to_string().contains("404") {
                    ModerationError::Docker(format!("container not found: {container}"))
                } else {
                    ModerationError::Docker(format!("read logs failed: {e}"))
                }
            })?;
            output.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(output)
    }
}

/// 로그 텍스트에서 마지막으로 생성된 비밀번호를 찾습니다.
pub fn extract_password(logs: &str) -> Option<String> {
    let re = Regex::new(PASSWORD_PATTERN).ok()?;
    re.captures_iter(logs)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// 컨테이너 로그에서 관리 비밀번호를 찾습니다.
///
/// 컨테이너가 막 시작된 경우를 위해 `attempts`번까지 `delay` 간격으로 재시도합니다.
/// 찾지 못하면 `Ok(None)`을 반환합니다.
pub async fn discover_admin_password<C: ContainerLogs>(
    client: &C,
    container: &str,
    attempts: u32,
    delay: Duration,
) -> Result<Option<String>, ModerationError> {
    validate_container_name(container)?;

    for attempt in 1..=attempts.max(1) {
        match client.fetch_logs(container).await {
            Ok(logs) => {
                if let Some(password) = extract_password(&logs) {
                    info!(container, attempt, "admin password discovered from container logs");
                    return Ok(Some(password));
                }
                warn!(container, attempt, "generated password not found in container logs");
            }
            Err(e) => warn!(container, attempt, error = %e, "failed to read container logs"),
        }

        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(None)
}

/// 테스트용 mock 로그 조회기
#[cfg(test)]
pub struct MockContainerLogs {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>,
    calls: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl MockContainerLogs {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ContainerLogs for MockContainerLogs {
    async fn fetch_logs(&self, _container: &str) -> Result<String, ModerationError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(logs)) => Ok(logs),
            Some(Err(e)) => Err(ModerationError::Docker(e)),
            None => Ok(String::new()),
        }
    }
}
