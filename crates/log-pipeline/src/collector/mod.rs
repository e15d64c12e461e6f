//! 로그 수집 모듈 -- 게임 서버가 계속 덧붙여 쓰는 로그 파일을 tail 합니다.
//!
//! # 수집 소스
//! - [`LineSource`]: 바이트 오프셋 기반 파일 tail (폴링 방식)
//!
//! # 동작
//! 각 로그 파일은 자체 tokio 태스크에서 [`LineSource::next_line`]을 반복 호출합니다.
//! inotify 같은 알림 API 대신 고정 주기 폴링만 사용하므로 플랫폼마다 동작이 같습니다.

pub mod file;

pub use file::LineSource;

use std::borrow::Cow;

use encoding_rs::WINDOWS_1252;

/// 모니터 시작 시 파일 읽기 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// 파일 처음부터 (기존 내용 재처리)
    Beginning,
    /// 파일 끝부터 (새로 추가되는 내용만)
    End,
}

/// 바이트열을 텍스트로 디코딩합니다.
///
/// 엄격한 UTF-8을 먼저 시도하고, 실패하면 전체를 cp1252로 다시 디코딩합니다.
/// 두 번째 값은 대체 디코딩 사용 여부입니다.
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), false),
        Err(_) => {
            let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, true)
        }
    }
}
