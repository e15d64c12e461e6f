//! 접속 로그 파서 (playlog.txt)
//!
//! # 형식
//! ```text
//! --> Pelaaja joined the game (ip: 178.128.137.111). [25.01.2026 07:29] [/banaddress 178.128.137.111 60 Pelaaja 1124073472 ] [v2.0.7]
//! ```
//!
//! ban 명령의 세 번째 토큰(기간, 분)은 항상 [`PERMANENT_BAN_MINUTES`]로 교체됩니다.
//! 서버가 기록한 원래 기간은 밖으로 전달되지 않습니다.

use pp2sentry_core::types::{PERMANENT_BAN_MINUTES, PlayerJoinEvent};
use regex::Regex;

use crate::error::LogPipelineError;

/// 접속 라인 정규식
const JOIN_PATTERN: &str = r"-->\s+(.+?)\s+joined the game\s+\(ip:\s+([0-9.]+)\)\.\s+\[(.+?)\]\s+\[\s*(/banaddress\s+.+?)\s*\]\s+\[(.+?)\]";

/// 접속 이벤트 파서
///
/// 내부 상태가 없으며 컴파일된 정규식만 가집니다.
/// 여러 태스크에서 동시에 사용해도 안전합니다 (`Clone`은 정규식을 공유).
#[derive(Debug, Clone)]
pub struct JoinEventParser {
    pattern: Regex,
}

impl JoinEventParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(JOIN_PATTERN)?,
        })
    }

    /// 한 라인을 파싱합니다. 형식이 맞지 않으면 `None`을 반환합니다.
    pub fn parse(&self, line: &str) -> Option<PlayerJoinEvent> {
        let caps = self.pattern.captures(line)?;

        let player_name = caps.get(1)?.as_str().trim().to_owned();
        let ip_address = caps.get(2)?.as_str().to_owned();
        let timestamp = caps.get(3)?.as_str().to_owned();
        let raw_ban_command = caps.get(4)?.as_str().trim();
        let client_version = caps.get(5)?.as_str().to_owned();

        // /banaddress <ip> <minutes> <name> <id...>
        let mut parts: Vec<&str> = raw_ban_command.split_whitespace().collect();
        let (ban_command, name_with_ids) = if parts.len() >= 3 {
            parts[2] = PERMANENT_BAN_MINUTES;
            (parts.join(" "), parts[3..].join(" "))
        } else {
            (raw_ban_command.to_owned(), player_name.clone())
        };

        let player_id = if parts.len() > 3 {
            parts.last().map(|s| (*s).to_owned()).unwrap_or_default()
        } else {
            String::new()
        };

        Some(PlayerJoinEvent {
            timestamp,
            player_name,
            ip_address,
            client_version,
            ban_command,
            name_with_ids,
            player_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parser() -> JoinEventParser {
        JoinEventParser::new().unwrap()
    }

    #[test]
    fn parses_real_join_line() {
        let line = "--> Pelaaja joined the game (ip: 178.128.137.111). [25.01.2026 07:29] [/banaddress 178.128.137.111 60 Pelaaja 1124073472 ] [v2.0.7]";
        let event = parser().parse(line).unwrap();

        assert_eq!(event.player_name, "Pelaaja");
        assert_eq!(event.ip_address, "178.128.137.111");
        assert_eq!(event.timestamp, "25.01.2026 07:29");
        assert_eq!(event.client_version, "v2.0.7");
        assert_eq!(
            event.ban_command,
            "/banaddress 178.128.137.111 9999999 Pelaaja 1124073472"
        );
        assert_eq!(event.name_with_ids, "Pelaaja 1124073472");
        assert_eq!(event.player_id, "1124073472");
    }

    #[test]
    fn player_name_with_spaces() {
        let line = "--> Big Boss joined the game (ip: 10.0.0.2). [01.02.2025 12:00] [/banaddress 10.0.0.2 30 Big Boss 42 77] [v2.0.7]";
        let event = parser().parse(line).unwrap();
        assert_eq!(event.player_name, "Big Boss");
        assert_eq!(event.name_with_ids, "Big Boss 42 77");
        assert_eq!(event.player_id, "77");
    }

    #[test]
    fn short_ban_command_passes_through() {
        let line = "--> Foo joined the game (ip: 1.2.3.4). [01.01.2025 10:00] [/banaddress 1.2.3.4] [v1.0]";
        let event = parser().parse(line).unwrap();
        assert_eq!(event.ban_command, "/banaddress 1.2.3.4");
        assert_eq!(event.name_with_ids, "Foo");
        assert_eq!(event.player_id, "");
    }

    #[test]
    fn exactly_three_tokens_has_empty_ids() {
        let line = "--> Foo joined the game (ip: 1.2.3.4). [01.01.2025 10:00] [/banaddress 1.2.3.4 60] [v1.0]";
        let event = parser().parse(line).unwrap();
        assert_eq!(event.ban_command, "/banaddress 1.2.3.4 9999999");
        assert_eq!(event.name_with_ids, "");
        assert_eq!(event.player_id, "");
    }

    #[test]
    fn non_matching_lines_yield_none() {
        let p = parser();
        assert!(p.parse("").is_none());
        assert!(p.parse("<-- Foo left the game.").is_none());
        assert!(p.parse("--> Foo joined the game").is_none());
        assert!(p.parse("Foo:   [01.01.2025 10:01]").is_none());
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let line = "--> Foo joined the game (ip: 1.2.3.4). [01.01.2025 10:00] [/banaddress 1.2.3.4 60 Foo 999] [v1.0]\r\n";
        assert!(parser().parse(line).is_some());
    }

    proptest! {
        #[test]
        fn duration_is_always_permanent(minutes in "[0-9]{1,8}", name in "[A-Za-z][A-Za-z0-9_]{0,15}", id in "[0-9]{1,10}") {
            let line = format!(
                "--> {name} joined the game (ip: 1.2.3.4). [01.01.2025 10:00] [/banaddress 1.2.3.4 {minutes} {name} {id}] [v1.0]"
            );
            let event = parser().parse(&line).unwrap();
            let tokens: Vec<&str> = event.ban_command.split_whitespace().collect();
            prop_assert_eq!(tokens[2], PERMANENT_BAN_MINUTES);
            prop_assert_eq!(event.player_id, id);
        }
    }
}
