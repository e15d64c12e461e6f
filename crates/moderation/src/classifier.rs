//! 규칙 기반 분류기 -- YAML 규칙으로 채팅 메시지와 닉네임을 판정합니다.
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 로드합니다.
//! 여러 규칙이 일치하면 가장 심각한 규칙이 이깁니다. 일치하는 규칙이 없으면 `OK`입니다.
//!
//! # YAML 스키마
//! ```yaml
//! rules:
//!   - id: profanity
//!     title: Kiroilu
//!     level: MODERATE
//!     scope: both        # message | nickname | both
//!     patterns:
//!       - '\bperkele\b'
//!       - 'vittu'
//! ```
//!
//! 패턴은 대소문자를 구분하지 않는 정규식입니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pp2sentry_core::pipeline::Classifier;
use pp2sentry_core::types::{Analysis, ViolationLevel};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ModerationError;

const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULES_COUNT: usize = 10_000;
const MAX_PATTERN_LEN: usize = 1024;
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// 규칙 적용 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// 채팅 메시지에만 적용
    Message,
    /// 닉네임에만 적용
    Nickname,
    /// 둘 다
    #[default]
    Both,
}

impl RuleScope {
    fn covers(self, target: RuleScope) -> bool {
        self == RuleScope::Both || self == target
    }
}

/// 모더레이션 규칙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRule {
    /// 규칙 고유 ID
    pub id: String,
    /// 규칙 제목 (판단 사유에 표시)
    pub title: String,
    /// 규칙 설명
    #[serde(default)]
    pub description: String,
    /// 일치 시 심각도
    pub level: ViolationLevel,
    /// 적용 대상
    #[serde(default)]
    pub scope: RuleScope,
    /// 활성화 여부
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 정규식 패턴 목록 (하나라도 일치하면 규칙 일치)
    pub patterns: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl ModerationRule {
    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ModerationError> {
        let invalid = |reason: &str| ModerationError::RuleValidation {
            rule_id: if self.id.is_empty() {
                "(empty)".to_owned()
            } else {
                self.id.clone()
            },
            reason: reason.to_owned(),
        };

        if self.id.is_empty() {
            return Err(invalid("rule id must not be empty"));
        }
        if self.id.len() > 256 {
            return Err(invalid("rule id must not exceed 256 characters"));
        }
        if self.title.is_empty() {
            return Err(invalid("rule title must not be empty"));
        }
        if self.level == ViolationLevel::Ok {
            return Err(invalid("rule level must not be OK"));
        }
        if self.patterns.is_empty() {
            return Err(invalid("rule must have at least one pattern"));
        }
        if self.patterns.iter().any(|p| p.is_empty()) {
            return Err(invalid("patterns must not be empty"));
        }
        if self.patterns.iter().any(|p| p.len() > MAX_PATTERN_LEN) {
            return Err(invalid("pattern exceeds 1024 characters"));
        }
        Ok(())
    }
}

/// 규칙 파일 최상위 구조
#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<ModerationRule>,
}

#[derive(Debug)]
struct CompiledRule {
    id: String,
    title: String,
    level: ViolationLevel,
    scope: RuleScope,
    matcher: Regex,
}

/// 규칙 기반 분류기
#[derive(Debug, Default)]
pub struct RuleClassifier {
    rules: Vec<CompiledRule>,
}

impl RuleClassifier {
    /// 규칙 목록으로 분류기를 생성합니다. 비활성 규칙은 건너뜁니다.
    pub fn new(rules: Vec<ModerationRule>) -> Result<Self, ModerationError> {
        if rules.len() > MAX_RULES_COUNT {
            return Err(ModerationError::RuleValidation {
                rule_id: "(all)".to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        let mut seen_ids = HashSet::new();
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            rule.validate()?;
            if !seen_ids.insert(rule.id.clone()) {
                return Err(ModerationError::RuleValidation {
                    rule_id: rule.id,
                    reason: "duplicate rule id".to_owned(),
                });
            }
            if !rule.enabled {
                debug!(rule_id = %rule.id, "rule disabled, skipping");
                continue;
            }

            let alternation = rule
                .patterns
                .iter()
                .map(|p| format!("(?:{p})"))
                .collect::<Vec<_>>()
                .join("|");
            let matcher = RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
                .map_err(|e| ModerationError::RuleValidation {
                    rule_id: rule.id.clone(),
                    reason: format!("invalid pattern: {e}"),
                })?;

            compiled.push(CompiledRule {
                id: rule.id,
                title: rule.title,
                level: rule.level,
                scope: rule.scope,
                matcher,
            });
        }

        Ok(Self { rules: compiled })
    }

    /// 활성 규칙 수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 파일 또는 디렉토리에서 규칙을 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ModerationError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ModerationError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read metadata: {e}"),
            })?;

        let rules = if metadata.is_dir() {
            Self::load_directory(path).await?
        } else {
            Self::load_file(path).await?
        };
        let classifier = Self::new(rules)?;

        info!(
            path = %path.display(),
            count = classifier.rule_count(),
            "loaded moderation rules"
        );
        Ok(classifier)
    }

    /// 디렉토리의 모든 YAML 규칙 파일을 파일명 순서로 로드합니다.
    ///
    /// 개별 파일 로딩 실패는 경고 로그를 남기고 건너뜁니다.
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<ModerationRule>, ModerationError> {
        let dir = dir.as_ref();
        let dir_error = |e: std::io::Error| ModerationError::RuleLoad {
            path: dir.display().to_string(),
            reason: format!("failed to read directory: {e}"),
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(dir_error)?;
        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(dir_error)? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();
        for path in paths {
            match Self::load_file(&path).await {
                Ok(file_rules) => {
                    for rule in file_rules {
                        if !seen_ids.insert(rule.id.clone()) {
                            warn!(
                                rule_id = %rule.id,
                                path = %path.display(),
                                "duplicate rule id, skipping"
                            );
                            continue;
                        }
                        rules.push(rule);
                    }
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }
        }

        Ok(rules)
    }

    /// 단일 YAML 파일에서 규칙을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<ModerationRule>, ModerationError> {
        let path = path.as_ref();
        let load_error = |reason: String| ModerationError::RuleLoad {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_error(format!("failed to read file metadata: {e}")))?;
        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(load_error(format!(
                "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_error(format!("failed to read file: {e}")))?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하고 각 규칙을 검증합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<ModerationRule>, ModerationError> {
        let file: RuleFile =
            serde_yaml::from_str(yaml_str).map_err(|e| ModerationError::RuleLoad {
                path: source.to_owned(),
                reason: format!("invalid YAML: {e}"),
            })?;

        for rule in &file.rules {
            rule.validate()?;
        }
        Ok(file.rules)
    }

    /// 대상 텍스트에 일치하는 가장 심각한 규칙을 찾습니다.
    fn most_severe(&self, text: &str, target: RuleScope) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .filter(|rule| rule.scope.covers(target) && rule.matcher.is_match(text))
            .fold(None, |best: Option<&CompiledRule>, rule| match best {
                Some(current) if current.level >= rule.level => Some(current),
                _ => Some(rule),
            })
    }

    fn analyze(&self, text: &str, target: RuleScope) -> Analysis {
        let Some(rule) = self.most_severe(text, target) else {
            return Analysis::ok(ok_reason(target));
        };

        debug!(rule_id = %rule.id, level = %rule.level, "moderation rule matched");
        Analysis {
            level: rule.level,
            reason: format!("{} (sääntö: {})", violation_reason(rule.level, target), rule.title),
            suggested_action: suggested_action(rule.level).to_owned(),
        }
    }
}

impl Classifier for RuleClassifier {
    fn classify_message(&self, _player_name: &str, text: &str) -> Analysis {
        self.analyze(text, RuleScope::Message)
    }

    fn classify_nickname(&self, nickname: &str) -> Analysis {
        self.analyze(nickname, RuleScope::Nickname)
    }
}

fn ok_reason(target: RuleScope) -> &'static str {
    match target {
        RuleScope::Nickname => "Nimimerkki on asiallinen.",
        _ => "Viesti on asiallinen.",
    }
}

fn violation_reason(level: ViolationLevel, target: RuleScope) -> &'static str {
    match (target, level) {
        (RuleScope::Nickname, ViolationLevel::Severe) => {
            "Sopimaton tai sääntöjen vastainen nimimerkki."
        }
        (RuleScope::Nickname, ViolationLevel::Moderate) => {
            "Huomautus nimimerkistä (sisältää mahdollisesti kirosanoja tms)."
        }
        (RuleScope::Nickname, _) => "Nimimerkki saattaa vaatia tarkistusta.",
        (_, ViolationLevel::Severe) => {
            "Vakava sääntörikkomus havaittu (esim. vihapuhe tai suora solvaus)."
        }
        (_, ViolationLevel::Moderate) => {
            "Keskivakava rikkomus havaittu (esim. kiroilu tai epäkohtelias käytös)."
        }
        _ => "Lievä huomautus sääntöjen noudattamisesta.",
    }
}

/// 심각도별 권장 조치
pub fn suggested_action(level: ViolationLevel) -> &'static str {
    match level {
        ViolationLevel::Severe => "/banaddress {ip} 9999999 {full_name}",
        ViolationLevel::Moderate => "/kick {index}",
        ViolationLevel::Minor => "Varoitus",
        ViolationLevel::Ok => "Ei toimenpiteitä",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES_YAML: &str = r#"
rules:
  - id: profanity
    title: Kiroilu
    level: MODERATE
    patterns:
      - '\bperkele\b'
  - id: threats
    title: Uhkailu
    level: SEVERE
    scope: message
    patterns:
      - '\bkys\b'
      - 'tapan sut'
  - id: advertising
    title: Mainostus
    level: MINOR
    patterns:
      - 'discord\.gg/'
  - id: impersonation
    title: Ylläpitäjäksi tekeytyminen
    level: SEVERE
    scope: nickname
    patterns:
      - '^admin'
"#;

    fn classifier() -> RuleClassifier {
        RuleClassifier::new(RuleClassifier::parse_yaml(RULES_YAML, "test").unwrap()).unwrap()
    }

    #[test]
    fn clean_message_is_ok() {
        let analysis = classifier().classify_message("Foo", "moro mitä kuuluu");
        assert_eq!(analysis.level, ViolationLevel::Ok);
        assert_eq!(analysis.reason, "Viesti on asiallinen.");
        assert_eq!(analysis.suggested_action, "Ei toimenpiteitä");
    }

    #[test]
    fn match_is_case_insensitive() {
        let analysis = classifier().classify_message("Foo", "PERKELE sentään");
        assert_eq!(analysis.level, ViolationLevel::Moderate);
        assert_eq!(analysis.suggested_action, "/kick {index}");
        assert!(analysis.reason.contains("Kiroilu"));
    }

    #[test]
    fn most_severe_rule_wins() {
        let analysis = classifier().classify_message("Foo", "perkele kys discord.gg/abc");
        assert_eq!(analysis.level, ViolationLevel::Severe);
        assert_eq!(analysis.suggested_action, "/banaddress {ip} 9999999 {full_name}");
        assert!(analysis.reason.contains("Uhkailu"));
    }

    #[test]
    fn scope_limits_rule_targets() {
        let c = classifier();
        // 메시지 전용 규칙은 닉네임에 적용되지 않음
        assert_eq!(c.classify_nickname("kys").level, ViolationLevel::Ok);
        // 닉네임 전용 규칙은 메시지에 적용되지 않음
        assert_eq!(c.classify_message("Foo", "admin here").level, ViolationLevel::Ok);

        let analysis = c.classify_nickname("AdminBob");
        assert_eq!(analysis.level, ViolationLevel::Severe);
        assert!(analysis.reason.starts_with("Sopimaton"));
    }

    #[test]
    fn nickname_ok_reason() {
        let analysis = classifier().classify_nickname("Pelaaja");
        assert_eq!(analysis.reason, "Nimimerkki on asiallinen.");
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut rules = RuleClassifier::parse_yaml(RULES_YAML, "test").unwrap();
        for rule in &mut rules {
            rule.enabled = rule.id != "profanity";
        }
        let c = RuleClassifier::new(rules).unwrap();
        assert_eq!(c.rule_count(), 3);
        assert_eq!(c.classify_message("Foo", "perkele").level, ViolationLevel::Ok);
    }

    #[test]
    fn rejects_ok_level_rule() {
        let yaml = "rules:\n  - id: x\n    title: X\n    level: OK\n    patterns: ['a']\n";
        assert!(matches!(
            RuleClassifier::parse_yaml(yaml, "test"),
            Err(ModerationError::RuleValidation { .. })
        ));
    }

    #[test]
    fn rejects_rule_without_patterns() {
        let yaml = "rules:\n  - id: x\n    title: X\n    level: MINOR\n    patterns: []\n";
        assert!(RuleClassifier::parse_yaml(yaml, "test").is_err());
    }

    #[test]
    fn rejects_invalid_regex() {
        let rule = ModerationRule {
            id: "broken".to_owned(),
            title: "Broken".to_owned(),
            description: String::new(),
            level: ViolationLevel::Minor,
            scope: RuleScope::Both,
            enabled: true,
            patterns: vec!["(unclosed".to_owned()],
        };
        assert!(matches!(
            RuleClassifier::new(vec![rule]),
            Err(ModerationError::RuleValidation { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut rules = RuleClassifier::parse_yaml(RULES_YAML, "test").unwrap();
        rules.push(rules[0].clone());
        assert!(RuleClassifier::new(rules).is_err());
    }

    #[test]
    fn invalid_yaml_is_load_error() {
        assert!(matches!(
            RuleClassifier::parse_yaml("rules: [", "broken.yml"),
            Err(ModerationError::RuleLoad { .. })
        ));
    }

    #[test]
    fn empty_classifier_accepts_everything() {
        let c = RuleClassifier::default();
        assert_eq!(c.classify_message("Foo", "anything").level, ViolationLevel::Ok);
    }

    #[tokio::test]
    async fn load_directory_merges_files_and_skips_broken_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), RULES_YAML).unwrap();
        std::fs::write(dir.path().join("b.yaml"), "rules: [").unwrap();
        std::fs::write(
            dir.path().join("c.yml"),
            "rules:\n  - id: profanity\n    title: Dup\n    level: MINOR\n    patterns: ['x']\n  - id: spam\n    title: Spam\n    level: MINOR\n    patterns: ['(?:ha){5,}']\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let c = RuleClassifier::load(dir.path()).await.unwrap();
        // a.yml 4개 + c.yml의 spam (중복 profanity 제외)
        assert_eq!(c.rule_count(), 5);
    }

    #[tokio::test]
    async fn load_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = RuleClassifier::load(dir.path().join("missing")).await;
        assert!(matches!(result, Err(ModerationError::RuleLoad { .. })));
    }
}
