//! Shared content validation rules (spec §4.8). Applied to summary bullets,
//! display titles, lead paragraphs, and citation summaries alike; callers
//! pick the bounds via [`TextKind`] and interpret the resulting [`Report`].

pub mod rules;

use rules::*;

/// Which validation profile to apply — the bullet-length bounds differ
/// between a summary bullet and a citation summary (spec §4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKind {
    SummaryBullet,
    CitationSummary,
    DisplayTitle,
    LeadParagraph,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLevel {
    Failed,
    Poor,
    Acceptable,
    Good,
    Excellent,
}

#[derive(Clone, Debug)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub score: f64,
    pub level: QualityLevel,
}

impl Report {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }
}

fn score_findings(findings: Vec<Finding>) -> Report {
    let mut score = 1.0f64;
    for f in &findings {
        score -= match f.severity {
            Severity::Error => 0.3,
            Severity::Warning => 0.1,
            Severity::Info => 0.05,
        };
    }
    let score = score.max(0.0);
    let has_error = findings.iter().any(|f| f.severity == Severity::Error);
    let level = if has_error {
        QualityLevel::Failed
    } else if score >= 0.9 {
        QualityLevel::Excellent
    } else if score >= 0.8 {
        QualityLevel::Good
    } else if score >= 0.6 {
        QualityLevel::Acceptable
    } else {
        QualityLevel::Poor
    };
    Report {
        findings,
        score,
        level,
    }
}

/// Strip meta-artifacts (acknowledgment preambles, markdown fences, numbered
/// prefixes, enclosing quotes) from LLM-generated prose. Returns `None` when
/// the cleaned text lost the original's load-bearing content (a number or a
/// proper noun, approximated here as any uppercase-initial word).
pub fn strip_meta_artifacts(text: &str) -> Option<String> {
    let mut cleaned = text.trim().to_string();

    for fence in ["```json", "```markdown", "```"] {
        if let Some(stripped) = cleaned.strip_prefix(fence) {
            cleaned = stripped.trim_start().to_string();
        }
        if let Some(stripped) = cleaned.strip_suffix("```") {
            cleaned = stripped.trim_end().to_string();
        }
    }

    for preamble in META_PREAMBLES {
        if let Some(rest) = cleaned
            .to_lowercase()
            .strip_prefix(&preamble.to_lowercase())
        {
            cleaned = cleaned[cleaned.len() - rest.len()..].trim_start().to_string();
        }
    }

    let numbered = cleaned
        .trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == ' ');
    if numbered.len() != cleaned.trim_start().len() {
        cleaned = numbered.to_string();
    }

    let trimmed = cleaned.trim();
    if trimmed.len() >= 2 {
        let first = trimmed.chars().next().unwrap();
        let last = trimmed.chars().last().unwrap();
        let enclosing = matches!((first, last), ('"', '"') | ('\u{300c}', '\u{300d}') | ('\'', '\''));
        if enclosing {
            cleaned = trimmed[first.len_utf8()..trimmed.len() - last.len_utf8()].to_string();
        }
    }

    let cleaned = cleaned.trim().to_string();
    let kept_signal = text.chars().any(|c| c.is_ascii_digit())
        && !cleaned.chars().any(|c| c.is_ascii_digit())
        || text.chars().any(|c| c.is_uppercase())
            && !cleaned.chars().any(|c| c.is_uppercase());

    if cleaned.is_empty() || kept_signal {
        None
    } else {
        Some(cleaned)
    }
}

/// Auto-append a terminator to a bullet lacking one (spec §4.8 "terminal form").
pub fn ensure_terminal_form(text: &str) -> String {
    let trimmed = text.trim_end();
    if TERMINAL_FORMS.iter().any(|t| trimmed.ends_with(t)) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}

fn contains_forbidden_token(text: &str) -> bool {
    FORBIDDEN_TOKENS.iter().any(|tok| text.contains(tok))
}

fn has_specificity(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        || text
            .split_whitespace()
            .any(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
}

/// Validate a single bullet against the bounds for `kind` (spec §4.8).
pub fn validate_text(text: &str, kind: TextKind, production_mode: bool) -> Report {
    let mut findings = Vec::new();
    let len = text.chars().count();

    let (min_len, max_len) = match kind {
        TextKind::SummaryBullet => (BULLET_MIN_LEN, BULLET_MAX_LEN),
        TextKind::CitationSummary => (CITATION_MIN_LEN, CITATION_MAX_LEN),
        TextKind::DisplayTitle => (TITLE_MIN_LEN, TITLE_MAX_LEN),
        TextKind::LeadParagraph => (1, LEAD_PARAGRAPH_MAX_LEN),
    };
    let effective_min = if production_mode && kind == TextKind::SummaryBullet {
        min_len.max(PRODUCTION_BULLET_MIN_LEN)
    } else {
        min_len
    };

    if len < effective_min || len > max_len {
        findings.push(Finding {
            severity: Severity::Error,
            message: format!("length {len} outside [{effective_min}, {max_len}]"),
        });
    }

    if contains_forbidden_token(text) {
        findings.push(Finding {
            severity: Severity::Error,
            message: "contains a forbidden demonstrative token".to_string(),
        });
    }

    if matches!(kind, TextKind::SummaryBullet) && !TERMINAL_FORMS.iter().any(|t| text.trim_end().ends_with(t)) {
        findings.push(Finding {
            severity: Severity::Warning,
            message: "missing recognized sentence-terminal form".to_string(),
        });
    }

    if !has_specificity(text) {
        findings.push(Finding {
            severity: Severity::Warning,
            message: "no number or proper noun present".to_string(),
        });
    }

    if production_mode
        && kind == TextKind::DisplayTitle
        && len < PRODUCTION_TITLE_MIN_LEN
        && !AI_DOMAIN_TOKENS.iter().any(|tok| text.contains(tok))
    {
        findings.push(Finding {
            severity: Severity::Error,
            message: "title too short without an AI/tech-domain token".to_string(),
        });
    }

    score_findings(findings)
}

/// Politeness/repetition checks applied across a whole bullet set (spec
/// §4.8 "politeness consistency", "repetition").
pub fn validate_bullet_set(bullets: &[String]) -> Report {
    let mut findings = Vec::new();

    if !(BULLET_COUNT_MIN..=BULLET_COUNT_MAX).contains(&bullets.len()) {
        findings.push(Finding {
            severity: Severity::Error,
            message: format!(
                "bullet count {} outside [{BULLET_COUNT_MIN}, {BULLET_COUNT_MAX}]",
                bullets.len()
            ),
        });
    }

    let polite = bullets
        .iter()
        .filter(|b| POLITE_ENDINGS.iter().any(|e| b.trim_end().ends_with(e)))
        .count();
    if !bullets.is_empty() {
        let ratio = polite as f64 / bullets.len() as f64;
        if ratio > 0.0 && ratio < 1.0 && (1.0 - ratio).min(ratio) > 0.3 {
            findings.push(Finding {
                severity: Severity::Warning,
                message: "mixed polite/plain forms beyond 30% ratio".to_string(),
            });
        }
    }

    let mut token_counts = std::collections::HashMap::new();
    for bullet in bullets {
        for word in bullet.split_whitespace().filter(|w| w.chars().count() > 2) {
            *token_counts.entry(word.to_string()).or_insert(0usize) += 1;
        }
    }
    if token_counts.values().any(|&c| c > 2) {
        findings.push(Finding {
            severity: Severity::Warning,
            message: "content-bearing token repeats more than twice".to_string(),
        });
    }

    score_findings(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_acknowledgment_preamble_and_fences() {
        let raw = "```json\nHere is the summary: OpenAI released GPT-5 today.\n```";
        let cleaned = strip_meta_artifacts(raw).expect("should keep numeric/proper-noun content");
        assert!(cleaned.contains("OpenAI"));
        assert!(!cleaned.to_lowercase().contains("here is"));
    }

    #[test]
    fn empty_after_cleaning_is_none() {
        assert!(strip_meta_artifacts("Understood.").is_none());
    }

    #[test]
    fn terminal_form_is_appended_when_missing() {
        assert_eq!(ensure_terminal_form("the model shipped today"), "the model shipped today.");
        assert_eq!(ensure_terminal_form("it shipped."), "it shipped.");
    }

    #[test]
    fn bullet_count_out_of_range_is_an_error() {
        let bullets = vec!["one.".to_string(), "two.".to_string()];
        let report = validate_bullet_set(&bullets);
        assert!(report.has_errors());
    }

    #[test]
    fn valid_bullet_scores_acceptable_or_better() {
        let text = "OpenAI released a new model with 40% faster inference today.";
        let report = validate_text(text, TextKind::SummaryBullet, false);
        assert!(report.level >= QualityLevel::Acceptable);
    }
}
