//! Tolerant response parsing (spec §4.3): direct JSON, fenced JSON,
//! brace-matched JSON, then a bullet/sentence fallback.

use serde::Deserialize;

use crate::model::{Summary, SourceReliability};
use crate::validation::strip_meta_artifacts;

#[derive(Deserialize)]
struct SummarySchema {
    bullets: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    source_reliability: Option<String>,
}

fn reliability_from_str(s: Option<&str>) -> SourceReliability {
    match s.map(str::to_lowercase).as_deref() {
        Some("high") => SourceReliability::High,
        Some("low") => SourceReliability::Low,
        _ => SourceReliability::Medium,
    }
}

fn extract_fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    Some(after_fence[..end].trim())
}

fn extract_brace_matched_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn schema_to_summary(schema: SummarySchema, provider: &str) -> Option<Summary> {
    if !(3..=4).contains(&schema.bullets.len()) {
        return None;
    }
    Some(Summary {
        bullets: schema.bullets,
        confidence: schema.confidence.unwrap_or(0.7).clamp(0.0, 1.0),
        source_reliability: reliability_from_str(schema.source_reliability.as_deref()),
        producing_model: provider.to_string(),
        fallback_used: false,
    })
}

/// Try, in order: direct JSON, fenced JSON, brace-matched JSON. Returns
/// `None` if none of the three shapes parse into a valid 3-4 bullet summary
/// — callers fall back to [`fallback_bullets`].
pub fn parse_summary_response(raw: &str, provider: &str) -> Option<Summary> {
    let trimmed = raw.trim();

    if let Ok(schema) = serde_json::from_str::<SummarySchema>(trimmed) {
        if let Some(summary) = schema_to_summary(schema, provider) {
            return Some(summary);
        }
    }

    if let Some(fenced) = extract_fenced_json(trimmed) {
        if let Ok(schema) = serde_json::from_str::<SummarySchema>(fenced) {
            if let Some(summary) = schema_to_summary(schema, provider) {
                return Some(summary);
            }
        }
    }

    if let Some(braced) = extract_brace_matched_json(trimmed) {
        if let Ok(schema) = serde_json::from_str::<SummarySchema>(braced) {
            if let Some(summary) = schema_to_summary(schema, provider) {
                return Some(summary);
            }
        }
    }

    None
}

/// Bullet/sentence fallback (spec §4.3 shape (d)): split into sentences of
/// at least 30 chars, with meta-preambles stripped, take 3-4.
pub fn fallback_bullets(raw: &str, provider: &str) -> Summary {
    let cleaned = strip_meta_artifacts(raw).unwrap_or_else(|| raw.trim().to_string());

    let mut bullets: Vec<String> = cleaned
        .split(['.', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().count() >= 30)
        .map(|s| crate::validation::ensure_terminal_form(s))
        .take(4)
        .collect();

    while bullets.len() < 3 {
        bullets.push("Details were not available from the source in a structured form.".to_string());
    }

    Summary {
        bullets,
        confidence: 0.3,
        source_reliability: SourceReliability::Low,
        producing_model: provider.to_string(),
        fallback_used: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json() {
        let raw = r#"{"bullets": ["a is very relevant and quite long enough.", "b is also notably long.", "c concludes the summary nicely."], "confidence": 0.8, "source_reliability": "high"}"#;
        let summary = parse_summary_response(raw, "primary").unwrap();
        assert_eq!(summary.bullets.len(), 3);
        assert_eq!(summary.source_reliability, SourceReliability::High);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"bullets\": [\"first bullet point is long enough.\", \"second bullet point also long.\", \"third bullet point wraps up.\"]}\n```";
        assert!(parse_summary_response(raw, "primary").is_some());
    }

    #[test]
    fn parses_brace_matched_json_amid_prose() {
        let raw = "Sure, here you go: {\"bullets\": [\"first bullet point is long enough.\", \"second bullet point also long.\", \"third bullet point wraps up.\"]} Hope that helps!";
        assert!(parse_summary_response(raw, "primary").is_some());
    }

    #[test]
    fn falls_back_to_bullets_when_nothing_parses() {
        let raw = "Here is the deal. The model launched today with strong benchmarks across the board. Pricing dropped by a wide margin overall.";
        let summary = fallback_bullets(raw, "fallback-1");
        assert!(summary.fallback_used);
        assert!(summary.bullets.len() >= 3);
    }
}
