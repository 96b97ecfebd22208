//! Domain-tag keyword map and mutually-exclusive pair list for S5's
//! domain-coherence guard (spec §4.5 step 4), grounded on
//! `original_source/src/utils/topic_clustering.py`'s tag map. Translated to
//! English-only keyword matching; the source carries Japanese synonyms
//! alongside the English ones since it targets a bilingual output, which
//! this crate's output language does not.

const HR_RECRUITMENT: &[&str] = &["hiring", "recruitment", "linkedin", "job search", "talent acquisition", "recruiter"];
const RESEARCH_TECHNICAL: &[&str] = &["research", "researcher", "model", "algorithm", "api", "technical", "paper", "benchmark"];
const ECONOMIC_POLICY: &[&str] = &["economy", "economic", "job losses", "layoffs", "policy", "regulation", "unemployment"];
const BUSINESS_FINANCE: &[&str] = &["investment", "funding", "ipo", "valuation", "venture", "startup", "acquisition"];
const PRODUCT_TOOLS: &[&str] = &["cli", "api", "tool", "product", "feature", "release", "launch"];
const LOCAL_INFRASTRUCTURE: &[&str] = &["ollama", "local", "infrastructure", "self-hosted", "on-prem", "edge"];

const MUTUALLY_EXCLUSIVE_PAIRS: &[(&str, &str)] = &[
    ("hr_recruitment", "research_technical"),
    ("economic_policy", "hr_recruitment"),
    ("business_finance", "research_technical"),
    ("local_infrastructure", "economic_policy"),
];

fn tag_keywords(tag: &str) -> &'static [&'static str] {
    match tag {
        "hr_recruitment" => HR_RECRUITMENT,
        "research_technical" => RESEARCH_TECHNICAL,
        "economic_policy" => ECONOMIC_POLICY,
        "business_finance" => BUSINESS_FINANCE,
        "product_tools" => PRODUCT_TOOLS,
        "local_infrastructure" => LOCAL_INFRASTRUCTURE,
        _ => &[],
    }
}

const ALL_TAGS: &[&str] = &[
    "hr_recruitment",
    "research_technical",
    "economic_policy",
    "business_finance",
    "product_tools",
    "local_infrastructure",
];

/// Return every domain tag whose keywords appear in `text` (case-insensitive).
pub fn classify_domain_tags(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    ALL_TAGS
        .iter()
        .copied()
        .filter(|tag| tag_keywords(tag).iter().any(|kw| lower.contains(kw)))
        .collect()
}

/// Whether `a` and `b` form a mutually-exclusive domain-tag pair.
pub fn mutually_exclusive(a: &str, b: &str) -> bool {
    MUTUALLY_EXCLUSIVE_PAIRS
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hr_and_research_are_mutually_exclusive() {
        assert!(mutually_exclusive("hr_recruitment", "research_technical"));
        assert!(!mutually_exclusive("hr_recruitment", "business_finance"));
    }

    #[test]
    fn classify_finds_expected_tags() {
        let tags = classify_domain_tags("OpenAI announces a new hiring push for recruiters");
        assert!(tags.contains(&"hr_recruitment"));
    }
}
