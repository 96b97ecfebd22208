//! Centralized prompt templates (spec §4.3, §4.4, §4.5, §4.7). Keeping
//! every prompt string in one module mirrors `discord/constants.rs`'s
//! practice of pulling prompt text out of call sites.

/// S3's per-item summarization prompt.
pub fn summarize_prompt(title: &str, body: &str, url: &str, source: &str) -> String {
    format!(
        "You summarize AI industry news for a daily digest.\n\n\
         Source: {source}\n\
         URL: {url}\n\
         Title: {title}\n\
         Body:\n{body}\n\n\
         Return JSON with this exact shape: \
         {{\"bullets\": [\"...\", \"...\", \"...\"], \"confidence\": 0.0-1.0, \"source_reliability\": \"high\"|\"medium\"|\"low\"}}.\n\
         Write 3 to 4 bullets, each a complete sentence ending in a period, each at least 50 characters, \
         each naming a specific entity, number, or product rather than a vague reference. \
         Do not use the words \"this\", \"that\", \"these\", or \"those\". \
         Do not include any acknowledgment, preamble, or text outside the JSON object."
    )
}

/// S7's title-generation prompt.
pub fn title_prompt(article_summary: &str) -> String {
    format!(
        "Write one headline for this AI news summary. The headline must name the \
         company or project involved, include a number or metric when the summary has one, \
         and use an active verb. Do not use quotation marks or a trailing period. \
         Respond with only the headline, nothing else.\n\nSummary:\n{article_summary}"
    )
}

/// S4 Phase B's contextual re-summarization prompt (spec §4.4.1).
pub fn contextual_resummarize_prompt(
    new_title: &str,
    new_bullets: &[String],
    prior_title: &str,
    prior_bullets: &[String],
) -> String {
    let new_text = new_bullets.join(" ");
    let prior_text = prior_bullets.join(" ");
    format!(
        "A new article updates an earlier one on the same story. Write 3 to 4 bullets for the \
         updated digest entry that state what is new or changed, referencing the earlier coverage \
         only when it clarifies what changed. Each bullet must be a complete sentence ending in a \
         period, at least 50 characters, with no vague demonstrative references.\n\n\
         Earlier headline: {prior_title}\n\
         Earlier summary: {prior_text}\n\n\
         New headline: {new_title}\n\
         New summary: {new_text}\n\n\
         Return JSON: {{\"bullets\": [\"...\"], \"confidence\": 0.0-1.0, \"source_reliability\": \"high\"|\"medium\"|\"low\"}}."
    )
}

/// S4 Phase B's KEEP/UPDATE/SKIP adjudication prompt.
pub fn context_adjudication_prompt(
    new_title: &str,
    new_summary: &str,
    candidates: &[(String, String)],
) -> String {
    let candidate_text = candidates
        .iter()
        .enumerate()
        .map(|(i, (title, summary))| format!("{}. {title} — {summary}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "A new article may relate to recently published ones. Decide KEEP (unrelated, publish as \
         a standalone item), UPDATE (this supersedes or extends one of the candidates; write a note \
         on what changed), or SKIP (this adds nothing a reader hasn't already seen).\n\n\
         New article:\n{new_title} — {new_summary}\n\n\
         Candidates:\n{candidate_text}\n\n\
         Respond with JSON: {{\"decision\": \"keep\"|\"update\"|\"skip\", \"references\": [\"<candidate index or id>\"], \
         \"reasoning\": \"...\"}}."
    )
}

/// S6's per-citation summary prompt.
pub fn citation_summary_prompt(title: &str, body: &str) -> String {
    format!(
        "Write one sentence, 60 to 120 characters, summarizing this source article for use as a \
         citation underneath a digest entry. No preamble, no trailing commentary, just the sentence.\n\n\
         Title: {title}\nBody:\n{body}"
    )
}

/// S5's cluster-naming prompt.
pub fn cluster_name_prompt(member_titles: &[String]) -> String {
    let joined = member_titles.join("; ");
    format!(
        "These headlines belong to the same topic cluster in an AI news digest: {joined}. \
         Write a short topic label, 2 to 5 words, naming the specific company, product, or event \
         they share. Do not write a generic label like \"AI News\" or \"Technology Update\". \
         Respond with only the label."
    )
}

/// S7's lead-paragraph prompt.
pub fn lead_paragraph_prompt(headlines: &[String]) -> String {
    let joined = headlines.join("; ");
    format!(
        "Write one lead paragraph, under 200 characters, introducing today's AI news digest given \
         these headlines: {joined}. Mention the single most significant story by name. No preamble."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_prompt_includes_source_and_url() {
        let prompt = summarize_prompt("T", "B", "https://example.com", "Example Feed");
        assert!(prompt.contains("https://example.com"));
        assert!(prompt.contains("Example Feed"));
    }

    #[test]
    fn title_prompt_forbids_quotes_and_period() {
        let prompt = title_prompt("A model shipped.");
        assert!(prompt.contains("quotation marks"));
    }
}
