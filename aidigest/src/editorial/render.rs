//! Pure-function Markdown rendering for the assembled newsletter, grounded
//! on the teacher's `handlebars`-based rendering style.

use std::sync::LazyLock;

use handlebars::Handlebars;
use serde::Serialize;

use crate::model::ProcessedArticle;

const TEMPLATE: &str = r#"# AI Daily Digest

{{lead}}

## Contents

{{#each toc}}
{{this.number}}. {{this.title}}
{{/each}}

{{#each articles}}
## {{this.display_title}}

{{#each this.bullets}}
- {{this}}
{{/each}}

**Sources:**
{{#each this.citations}}
- [{{this.source_display_name}}]({{this.url}}) — {{this.summary}}
{{/each}}

{{/each}}
"#;

static HANDLEBARS: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut hb = Handlebars::new();
    hb.register_template_string("newsletter", TEMPLATE)
        .expect("newsletter template must compile");
    hb
});

#[derive(Serialize)]
struct TocEntry {
    number: usize,
    title: String,
}

#[derive(Serialize)]
struct RenderArticle {
    display_title: String,
    bullets: Vec<String>,
    citations: Vec<RenderCitation>,
}

#[derive(Serialize)]
struct RenderCitation {
    source_display_name: String,
    url: String,
    summary: String,
}

#[derive(Serialize)]
struct RenderContext<'a> {
    lead: &'a str,
    toc: Vec<TocEntry>,
    articles: Vec<RenderArticle>,
}

/// The final assembled newsletter (spec §4.7 output).
pub struct Newsletter {
    pub lead: String,
    pub toc: Vec<String>,
    pub articles: Vec<ProcessedArticle>,
    pub markdown: String,
}

/// Render `lead`, `toc`, and `articles` into the single Markdown artifact
/// (spec §6's rendered-output contract). A pure function of its inputs.
pub fn render_markdown(lead: &str, toc: &[String], articles: &[ProcessedArticle]) -> String {
    let toc_entries = toc
        .iter()
        .enumerate()
        .map(|(i, title)| TocEntry { number: i + 1, title: title.clone() })
        .collect();

    let render_articles = articles
        .iter()
        .map(|a| RenderArticle {
            display_title: a.display_title.clone(),
            bullets: a.summarized.summary.bullets.clone(),
            citations: a
                .citations
                .iter()
                .map(|c| RenderCitation {
                    source_display_name: c.source_display_name.clone(),
                    url: c.url.clone(),
                    summary: c.summary.clone(),
                })
                .collect(),
        })
        .collect();

    let context = RenderContext { lead, toc: toc_entries, articles: render_articles };

    HANDLEBARS.render("newsletter", &context).unwrap_or_else(|err| {
        tracing::error!(?err, "newsletter template render failed, falling back to plain join");
        plain_fallback(lead, toc, articles)
    })
}

fn plain_fallback(lead: &str, toc: &[String], articles: &[ProcessedArticle]) -> String {
    let mut out = String::new();
    out.push_str("# AI Daily Digest\n\n");
    out.push_str(lead);
    out.push_str("\n\n## Contents\n\n");
    for (i, title) in toc.iter().enumerate() {
        out.push_str(&format!("{}. {title}\n", i + 1));
    }
    for article in articles {
        out.push_str(&format!("\n## {}\n\n", article.display_title));
        for bullet in &article.summarized.summary.bullets {
            out.push_str(&format!("- {bullet}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fallback_contains_every_title() {
        let toc = vec!["First".to_string(), "Second".to_string()];
        let out = plain_fallback("Lead text.", &toc, &[]);
        assert!(out.contains("1. First"));
        assert!(out.contains("2. Second"));
    }
}
