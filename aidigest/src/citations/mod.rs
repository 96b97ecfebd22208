//! S6 — citation assembler (spec §4.6). Builds 1-3 citations per article:
//! the article's own source first, then cluster siblings in S5 order, then
//! S4a consolidation siblings, followed by a post-generation global
//! dedup/redistribution pass.

use std::collections::HashSet;

use futures::stream::StreamExt;

use crate::config::PipelineConfig;
use crate::model::{Citation, ProcessedArticle, TopicCluster};

const WHITELISTED_PARAMS: &[&str] = &["id", "post_id", "article_id", "p", "postid"];

/// Lowercase scheme/host, strip trailing path slash, drop query/fragment
/// except whitelisted identifier params (spec §4.6 "URL normalization").
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return raw.trim().to_lowercase();
    };

    let _ = url.set_scheme(&url.scheme().to_lowercase());
    if let Some(host) = url.host_str() {
        let host = host.to_lowercase();
        let _ = url.set_host(Some(&host));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| WHITELISTED_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&kept);
    }
    url.set_fragment(None);

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { &path });

    url.to_string()
}

fn source_display_name(source_id: &str) -> String {
    source_id
        .split(['-', '_'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn summarize_citation(router: &crate::llm::LlmRouter, title: &str, body: &str) -> String {
    let prompt = crate::prompts::citation_summary_prompt(title, body);
    if let Ok(Some(text)) = router.generate_text(&prompt).await {
        let report = crate::validation::validate_text(&text, crate::validation::TextKind::CitationSummary, false);
        if !report.has_errors() {
            return text;
        }
    }
    fallback_citation_summary(title, body)
}

fn fallback_citation_summary(title: &str, body: &str) -> String {
    let text = if body.chars().count() > 40 { body } else { title };
    let truncated: String = text.chars().take(117).collect();
    crate::validation::ensure_terminal_form(truncated.trim_end())
}

fn article_domain_tags(article: &ProcessedArticle) -> Vec<&'static str> {
    let text = format!(
        "{} {}",
        article.summarized.scored.item.title,
        article.summarized.summary.bullets.join(" ")
    );
    crate::cluster::classify_domain_tags(&text)
}

fn sibling_domain_tags(sibling: &crate::model::ConsolidatedSibling) -> Vec<&'static str> {
    let text = format!("{} {}", sibling.title, sibling.body);
    crate::cluster::classify_domain_tags(&text)
}

fn conflicts(a: &[&'static str], b: &[&'static str]) -> bool {
    a.iter().any(|&ta| b.iter().any(|&tb| crate::cluster::mutually_exclusive(ta, tb)))
}

/// Generate citations for one article given its cluster siblings (spec
/// §4.6's per-article algorithm).
async fn citations_for_one(
    config: &PipelineConfig,
    router: &crate::llm::LlmRouter,
    article: &ProcessedArticle,
    siblings: &[&ProcessedArticle],
) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut used_urls = HashSet::new();
    let mut used_sources = HashSet::new();

    let own_url = normalize_url(article.url());
    citations.push(Citation {
        source_display_name: source_display_name(article.source_id()),
        url: article.url().to_string(),
        original_title: article.summarized.scored.item.title.clone(),
        summary: summarize_citation(router, &article.summarized.scored.item.title, &article.summarized.summary.bullets.join(" ")).await,
    });
    used_urls.insert(own_url);
    used_sources.insert(article.source_id().to_string());

    let own_tags = article_domain_tags(article);

    for sibling in siblings {
        if citations.len() >= config.max_citations_per_article {
            break;
        }
        let normalized = normalize_url(sibling.url());
        if used_urls.contains(&normalized) || used_sources.contains(sibling.source_id()) {
            continue;
        }
        if conflicts(&own_tags, &article_domain_tags(sibling)) {
            continue;
        }

        let summary = summarize_citation(
            router,
            &sibling.summarized.scored.item.title,
            &sibling.summarized.summary.bullets.join(" "),
        )
        .await;

        used_urls.insert(normalized);
        used_sources.insert(sibling.source_id().to_string());
        citations.push(Citation {
            source_display_name: source_display_name(sibling.source_id()),
            url: sibling.url().to_string(),
            original_title: sibling.summarized.scored.item.title.clone(),
            summary,
        });
    }

    // S4a consolidation siblings: same-story items from other sources that were
    // folded into this article before it ever reached S5 clustering. They never
    // became their own `ProcessedArticle`, so they're not covered by
    // `siblings_for`'s cluster-membership lookup above — this pool is the only
    // place they can surface as citations.
    for sibling in &article.consolidated_siblings {
        if citations.len() >= config.max_citations_per_article {
            break;
        }
        let normalized = normalize_url(&sibling.url);
        if used_urls.contains(&normalized) || used_sources.contains(&sibling.source_id) {
            continue;
        }
        if conflicts(&own_tags, &sibling_domain_tags(sibling)) {
            continue;
        }

        let summary = summarize_citation(router, &sibling.title, &sibling.body).await;

        used_urls.insert(normalized);
        used_sources.insert(sibling.source_id.clone());
        citations.push(Citation {
            source_display_name: source_display_name(&sibling.source_id),
            url: sibling.url.clone(),
            original_title: sibling.title.clone(),
            summary,
        });
    }

    citations
}

fn siblings_for<'a>(article: &ProcessedArticle, clusters: &[TopicCluster], articles: &'a [ProcessedArticle]) -> Vec<&'a ProcessedArticle> {
    let Some(cluster) = clusters.iter().find(|c| c.member_ids().any(|id| id == article.id())) else {
        return Vec::new();
    };
    cluster
        .member_ids()
        .filter(|id| *id != article.id())
        .filter_map(|id| articles.iter().find(|a| a.id() == id))
        .collect()
}

/// Run S6 over the context/cluster output, applying the per-article
/// generation pass then the global post-generation dedup/redistribution
/// pass (spec §4.6).
#[tracing::instrument(skip(config, router, articles, clusters))]
pub async fn assemble(
    config: &PipelineConfig,
    router: &crate::llm::LlmRouter,
    articles: Vec<ProcessedArticle>,
    clusters: &[TopicCluster],
) -> Vec<ProcessedArticle> {
    let cap = config.citation_concurrency;
    let per_article: Vec<Vec<Citation>> = futures::stream::iter(articles.iter().enumerate())
        .map(|(idx, article)| {
            let siblings = siblings_for(article, clusters, &articles);
            async move { (idx, citations_for_one(config, router, article, &siblings).await) }
        })
        .buffer_unordered(cap)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .fold(vec![Vec::new(); articles.len()], |mut acc, (idx, cites)| {
            acc[idx] = cites;
            acc
        });

    redistribute(config, articles, per_article)
}

/// Pool all citations, dedup by normalized URL (first claimant across the
/// whole run wins, except an article's own-source citation is always kept),
/// then redistribute so every article retains ≥1 citation (spec §4.6
/// "Post-generation dedup pass").
fn redistribute(config: &PipelineConfig, mut articles: Vec<ProcessedArticle>, per_article: Vec<Vec<Citation>>) -> Vec<ProcessedArticle> {
    let own_urls: Vec<String> = articles.iter().map(|a| normalize_url(a.url())).collect();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut deduped: Vec<Vec<Citation>> = Vec::with_capacity(per_article.len());

    for (idx, citations) in per_article.into_iter().enumerate() {
        let mut kept = Vec::new();
        for citation in citations {
            let normalized = normalize_url(&citation.url);
            let is_own = normalized == own_urls[idx];
            if !is_own && claimed.contains(&normalized) {
                continue;
            }
            claimed.insert(normalized);
            kept.push(citation);
        }
        deduped.push(kept);
    }

    for (article, citations) in articles.iter_mut().zip(deduped.into_iter()) {
        let citations = if citations.is_empty() {
            vec![Citation {
                source_display_name: source_display_name(article.source_id()),
                url: article.url().to_string(),
                original_title: article.summarized.scored.item.title.clone(),
                summary: fallback_citation_summary(
                    &article.summarized.scored.item.title,
                    &article.summarized.summary.bullets.join(" "),
                ),
            }]
        } else {
            citations
        };
        article.citations = citations.into_iter().take(config.max_citations_per_article).collect();
    }

    articles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_lowercases_host_and_strips_trailing_slash() {
        let a = normalize_url("https://Example.com/post/123/");
        let b = normalize_url("https://example.com/post/123");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_url_drops_non_whitelisted_query_params() {
        let a = normalize_url("https://example.com/post?utm_source=x&id=7");
        assert!(a.contains("id=7"));
        assert!(!a.contains("utm_source"));
    }

    #[test]
    fn source_display_name_title_cases_hyphenated_ids() {
        assert_eq!(source_display_name("tech-crunch"), "Tech Crunch");
    }
}
