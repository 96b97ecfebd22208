//! S1 — Fetch collector (spec §4.1). Pulls each configured source
//! concurrently, normalizes whatever it finds into [`RawItem`]s, and never
//! fails the stage over a single bad source, mirroring
//! `recommendation::crawler::run_crawl`'s per-source `inspect_err`/`unwrap_or_default`
//! pattern.

mod rss;

use std::time::Duration;

use chrono::Utc;
use futures::stream::StreamExt;

use crate::config::{PipelineConfig, SourceEntry};
use crate::model::{RawItem, SourceKind};

const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 3600);

pub struct FetchServices {
    pub http: reqwest::Client,
}

/// Fetch every enabled source concurrently (one task per source, no shared
/// cap, per spec §5) and merge into a single deduplicated, freshness-filtered
/// list capped at `max_items`.
#[tracing::instrument(skip(services, config, sources))]
pub async fn collect(
    services: &FetchServices,
    config: &PipelineConfig,
    sources: &[SourceEntry],
    max_items: usize,
) -> (Vec<RawItem>, Vec<crate::model::LogEntry>) {
    let mut log = Vec::new();
    let enabled: Vec<&SourceEntry> = sources.iter().filter(|s| s.enabled).collect();

    if enabled.is_empty() {
        log.push(log_entry("fetch", crate::model::LogLevel::Warn, "no enabled sources configured"));
        return (Vec::new(), log);
    }

    let fan_out = enabled.len();
    let results: Vec<Result<Vec<RawItem>, (String, eyre::Error)>> = futures::stream::iter(enabled)
        .map(|source| {
            let http = services.http.clone();
            let source = source.clone();
            async move {
                fetch_source(&http, &source)
                    .await
                    .map_err(|err| (source.id.clone(), err))
            }
        })
        .buffer_unordered(fan_out)
        .collect()
        .await;

    let mut seen_ids = std::collections::HashSet::new();
    let mut items = Vec::new();
    let cutoff = Utc::now() - chrono::Duration::from_std(DEFAULT_FRESHNESS_WINDOW).unwrap();

    for result in results {
        match result {
            Ok(fetched) => {
                for item in fetched {
                    if item.published_at < cutoff {
                        continue;
                    }
                    if seen_ids.insert(item.id.clone()) {
                        items.push(item);
                    }
                }
            }
            Err((source_id, err)) => {
                tracing::warn!(source_id, ?err, "source fetch failed");
                log.push(log_entry(
                    "fetch",
                    crate::model::LogLevel::Warn,
                    &format!("source `{source_id}` failed: {err}"),
                ));
            }
        }
    }

    let _ = config;
    items.truncate(max_items);
    (items, log)
}

fn log_entry(stage: &'static str, level: crate::model::LogLevel, message: &str) -> crate::model::LogEntry {
    crate::model::LogEntry {
        stage,
        level,
        message: message.to_string(),
        at: Utc::now(),
    }
}

async fn fetch_source(http: &reqwest::Client, source: &SourceEntry) -> Result<Vec<RawItem>, eyre::Error> {
    let items = match source.kind {
        SourceKind::Feed => rss::fetch_feed(http, source).await?,
        SourceKind::Video => fetch_video_metadata(http, source).await?,
    };

    let limit = source.max_items.unwrap_or(u32::MAX) as usize;
    Ok(items.into_iter().take(limit).collect())
}

/// Video/YouTube metadata source. The teacher has no video-ingestion
/// analogue; this stub normalizes whatever a metadata endpoint returns into
/// the same `RawItem` shape as a feed item, matching the fetch contract of
/// spec §4.1. A real deployment plugs in a provider-specific metadata client
/// here.
async fn fetch_video_metadata(
    http: &reqwest::Client,
    source: &SourceEntry,
) -> Result<Vec<RawItem>, eyre::Error> {
    #[derive(serde::Deserialize)]
    struct VideoEntry {
        id: String,
        title: String,
        description: Option<String>,
        url: String,
        published_at: chrono::DateTime<Utc>,
    }

    let resp = http.get(&source.location).send().await?;
    let entries: Vec<VideoEntry> = resp.json().await.unwrap_or_default();
    let fetched_at = Utc::now();

    Ok(entries
        .into_iter()
        .map(|e| RawItem {
            id: item_id(&source.id, &e.url),
            source_id: source.id.clone(),
            source_kind: SourceKind::Video,
            title: e.title,
            body: e.description.unwrap_or_default(),
            url: e.url,
            published_at: e.published_at,
            fetched_at,
        })
        .collect())
}

pub fn item_id(source_id: &str, url: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source_id.hash(&mut hasher);
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_is_stable_for_same_source_and_url() {
        let a = item_id("feed-a", "https://example.com/post");
        let b = item_id("feed-a", "https://example.com/post");
        assert_eq!(a, b);
    }

    #[test]
    fn item_id_differs_across_sources() {
        let a = item_id("feed-a", "https://example.com/post");
        let b = item_id("feed-b", "https://example.com/post");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn collect_returns_empty_with_no_enabled_sources() {
        let services = FetchServices {
            http: reqwest::Client::new(),
        };
        let cli = crate::config::CliArgs {
            max_items: 30,
            edition: "daily".to_string(),
            output_dir: "drafts".into(),
            dry_run: true,
            embedding_model: "AllMiniLML12V2".to_string(),
            embedding_dimensions: 384,
            sources_file: "sources.json".into(),
        };
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "test");
        }
        let config = PipelineConfig::new_from_env(&cli).unwrap();
        let (items, log) = collect(&services, &config, &[], 30).await;
        assert!(items.is_empty());
        assert_eq!(log.len(), 1);
    }
}
