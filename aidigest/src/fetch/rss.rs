//! RSS 2.0 / Atom feed parsing, grounded on the pack's
//! `blz-core::discovery::sitemap` hand-rolled `quick_xml::Reader` event loop
//! (no `rss`/`atom_syndication` dependency needed, same low-level approach).

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::config::SourceEntry;
use crate::model::{RawItem, SourceKind};

struct RawEntry {
    title: String,
    link: String,
    body: String,
    published: Option<DateTime<Utc>>,
}

pub async fn fetch_feed(http: &reqwest::Client, source: &SourceEntry) -> Result<Vec<RawItem>, eyre::Error> {
    let body = http
        .get(&source.location)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let entries = parse_feed(&body)?;
    let fetched_at = Utc::now();

    Ok(entries
        .into_iter()
        .map(|e| RawItem {
            id: super::item_id(&source.id, &e.link),
            source_id: source.id.clone(),
            source_kind: SourceKind::Feed,
            title: e.title,
            body: e.body,
            url: e.link,
            published_at: e.published.unwrap_or(fetched_at),
            fetched_at,
        })
        .collect())
}

fn parse_feed(xml: &str) -> Result<Vec<RawEntry>, eyre::Error> {
    if xml.contains("<feed") {
        parse_atom(xml)
    } else {
        parse_rss(xml)
    }
}

fn parse_rss(xml: &str) -> Result<Vec<RawEntry>, eyre::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    let mut in_item = false;
    let mut current_element: Option<String> = None;
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut published = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "item" => {
                        in_item = true;
                        title.clear();
                        link.clear();
                        description.clear();
                        published = None;
                    }
                    "title" | "link" | "description" | "pubDate" if in_item => {
                        current_element = Some(name);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "item" && in_item {
                    if !link.is_empty() {
                        entries.push(RawEntry {
                            title: title.clone(),
                            link: link.clone(),
                            body: description.clone(),
                            published,
                        });
                    }
                    in_item = false;
                }
                current_element = None;
            }
            Ok(Event::Text(e)) | Ok(Event::CData(e)) => {
                if let Some(ref element) = current_element {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    match element.as_str() {
                        "title" => title = text,
                        "link" => link = text,
                        "description" => description = text,
                        "pubDate" => published = parse_rfc2822_or_3339(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(eyre::eyre!("RSS parse error: {err}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn parse_atom(xml: &str) -> Result<Vec<RawEntry>, eyre::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    let mut in_entry = false;
    let mut current_element: Option<String> = None;
    let mut title = String::new();
    let mut link = String::new();
    let mut summary = String::new();
    let mut published = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "entry" {
                    in_entry = true;
                    title.clear();
                    link.clear();
                    summary.clear();
                    published = None;
                } else if name == "link" && in_entry {
                    if let Some(href) = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"href")
                    {
                        link = String::from_utf8_lossy(&href.value).to_string();
                    }
                } else if matches!(name.as_str(), "title" | "summary" | "content" | "published" | "updated")
                    && in_entry
                {
                    current_element = Some(name);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "link" && in_entry {
                    if let Some(href) = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"href")
                    {
                        link = String::from_utf8_lossy(&href.value).to_string();
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "entry" && in_entry {
                    if !link.is_empty() {
                        entries.push(RawEntry {
                            title: title.clone(),
                            link: link.clone(),
                            body: summary.clone(),
                            published,
                        });
                    }
                    in_entry = false;
                }
                current_element = None;
            }
            Ok(Event::Text(e)) | Ok(Event::CData(e)) => {
                if let Some(ref element) = current_element {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    match element.as_str() {
                        "title" => title = text,
                        "summary" | "content" => summary = text,
                        "published" | "updated" if published.is_none() => {
                            published = parse_rfc2822_or_3339(&text);
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(eyre::eyre!("Atom parse error: {err}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn parse_rfc2822_or_3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_rss_item() {
        let xml = r#"<?xml version="1.0"?>
        <rss><channel>
          <item>
            <title>Model ships</title>
            <link>https://example.com/a</link>
            <description>Body text</description>
            <pubDate>Tue, 01 Jul 2025 12:00:00 GMT</pubDate>
          </item>
        </channel></rss>"#;

        let entries = parse_rss(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/a");
        assert!(entries[0].published.is_some());
    }

    #[test]
    fn parses_basic_atom_entry() {
        let xml = r#"<?xml version="1.0"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <title>Model ships</title>
            <link href="https://example.com/b"/>
            <summary>Body text</summary>
            <updated>2025-07-01T12:00:00Z</updated>
          </entry>
        </feed>"#;

        let entries = parse_atom(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/b");
    }

    #[test]
    fn skips_items_without_a_link() {
        let xml = r#"<?xml version="1.0"?>
        <rss><channel>
          <item><title>No link</title></item>
        </channel></rss>"#;
        assert!(parse_rss(xml).unwrap().is_empty());
    }
}
