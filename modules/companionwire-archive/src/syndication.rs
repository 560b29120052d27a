// RSS/Atom connector. One fetch per configured feed URL; per-item parse
// problems are collected as errors rather than aborting the feed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use companionwire_common::error::{kind, RunError};
use companionwire_common::hashing::truncate_with_ellipsis;

use crate::connector::{Connector, FetchOutcome, FetchedItem, SourceConfig};
use crate::text_extract::strip_html;

const USER_AGENT: &str = "companionwire/0.1 (+feed ingest)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Raw text on a signal is bounded; the extract gets the same cap.
const MAX_TEXT_CHARS: usize = 20_000;

pub struct SyndicationConnector {
    client: reqwest::Client,
}

impl SyndicationConnector {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build feed HTTP client");
        Self { client }
    }
}

impl Default for SyndicationConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SyndicationConnector {
    fn can_handle(&self, source: &SourceConfig) -> bool {
        matches!(source.format.as_str(), "rss" | "atom" | "feed")
    }

    async fn fetch(&self, source: &SourceConfig) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        let bytes = match self.client.get(&source.url).send().await {
            Ok(resp) => match resp.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(feed = source.url.as_str(), error = %e, "Failed to read feed body");
                    outcome.errors.push(
                        RunError::new(kind::FETCH_ERROR, e.to_string()).with_source(&source.name),
                    );
                    return outcome;
                }
            },
            Err(e) => {
                warn!(feed = source.url.as_str(), error = %e, "Feed fetch failed");
                outcome
                    .errors
                    .push(RunError::new(kind::FETCH_ERROR, e.to_string()).with_source(&source.name));
                return outcome;
            }
        };

        match parse_feed(&bytes, source) {
            Ok(items) => {
                info!(feed = source.url.as_str(), items = items.len(), "feed: parsed successfully");
                outcome.metadata = json!({ "feed_url": source.url, "item_count": items.len() });
                outcome.items = items;
            }
            Err(e) => {
                warn!(feed = source.url.as_str(), error = %e, "Feed parse failed");
                outcome
                    .errors
                    .push(RunError::new(kind::FETCH_ERROR, e.to_string()).with_source(&source.name));
            }
        }

        outcome
    }
}

/// Parse feed XML into fetched items. Pure so tests can feed it fixture bytes.
pub fn parse_feed(bytes: &[u8], source: &SourceConfig) -> anyhow::Result<Vec<FetchedItem>> {
    let feed = feed_rs::parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            // A usable link is the one thing an item can't go without.
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            let external_id = (!entry.id.is_empty()).then(|| entry.id.clone());
            let title = entry.title.as_ref().map(|t| t.content.clone());
            let author = entry.authors.first().map(|a| a.name.clone());
            let published_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc));

            // Prefer the full content body, fall back to the summary.
            let body = entry
                .content
                .as_ref()
                .and_then(|c| c.body.clone())
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()));
            let text = body
                .map(|b| truncate_with_ellipsis(&strip_html(&b), MAX_TEXT_CHARS))
                .filter(|t| !t.is_empty());

            let payload = json!({
                "id": entry.id,
                "url": url,
                "title": title,
                "author": author,
                "published": published_at.map(|d| d.to_rfc3339()),
                "feed": source.url,
            });

            Some(FetchedItem {
                external_id,
                url,
                title,
                author,
                published_at,
                text,
                payload,
                content_type: "application/rss+xml".to_string(),
            })
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use companionwire_common::SourceKind;

    fn source() -> SourceConfig {
        SourceConfig::feed("Test Feed", SourceKind::Media, "https://news.test/feed.xml")
    }

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Companion News</title>
    <item>
      <title>Replika adds voice calls</title>
      <link>https://news.test/replika-voice</link>
      <guid>news-test-1001</guid>
      <author>jane@news.test (Jane Doe)</author>
      <pubDate>Fri, 13 Mar 2026 10:30:00 GMT</pubDate>
      <description>&lt;p&gt;Replika &lt;b&gt;launched&lt;/b&gt; voice calls today.&lt;/p&gt;&lt;script&gt;alert(1)&lt;/script&gt;</description>
    </item>
    <item>
      <title>No link item</title>
      <guid isPermaLink="false">not-a-url</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_strips_html() {
        let items = parse_feed(RSS_FIXTURE.as_bytes(), &source()).unwrap();
        assert_eq!(items.len(), 1, "the linkless item is dropped");

        let item = &items[0];
        assert_eq!(item.url, "https://news.test/replika-voice");
        assert_eq!(item.external_id.as_deref(), Some("news-test-1001"));
        assert_eq!(item.title.as_deref(), Some("Replika adds voice calls"));
        assert_eq!(item.text.as_deref(), Some("Replika launched voice calls today."));
        assert!(item.published_at.is_some());
    }

    #[test]
    fn entry_id_used_as_link_fallback() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item><title>Self-linked</title><guid>https://news.test/self</guid></item>
</channel></rss>"#;
        let items = parse_feed(xml.as_bytes(), &source()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://news.test/self");
    }

    #[test]
    fn bad_xml_is_an_error() {
        assert!(parse_feed(b"this is not xml", &source()).is_err());
    }

    #[test]
    fn atom_updated_date_is_accepted() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:uuid:feed</id>
  <updated>2026-03-10T00:00:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:uuid:e1</id>
    <link href="https://news.test/atom-entry"/>
    <updated>2026-03-10T12:00:00Z</updated>
    <summary>Plain summary</summary>
  </entry>
</feed>"#;
        let items = parse_feed(xml.as_bytes(), &source()).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].published_at.is_some(), "updated fills in for published");
        assert_eq!(items[0].text.as_deref(), Some("Plain summary"));
    }
}
