//! Curated feed sources, overridable with the `FEED_SOURCES` env var
//! (comma-separated `name|kind|url` triples).

use companionwire_common::SourceKind;
use tracing::warn;

use crate::connector::SourceConfig;

/// The built-in source list: companion-platform product blogs plus the tech
/// press desks that cover them.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::feed("TechCrunch AI", SourceKind::Media, "https://techcrunch.com/category/artificial-intelligence/feed/"),
        SourceConfig::feed("The Verge AI", SourceKind::Media, "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml"),
        SourceConfig::feed("Ars Technica AI", SourceKind::Media, "https://arstechnica.com/ai/feed/"),
        SourceConfig::feed("Replika Blog", SourceKind::Product, "https://blog.replika.com/rss/"),
        SourceConfig::feed("Character.AI Blog", SourceKind::Product, "https://blog.character.ai/rss/"),
        SourceConfig::feed("FTC Press Releases", SourceKind::Regulatory, "https://www.ftc.gov/feeds/press-release.xml"),
    ]
}

/// Sources from the environment, falling back to the curated list.
/// Malformed entries are skipped with a warning.
pub fn sources_from_env() -> Vec<SourceConfig> {
    let Ok(raw) = std::env::var("FEED_SOURCES") else {
        return default_sources();
    };
    let parsed = parse_sources(&raw);
    if parsed.is_empty() {
        warn!("FEED_SOURCES set but produced no valid sources, using defaults");
        return default_sources();
    }
    parsed
}

fn parse_sources(raw: &str) -> Vec<SourceConfig> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.splitn(3, '|');
            let name = parts.next()?.trim();
            let kind = parts.next()?.trim();
            let url = parts.next()?.trim();
            if name.is_empty() || url.is_empty() {
                warn!(entry, "Skipping malformed FEED_SOURCES entry");
                return None;
            }
            Some(SourceConfig::feed(name, SourceKind::from_str_loose(kind), url))
        })
        .collect()
}
