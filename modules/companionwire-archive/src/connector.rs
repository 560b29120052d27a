use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use companionwire_common::error::RunError;
use companionwire_common::SourceKind;

/// One configured upstream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    /// Connector selector: "rss" / "atom" for syndication feeds.
    pub format: String,
    pub enabled: bool,
}

impl SourceConfig {
    pub fn feed(name: &str, kind: SourceKind, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            url: url.to_string(),
            format: "rss".to_string(),
            enabled: true,
        }
    }
}

/// One item pulled out of a source, before any interpretation.
#[derive(Debug, Clone)]
pub struct FetchedItem {
    /// Stable id from the feed when it provides one.
    pub external_id: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Plain-text extract with HTML stripped, bounded upstream.
    pub text: Option<String>,
    /// The original structured entry, kept for audit.
    pub payload: serde_json::Value,
    pub content_type: String,
}

/// What one connector produced for one source. Errors are collected, never
/// thrown; a bad item or a bad feed must not abort the cycle.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub items: Vec<FetchedItem>,
    pub errors: Vec<RunError>,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn can_handle(&self, source: &SourceConfig) -> bool;
    async fn fetch(&self, source: &SourceConfig) -> FetchOutcome;
}

/// Ordered connector list; the first `can_handle` match wins.
pub struct ConnectorRegistry {
    connectors: Vec<Box<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new(connectors: Vec<Box<dyn Connector>>) -> Self {
        Self { connectors }
    }

    pub fn find(&self, source: &SourceConfig) -> Option<&dyn Connector> {
        self.connectors
            .iter()
            .find(|c| c.can_handle(source))
            .map(|c| c.as_ref())
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new(vec![Box::new(crate::syndication::SyndicationConnector::new())])
    }
}
