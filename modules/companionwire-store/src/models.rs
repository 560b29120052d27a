use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A row from the raw_signals table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawSignalRow {
    pub id: Uuid,
    pub source_kind: String,
    pub source_name: String,
    pub source_url: String,
    pub source_domain: String,
    pub external_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub content_type: String,
    pub payload: Value,
    pub raw_text: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A row from the signals table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    pub id: Uuid,
    pub raw_signal_id: Uuid,
    pub canonical_url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub language: String,
    pub summary: Option<String>,
    pub suggested_headline: Option<String>,
    pub categories: Vec<String>,
    pub entity_platforms: Vec<String>,
    pub entity_companies: Vec<String>,
    pub entity_people: Vec<String>,
    pub entity_topics: Vec<String>,
    pub confidence: Option<f64>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub prompt_version: Option<String>,
    pub llm_raw_response: Option<String>,
    pub ingest_status: String,
    pub ingest_reason: Option<String>,
    pub normalized_at: Option<DateTime<Utc>>,
    pub cluster_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the story_clusters table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClusterRow {
    pub id: Uuid,
    pub fingerprint: String,
    pub headline: String,
    pub context_summary: String,
    pub search_text: String,
    pub categories: Vec<String>,
    pub importance_score: i64,
    pub score_breakdown: Value,
    pub manual_boost: i32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_signal_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestRunRow {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub signals_fetched: i32,
    pub signals_accepted: i32,
    pub signals_rejected: i32,
    pub errors: Value,
}

/// Parameters for inserting a raw signal with its companion pending signal.
#[derive(Debug, Clone)]
pub struct NewRawSignal {
    pub source_kind: String,
    pub source_name: String,
    pub source_url: String,
    pub source_domain: String,
    pub external_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub content_type: String,
    pub payload: Value,
    pub raw_text: Option<String>,
    pub content_hash: String,
    // Companion signal fields
    pub canonical_url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// What the normalizer decided for one signal; applied in a single UPDATE.
#[derive(Debug, Clone, Default)]
pub struct SignalNormalization {
    pub status: String,
    pub reason: Option<String>,
    pub summary: Option<String>,
    pub suggested_headline: Option<String>,
    pub categories: Vec<String>,
    pub entity_platforms: Vec<String>,
    pub entity_companies: Vec<String>,
    pub entity_people: Vec<String>,
    pub entity_topics: Vec<String>,
    pub confidence: Option<f64>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub prompt_version: Option<String>,
    pub llm_raw_response: Option<String>,
    pub image_url: Option<String>,
}

/// Parameters for creating a new story cluster.
#[derive(Debug, Clone)]
pub struct NewCluster {
    pub fingerprint: String,
    pub headline: String,
    pub context_summary: String,
    pub search_text: String,
    pub categories: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_signal_at: DateTime<Utc>,
}

/// Domain + creation time of one attached signal; everything the ranker
/// needs from the signal side.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalFact {
    pub source_domain: String,
    pub created_at: DateTime<Utc>,
}

/// A cluster's signal hydrated for the feed response.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedSignalRow {
    pub id: Uuid,
    pub title: String,
    pub canonical_url: String,
    pub image_url: Option<String>,
    pub source_name: String,
    pub source_domain: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
