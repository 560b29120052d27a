use serde::{Deserialize, Serialize};

/// Error kinds recorded on ingest-run audit rows.
pub mod kind {
    /// Network or parse failure while pulling a feed.
    pub const FETCH_ERROR: &str = "FETCH_ERROR";
    /// No connector handles the source's format.
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    /// LLM response failed shape validation.
    pub const VALIDATION: &str = "VALIDATION";
    /// LLM provider returned 429.
    pub const RATE_LIMIT: &str = "RATE_LIMIT";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const NETWORK: &str = "NETWORK";
    /// Fingerprint race recovered by re-read; recorded, not fatal.
    pub const DB_UNIQUE: &str = "DB_UNIQUE";
    /// Cycle wall-clock budget ran out; remaining work deferred.
    pub const BUDGET_EXCEEDED: &str = "BUDGET_EXCEEDED";
    /// Uncaught failure in the coordinator or a per-item step.
    pub const PIPELINE_ERROR: &str = "PIPELINE_ERROR";
}

/// A captured per-item or per-source error, persisted on the ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RunError {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
