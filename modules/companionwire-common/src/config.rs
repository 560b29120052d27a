use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM provider
    /// "openai" or "anthropic".
    pub llm_provider: String,
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub llm_model: Option<String>,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Ingest trigger secrets
    pub ingest_secret: String,
    /// Separate secret for the external scheduler. Empty = not configured.
    pub cron_secret: String,

    // Clustering
    /// Minimum TF-IDF + platform bonus for a phase-2 match.
    pub cluster_similarity_threshold: f64,
    /// Trigram candidate threshold for phase-1 search.
    pub cluster_trgm_threshold: f64,
    /// Days before an ACTIVE cluster is swept to STALE.
    pub cluster_active_days: i64,

    // Ranking
    pub ranking_max_domains: usize,
    pub ranking_recency_decay_hours: f64,

    // Pipeline cycle
    pub max_items: usize,
    pub timeout_ms: u64,
    pub llm_concurrency: usize,
    pub min_confidence_threshold: f64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL").ok(),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            ingest_secret: required_env("INGEST_SECRET"),
            cron_secret: env::var("CRON_SECRET").unwrap_or_default(),
            cluster_similarity_threshold: parsed_env("CLUSTER_SIMILARITY_THRESHOLD", 0.4),
            cluster_trgm_threshold: parsed_env("CLUSTER_TRGM_THRESHOLD", 0.2),
            cluster_active_days: parsed_env("CLUSTER_ACTIVE_DAYS", 7),
            ranking_max_domains: parsed_env("RANKING_MAX_DOMAINS", 6),
            ranking_recency_decay_hours: parsed_env("RANKING_RECENCY_DECAY_HOURS", 24.0),
            max_items: parsed_env("DIRECT_MODE_MAX_ITEMS", 30),
            timeout_ms: parsed_env("DIRECT_MODE_TIMEOUT_MS", 120_000),
            llm_concurrency: parsed_env("DIRECT_MODE_LLM_CONCURRENCY", 3),
            min_confidence_threshold: parsed_env("MIN_CONFIDENCE_THRESHOLD", 0.6),
        }
    }

    /// Log the presence of each sensitive env var without exposing values.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("OPENAI_API_KEY", &self.openai_api_key),
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
            ("INGEST_SECRET", &self.ingest_secret),
            ("CRON_SECRET", &self.cron_secret),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
