//! Source-credibility reader with a short TTL cache. The table is
//! read-mostly; one SELECT per cycle is plenty.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::sync::RwLock;

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// Weight used for domains with no credibility row.
pub const DEFAULT_WEIGHT: f64 = 0.5;

pub struct CredibilityCache {
    pool: PgPool,
    cached: RwLock<Option<(Instant, HashMap<String, f64>)>>,
}

impl CredibilityCache {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cached: RwLock::new(None),
        }
    }

    /// The full domain -> weight map, refreshed when the TTL lapses.
    pub async fn weights(&self) -> sqlx::Result<HashMap<String, f64>> {
        {
            let guard = self.cached.read().await;
            if let Some((at, map)) = guard.as_ref() {
                if at.elapsed() < CACHE_TTL {
                    return Ok(map.clone());
                }
            }
        }

        let rows: Vec<(String, f64)> =
            sqlx::query_as("SELECT domain, weight FROM source_credibility")
                .fetch_all(&self.pool)
                .await?;
        let map: HashMap<String, f64> = rows.into_iter().collect();

        let mut guard = self.cached.write().await;
        *guard = Some((Instant::now(), map.clone()));
        Ok(map)
    }
}

/// Look up a domain's weight, defaulting unknown domains.
pub fn weight_for(weights: &HashMap<String, f64>, domain: &str) -> f64 {
    weights.get(domain).copied().unwrap_or(DEFAULT_WEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_domain_gets_default_weight() {
        let mut weights = HashMap::new();
        weights.insert("techcrunch.com".to_string(), 0.9);
        assert_eq!(weight_for(&weights, "techcrunch.com"), 0.9);
        assert_eq!(weight_for(&weights, "unknown.example"), 0.5);
    }
}
