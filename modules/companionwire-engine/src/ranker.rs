//! Multi-factor importance scoring. The real-valued score is a pure function
//! of the cluster's signals, their source weights, its categories, recency,
//! and the manual boost; only the ×1000 integer is ever compared.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use companionwire_common::Category;
use companionwire_store::credibility::{weight_for, CredibilityCache, DEFAULT_WEIGHT};
use companionwire_store::models::SignalFact;
use companionwire_store::{clusters, Store};

const DIVERSITY_FACTOR: f64 = 2.0;
const VELOCITY_FACTOR: f64 = 3.0;
const CREDIBILITY_FACTOR: f64 = 1.5;
const CATEGORY_FACTOR: f64 = 2.0;
const RECENCY_FACTOR: f64 = 1.0;
const MANUAL_FACTOR: f64 = 5.0;
/// Signals inside this window count toward velocity.
const VELOCITY_WINDOW_MINUTES: i64 = 60;

/// Per-component audit of one score computation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub source_diversity: f64,
    pub velocity: f64,
    pub credibility: f64,
    pub category: f64,
    pub recency: f64,
    pub manual: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    /// The persisted integer: score × 1000, rounded, floored at zero so a
    /// negative manual boost can't push a cluster below the keyset range.
    pub fn importance_score(&self) -> i64 {
        ((self.total * 1000.0).round() as i64).max(0)
    }
}

/// Compute the full breakdown for one cluster's facts.
#[allow(clippy::too_many_arguments)]
pub fn compute_score(
    facts: &[SignalFact],
    weights: &HashMap<String, f64>,
    categories: &[Category],
    last_signal_at: DateTime<Utc>,
    manual_boost: i32,
    now: DateTime<Utc>,
    max_domains: usize,
    decay_hours: f64,
) -> ScoreBreakdown {
    let mut domains: Vec<&str> = facts.iter().map(|f| f.source_domain.as_str()).collect();
    domains.sort_unstable();
    domains.dedup();
    let source_diversity = domains.len().min(max_domains) as f64 * DIVERSITY_FACTOR;

    let velocity_cutoff = now - Duration::minutes(VELOCITY_WINDOW_MINUTES);
    let recent = facts.iter().filter(|f| f.created_at >= velocity_cutoff).count();
    let velocity = (1.0 + recent as f64).ln() * VELOCITY_FACTOR;

    let avg_weight = if facts.is_empty() {
        DEFAULT_WEIGHT
    } else {
        facts
            .iter()
            .map(|f| weight_for(weights, &f.source_domain))
            .sum::<f64>()
            / facts.len() as f64
    };
    let credibility = avg_weight * CREDIBILITY_FACTOR;

    let category_weight = categories
        .iter()
        .map(|c| c.weight())
        .fold(1.0f64, f64::max);
    let category = category_weight * CATEGORY_FACTOR;

    let hours_since = (now - last_signal_at).num_seconds() as f64 / 3600.0;
    let recency = (-hours_since / decay_hours).exp() * RECENCY_FACTOR;

    let manual = manual_boost as f64 * MANUAL_FACTOR;

    let total = source_diversity + velocity + credibility + category + recency + manual;

    ScoreBreakdown {
        source_diversity,
        velocity,
        credibility,
        category,
        recency,
        manual,
        total,
    }
}

pub struct Ranker {
    store: Store,
    credibility: Arc<CredibilityCache>,
    max_domains: usize,
    decay_hours: f64,
}

impl Ranker {
    pub fn new(
        store: Store,
        credibility: Arc<CredibilityCache>,
        max_domains: usize,
        decay_hours: f64,
    ) -> Self {
        Self {
            store,
            credibility,
            max_domains,
            decay_hours,
        }
    }

    /// Recompute and persist one cluster's score.
    pub async fn rescore(&self, cluster_id: Uuid) -> anyhow::Result<i64> {
        let cluster = clusters::cluster_by_id(self.store.pool(), cluster_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("cluster not found: {cluster_id}"))?;
        let facts = clusters::cluster_signal_facts(self.store.pool(), cluster_id).await?;
        let weights = self.credibility.weights().await?;
        let categories: Vec<Category> = cluster
            .categories
            .iter()
            .filter_map(|c| Category::parse(c))
            .collect();

        let breakdown = compute_score(
            &facts,
            &weights,
            &categories,
            cluster.last_signal_at,
            cluster.manual_boost,
            Utc::now(),
            self.max_domains,
            self.decay_hours,
        );
        let score = breakdown.importance_score();

        let breakdown_json = serde_json::to_value(&breakdown).unwrap_or_else(|_| json!({}));
        clusters::update_cluster_score(self.store.pool(), cluster_id, score, &breakdown_json)
            .await?;
        Ok(score)
    }

    /// Rescore every active cluster. One bad cluster is logged and skipped;
    /// the batch carries on.
    pub async fn recompute_all(&self) -> anyhow::Result<usize> {
        let ids = clusters::active_cluster_ids(self.store.pool()).await?;
        let mut rescored = 0usize;
        for id in &ids {
            match self.rescore(*id).await {
                Ok(_) => rescored += 1,
                Err(e) => warn!(cluster = %id, error = %e, "rescore failed"),
            }
        }
        info!(rescored, total = ids.len(), "recomputed cluster rankings");
        Ok(rescored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(domain: &str, created_at: DateTime<Utc>) -> SignalFact {
        SignalFact {
            source_domain: domain.to_string(),
            created_at,
        }
    }

    fn weights(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(d, w)| (d.to_string(), *w)).collect()
    }

    #[test]
    fn reference_scenario_scores_12429() {
        // 3 domains all weight 0.9, one signal in the last hour,
        // last_signal_at = now, PRODUCT_UPDATE, no boost.
        let now = Utc::now();
        let facts = vec![
            fact("a.com", now - Duration::minutes(10)),
            fact("b.com", now - Duration::hours(3)),
            fact("c.com", now - Duration::hours(5)),
        ];
        let w = weights(&[("a.com", 0.9), ("b.com", 0.9), ("c.com", 0.9)]);
        let breakdown = compute_score(
            &facts,
            &w,
            &[Category::ProductUpdate],
            now,
            0,
            now,
            6,
            24.0,
        );

        assert!((breakdown.source_diversity - 6.0).abs() < 1e-9);
        assert!((breakdown.velocity - 2.0f64.ln() * 3.0).abs() < 1e-9);
        assert!((breakdown.credibility - 1.35).abs() < 1e-9);
        assert!((breakdown.category - 2.0).abs() < 1e-9);
        assert!((breakdown.recency - 1.0).abs() < 1e-9);
        assert_eq!(breakdown.manual, 0.0);
        assert_eq!(breakdown.importance_score(), 12429);
    }

    #[test]
    fn diversity_caps_at_max_domains() {
        let now = Utc::now();
        let facts: Vec<SignalFact> = (0..7)
            .map(|i| fact(&format!("d{i}.com"), now - Duration::hours(2)))
            .collect();
        let breakdown =
            compute_score(&facts, &HashMap::new(), &[], now, 0, now, 6, 24.0);
        assert_eq!(breakdown.source_diversity, 12.0);
    }

    #[test]
    fn duplicate_domains_count_once() {
        let now = Utc::now();
        let facts = vec![
            fact("same.com", now - Duration::hours(2)),
            fact("same.com", now - Duration::hours(3)),
        ];
        let breakdown =
            compute_score(&facts, &HashMap::new(), &[], now, 0, now, 6, 24.0);
        assert_eq!(breakdown.source_diversity, 2.0);
    }

    #[test]
    fn category_takes_max_not_sum() {
        let now = Utc::now();
        let categories = vec![
            Category::SafetyYouthRisk,
            Category::RegulatoryLegal,
            Category::ProductUpdate,
        ];
        let breakdown =
            compute_score(&[], &HashMap::new(), &categories, now, 0, now, 6, 24.0);
        assert_eq!(breakdown.category, 3.0);
    }

    #[test]
    fn category_floor_is_one() {
        let now = Utc::now();
        let breakdown = compute_score(&[], &HashMap::new(), &[], now, 0, now, 6, 24.0);
        assert_eq!(breakdown.category, 2.0, "no categories still scores 1.0 x 2.0");
    }

    #[test]
    fn recency_decays_to_e_minus_one_after_decay_hours() {
        let now = Utc::now();
        let breakdown = compute_score(
            &[],
            &HashMap::new(),
            &[],
            now - Duration::hours(24),
            0,
            now,
            6,
            24.0,
        );
        assert!((breakdown.recency - (-1.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn empty_cluster_gets_default_credibility() {
        let now = Utc::now();
        let breakdown = compute_score(&[], &HashMap::new(), &[], now, 0, now, 6, 24.0);
        assert!((breakdown.credibility - 0.5 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_domains_default_half_weight() {
        let now = Utc::now();
        let facts = vec![fact("nobody-knows.example", now - Duration::hours(2))];
        let breakdown = compute_score(&facts, &HashMap::new(), &[], now, 0, now, 6, 24.0);
        assert!((breakdown.credibility - 0.75).abs() < 1e-9);
    }

    #[test]
    fn manual_boost_is_linear() {
        let now = Utc::now();
        let base = compute_score(&[], &HashMap::new(), &[], now, 0, now, 6, 24.0);
        let boosted = compute_score(&[], &HashMap::new(), &[], now, 2, now, 6, 24.0);
        assert_eq!(boosted.manual, 10.0);
        assert_eq!(
            boosted.importance_score() - base.importance_score(),
            10_000
        );
    }

    #[test]
    fn negative_boost_cannot_push_score_below_zero() {
        let now = Utc::now();
        let breakdown = compute_score(&[], &HashMap::new(), &[], now, -10, now, 6, 24.0);
        assert!(breakdown.total < 0.0);
        assert_eq!(breakdown.importance_score(), 0);
    }

    #[test]
    fn velocity_only_counts_last_hour() {
        let now = Utc::now();
        let facts = vec![
            fact("a.com", now - Duration::minutes(30)),
            fact("b.com", now - Duration::minutes(59)),
            fact("c.com", now - Duration::minutes(90)),
        ];
        let breakdown = compute_score(&facts, &HashMap::new(), &[], now, 0, now, 6, 24.0);
        assert!((breakdown.velocity - 3.0f64.ln() * 3.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_idempotent_for_fixed_now() {
        let now = Utc::now();
        let facts = vec![fact("a.com", now - Duration::minutes(5))];
        let w = weights(&[("a.com", 0.8)]);
        let cats = vec![Category::RegulatoryLegal];
        let first = compute_score(&facts, &w, &cats, now, 1, now, 6, 24.0);
        let second = compute_score(&facts, &w, &cats, now, 1, now, 6, 24.0);
        assert_eq!(first.importance_score(), second.importance_score());
    }
}
