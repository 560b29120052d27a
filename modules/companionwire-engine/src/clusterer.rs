//! Two-phase story clustering with concurrent-safe cluster creation.
//!
//! Phase 1 narrows candidates with the trigram index; phase 2 refines with
//! TF-IDF cosine plus a platform-overlap bonus. Creation and attachment run
//! inside one transaction under a per-fingerprint advisory lock, with the
//! unique fingerprint index as the final guard.

use chrono::{DateTime, Utc};
use sqlx::Acquire;
use tracing::{debug, info};
use uuid::Uuid;

use companionwire_common::hashing::{fingerprint_lock_key, truncate_with_ellipsis};
use companionwire_common::text::{tokenize, top_keywords};
use companionwire_store::models::{NewCluster, SignalRow};
use companionwire_store::{clusters, is_unique_violation, Store};

use crate::similarity::{build_search_text, platform_bonus, score_candidates};

/// Candidates carried from phase 1 into phase 2.
const CANDIDATE_LIMIT: i64 = 10;
/// Keywords folded into the fingerprint.
const FINGERPRINT_KEYWORDS: usize = 5;

/// Deterministic coarse identity for a story: platforms, day bucket, and the
/// item's top keywords. Two writeups of the same event on the same day are
/// meant to collide here.
pub fn fingerprint(platforms: &[String], bucket: DateTime<Utc>, text: &str) -> String {
    let mut sorted: Vec<String> = platforms.to_vec();
    sorted.sort();
    let keywords = top_keywords(text, FINGERPRINT_KEYWORDS);
    format!(
        "{}|{}|{}",
        sorted.join(","),
        bucket.format("%Y-%m-%d"),
        keywords.join(",")
    )
}

/// Phase-2 refinement: best candidate whose cosine + platform bonus clears
/// the threshold. Pure; candidates carry their current platform sets.
pub fn choose_candidate(
    query_text: &str,
    signal_platforms: &[String],
    candidates: &[(Uuid, String, Vec<String>)],
    threshold: f64,
) -> Option<Uuid> {
    if candidates.is_empty() {
        return None;
    }
    let query_tokens = tokenize(query_text);
    let candidate_tokens: Vec<Vec<String>> =
        candidates.iter().map(|(_, text, _)| tokenize(text)).collect();
    let cosines = score_candidates(&query_tokens, &candidate_tokens);

    let mut best: Option<(Uuid, f64)> = None;
    for ((id, _, platforms), cosine) in candidates.iter().zip(cosines) {
        let adjusted = cosine + platform_bonus(signal_platforms, platforms);
        if best.map(|(_, s)| adjusted > s).unwrap_or(true) {
            best = Some((*id, adjusted));
        }
    }

    best.filter(|(_, score)| *score >= threshold).map(|(id, _)| id)
}

pub struct Clusterer {
    store: Store,
    similarity_threshold: f64,
    trgm_threshold: f64,
    active_days: i64,
}

impl Clusterer {
    pub fn new(
        store: Store,
        similarity_threshold: f64,
        trgm_threshold: f64,
        active_days: i64,
    ) -> Self {
        Self {
            store,
            similarity_threshold,
            trgm_threshold,
            active_days,
        }
    }

    /// Assign one accepted signal to a cluster, creating it if nothing
    /// matches. Returns the cluster id. The whole protocol runs in a single
    /// transaction; the advisory lock serializes same-fingerprint writers
    /// and releases on commit or rollback.
    pub async fn assign(&self, signal: &SignalRow) -> anyhow::Result<Uuid> {
        let headline = signal
            .suggested_headline
            .clone()
            .unwrap_or_else(|| signal.title.clone());
        let summary = signal.summary.clone().unwrap_or_default();
        let bucket = signal.published_at.unwrap_or(signal.created_at);

        let fp = fingerprint(
            &signal.entity_platforms,
            bucket,
            &format!("{} {}", signal.title, summary),
        );
        let search_text = build_search_text(&headline, &summary);
        let now = Utc::now();

        let mut tx = self.store.begin().await?;
        clusters::advisory_xact_lock(&mut tx, fingerprint_lock_key(&fp)).await?;

        // Exact fingerprint hit: same story, same day.
        if let Some(cluster) = clusters::cluster_by_fingerprint(&mut tx, &fp).await? {
            self.attach(&mut tx, signal, cluster.id, now).await?;
            tx.commit().await?;
            debug!(signal = %signal.id, cluster = %cluster.id, "attached by fingerprint");
            return Ok(cluster.id);
        }

        // Phase 1: trigram candidates over active clusters in the window.
        clusters::set_trgm_threshold(&mut tx, self.trgm_threshold).await?;
        let rows =
            clusters::trigram_candidates(&mut tx, &search_text, self.active_days, CANDIDATE_LIMIT)
                .await?;

        let mut candidates: Vec<(Uuid, String, Vec<String>)> = Vec::with_capacity(rows.len());
        for row in rows {
            let platforms = clusters::cluster_platform_slugs(&mut tx, row.id).await?;
            candidates.push((row.id, row.search_text, platforms));
        }

        // Phase 2: TF-IDF cosine + platform bonus.
        if let Some(cluster_id) = choose_candidate(
            &search_text,
            &signal.entity_platforms,
            &candidates,
            self.similarity_threshold,
        ) {
            self.attach(&mut tx, signal, cluster_id, now).await?;
            tx.commit().await?;
            debug!(signal = %signal.id, cluster = %cluster_id, "attached by similarity");
            return Ok(cluster_id);
        }

        // No match: create. The insert runs under a savepoint so a
        // fingerprint race can fall back to re-read without poisoning the
        // outer transaction.
        let new = NewCluster {
            fingerprint: fp.clone(),
            headline: truncate_with_ellipsis(
                if headline.trim().is_empty() { "Untitled Story" } else { headline.trim() },
                200,
            ),
            context_summary: truncate_with_ellipsis(&summary, 1000),
            search_text: search_text.clone(),
            categories: signal.categories.clone(),
            first_seen_at: bucket,
            last_signal_at: now,
        };

        let created = {
            let mut sp = tx.begin().await?;
            match clusters::insert_cluster(&mut sp, &new).await {
                Ok(cluster) => {
                    sp.commit().await?;
                    Some(cluster)
                }
                Err(e) if is_unique_violation(&e) => {
                    sp.rollback().await?;
                    None
                }
                Err(e) => return Err(e.into()),
            }
        };

        let cluster_id = match created {
            Some(cluster) => {
                clusters::link_cluster_platforms(&mut tx, cluster.id, &signal.entity_platforms)
                    .await?;
                info!(cluster = %cluster.id, headline = new.headline.as_str(), "created story cluster");
                cluster.id
            }
            // Lost the insert race: someone else created this fingerprint
            // between our lookup and insert. Attach to theirs.
            None => {
                let cluster = clusters::cluster_by_fingerprint(&mut tx, &fp)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("fingerprint vanished after unique violation: {fp}")
                    })?;
                debug!(cluster = %cluster.id, "recovered from fingerprint race");
                cluster.id
            }
        };

        self.attach(&mut tx, signal, cluster_id, now).await?;
        tx.commit().await?;
        Ok(cluster_id)
    }

    async fn attach(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
        signal: &SignalRow,
        cluster_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        clusters::attach_signal(tx, signal.id, cluster_id, now).await?;
        clusters::merge_cluster_categories(tx, cluster_id, &signal.categories).await?;
        Ok(())
    }

    /// Demote clusters whose newest signal fell outside the window.
    pub async fn sweep_stale(&self) -> anyhow::Result<u64> {
        let swept = clusters::sweep_stale(self.store.pool(), self.active_days).await?;
        if swept > 0 {
            info!(swept, "swept stale clusters");
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap()
    }

    // --- fingerprint tests ---

    #[test]
    fn fingerprint_is_pure() {
        let platforms = vec!["replika".to_string()];
        let a = fingerprint(&platforms, day(), "Replika launches voice calls");
        let b = fingerprint(&platforms, day(), "Replika launches voice calls");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_sorts_platforms() {
        let ab = fingerprint(&["b".to_string(), "a".to_string()], day(), "same text here");
        let ba = fingerprint(&["a".to_string(), "b".to_string()], day(), "same text here");
        assert_eq!(ab, ba);
        assert!(ab.starts_with("a,b|2026-03-14|"));
    }

    #[test]
    fn fingerprint_day_granularity() {
        let platforms = vec!["replika".to_string()];
        let morning = Utc.with_ymd_and_hms(2026, 3, 14, 1, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 14, 23, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 15, 1, 0, 0).unwrap();
        let text = "voice calls launch";
        assert_eq!(fingerprint(&platforms, morning, text), fingerprint(&platforms, night, text));
        assert_ne!(fingerprint(&platforms, morning, text), fingerprint(&platforms, next_day, text));
    }

    #[test]
    fn fingerprint_no_platforms_is_still_valid() {
        let fp = fingerprint(&[], day(), "regulator opens inquiry into companion chatbots");
        assert!(fp.starts_with("|2026-03-14|"));
    }

    // --- choose_candidate tests ---

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn chooses_best_matching_candidate() {
        let candidates = vec![
            (
                id(1),
                "Replika adds voice calls voice subscribers".to_string(),
                vec!["replika".to_string()],
            ),
            (
                id(2),
                "Regulator fines platform minors safety".to_string(),
                vec!["character-ai".to_string()],
            ),
        ];
        let chosen = choose_candidate(
            "Replika launches voice calls subscribers",
            &["replika".to_string()],
            &candidates,
            0.4,
        );
        assert_eq!(chosen, Some(id(1)));
    }

    #[test]
    fn below_threshold_means_no_match() {
        let candidates = vec![(
            id(1),
            "completely unrelated gardening tips".to_string(),
            vec![],
        )];
        let chosen = choose_candidate(
            "Replika launches voice calls",
            &["replika".to_string()],
            &candidates,
            0.4,
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn platform_overlap_can_push_over_threshold() {
        // Weak text overlap alone stays under 0.4; two shared platforms add it.
        let candidates = vec![(
            id(1),
            "subscription pricing announcement details".to_string(),
            vec!["replika".to_string(), "nomi".to_string()],
        )];
        let without = choose_candidate(
            "companion app pricing changes",
            &[],
            &candidates,
            0.4,
        );
        let with = choose_candidate(
            "companion app pricing changes",
            &["replika".to_string(), "nomi".to_string()],
            &candidates,
            0.4,
        );
        assert_eq!(without, None);
        assert_eq!(with, Some(id(1)));
    }

    #[test]
    fn empty_candidates_no_match() {
        assert_eq!(choose_candidate("anything", &[], &[], 0.4), None);
    }
}
