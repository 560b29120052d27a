//! Cluster-side persistence ops. The assignment protocol runs inside one
//! transaction, so everything here takes the open transaction's connection;
//! the engine decides the control flow.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{ClusterRow, NewCluster, SignalFact};

/// Take the per-fingerprint advisory lock. Tied to the transaction: released
/// automatically on commit or rollback, and it only serializes writers that
/// hash to the same key.
pub async fn advisory_xact_lock(conn: &mut PgConnection, key: i64) -> sqlx::Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

/// Set the trigram similarity threshold for this transaction only. The third
/// argument to set_config makes it transaction-local, so the setting never
/// bleeds across pooled connections.
pub async fn set_trgm_threshold(conn: &mut PgConnection, threshold: f64) -> sqlx::Result<()> {
    sqlx::query("SELECT set_config('pg_trgm.similarity_threshold', $1, true)")
        .bind(threshold.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn cluster_by_fingerprint(
    conn: &mut PgConnection,
    fingerprint: &str,
) -> sqlx::Result<Option<ClusterRow>> {
    sqlx::query_as::<_, ClusterRow>("SELECT * FROM story_clusters WHERE fingerprint = $1")
        .bind(fingerprint)
        .fetch_optional(conn)
        .await
}

/// Phase-1 candidate search: ACTIVE clusters inside the window whose search
/// text is trigram-similar to the query, best first.
pub async fn trigram_candidates(
    conn: &mut PgConnection,
    search_text: &str,
    active_days: i64,
    limit: i64,
) -> sqlx::Result<Vec<ClusterRow>> {
    let window_start = Utc::now() - Duration::days(active_days);
    sqlx::query_as::<_, ClusterRow>(
        r#"
        SELECT * FROM story_clusters
        WHERE status = 'ACTIVE'
          AND last_signal_at >= $2
          AND search_text % $1
        ORDER BY similarity(search_text, $1) DESC
        LIMIT $3
        "#,
    )
    .bind(search_text)
    .bind(window_start)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn cluster_platform_slugs(
    conn: &mut PgConnection,
    cluster_id: Uuid,
) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT p.slug FROM cluster_platforms cp
        JOIN platforms p ON p.id = cp.platform_id
        WHERE cp.cluster_id = $1
        "#,
    )
    .bind(cluster_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

/// Insert a new cluster. A unique violation on the fingerprint is the
/// caller's signal to re-read and attach instead.
pub async fn insert_cluster(conn: &mut PgConnection, new: &NewCluster) -> sqlx::Result<ClusterRow> {
    sqlx::query_as::<_, ClusterRow>(
        r#"
        INSERT INTO story_clusters
            (id, fingerprint, headline, context_summary, search_text, categories,
             first_seen_at, last_seen_at, last_signal_at, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'ACTIVE')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.fingerprint)
    .bind(&new.headline)
    .bind(&new.context_summary)
    .bind(&new.search_text)
    .bind(&new.categories)
    .bind(new.first_seen_at)
    .bind(new.last_signal_at)
    .bind(new.last_signal_at)
    .fetch_one(conn)
    .await
}

/// Append-only platform links for a cluster, resolved by slug.
pub async fn link_cluster_platforms(
    conn: &mut PgConnection,
    cluster_id: Uuid,
    slugs: &[String],
) -> sqlx::Result<()> {
    if slugs.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO cluster_platforms (cluster_id, platform_id)
        SELECT $1, id FROM platforms WHERE slug = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(cluster_id)
    .bind(slugs)
    .execute(conn)
    .await?;
    Ok(())
}

/// Attach a signal: set its cluster reference and bump the cluster's
/// last-seen/last-signal stamps.
pub async fn attach_signal(
    conn: &mut PgConnection,
    signal_id: Uuid,
    cluster_id: Uuid,
    now: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE signals SET cluster_id = $2 WHERE id = $1 AND cluster_id IS NULL")
        .bind(signal_id)
        .bind(cluster_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "UPDATE story_clusters SET last_signal_at = $2, last_seen_at = $2 WHERE id = $1",
    )
    .bind(cluster_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Union the signal's categories into the cluster's category list.
pub async fn merge_cluster_categories(
    conn: &mut PgConnection,
    cluster_id: Uuid,
    categories: &[String],
) -> sqlx::Result<()> {
    if categories.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        UPDATE story_clusters
        SET categories = (
            SELECT array_agg(DISTINCT c) FROM unnest(categories || $2) AS c
        )
        WHERE id = $1
        "#,
    )
    .bind(cluster_id)
    .bind(categories)
    .execute(conn)
    .await?;
    Ok(())
}

// --- Pool-level cluster ops (outside the assignment transaction) ---

/// Demote ACTIVE clusters whose newest signal fell out of the window.
pub async fn sweep_stale(pool: &PgPool, active_days: i64) -> sqlx::Result<u64> {
    let cutoff = Utc::now() - Duration::days(active_days);
    let result = sqlx::query(
        "UPDATE story_clusters SET status = 'STALE' WHERE status = 'ACTIVE' AND last_signal_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn active_cluster_ids(pool: &PgPool) -> sqlx::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT id FROM story_clusters WHERE status = 'ACTIVE'")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn cluster_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ClusterRow>> {
    sqlx::query_as::<_, ClusterRow>("SELECT * FROM story_clusters WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// The per-signal facts the ranker consumes: source domain + created-at of
/// every attached signal.
pub async fn cluster_signal_facts(pool: &PgPool, cluster_id: Uuid) -> sqlx::Result<Vec<SignalFact>> {
    sqlx::query_as::<_, SignalFact>(
        r#"
        SELECT r.source_domain, s.created_at
        FROM signals s
        JOIN raw_signals r ON r.id = s.raw_signal_id
        WHERE s.cluster_id = $1
        "#,
    )
    .bind(cluster_id)
    .fetch_all(pool)
    .await
}

/// Persist the integer score and its component breakdown.
pub async fn update_cluster_score(
    pool: &PgPool,
    cluster_id: Uuid,
    importance_score: i64,
    breakdown: &serde_json::Value,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE story_clusters SET importance_score = $2, score_breakdown = $3 WHERE id = $1",
    )
    .bind(cluster_id)
    .bind(importance_score)
    .bind(breakdown)
    .execute(pool)
    .await?;
    Ok(())
}
