//! The cluster feed query: keyset pagination over
//! `(importance_score DESC, last_signal_at DESC, id DESC)` with optional
//! category / platform filters, stable under concurrent inserts.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use companionwire_common::{Category, Window};

use crate::cursor::Cursor;
use crate::models::{ClusterRow, FeedSignalRow, PlatformRow};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 50;
/// Newest signals hydrated per cluster in the feed response.
const SIGNALS_PER_CLUSTER: i64 = 10;

#[derive(Debug, Clone, Default)]
pub struct FeedParams {
    pub category: Option<Category>,
    pub platform: Option<String>,
    pub window: Window,
    pub cursor: Option<Cursor>,
    pub limit: Option<i64>,
}

#[derive(Debug)]
pub struct FeedPage {
    pub clusters: Vec<ClusterRow>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Fetch one page. Probes `limit + 1` rows; the extra row only signals that
/// a next page exists and is dropped from the result.
pub async fn feed_page(pool: &PgPool, params: &FeedParams) -> sqlx::Result<FeedPage> {
    let limit = clamp_limit(params.limit);
    let window_start = Utc::now() - Duration::hours(params.window.hours());

    let category = params.category.map(|c| c.as_str().to_string());
    let (cursor_score, cursor_at, cursor_id) = match &params.cursor {
        Some(c) => (Some(c.importance_score), Some(c.last_signal_at), Some(c.id)),
        None => (None, None, None),
    };

    let mut rows = sqlx::query_as::<_, ClusterRow>(
        r#"
        SELECT * FROM story_clusters
        WHERE status = 'ACTIVE'
          AND last_signal_at >= $1
          AND ($2::text IS NULL OR $2 = ANY(categories))
          AND ($3::text IS NULL OR EXISTS (
                SELECT 1 FROM cluster_platforms cp
                JOIN platforms p ON p.id = cp.platform_id
                WHERE cp.cluster_id = story_clusters.id AND p.slug = $3))
          AND ($4::bigint IS NULL OR (
                importance_score < $4
                OR (importance_score = $4 AND last_signal_at < $5)
                OR (importance_score = $4 AND last_signal_at = $5 AND id < $6)))
        ORDER BY importance_score DESC, last_signal_at DESC, id DESC
        LIMIT $7
        "#,
    )
    .bind(window_start)
    .bind(&category)
    .bind(&params.platform)
    .bind(cursor_score)
    .bind(cursor_at)
    .bind(cursor_id)
    .bind(limit + 1)
    .fetch_all(pool)
    .await?;

    let has_more = rows.len() as i64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        rows.last().map(|c| Cursor {
            importance_score: c.importance_score,
            last_signal_at: c.last_signal_at,
            id: c.id,
        })
    } else {
        None
    };

    Ok(FeedPage {
        clusters: rows,
        next_cursor,
        has_more,
    })
}

/// Newest-first signals attached to a cluster, joined to their raw capture
/// for source name/domain.
pub async fn cluster_signals(pool: &PgPool, cluster_id: Uuid) -> sqlx::Result<Vec<FeedSignalRow>> {
    sqlx::query_as::<_, FeedSignalRow>(
        r#"
        SELECT s.id, s.title, s.canonical_url, s.image_url,
               r.source_name, r.source_domain, s.published_at, s.created_at
        FROM signals s
        JOIN raw_signals r ON r.id = s.raw_signal_id
        WHERE s.cluster_id = $1
        ORDER BY s.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(cluster_id)
    .bind(SIGNALS_PER_CLUSTER)
    .fetch_all(pool)
    .await
}

pub async fn cluster_platforms(pool: &PgPool, cluster_id: Uuid) -> sqlx::Result<Vec<PlatformRow>> {
    sqlx::query_as::<_, PlatformRow>(
        r#"
        SELECT p.* FROM cluster_platforms cp
        JOIN platforms p ON p.id = cp.platform_id
        WHERE cp.cluster_id = $1
        ORDER BY p.slug
        "#,
    )
    .bind(cluster_id)
    .fetch_all(pool)
    .await
}

pub async fn signal_count(pool: &PgPool, cluster_id: Uuid) -> sqlx::Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM signals WHERE cluster_id = $1")
            .bind(cluster_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// All platforms with their count of currently-active clusters.
pub async fn platforms_with_active_counts(
    pool: &PgPool,
) -> sqlx::Result<Vec<(PlatformRow, i64)>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        platform: PlatformRow,
        active_clusters: i64,
    }

    let rows = sqlx::query_as::<_, Row>(
        r#"
        SELECT p.*, count(sc.id) FILTER (WHERE sc.status = 'ACTIVE') AS active_clusters
        FROM platforms p
        LEFT JOIN cluster_platforms cp ON cp.platform_id = p.id
        LEFT JOIN story_clusters sc ON sc.id = cp.cluster_id
        GROUP BY p.id
        ORDER BY active_clusters DESC, p.slug
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| (r.platform, r.active_clusters)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_to_bounds() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(35)), 35);
        assert_eq!(clamp_limit(Some(500)), 50);
    }
}
