use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use companionwire_common::{Category, Window};
use companionwire_store::feed::{self, FeedParams};
use companionwire_store::models::{ClusterRow, FeedSignalRow, PlatformRow};
use companionwire_store::Cursor;

use crate::AppState;

#[derive(Deserialize)]
pub struct ClustersQuery {
    category: Option<String>,
    platform: Option<String>,
    window: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterView {
    id: Uuid,
    headline: String,
    context_summary: String,
    categories: Vec<String>,
    platforms: Vec<PlatformView>,
    importance_score: i64,
    score_breakdown: serde_json::Value,
    signal_count: i64,
    first_seen_at: DateTime<Utc>,
    last_signal_at: DateTime<Utc>,
    signals: Vec<SignalView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlatformView {
    slug: String,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignalView {
    id: Uuid,
    title: String,
    canonical_url: String,
    image_url: Option<String>,
    source_name: String,
    source_domain: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClustersResponse {
    clusters: Vec<ClusterView>,
    next_cursor: Option<String>,
    has_more: bool,
}

impl From<FeedSignalRow> for SignalView {
    fn from(row: FeedSignalRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            canonical_url: row.canonical_url,
            image_url: row.image_url,
            source_name: row.source_name,
            source_domain: row.source_domain,
            published_at: row.published_at,
            created_at: row.created_at,
        }
    }
}

pub async fn list_clusters(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClustersQuery>,
) -> impl IntoResponse {
    let category = match params.category.as_deref() {
        None => None,
        Some(raw) => match Category::parse(raw) {
            Some(c) => Some(c),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": format!("unknown category: {raw}")})),
                )
                    .into_response();
            }
        },
    };

    let window = match params.window.as_deref() {
        None => Window::default(),
        Some(raw) => match Window::parse(raw) {
            Some(w) => w,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "window must be one of 24h, 7d, 30d"})),
                )
                    .into_response();
            }
        },
    };

    // An undecodable cursor reads as "start over" rather than erroring:
    // stale bookmarks from old clients should still return a page.
    let cursor = params.cursor.as_deref().and_then(Cursor::decode);

    let feed_params = FeedParams {
        category,
        platform: params.platform.clone(),
        window,
        cursor,
        limit: params.limit,
    };

    let page = match feed::feed_page(state.store.pool(), &feed_params).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "feed query failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut views = Vec::with_capacity(page.clusters.len());
    for cluster in page.clusters {
        match hydrate(&state, cluster).await {
            Ok(view) => views.push(view),
            Err(e) => {
                warn!(error = %e, "failed to hydrate cluster");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    Json(ClustersResponse {
        clusters: views,
        next_cursor: page.next_cursor.map(|c| c.encode()),
        has_more: page.has_more,
    })
    .into_response()
}

async fn hydrate(state: &AppState, cluster: ClusterRow) -> sqlx::Result<ClusterView> {
    let pool = state.store.pool();
    let signals = feed::cluster_signals(pool, cluster.id).await?;
    let platforms = feed::cluster_platforms(pool, cluster.id).await?;
    let signal_count = feed::signal_count(pool, cluster.id).await?;

    Ok(ClusterView {
        id: cluster.id,
        headline: cluster.headline,
        context_summary: cluster.context_summary,
        categories: cluster.categories,
        platforms: platforms
            .into_iter()
            .map(|p: PlatformRow| PlatformView {
                slug: p.slug,
                name: p.name,
            })
            .collect(),
        importance_score: cluster.importance_score,
        score_breakdown: cluster.score_breakdown,
        signal_count,
        first_seen_at: cluster.first_seen_at,
        last_signal_at: cluster.last_signal_at,
        signals: signals.into_iter().map(SignalView::from).collect(),
    })
}
