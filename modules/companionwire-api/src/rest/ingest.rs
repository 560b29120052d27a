use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tracing::{error, warn};

use crate::auth::check_ingest_auth;
use crate::AppState;

const RECENT_RUNS: i64 = 10;

#[derive(Deserialize)]
pub struct IngestQuery {
    secret: Option<String>,
}

/// Audit view: the last few ingest runs with their counters.
pub async fn recent_runs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.recent_runs(RECENT_RUNS).await {
        Ok(runs) => {
            let views: Vec<serde_json::Value> = runs
                .into_iter()
                .map(|r| {
                    let error_count = r.errors.as_array().map(|a| a.len()).unwrap_or(0);
                    serde_json::json!({
                        "id": r.id,
                        "startedAt": r.started_at,
                        "finishedAt": r.finished_at,
                        "status": r.status,
                        "signalsFetched": r.signals_fetched,
                        "signalsAccepted": r.signals_accepted,
                        "signalsRejected": r.signals_rejected,
                        "errorCount": error_count,
                    })
                })
                .collect();
            Json(serde_json::json!({ "runs": views })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to load ingest runs");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Trigger one ingest cycle. Runs inline; the response carries the cycle's
/// counters.
pub async fn trigger_ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<IngestQuery>,
) -> impl IntoResponse {
    if !check_ingest_auth(
        &headers,
        params.secret.as_deref(),
        &state.config.ingest_secret,
        &state.config.cron_secret,
    ) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        )
            .into_response();
    }

    // One cycle at a time; dedup makes overlap harmless but pointless.
    let Ok(_guard) = state.ingest_lock.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "Ingest cycle already in progress"})),
        )
            .into_response();
    };

    match state.pipeline.run_cycle().await {
        Ok(report) => Json(serde_json::json!({
            "runId": report.run_id,
            "status": report.status.as_str(),
            "mode": "direct",
            "signalsFetched": report.signals_fetched,
            "signalsAccepted": report.signals_accepted,
            "signalsRejected": report.signals_rejected,
            "errorCount": report.error_count,
            "durationMs": report.duration_ms,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "ingest cycle could not start");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to run ingest cycle"})),
            )
                .into_response()
        }
    }
}
