use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use tracing::warn;

use companionwire_store::feed;

use crate::AppState;

pub async fn list_platforms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match feed::platforms_with_active_counts(state.store.pool()).await {
        Ok(rows) => {
            let platforms: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|(p, active)| {
                    serde_json::json!({
                        "slug": p.slug,
                        "name": p.name,
                        "description": p.description,
                        "website": p.website,
                        "activeClusters": active,
                    })
                })
                .collect();
            Json(serde_json::json!({ "platforms": platforms })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to load platforms");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
