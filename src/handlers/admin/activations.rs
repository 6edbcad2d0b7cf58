//! Admin read access to the activation log and dashboard counters.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::ActivationRecord;

const DEFAULT_ACTIVATIONS_LIMIT: i64 = 10;
const MAX_ACTIVATIONS_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct RecentActivationsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentActivationsResponse {
    pub activations: Vec<ActivationRecord>,
}

/// GET /admin/activations?limit=N
pub async fn recent_activations(
    State(state): State<AppState>,
    Query(query): Query<RecentActivationsQuery>,
) -> Result<Json<RecentActivationsResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVATIONS_LIMIT)
        .clamp(1, MAX_ACTIVATIONS_LIMIT);

    let conn = state.db.get()?;
    let activations = queries::list_recent_activations(&conn, limit)?;

    Ok(Json(RecentActivationsResponse { activations }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_keys: i64,
    pub claimed_keys: i64,
    pub unused_keys: i64,
    pub total_activations: i64,
}

/// GET /admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let conn = state.db.get()?;
    let keys = queries::license_key_stats(&conn)?;
    let total_activations = queries::count_activations(&conn)?;

    Ok(Json(StatsResponse {
        total_keys: keys.total_keys,
        claimed_keys: keys.claimed_keys,
        unused_keys: keys.unused_keys,
        total_activations,
    }))
}
