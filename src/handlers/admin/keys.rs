//! Admin operations on license keys: bulk generation, listing, reset.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::LicenseKey;

/// Upper bound on one bulk generation request.
const MAX_KEYS_PER_REQUEST: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct GenerateKeysBody {
    pub count: usize,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateKeysResponse {
    pub generated: usize,
    pub keys: Vec<LicenseKey>,
}

/// POST /admin/keys
pub async fn generate_keys(
    State(state): State<AppState>,
    Json(body): Json<GenerateKeysBody>,
) -> Result<Json<GenerateKeysResponse>> {
    if body.count == 0 || body.count > MAX_KEYS_PER_REQUEST {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_KEYS_PER_REQUEST
        )));
    }

    let conn = state.db.get()?;
    let keys = queries::create_license_keys(&conn, body.count, body.notes.as_deref())?;

    tracing::info!(count = keys.len(), "Generated license keys");

    Ok(Json(GenerateKeysResponse {
        generated: keys.len(),
        keys,
    }))
}

#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub keys: Vec<LicenseKey>,
}

/// GET /admin/keys
pub async fn list_keys(State(state): State<AppState>) -> Result<Json<ListKeysResponse>> {
    let conn = state.db.get()?;
    let keys = queries::list_license_keys(&conn)?;
    Ok(Json(ListKeysResponse { keys }))
}

#[derive(Debug, Serialize)]
pub struct ResetKeyResponse {
    pub key: LicenseKey,
}

/// POST /admin/keys/{id}/reset
///
/// Returns the key to `unused` and clears the machine binding.
pub async fn reset_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResetKeyResponse>> {
    let conn = state.db.get()?;

    if !queries::reset_license_key(&conn, &id)? {
        return Err(AppError::NotFound("License key not found".into()));
    }

    let key = queries::get_license_key_by_id(&conn, &id)?
        .ok_or_else(|| AppError::Internal("License key vanished after reset".into()))?;

    tracing::info!(key_id = %id, "License key reset to unused");

    Ok(Json(ResetKeyResponse { key }))
}
