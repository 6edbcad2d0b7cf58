//! The activation endpoint: the installer's single point of contact.

use axum::{extract::State, http::{HeaderMap, StatusCode}};
use serde::{Deserialize, Serialize};

use crate::activation::{self, ActivationOutcome, ActivationRequest, RequestInfo};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::token::LicenseToken;
use crate::util::extract_request_info;

#[derive(Debug, Deserialize)]
pub struct ActivateBody {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub machine_id: String,
}

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<LicenseToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl ActivateResponse {
    fn issued(token: LicenseToken) -> Self {
        Self {
            success: true,
            token: Some(token),
            error: None,
        }
    }

    fn rejected(error: &'static str) -> Self {
        Self {
            success: false,
            token: None,
            error: Some(error),
        }
    }
}

/// POST /activate
///
/// Runs the claim state machine and returns the signed license token, or
/// one of the enumerated rejections. A missing/unusable signing key maps to
/// a 500 with a stable reason; client-input rejections are 400s.
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ActivateBody>,
) -> Result<(StatusCode, Json<ActivateResponse>)> {
    let conn = state.db.get()?;

    let request = ActivationRequest {
        key: body.key,
        email: body.email,
        name: body.name,
        machine_id: body.machine_id,
    };
    let (source_address, client_agent) = extract_request_info(&headers);
    let info = RequestInfo {
        source_address,
        client_agent,
    };

    let outcome =
        activation::process_activation(&conn, state.signer.as_deref(), &request, &info);

    let (status, response) = match outcome {
        Ok(ActivationOutcome::Issued(token)) => {
            (StatusCode::OK, ActivateResponse::issued(token))
        }
        Ok(ActivationOutcome::MissingFields) => (
            StatusCode::BAD_REQUEST,
            ActivateResponse::rejected("Missing required fields"),
        ),
        Ok(ActivationOutcome::InvalidKey) => (
            StatusCode::BAD_REQUEST,
            ActivateResponse::rejected("Invalid license key"),
        ),
        Ok(ActivationOutcome::KeyAlreadyUsed) => (
            StatusCode::BAD_REQUEST,
            ActivateResponse::rejected("License key already used on another computer"),
        ),
        Err(AppError::SigningUnavailable) => {
            tracing::error!("Activation failed: signing unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ActivateResponse::rejected("Server signing error"),
            )
        }
        Err(e) => return Err(e),
    };

    Ok((status, Json(response)))
}
