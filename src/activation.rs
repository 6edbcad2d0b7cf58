//! Activation orchestration: the license claim state machine.
//!
//! Given a validated request this decides accept / reject / reactivate,
//! drives the claim store, and produces the signed token. It is
//! transport-free; the HTTP layer maps [`ActivationOutcome`] to wire
//! responses.
//!
//! Transition rule for one request against one key:
//! - unknown key            -> `InvalidKey`
//! - claimed by another     -> `KeyAlreadyUsed`
//! - unused                 -> atomic claim, then issue (a lost race falls
//!                             back into one of the two cases above or the
//!                             reactivation case — the single internal retry)
//! - claimed by requester   -> idempotent reactivation, no mutation, issue
//!
//! A committed claim is never rolled back on signing failure; the retry
//! self-heals through the reactivation path.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries::{self, ClaimResult};
use crate::error::{AppError, Result};
use crate::models::{CreateActivation, LicenseKey};
use crate::signing::Signer;
use crate::token::{LicensePayload, LicenseToken};

/// A parsed activation request, as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct ActivationRequest {
    pub key: String,
    pub email: String,
    pub name: String,
    pub machine_id: String,
}

impl ActivationRequest {
    /// Trim all fields; `None` if any is empty afterwards.
    fn trimmed(&self) -> Option<ActivationRequest> {
        let key = self.key.trim();
        let email = self.email.trim();
        let name = self.name.trim();
        let machine_id = self.machine_id.trim();

        if key.is_empty() || email.is_empty() || name.is_empty() || machine_id.is_empty() {
            return None;
        }

        Some(ActivationRequest {
            key: key.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            machine_id: machine_id.to_string(),
        })
    }
}

/// Transport metadata recorded in the activation log.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}

/// Result of processing one activation request. Infrastructure failures
/// (store unavailable, signing unavailable) surface as `Err` instead.
#[derive(Debug)]
pub enum ActivationOutcome {
    Issued(LicenseToken),
    MissingFields,
    InvalidKey,
    KeyAlreadyUsed,
}

/// Run one activation request through the state machine.
pub fn process_activation(
    conn: &Connection,
    signer: Option<&Signer>,
    request: &ActivationRequest,
    info: &RequestInfo,
) -> Result<ActivationOutcome> {
    // Validation happens before any store access.
    let Some(request) = request.trimmed() else {
        return Ok(ActivationOutcome::MissingFields);
    };

    let Some(key) = queries::get_license_key_by_key(conn, &request.key)? else {
        tracing::debug!("Activation rejected: unknown key");
        return Ok(ActivationOutcome::InvalidKey);
    };

    let reactivation = match decide(conn, &key, &request)? {
        Decision::Claim => false,
        Decision::Reactivate => true,
        Decision::Reject(outcome) => return Ok(outcome),
    };

    if reactivation {
        tracing::info!(machine_id = %request.machine_id, "Reactivation for bound machine");
    }

    // Best-effort audit append: the claim has already committed, so a log
    // failure degrades the request rather than failing it.
    let record = CreateActivation {
        key_string: request.key.clone(),
        email: request.email.clone(),
        name: request.name.clone(),
        machine_id: request.machine_id.clone(),
        source_address: info.source_address.clone(),
        client_agent: info.client_agent.clone(),
    };
    if let Err(e) = queries::append_activation(conn, &record) {
        tracing::warn!("Failed to append activation record: {}", e);
    }

    let signer = signer.ok_or(AppError::SigningUnavailable)?;
    let payload = LicensePayload::new(
        &request.name,
        &request.email,
        &request.machine_id,
        Utc::now(),
    );
    let sig = signer.sign(&payload.canonical_bytes()?);

    Ok(ActivationOutcome::Issued(LicenseToken { payload, sig }))
}

enum Decision {
    /// This request won the Unused -> Claimed transition.
    Claim,
    /// Key already bound to the requesting machine; no mutation.
    Reactivate,
    Reject(ActivationOutcome),
}

fn decide(conn: &Connection, key: &LicenseKey, request: &ActivationRequest) -> Result<Decision> {
    if key.is_bound_to(&request.machine_id) {
        return Ok(Decision::Reactivate);
    }

    if key.machine_id.is_some() {
        tracing::info!("Activation rejected: key bound to a different machine");
        return Ok(Decision::Reject(ActivationOutcome::KeyAlreadyUsed));
    }

    // Unused: attempt the atomic claim. On a lost race, re-inspect the
    // winner's record and fall into the reactivate or reject case.
    match queries::claim_license_key(
        conn,
        &request.key,
        &request.email,
        &request.name,
        &request.machine_id,
    )? {
        ClaimResult::Claimed(_) => Ok(Decision::Claim),
        ClaimResult::Conflict(winner) => {
            if winner.is_bound_to(&request.machine_id) {
                Ok(Decision::Reactivate)
            } else {
                tracing::info!("Activation rejected: lost claim race to another machine");
                Ok(Decision::Reject(ActivationOutcome::KeyAlreadyUsed))
            }
        }
        ClaimResult::NotFound => Ok(Decision::Reject(ActivationOutcome::InvalidKey)),
    }
}
