//! Activation orchestrator tests: the claim state machine end to end,
//! both at the library level and over the HTTP surface.

#[path = "common/mod.rs"]
mod common;

use axum::{body::Body, http::Request};
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;

// ============ State Machine (library level) ============

#[test]
fn test_missing_fields_rejected_before_store_access() {
    let conn = setup_test_db();
    let signer = test_signer();
    let key = create_test_key(&conn);

    let empty_variants = [
        request("", "a@x.com", "Alice", "M1"),
        request(&key.key_string, "", "Alice", "M1"),
        request(&key.key_string, "a@x.com", "", "M1"),
        request(&key.key_string, "a@x.com", "Alice", ""),
        request("   ", "a@x.com", "Alice", "M1"),
        request(&key.key_string, "a@x.com", "Alice", "\t\n"),
    ];

    for req in &empty_variants {
        let outcome =
            process_activation(&conn, Some(&signer), req, &RequestInfo::default()).unwrap();
        assert!(
            matches!(outcome, ActivationOutcome::MissingFields),
            "empty/whitespace field should be rejected: {:?}",
            req
        );
    }

    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.status,
        KeyStatus::Unused,
        "rejected requests must not mutate the key"
    );
    assert_eq!(
        queries::count_activations(&conn).unwrap(),
        0,
        "rejected requests must not be written to the activation log"
    );
}

#[test]
fn test_unknown_key_rejected_without_mutation() {
    let conn = setup_test_db();
    let signer = test_signer();

    let outcome = process_activation(
        &conn,
        Some(&signer),
        &request("CSPLINE-DEADBEEF-DEADBEEF-DEADBEEF", "a@x.com", "Alice", "M1"),
        &RequestInfo::default(),
    )
    .unwrap();

    assert!(matches!(outcome, ActivationOutcome::InvalidKey));
    assert_eq!(
        queries::count_activations(&conn).unwrap(),
        0,
        "unknown-key attempts must not produce activation records"
    );
}

#[test]
fn test_first_claim_issues_verifiable_token() {
    let conn = setup_test_db();
    let signer = test_signer();
    let key = create_test_key(&conn);

    let outcome = process_activation(
        &conn,
        Some(&signer),
        &request(&key.key_string, "a@x.com", "Alice", "M1"),
        &RequestInfo {
            source_address: Some("203.0.113.9".to_string()),
            client_agent: Some("installer/2.1".to_string()),
        },
    )
    .unwrap();

    let token = match outcome {
        ActivationOutcome::Issued(t) => t,
        other => panic!("expected issued token, got {:?}", other),
    };

    assert_eq!(token.payload.product, "CSpline Fusion Suite");
    assert_eq!(token.payload.edition, "Professional");
    assert_eq!(token.payload.machine_id, "M1");
    assert_eq!(token.payload.licensee.name, "Alice");
    assert_eq!(token.payload.licensee.email, "a@x.com");
    assert!(token.payload.expires.is_none());
    assert!(
        token.payload.issued_at.ends_with('Z'),
        "issued_at should be rendered in the fixed UTC form: {}",
        token.payload.issued_at
    );

    assert!(
        Signer::verify(
            &token.payload.canonical_bytes().unwrap(),
            &token.sig,
            &signer.public_key_base64(),
        ),
        "issued token should verify against the signer's public key"
    );

    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, KeyStatus::Claimed);
    assert_eq!(stored.machine_id.as_deref(), Some("M1"));

    let records = queries::list_recent_activations(&conn, 10).unwrap();
    assert_eq!(records.len(), 1, "accepted activation should be logged");
    assert_eq!(records[0].machine_id, "M1");
    assert_eq!(records[0].source_address.as_deref(), Some("203.0.113.9"));
}

#[test]
fn test_reactivation_is_idempotent() {
    let conn = setup_test_db();
    let signer = test_signer();
    let key = create_test_key(&conn);

    process_activation(
        &conn,
        Some(&signer),
        &request(&key.key_string, "a@x.com", "Alice", "M1"),
        &RequestInfo::default(),
    )
    .unwrap();
    let first = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();

    // Repeat from the same machine - different claimant fields on purpose;
    // the original claim must not be overwritten.
    let outcome = process_activation(
        &conn,
        Some(&signer),
        &request(&key.key_string, "other@x.com", "Other Name", "M1"),
        &RequestInfo::default(),
    )
    .unwrap();
    assert!(
        matches!(outcome, ActivationOutcome::Issued(_)),
        "reactivation from the bound machine should issue a fresh token"
    );

    let second = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(second.claimed_at, first.claimed_at, "claimed_at must not change");
    assert_eq!(second.email, first.email, "claimant email must not change");
    assert_eq!(second.name, first.name, "claimant name must not change");

    assert_eq!(
        queries::count_activations(&conn).unwrap(),
        2,
        "each accepted activation (including reactivation) is logged"
    );
}

#[test]
fn test_conflicting_machine_rejected() {
    let conn = setup_test_db();
    let signer = test_signer();
    let key = create_test_key(&conn);

    process_activation(
        &conn,
        Some(&signer),
        &request(&key.key_string, "a@x.com", "Alice", "M1"),
        &RequestInfo::default(),
    )
    .unwrap();

    let outcome = process_activation(
        &conn,
        Some(&signer),
        &request(&key.key_string, "b@x.com", "Bob", "M2"),
        &RequestInfo::default(),
    )
    .unwrap();
    assert!(matches!(outcome, ActivationOutcome::KeyAlreadyUsed));

    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.machine_id.as_deref(),
        Some("M1"),
        "a conflicting attempt must not disturb the existing binding"
    );
    assert_eq!(
        queries::count_activations(&conn).unwrap(),
        1,
        "rejected attempts are not logged"
    );
}

#[test]
fn test_signing_failure_keeps_claim_and_self_heals() {
    let conn = setup_test_db();
    let key = create_test_key(&conn);

    // No signer: the request fails server-side...
    let err = process_activation(
        &conn,
        None,
        &request(&key.key_string, "a@x.com", "Alice", "M1"),
        &RequestInfo::default(),
    )
    .unwrap_err();
    assert!(
        matches!(err, cspline_activation::error::AppError::SigningUnavailable),
        "missing key material should surface as the signing error kind"
    );

    // ...but the claim mutation stands.
    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.status,
        KeyStatus::Claimed,
        "a committed claim is not rolled back on signing failure"
    );

    // Retry with a signer recovers the token through the reactivation path.
    let signer = test_signer();
    let outcome = process_activation(
        &conn,
        Some(&signer),
        &request(&key.key_string, "a@x.com", "Alice", "M1"),
        &RequestInfo::default(),
    )
    .unwrap();
    assert!(
        matches!(outcome, ActivationOutcome::Issued(_)),
        "retry after signing failure should self-heal via reactivation"
    );
}

#[test]
fn test_fields_are_trimmed_before_use() {
    let conn = setup_test_db();
    let signer = test_signer();
    let key = create_test_key(&conn);

    let outcome = process_activation(
        &conn,
        Some(&signer),
        &request(
            &format!("  {}  ", key.key_string),
            " a@x.com ",
            " Alice ",
            " M1 ",
        ),
        &RequestInfo::default(),
    )
    .unwrap();

    let token = match outcome {
        ActivationOutcome::Issued(t) => t,
        other => panic!("expected issued token, got {:?}", other),
    };
    assert_eq!(token.payload.machine_id, "M1");
    assert_eq!(token.payload.licensee.email, "a@x.com");

    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(stored.machine_id.as_deref(), Some("M1"));
}

// ============ HTTP Surface ============

async fn post_activate(app: axum::Router, body: Value) -> (axum::http::StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/activate")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).expect("Response should be valid JSON");
    (status, json)
}

#[tokio::test]
async fn test_end_to_end_activation_scenario() {
    let (state, _dir) = create_test_app_state();
    let signer_public_key = state.signer.as_ref().unwrap().public_key_base64();
    let key = create_test_key_pooled(&state);

    // 1. First activation on M1 succeeds.
    let (status, json) = post_activate(
        public_app(state.clone()),
        json!({"key": key.key_string, "email": "a@x.com", "name": "Alice", "machine_id": "M1"}),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["token"]["payload"]["machine_id"], "M1");
    assert_eq!(json["token"]["payload"]["product"], "CSpline Fusion Suite");
    assert_eq!(
        json["token"]["payload"]["expires"],
        Value::Null,
        "expires should be an explicit null on the wire"
    );

    // The returned signature verifies over the canonical payload bytes.
    let payload: LicensePayload =
        serde_json::from_value(json["token"]["payload"].clone()).unwrap();
    assert!(
        Signer::verify(
            &payload.canonical_bytes().unwrap(),
            json["token"]["sig"].as_str().unwrap(),
            &signer_public_key,
        ),
        "wire token should verify offline against the public key"
    );

    // 2. Same request repeated: succeeds, no duplicate claim mutation.
    let (status, json) = post_activate(
        public_app(state.clone()),
        json!({"key": key.key_string, "email": "a@x.com", "name": "Alice", "machine_id": "M1"}),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["token"]["payload"]["machine_id"], "M1");

    // 3. Different machine: rejected.
    let (status, json) = post_activate(
        public_app(state.clone()),
        json!({"key": key.key_string, "email": "b@x.com", "name": "Bob", "machine_id": "M2"}),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "License key already used on another computer");

    // 4. Unknown key: rejected.
    let (status, json) = post_activate(
        public_app(state.clone()),
        json!({"key": "UNKNOWN", "email": "a@x.com", "name": "Alice", "machine_id": "M1"}),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Invalid license key");

    // Store state: still bound to M1, two logged activations.
    let conn = state.db.get().unwrap();
    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(stored.machine_id.as_deref(), Some("M1"));
    assert_eq!(queries::count_activations(&conn).unwrap(), 2);
}

#[tokio::test]
async fn test_activate_missing_fields_http() {
    let (state, _dir) = create_test_app_state();

    let (status, json) = post_activate(
        public_app(state.clone()),
        json!({"key": "", "email": "a@x.com", "name": "Alice", "machine_id": "M1"}),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields");

    // Absent fields deserialize as empty strings and are rejected the same way.
    let (status, json) = post_activate(public_app(state), json!({"email": "a@x.com"})).await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields");
}

#[tokio::test]
async fn test_activate_without_signer_returns_signing_error() {
    let (mut state, _dir) = create_test_app_state();
    state.signer = None;
    let key = create_test_key_pooled(&state);

    let (status, json) = post_activate(
        public_app(state.clone()),
        json!({"key": key.key_string, "email": "a@x.com", "name": "Alice", "machine_id": "M1"}),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Server signing error");

    // The claim itself committed; a retry on a repaired server recovers.
    let conn = state.db.get().unwrap();
    let stored = queries::get_license_key_by_key(&conn, &key.key_string)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, KeyStatus::Claimed);
}
