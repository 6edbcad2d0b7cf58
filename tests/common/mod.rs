//! Test utilities and fixtures for activation server integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use rusqlite::Connection;
use tempfile::TempDir;

pub use cspline_activation::activation::{
    process_activation, ActivationOutcome, ActivationRequest, RequestInfo,
};
pub use cspline_activation::db::{create_pool, init_db, queries, AppState, DbPool};
pub use cspline_activation::handlers;
pub use cspline_activation::models::*;
pub use cspline_activation::signing::Signer;
pub use cspline_activation::token::{canonical_json, LicensePayload, LicenseToken};
pub use cspline_activation::util::hash_secret;

/// Bearer token the test admin router accepts.
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a deterministic-enough test signer (fresh ephemeral keypair)
pub fn test_signer() -> Signer {
    Signer::generate()
}

/// Create a file-backed pool in a temp directory. Pooled in-memory SQLite
/// connections don't share data, so anything exercising the pool (HTTP
/// tests, concurrency tests) goes through a real file, via the production
/// pool constructor so busy-timeout behavior matches the server.
pub fn setup_test_pool() -> (DbPool, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("test_licenses.db");
    let pool = create_pool(path.to_str().expect("temp path should be UTF-8"))
        .expect("Failed to build test pool");
    {
        let conn = pool.get().expect("Failed to get test connection");
        init_db(&conn).expect("Failed to initialize schema");
    }
    (pool, dir)
}

/// Create an AppState with a working signer and admin token.
/// The returned TempDir guard must be kept alive for the state's lifetime.
pub fn create_test_app_state() -> (AppState, TempDir) {
    let (pool, dir) = setup_test_pool();
    let state = AppState {
        db: pool,
        signer: Some(Arc::new(test_signer())),
        admin_token_hash: Some(hash_secret(TEST_ADMIN_TOKEN)),
    };
    (state, dir)
}

/// Create one unused test key and return it.
pub fn create_test_key(conn: &Connection) -> LicenseKey {
    queries::create_license_keys(conn, 1, None)
        .expect("Failed to create test key")
        .remove(0)
}

/// Create one unused test key through the pool.
pub fn create_test_key_pooled(state: &AppState) -> LicenseKey {
    let conn = state.db.get().expect("Failed to get pooled connection");
    create_test_key(&conn)
}

/// A standard activation request for tests.
pub fn request(key: &str, email: &str, name: &str, machine_id: &str) -> ActivationRequest {
    ActivationRequest {
        key: key.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        machine_id: machine_id.to_string(),
    }
}

/// Router with the public endpoints, without rate limiting (rate limit
/// layers need connect-info, which `oneshot` requests don't carry).
pub fn public_app(state: AppState) -> Router {
    Router::new()
        .route("/activate", post(handlers::public::activate))
        .route("/health", get(|| async { "ok" }))
        .merge(handlers::admin::router(state.clone()))
        .with_state(state)
}
