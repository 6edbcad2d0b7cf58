//! CSpline activation server - machine-bound license activation and signing.
//!
//! This library implements the license claim state machine (exactly-once
//! claim, idempotent same-machine reactivation), the canonical payload
//! encoding, and the Ed25519 signing protocol that lets clients verify
//! issued license tokens offline.

pub mod activation;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod keygen;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod signing;
pub mod token;
pub mod util;
