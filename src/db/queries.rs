use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keygen::generate_license_key;
use crate::models::*;

use super::from_row::{query_all, query_one, ACTIVATION_COLS, LICENSE_KEY_COLS};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// How many times a bulk insert regenerates a key after a UNIQUE collision
/// before giving up. With 96-bit keys a single retry firing at all would be
/// remarkable.
const KEY_COLLISION_RETRIES: usize = 3;

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

// ============ License keys ============

/// Generate `count` fresh license keys.
///
/// A UNIQUE collision on `key_string` is retryable: the key is regenerated
/// and the insert retried. Anything else propagates.
pub fn create_license_keys(
    conn: &Connection,
    count: usize,
    notes: Option<&str>,
) -> Result<Vec<LicenseKey>> {
    let mut keys = Vec::with_capacity(count);

    for _ in 0..count {
        keys.push(insert_license_key(conn, notes)?);
    }

    Ok(keys)
}

fn insert_license_key(conn: &Connection, notes: Option<&str>) -> Result<LicenseKey> {
    let created_at = now();

    for _ in 0..=KEY_COLLISION_RETRIES {
        let id = gen_id();
        let key_string = generate_license_key();

        let inserted = conn.execute(
            "INSERT INTO license_keys (id, key_string, status, notes, created_at)
             VALUES (?1, ?2, 'unused', ?3, ?4)",
            params![&id, &key_string, notes, created_at],
        );

        match inserted {
            Ok(_) => {
                return Ok(LicenseKey {
                    id,
                    key_string,
                    status: KeyStatus::Unused,
                    email: None,
                    name: None,
                    machine_id: None,
                    claimed_at: None,
                    notes: notes.map(String::from),
                    created_at,
                })
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!("License key collision on insert, regenerating");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(
        "Failed to generate a unique license key".into(),
    ))
}

pub fn get_license_key_by_key(conn: &Connection, key_string: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_keys WHERE key_string = ?1",
            LICENSE_KEY_COLS
        ),
        &[&key_string],
    )
}

pub fn get_license_key_by_id(conn: &Connection, id: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!("SELECT {} FROM license_keys WHERE id = ?1", LICENSE_KEY_COLS),
        &[&id],
    )
}

pub fn list_license_keys(conn: &Connection) -> Result<Vec<LicenseKey>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_keys ORDER BY created_at DESC, key_string",
            LICENSE_KEY_COLS
        ),
        &[],
    )
}

/// Outcome of an atomic claim attempt.
pub enum ClaimResult {
    /// This caller won the Unused -> Claimed transition.
    Claimed(LicenseKey),
    /// The key was already claimed; carries the winning record so the
    /// caller can see which machine holds the binding.
    Conflict(LicenseKey),
    NotFound,
}

/// Atomically claim a license key for a machine.
///
/// The UPDATE is a compare-and-swap guarded on `status = 'unused'`; SQLite
/// serializes writers, so of any number of concurrent callers exactly one
/// observes an affected row. Losers re-read and receive the winner's bound
/// record, not a generic error.
pub fn claim_license_key(
    conn: &Connection,
    key_string: &str,
    email: &str,
    name: &str,
    machine_id: &str,
) -> Result<ClaimResult> {
    let affected = conn.execute(
        "UPDATE license_keys
         SET status = 'claimed', email = ?1, name = ?2, machine_id = ?3, claimed_at = ?4
         WHERE key_string = ?5 AND status = 'unused'",
        params![email, name, machine_id, now(), key_string],
    )?;

    let record = get_license_key_by_key(conn, key_string)?;

    match record {
        Some(key) if affected == 1 => Ok(ClaimResult::Claimed(key)),
        Some(key) => Ok(ClaimResult::Conflict(key)),
        None => Ok(ClaimResult::NotFound),
    }
}

/// Administrative reset: return a key to `unused` and clear the binding.
/// Returns false if the id is unknown.
pub fn reset_license_key(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE license_keys
         SET status = 'unused', email = NULL, name = NULL, machine_id = NULL, claimed_at = NULL
         WHERE id = ?1",
        params![id],
    )?;
    Ok(affected > 0)
}

pub fn license_key_stats(conn: &Connection) -> Result<KeyStats> {
    let (total, claimed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'claimed') FROM license_keys",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(KeyStats {
        total_keys: total,
        claimed_keys: claimed,
        unused_keys: total - claimed,
    })
}

// ============ Activation log ============

/// Append an activation record. Append-only; nothing ever updates or
/// deletes these rows.
pub fn append_activation(conn: &Connection, input: &CreateActivation) -> Result<ActivationRecord> {
    let id = gen_id();
    let activated_at = now();

    conn.execute(
        "INSERT INTO activations (id, key_string, email, name, machine_id, activated_at, source_address, client_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            &input.key_string,
            &input.email,
            &input.name,
            &input.machine_id,
            activated_at,
            &input.source_address,
            &input.client_agent,
        ],
    )?;

    Ok(ActivationRecord {
        id,
        key_string: input.key_string.clone(),
        email: input.email.clone(),
        name: input.name.clone(),
        machine_id: input.machine_id.clone(),
        activated_at,
        source_address: input.source_address.clone(),
        client_agent: input.client_agent.clone(),
    })
}

pub fn list_recent_activations(conn: &Connection, limit: i64) -> Result<Vec<ActivationRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activations ORDER BY activated_at DESC, id LIMIT ?1",
            ACTIVATION_COLS
        ),
        &[&limit],
    )
}

pub fn count_activations(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM activations", [], |row| row.get(0))
        .map_err(Into::into)
}
