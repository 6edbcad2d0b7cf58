//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on unexpected stored values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const LICENSE_KEY_COLS: &str =
    "id, key_string, status, email, name, machine_id, claimed_at, notes, created_at";

pub const ACTIVATION_COLS: &str =
    "id, key_string, email, name, machine_id, activated_at, source_address, client_agent";

// ============ FromRow Implementations ============

impl FromRow for LicenseKey {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LicenseKey {
            id: row.get(0)?,
            key_string: row.get(1)?,
            status: parse_enum(row, 2, "status")?,
            email: row.get(3)?,
            name: row.get(4)?,
            machine_id: row.get(5)?,
            claimed_at: row.get(6)?,
            notes: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for ActivationRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ActivationRecord {
            id: row.get(0)?,
            key_string: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            machine_id: row.get(4)?,
            activated_at: row.get(5)?,
            source_address: row.get(6)?,
            client_agent: row.get(7)?,
        })
    }
}
