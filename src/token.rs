//! License payload, token, and canonical encoding.
//!
//! The signature covers the exact bytes produced here, and the client
//! re-derives those bytes independently during offline verification, so the
//! encoding must be deterministic: object keys sorted at every nesting
//! level, compact separators, one fixed timestamp form, and explicit `null`
//! for absent optional fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Product name embedded in every issued payload.
pub const PRODUCT_NAME: &str = "CSpline Fusion Suite";

/// Edition embedded in every issued payload.
pub const PRODUCT_EDITION: &str = "Professional";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Licensee {
    pub name: String,
    pub email: String,
}

/// The signed artifact's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    pub product: String,
    pub edition: String,
    pub licensee: Licensee,
    pub machine_id: String,
    /// RFC 3339 UTC, seconds precision, `Z` suffix. Fixed form; see
    /// [`format_issued_at`].
    pub issued_at: String,
    /// Always `None` in current scope, but serialized as an explicit JSON
    /// `null` so presence/absence never changes the signed bytes.
    pub expires: Option<String>,
}

impl LicensePayload {
    /// Build the standard payload for an activation issued now.
    pub fn new(name: &str, email: &str, machine_id: &str, issued_at: DateTime<Utc>) -> Self {
        Self {
            product: PRODUCT_NAME.to_string(),
            edition: PRODUCT_EDITION.to_string(),
            licensee: Licensee {
                name: name.to_string(),
                email: email.to_string(),
            },
            machine_id: machine_id.to_string(),
            issued_at: format_issued_at(issued_at),
            expires: None,
        }
    }

    /// Canonical byte encoding of this payload (the signed message).
    pub fn canonical_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let value = serde_json::to_value(self)?;
        Ok(canonical_json(&value).into_bytes())
    }
}

/// The externally returned artifact: payload plus detached signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseToken {
    pub payload: LicensePayload,
    /// Base64-encoded signature over the canonical encoding of `payload`.
    pub sig: String,
}

/// Render an issuance timestamp in the one fixed form the encoding uses.
pub fn format_issued_at(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serialize a JSON value canonically: keys sorted lexicographically at
/// every nesting level, no insignificant whitespace, `null` kept explicit.
///
/// Scalars go through `serde_json`'s own rendering, so string escaping and
/// number forms match ordinary serialization; only object key order and
/// whitespace are pinned down here.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(out, &map[*key]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
