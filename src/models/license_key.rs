use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle state of a license key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyStatus {
    Unused,
    Claimed,
}

/// One purchasable license.
///
/// Invariant (also CHECK-constrained in the schema): `status == Claimed`
/// exactly when `machine_id` is set. The binding fields `email`, `name`,
/// `machine_id` and `claimed_at` are written once on first claim and only
/// cleared by an administrative reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseKey {
    pub id: String,
    /// Unique, unguessable, human-enterable token. Immutable.
    pub key_string: String,
    pub status: KeyStatus,
    pub email: Option<String>,
    pub name: Option<String>,
    pub machine_id: Option<String>,
    pub claimed_at: Option<i64>,
    /// Free-form administrative annotation.
    pub notes: Option<String>,
    pub created_at: i64,
}

impl LicenseKey {
    /// Whether this key is bound to the given machine.
    pub fn is_bound_to(&self, machine_id: &str) -> bool {
        self.status == KeyStatus::Claimed && self.machine_id.as_deref() == Some(machine_id)
    }
}

/// Counters backing the admin dashboard.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KeyStats {
    pub total_keys: i64,
    pub claimed_keys: i64,
    pub unused_keys: i64,
}
