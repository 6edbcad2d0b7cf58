use serde::{Deserialize, Serialize};

/// Append-only audit record: one row per accepted activation, including
/// repeat activations from the already-bound machine. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub id: String,
    pub key_string: String,
    pub email: String,
    pub name: String,
    pub machine_id: String,
    pub activated_at: i64,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}

/// Input for appending an activation record.
#[derive(Debug, Clone)]
pub struct CreateActivation {
    pub key_string: String,
    pub email: String,
    pub name: String,
    pub machine_id: String,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}
