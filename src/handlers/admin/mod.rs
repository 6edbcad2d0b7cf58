mod activations;
mod keys;

pub use activations::*;
pub use keys::*;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/keys", post(generate_keys).get(list_keys))
        .route("/admin/keys/{id}/reset", post(reset_key))
        .route("/admin/activations", get(recent_activations))
        .route("/admin/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state, admin_auth))
}
