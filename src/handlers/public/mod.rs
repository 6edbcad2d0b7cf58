mod activate;

pub use activate::*;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;
use crate::rate_limit::{self, RateLimitConfig};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "cspline-activation",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route(
            "/activate",
            post(activate).layer(rate_limit::standard_layer(rate_limit.standard_rpm)),
        )
        .route(
            "/health",
            get(health).layer(rate_limit::relaxed_layer(rate_limit.relaxed_rpm)),
        )
}
