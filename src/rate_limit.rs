//! Rate limiting for public endpoints.
//!
//! Limits are applied per-IP to protect against abuse of the unauthenticated
//! surface. Brute-forcing keys is already uneconomical (96-bit key space);
//! this bounds request volume.
//!
//! Tiers:
//! - Standard: /activate (DB + crypto work per request)
//! - Relaxed: /health
//!
//! Configure via environment variables:
//! - RATE_LIMIT_STANDARD_RPM (default: 30)
//! - RATE_LIMIT_RELAXED_RPM (default: 60)

use std::sync::Arc;
use std::time::Duration;

use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Requests-per-minute settings for the public router's tiers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            standard_rpm: 30,
            relaxed_rpm: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            standard_rpm: env_rpm("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
            relaxed_rpm: env_rpm("RATE_LIMIT_RELAXED_RPM", defaults.relaxed_rpm),
        }
    }
}

fn env_rpm(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

/// Creates a rate limiter layer with the specified requests per minute.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    assert!(requests_per_minute > 0, "Rate limit must be greater than 0");

    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("Failed to build rate limiter config");

    GovernorLayer {
        config: Arc::new(config),
    }
}

/// Standard tier: endpoints doing crypto/DB work per request.
pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Relaxed tier: lightweight endpoints like health checks.
pub fn relaxed_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
