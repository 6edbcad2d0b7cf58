use std::env;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base64-encoded Ed25519 seed, resolved from `CSPLINE_SIGNING_KEY` or
    /// the file named by `CSPLINE_SIGNING_KEY_FILE`. `None` means no key is
    /// configured; see `main` for the dev-mode fallback.
    pub signing_key_b64: Option<String>,
    pub admin_token: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("CSPLINE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "cspline_licenses.db".to_string()),
            signing_key_b64: load_signing_key(),
            admin_token: env::var("CSPLINE_ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            rate_limit: RateLimitConfig::from_env(),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolve the signing key seed: inline env var first, then key file.
fn load_signing_key() -> Option<String> {
    if let Ok(inline) = env::var("CSPLINE_SIGNING_KEY") {
        let inline = inline.trim().to_string();
        if !inline.is_empty() {
            return Some(inline);
        }
    }

    let path = env::var("CSPLINE_SIGNING_KEY_FILE").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let contents = contents.trim().to_string();
            if contents.is_empty() {
                tracing::error!("Signing key file {} is empty", path);
                None
            } else {
                Some(contents)
            }
        }
        Err(e) => {
            tracing::error!("Failed to read signing key file {}: {}", path, e);
            None
        }
    }
}
