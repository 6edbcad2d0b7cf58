use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cspline_activation::config::Config;
use cspline_activation::db::{create_pool, init_db, queries, AppState};
use cspline_activation::handlers;
use cspline_activation::signing::Signer;
use cspline_activation::util::hash_secret;

#[derive(Parser, Debug)]
#[command(name = "cspline-activation")]
#[command(about = "Machine-bound license activation server for CSpline Fusion Suite")]
struct Cli {
    /// Seed the database with a few dev license keys and print them
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Generates a handful of license keys for local testing and prints them in
/// copy-paste friendly form. Only runs in dev mode and when the key table
/// is empty.
fn seed_dev_keys(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let stats = queries::license_key_stats(&conn).expect("Failed to count license keys");
    if stats.total_keys > 0 {
        tracing::info!("Database already has license keys, skipping seed");
        return;
    }

    let keys = queries::create_license_keys(&conn, 3, Some("dev seed"))
        .expect("Failed to create dev license keys");

    tracing::info!("============================================");
    tracing::info!("DEV LICENSE KEYS SEEDED");
    tracing::info!("============================================");

    println!();
    println!("--- COPY FROM HERE ---");
    for key in &keys {
        println!("  license_key: {}", key.key_string);
    }
    println!("--- END COPY ---");
    println!();
}

/// Build the signer from config, falling back to an ephemeral keypair in
/// dev mode. Returns `None` when no key is available; activation requests
/// then fail with a server signing error instead of going out unsigned.
fn build_signer(config: &Config) -> Option<Arc<Signer>> {
    if let Some(ref seed) = config.signing_key_b64 {
        match Signer::from_seed_base64(seed) {
            Ok(signer) => {
                tracing::info!("Signing key loaded (public key: {})", signer.public_key_base64());
                return Some(Arc::new(signer));
            }
            Err(e) => {
                tracing::error!("Configured signing key is unusable: {}", e);
                return None;
            }
        }
    }

    if config.dev_mode {
        let signer = Signer::generate();
        tracing::warn!("============================================");
        tracing::warn!("NO SIGNING KEY CONFIGURED - DEV MODE");
        tracing::warn!("Generated an EPHEMERAL keypair; tokens will not");
        tracing::warn!("verify after a restart. Public key:");
        tracing::warn!("{}", signer.public_key_base64());
        tracing::warn!("============================================");
        return Some(Arc::new(signer));
    }

    tracing::error!(
        "No signing key configured (set CSPLINE_SIGNING_KEY or CSPLINE_SIGNING_KEY_FILE); \
         activation requests will fail until one is provided"
    );
    None
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cspline_activation=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let signer = build_signer(&config);

    if config.admin_token.is_none() {
        tracing::warn!("CSPLINE_ADMIN_TOKEN not set; admin API is disabled");
    }

    let state = AppState {
        db: db_pool,
        signer,
        admin_token_hash: config.admin_token.as_deref().map(hash_secret),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set CSPLINE_ENV=dev)");
        } else {
            seed_dev_keys(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::public::router(config.rate_limit))
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("CSpline activation server listening on {}", addr);

    // Use into_make_service_with_connect_info so the per-IP rate limiter
    // can see peer addresses.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        // Also remove WAL and SHM files if they exist
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
