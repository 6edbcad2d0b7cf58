mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::signing::Signer;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on a locked database before the operation
/// fails as a retryable server error.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// `None` when no signing key is configured; activation requests then
    /// fail with a server signing error instead of issuing unsigned tokens.
    pub signer: Option<Arc<Signer>>,
    /// SHA-256 hash of the admin bearer token; `None` disables the admin API.
    pub admin_token_hash: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
    Pool::builder().max_size(10).build(manager)
}
