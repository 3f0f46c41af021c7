//! Pooled connection bootstrap for SQLite.
//!
//! # Responsibility
//! - Build `r2d2` pools over file or in-memory SQLite databases.
//! - Configure per-connection pragmas required by repository invariants.
//! - Trigger schema migrations before handing the pool out.
//!
//! # Invariants
//! - Pooled connections have `foreign_keys=ON`.
//! - File databases run in WAL mode so readers proceed alongside one writer.
//! - In-memory pools hold exactly one connection; it is never reaped.
//! - Returned pools have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::config::DatabaseConfig;
use log::{error, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Shared handle to the SQLite connection pool. Cheap to clone.
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

const IN_MEMORY_CONNECTION_STRING: &str = ":memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolMode {
    File,
    /// The database lives and dies with its only connection.
    Memory,
}

impl PoolMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens a pool described by `config` and applies all pending migrations.
///
/// A connection string of `:memory:` yields a private in-memory database that
/// lives as long as the pool. Such a pool has a single connection, so callers
/// are serialized on checkout and `max_open_connections` is ignored.
///
/// Missing parent directories of a file database are created.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_pool(config: &DatabaseConfig) -> DbResult<DbPool> {
    if config.connection_string == IN_MEMORY_CONNECTION_STRING {
        return build_pool(
            memory_manager(config.busy_timeout()),
            1,
            None,
            config.connection_timeout(),
            PoolMode::Memory,
        );
    }

    ensure_parent_dir(&config.connection_string)?;
    // r2d2 asserts `max_size > 0` and `min_idle <= max_size`.
    let max_size = config.max_open_connections.max(1);
    let manager = SqliteConnectionManager::file(&config.connection_string)
        .with_init(connection_init(config.busy_timeout(), PoolMode::File));
    build_pool(
        manager,
        max_size,
        Some(config.max_idle_connections.min(max_size)),
        config.connection_timeout(),
        PoolMode::File,
    )
}

/// Opens an isolated in-memory pool and applies all pending migrations.
///
/// The pool's single connection stays open, so the database survives until the
/// pool is dropped.
pub fn open_pool_in_memory() -> DbResult<DbPool> {
    let defaults = DatabaseConfig::default();
    build_pool(
        memory_manager(defaults.busy_timeout()),
        1,
        None,
        defaults.connection_timeout(),
        PoolMode::Memory,
    )
}

// Shared-cache memory databases lock per table and `SQLITE_LOCKED` bypasses
// the busy handler, so memory pools stay at one private connection.
fn memory_manager(busy_timeout: Duration) -> SqliteConnectionManager {
    SqliteConnectionManager::memory().with_init(connection_init(busy_timeout, PoolMode::Memory))
}

fn ensure_parent_dir(connection_string: &str) -> DbResult<()> {
    if connection_string.starts_with("file:") {
        return Ok(());
    }
    match Path::new(connection_string).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn connection_init(
    busy_timeout: Duration,
    mode: PoolMode,
) -> impl Fn(&mut Connection) -> Result<(), rusqlite::Error> + Send + Sync + 'static {
    move |conn: &mut Connection| {
        conn.busy_timeout(busy_timeout)?;
        if mode == PoolMode::File {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    }
}

fn build_pool(
    manager: SqliteConnectionManager,
    max_size: u32,
    min_idle: Option<u32>,
    connection_timeout: Duration,
    mode: PoolMode,
) -> DbResult<DbPool> {
    let started_at = Instant::now();
    let mode_name = mode.as_str();
    info!("event=db_open module=db status=start mode={mode_name} max_size={max_size}");

    let mut builder = r2d2::Pool::builder()
        .max_size(max_size)
        .min_idle(min_idle)
        .connection_timeout(connection_timeout);
    if mode == PoolMode::Memory {
        builder = builder.idle_timeout(None).max_lifetime(None);
    }

    let pool = match builder.build(manager) {
        Ok(pool) => pool,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode_name} duration_ms={} error_code=db_pool_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let migrated = pool
        .get()
        .map_err(DbError::from)
        .and_then(|mut conn| apply_migrations(&mut conn));
    match migrated {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode_name} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(pool)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode_name} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}
