//! Repository layer over the pooled SQLite store.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for books and users.
//! - Keep SQL, transactions and preloading inside the persistence boundary.
//!
//! # Invariants
//! - Multi-step mutations run in one `IMMEDIATE` transaction and roll back on
//!   the first failure, which is returned unchanged.
//! - Single-entity lookups return `Ok(None)` when absent; scoped list queries
//!   return `RepoError::NotFound` when their scope does not exist.
//! - Reads never retry.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbPool;
use crate::logging::sanitize_message;
use log::{info, warn};
use rusqlite::{Transaction, TransactionBehavior};
use std::time::Instant;

pub mod book_repo;
mod error;
pub(crate) mod feed;
pub(crate) mod follow_graph;
mod rows;
pub(crate) mod tag_assoc;
pub mod user_repo;

pub use error::{RepoError, RepoResult};

/// Rejects pools whose schema is not at the version this binary writes.
fn ensure_schema_ready(pool: &DbPool) -> RepoResult<()> {
    let conn = pool.get()?;
    let actual_version = current_version(&conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::SchemaMismatch {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Runs `work` in one `IMMEDIATE` transaction; any error rolls everything back.
fn write_transaction<T>(
    pool: &DbPool,
    work: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
) -> RepoResult<T> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = work(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Runs multi-statement reads (page + total) against one consistent snapshot.
fn read_snapshot<T>(
    pool: &DbPool,
    work: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
) -> RepoResult<T> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
    let value = work(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Emits one `event=<event> module=repo` record for a finished mutation.
fn log_mutation<T>(event: &str, started_at: Instant, result: &RepoResult<T>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!("event={event} module=repo status=ok duration_ms={duration_ms}"),
        Err(err) => warn!(
            "event={event} module=repo status=error duration_ms={duration_ms} error_code={} error={}",
            err.code(),
            sanitize_message(&err.to_string())
        ),
    }
}
