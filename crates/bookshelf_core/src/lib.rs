//! Data-access core for the book-sharing service.
//! This crate is the single source of truth for catalog and follow-graph invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{ConfigError, DatabaseConfig, LoggingConfig, StoreConfig};
pub use db::{open_pool, open_pool_in_memory, DbError, DbPool};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::book::{Book, BookId, BookPatch, NewBook, NewReview, Review, ReviewId, Tag, TagId};
pub use model::page::{Page, PageRequest};
pub use model::user::{Follow, NewUser, User, UserId, UserPatch, UserProfile};
pub use repo::book_repo::{BookRepository, SqliteBookRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
