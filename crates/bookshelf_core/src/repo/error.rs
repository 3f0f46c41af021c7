//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::user::UserId;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// A resource required by the operation does not exist.
    NotFound { entity: &'static str, key: String },
    /// A unique constraint rejected the write.
    Conflict(String),
    /// A user tried to follow themselves.
    SelfFollow(UserId),
    /// Any other storage-engine failure.
    Storage(DbError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// The pool points at a database that is not at the expected schema version.
    SchemaMismatch {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable machine-readable code used in log records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::SelfFollow(_) => "self_follow",
            Self::Storage(_) => "storage",
            Self::InvalidData(_) => "invalid_data",
            Self::SchemaMismatch { .. } => "schema_mismatch",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Conflict(detail) => write!(f, "conflict: {detail}"),
            Self::SelfFollow(user_id) => write!(f, "user {user_id} cannot follow themselves"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::SchemaMismatch {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unique_violation(&value) {
            return Self::Conflict(value.to_string());
        }
        Self::Storage(DbError::Sqlite(value))
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(value: r2d2::Error) -> Self {
        Self::Storage(DbError::Pool(value))
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use rusqlite::Connection;

    fn scratch() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE child (parent_id INTEGER NOT NULL REFERENCES parent (id));
             INSERT INTO parent (id, name) VALUES (1, 'a');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let conn = scratch();
        let err = conn
            .execute("INSERT INTO parent (name) VALUES ('a');", [])
            .unwrap_err();
        let repo_err = RepoError::from(err);
        assert!(repo_err.is_conflict(), "got {repo_err:?}");
        assert_eq!(repo_err.code(), "conflict");
    }

    #[test]
    fn foreign_key_violation_maps_to_storage() {
        let conn = scratch();
        let err = conn
            .execute("INSERT INTO child (parent_id) VALUES (42);", [])
            .unwrap_err();
        let repo_err = RepoError::from(err);
        assert!(matches!(repo_err, RepoError::Storage(_)), "got {repo_err:?}");
    }
}
