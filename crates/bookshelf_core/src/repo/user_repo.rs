//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD for users.
//! - Follower management on top of the follow graph.
//!
//! # Invariants
//! - Usernames and emails are unique; duplicates surface as `Conflict`.
//! - `add_follower` fails on an existing edge; `remove_follower` is idempotent.

use crate::db::DbPool;
use crate::model::user::{Follow, NewUser, User, UserId, UserPatch, UserProfile};
use crate::repo::follow_graph;
use crate::repo::rows::{parse_user_row, NOW_MS_SQL, USER_SELECT_SQL};
use crate::repo::{
    ensure_schema_ready, log_mutation, read_snapshot, write_transaction, RepoError, RepoResult,
};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::time::Instant;

/// Repository interface for users and follow edges.
pub trait UserRepository {
    fn get_by_id(&self, user_id: UserId) -> RepoResult<Option<User>>;
    fn get_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Loads one user by username with follower ids preloaded.
    fn get_by_username(&self, username: &str) -> RepoResult<Option<UserProfile>>;
    fn create(&self, user: &NewUser) -> RepoResult<User>;
    fn update(&self, user_id: UserId, patch: &UserPatch) -> RepoResult<User>;
    /// Records that `follower_id` follows `followee_id`. Fails with `Conflict`
    /// when the edge already exists.
    fn add_follower(&self, followee_id: UserId, follower_id: UserId) -> RepoResult<Follow>;
    /// Removes the edge if present; a missing edge is not an error.
    fn remove_follower(&self, followee_id: UserId, follower_id: UserId) -> RepoResult<()>;
    fn is_follower(&self, followee_id: UserId, follower_id: UserId) -> RepoResult<bool>;
    /// Users that `user_id` follows.
    fn list_following(&self, user_id: UserId) -> RepoResult<Vec<UserId>>;
    /// Users that follow `user_id`.
    fn list_followers(&self, user_id: UserId) -> RepoResult<Vec<UserId>>;
}

/// SQLite-backed user repository. Cheap to clone.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    /// Constructs a repository over a migrated pool.
    pub fn try_new(pool: DbPool) -> RepoResult<Self> {
        ensure_schema_ready(&pool)?;
        Ok(Self { pool })
    }
}

impl UserRepository for SqliteUserRepository {
    fn get_by_id(&self, user_id: UserId) -> RepoResult<Option<User>> {
        let conn = self.pool.get()?;
        find_user(&conn, "u.id = ?1", &user_id)
    }

    fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let conn = self.pool.get()?;
        find_user(&conn, "u.email = ?1", &email)
    }

    fn get_by_username(&self, username: &str) -> RepoResult<Option<UserProfile>> {
        read_snapshot(&self.pool, |tx| {
            let Some(user) = find_user(tx, "u.username = ?1", &username)? else {
                return Ok(None);
            };
            let follower_ids = follow_graph::list_followers(tx, user.id)?;
            Ok(Some(UserProfile { user, follower_ids }))
        })
    }

    fn create(&self, user: &NewUser) -> RepoResult<User> {
        let started_at = Instant::now();
        let result = write_transaction(&self.pool, |tx| {
            tx.execute(
                "INSERT INTO users (username, email, bio, image) VALUES (?1, ?2, ?3, ?4);",
                params![
                    user.username.as_str(),
                    user.email.as_str(),
                    user.bio.as_deref(),
                    user.image.as_deref(),
                ],
            )?;
            let user_id = tx.last_insert_rowid();
            reload_user(tx, user_id)
        });
        log_mutation("user_create", started_at, &result);
        result
    }

    fn update(&self, user_id: UserId, patch: &UserPatch) -> RepoResult<User> {
        let started_at = Instant::now();
        let result = write_transaction(&self.pool, |tx| {
            let changed = tx.execute(
                &format!(
                    "UPDATE users
                     SET
                        username = COALESCE(?2, username),
                        email = COALESCE(?3, email),
                        bio = COALESCE(?4, bio),
                        image = COALESCE(?5, image),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![
                    user_id,
                    patch.username.as_deref(),
                    patch.email.as_deref(),
                    patch.bio.as_deref(),
                    patch.image.as_deref(),
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::not_found("user", user_id));
            }
            reload_user(tx, user_id)
        });
        log_mutation("user_update", started_at, &result);
        result
    }

    fn add_follower(&self, followee_id: UserId, follower_id: UserId) -> RepoResult<Follow> {
        let started_at = Instant::now();
        let result = write_transaction(&self.pool, |tx| {
            follow_graph::add_follower(tx, followee_id, follower_id)
        });
        log_mutation("follow_add", started_at, &result);
        result
    }

    fn remove_follower(&self, followee_id: UserId, follower_id: UserId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self
            .pool
            .get()
            .map_err(RepoError::from)
            .and_then(|conn| follow_graph::remove_follower(&conn, followee_id, follower_id));
        if let Ok(false) = result {
            debug!(
                "event=follow_remove module=repo status=noop followee_id={followee_id} follower_id={follower_id}"
            );
        }
        let result = result.map(|_| ());
        log_mutation("follow_remove", started_at, &result);
        result
    }

    fn is_follower(&self, followee_id: UserId, follower_id: UserId) -> RepoResult<bool> {
        let conn = self.pool.get()?;
        follow_graph::is_follower(&conn, followee_id, follower_id)
    }

    fn list_following(&self, user_id: UserId) -> RepoResult<Vec<UserId>> {
        let conn = self.pool.get()?;
        follow_graph::list_following(&conn, user_id)
    }

    fn list_followers(&self, user_id: UserId) -> RepoResult<Vec<UserId>> {
        let conn = self.pool.get()?;
        follow_graph::list_followers(&conn, user_id)
    }
}

fn find_user(conn: &Connection, predicate: &str, value: &dyn ToSql) -> RepoResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("{USER_SELECT_SQL} WHERE {predicate};"),
            params![value],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

fn reload_user(conn: &Connection, user_id: UserId) -> RepoResult<User> {
    find_user(conn, "u.id = ?1", &user_id)?
        .ok_or_else(|| RepoError::InvalidData(format!("user {user_id} missing after write")))
}
