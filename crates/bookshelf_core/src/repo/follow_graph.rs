//! Directed follow edges stored in the `follows` join table.
//!
//! # Invariants
//! - At most one edge per ordered `(follower_id, following_id)` pair.
//! - An edge never points a user at themselves.
//! - "Who follows me" and "who do I follow" are both answered from `follows`
//!   by selecting on `following_id` or `follower_id`.

use crate::model::user::{Follow, UserId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};

/// Inserts the edge `follower_id -> followee_id`.
///
/// Must run inside a transaction: the existence checks and the insert form
/// one unit.
pub(crate) fn add_follower(
    conn: &Connection,
    followee_id: UserId,
    follower_id: UserId,
) -> RepoResult<Follow> {
    if followee_id == follower_id {
        return Err(RepoError::SelfFollow(follower_id));
    }
    for user_id in [followee_id, follower_id] {
        if !user_exists(conn, user_id)? {
            return Err(RepoError::not_found("user", user_id));
        }
    }
    if is_follower(conn, followee_id, follower_id)? {
        return Err(RepoError::Conflict(format!(
            "user {follower_id} already follows user {followee_id}"
        )));
    }

    conn.execute(
        "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2);",
        params![follower_id, followee_id],
    )?;
    Ok(Follow {
        follower_id,
        following_id: followee_id,
    })
}

/// Deletes the edge `follower_id -> followee_id`. Returns whether a row went away.
pub(crate) fn remove_follower(
    conn: &Connection,
    followee_id: UserId,
    follower_id: UserId,
) -> RepoResult<bool> {
    let removed = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2;",
        params![follower_id, followee_id],
    )?;
    Ok(removed > 0)
}

pub(crate) fn is_follower(
    conn: &Connection,
    followee_id: UserId,
    follower_id: UserId,
) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM follows
            WHERE follower_id = ?1 AND following_id = ?2
        );",
        params![follower_id, followee_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Users that `user_id` follows, ascending by id.
pub(crate) fn list_following(conn: &Connection, user_id: UserId) -> RepoResult<Vec<UserId>> {
    collect_ids(
        conn,
        "SELECT following_id FROM follows WHERE follower_id = ?1 ORDER BY following_id ASC;",
        user_id,
    )
}

/// Users following `user_id`, ascending by id.
pub(crate) fn list_followers(conn: &Connection, user_id: UserId) -> RepoResult<Vec<UserId>> {
    collect_ids(
        conn,
        "SELECT follower_id FROM follows WHERE following_id = ?1 ORDER BY follower_id ASC;",
        user_id,
    )
}

pub(crate) fn user_exists(conn: &Connection, user_id: UserId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn collect_ids(conn: &Connection, sql: &str, user_id: UserId) -> RepoResult<Vec<UserId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([user_id])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}
