//! Personalized feed: books owned by the users someone follows.

use crate::model::book::Book;
use crate::model::page::{Page, PageRequest};
use crate::model::user::UserId;
use crate::repo::book_repo::{count_books, query_books};
use crate::repo::follow_graph::user_exists;
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::Connection;

// Resolved inside the engine: a bind per followed user would hit SQLite's
// host-parameter limit.
const FEED_WHERE_SQL: &str = " WHERE b.uploaded_by_id IN (
    SELECT f.following_id
    FROM follows f
    WHERE f.follower_id = ?
)";

/// Builds one feed page for `user_id`, newest books first.
///
/// Following nobody is a valid state and yields an empty page. `total` counts
/// every feed-eligible book, not the requesting user's own books.
pub(crate) fn compose_feed(
    conn: &Connection,
    user_id: UserId,
    page: PageRequest,
) -> RepoResult<Page<Book>> {
    if !user_exists(conn, user_id)? {
        return Err(RepoError::not_found("user", user_id));
    }

    let total = count_books(conn, FEED_WHERE_SQL, vec![Value::Integer(user_id)])?;
    if total == 0 {
        return Ok(Page::empty());
    }

    let items = query_books(
        conn,
        FEED_WHERE_SQL,
        vec![Value::Integer(user_id)],
        Some(page),
    )?;
    Ok(Page { items, total })
}
