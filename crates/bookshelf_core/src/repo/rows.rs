//! Shared SELECT fragments and row decoders.

use crate::model::book::{Book, Review};
use crate::model::user::User;
use rusqlite::Row;

/// Epoch milliseconds expression matching the schema column defaults.
pub(crate) const NOW_MS_SQL: &str =
    "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

pub(crate) const USER_SELECT_SQL: &str = "SELECT
    u.id AS user_id,
    u.username AS user_username,
    u.email AS user_email,
    u.bio AS user_bio,
    u.image AS user_image,
    u.created_at AS user_created_at,
    u.updated_at AS user_updated_at
FROM users u";

pub(crate) const BOOK_SELECT_SQL: &str = "SELECT
    b.id,
    b.slug,
    b.title,
    b.description,
    b.image,
    b.file,
    b.download_count,
    b.created_at,
    b.updated_at,
    u.id AS user_id,
    u.username AS user_username,
    u.email AS user_email,
    u.bio AS user_bio,
    u.image AS user_image,
    u.created_at AS user_created_at,
    u.updated_at AS user_updated_at
FROM books b
INNER JOIN users u ON u.id = b.uploaded_by_id";

pub(crate) const REVIEW_SELECT_SQL: &str = "SELECT
    r.id,
    r.book_id,
    r.title,
    r.body,
    r.score,
    r.created_at,
    u.id AS user_id,
    u.username AS user_username,
    u.email AS user_email,
    u.bio AS user_bio,
    u.image AS user_image,
    u.created_at AS user_created_at,
    u.updated_at AS user_updated_at
FROM reviews r
INNER JOIN users u ON u.id = r.user_id";

/// Newest first; id breaks ties between rows created in the same millisecond.
pub(crate) const BOOK_ORDER_SQL: &str = " ORDER BY b.created_at DESC, b.id DESC";

pub(crate) fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("user_id")?,
        username: row.get("user_username")?,
        email: row.get("user_email")?,
        bio: row.get("user_bio")?,
        image: row.get("user_image")?,
        created_at: row.get("user_created_at")?,
        updated_at: row.get("user_updated_at")?,
    })
}

/// Decodes a book row; tags are attached afterwards by the tag preload.
pub(crate) fn parse_book_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get("id")?,
        slug: row.get("slug")?,
        title: row.get("title")?,
        description: row.get("description")?,
        image: row.get("image")?,
        file: row.get("file")?,
        download_count: row.get("download_count")?,
        owner: parse_user_row(row)?,
        tags: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_review_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get("id")?,
        book_id: row.get("book_id")?,
        user: parse_user_row(row)?,
        title: row.get("title")?,
        body: row.get("body")?,
        score: row.get("score")?,
        created_at: row.get("created_at")?,
    })
}
