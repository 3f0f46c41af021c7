//! Tag resolution and book/tag association management.
//!
//! # Responsibility
//! - Resolve tag names to shared `tags` rows, creating missing ones.
//! - Bind a book to its tag set (`attach_tags`) or rebind it (`replace_tags`).
//! - Preload tag sets for a batch of books in one query.
//!
//! # Invariants
//! - Callers pass an open transaction for writes; tag rows are only created
//!   as part of attaching them to a book.
//! - Tag rows are never deleted here, even when no book references them.
//! - Preloaded tag sets are ordered by name ascending.

use crate::model::book::{Book, BookId, Tag};
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

/// Looks up one tag by exact name.
pub(crate) fn find_tag_by_name(conn: &Connection, name: &str) -> RepoResult<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, name FROM tags WHERE name = ?1;",
            [name],
            |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(tag)
}

/// Adds the named tags to `book_id`, reusing existing rows by exact name.
///
/// Duplicate names are collapsed; associations that already exist are kept.
pub(crate) fn attach_tags(conn: &Connection, book_id: BookId, names: &[String]) -> RepoResult<()> {
    let tags = resolve_tags(conn, names)?;
    for tag in &tags {
        conn.execute(
            "INSERT OR IGNORE INTO book_tags (book_id, tag_id) VALUES (?1, ?2);",
            params![book_id, tag.id],
        )?;
    }
    debug!(
        "event=tags_attach module=repo status=ok book_id={book_id} tag_count={}",
        tags.len()
    );
    Ok(())
}

/// Makes the tag set of `book_id` exactly the named set.
pub(crate) fn replace_tags(conn: &Connection, book_id: BookId, names: &[String]) -> RepoResult<()> {
    conn.execute("DELETE FROM book_tags WHERE book_id = ?1;", [book_id])?;
    attach_tags(conn, book_id, names)
}

/// Fills `Book::tags` for every book with one batched query.
pub(crate) fn preload_tags(conn: &Connection, books: &mut [Book]) -> RepoResult<()> {
    if books.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; books.len()].join(", ");
    let sql = format!(
        "SELECT bt.book_id, t.id, t.name
         FROM book_tags bt
         INNER JOIN tags t ON t.id = bt.tag_id
         WHERE bt.book_id IN ({placeholders})
         ORDER BY t.name ASC;"
    );
    let bind_values: Vec<Value> = books.iter().map(|book| Value::Integer(book.id)).collect();

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut by_book: HashMap<BookId, Vec<Tag>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let book_id: BookId = row.get(0)?;
        by_book.entry(book_id).or_default().push(Tag {
            id: row.get(1)?,
            name: row.get(2)?,
        });
    }

    for book in books.iter_mut() {
        book.tags = by_book.remove(&book.id).unwrap_or_default();
    }
    Ok(())
}

/// Returns every tag, ordered by name.
pub(crate) fn list_all_tags(conn: &Connection) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name ASC;")?;
    let mut rows = stmt.query([])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        });
    }
    Ok(tags)
}

/// Counts books associated with `tag` straight from the association table.
pub(crate) fn count_books_for_tag(conn: &Connection, tag: &Tag) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM book_tags WHERE tag_id = ?1;",
        [tag.id],
        |row| row.get(0),
    )?;
    u64::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("negative book count for tag `{}`", tag.name)))
}

fn resolve_tags(conn: &Connection, names: &[String]) -> RepoResult<Vec<Tag>> {
    let mut seen = HashSet::new();
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }

        let tag = match find_tag_by_name(conn, name)? {
            Some(existing) => existing,
            None => {
                conn.execute("INSERT INTO tags (name) VALUES (?1);", [name.as_str()])?;
                Tag {
                    id: conn.last_insert_rowid(),
                    name: name.clone(),
                }
            }
        };
        tags.push(tag);
    }
    Ok(tags)
}
