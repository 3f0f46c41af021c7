//! Book repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD and listing queries for books, with owner and tags preloaded.
//! - Compose the tag association manager into create/update.
//! - Review (comment) persistence scoped to books.
//!
//! # Invariants
//! - `create`/`update` are atomic and return the canonical persisted book.
//! - Book lists are ordered `created_at DESC, id DESC`; `total` ignores the
//!   offset/limit window.
//! - Every read that loads a book and then its tags runs in one read snapshot.
//! - Deleting a book cascades to its reviews and tag associations; tag rows
//!   survive.

use crate::db::DbPool;
use crate::model::book::{Book, BookId, BookPatch, NewBook, NewReview, Review, ReviewId, Tag};
use crate::model::page::{Page, PageRequest};
use crate::model::user::UserId;
use crate::repo::feed::compose_feed;
use crate::repo::follow_graph::user_exists;
use crate::repo::rows::{
    parse_book_row, parse_review_row, BOOK_ORDER_SQL, BOOK_SELECT_SQL, NOW_MS_SQL,
    REVIEW_SELECT_SQL,
};
use crate::repo::tag_assoc::{
    attach_tags, count_books_for_tag, find_tag_by_name, list_all_tags, preload_tags, replace_tags,
};
use crate::repo::{
    ensure_schema_ready, log_mutation, read_snapshot, write_transaction, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::time::Instant;

/// Repository interface for books, their tags and their reviews.
pub trait BookRepository {
    /// Loads one book by slug. `Ok(None)` when absent.
    fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Book>>;
    /// Loads one book by slug only if `owner_id` uploaded it.
    fn get_by_owner_and_slug(&self, owner_id: UserId, slug: &str) -> RepoResult<Option<Book>>;
    /// Inserts a book and binds its tag set in one transaction.
    fn create(&self, book: &NewBook) -> RepoResult<Book>;
    /// Applies `patch` and replaces the whole tag set in one transaction.
    fn update(&self, book_id: BookId, patch: &BookPatch, tags: &[String]) -> RepoResult<Book>;
    /// Deletes one book together with its reviews and tag associations.
    fn delete(&self, book_id: BookId) -> RepoResult<()>;
    /// Bumps the download counter and returns the new value.
    fn increment_download_count(&self, book_id: BookId) -> RepoResult<i64>;
    /// Lists all books.
    ///
    /// Every `list*` method serves at most [`PageRequest::effective_limit`]
    /// items: a zero limit means 20 and anything above 100 is cut to 100.
    /// `total` always counts the whole matching set, so callers that pass an
    /// oversized limit should page on `total` rather than on `items.len()`.
    fn list(&self, page: PageRequest) -> RepoResult<Page<Book>>;
    /// Lists books carrying `tag`. Fails with `NotFound` when the tag does not exist.
    fn list_by_tag(&self, tag: &str, page: PageRequest) -> RepoResult<Page<Book>>;
    /// Lists books uploaded by `username`. Fails with `NotFound` for unknown users.
    fn list_by_author(&self, username: &str, page: PageRequest) -> RepoResult<Page<Book>>;
    /// Lists books uploaded by the users `user_id` follows.
    fn list_feed(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<Book>>;
    /// Adds a review to a book and returns it with its author preloaded.
    fn add_comment(&self, book_id: BookId, review: &NewReview) -> RepoResult<Review>;
    /// Reviews of the book at `slug`, oldest first. `Ok(None)` when the book is absent.
    fn get_comments_by_slug(&self, slug: &str) -> RepoResult<Option<Vec<Review>>>;
    fn get_comment_by_id(&self, review_id: ReviewId) -> RepoResult<Option<Review>>;
    fn delete_comment(&self, review_id: ReviewId) -> RepoResult<()>;
    /// All tags ordered by name; empty when the catalog has none.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
}

/// SQLite-backed book repository. Cheap to clone.
#[derive(Clone)]
pub struct SqliteBookRepository {
    pool: DbPool,
}

impl SqliteBookRepository {
    /// Constructs a repository over a migrated pool.
    pub fn try_new(pool: DbPool) -> RepoResult<Self> {
        ensure_schema_ready(&pool)?;
        Ok(Self { pool })
    }
}

impl BookRepository for SqliteBookRepository {
    fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Book>> {
        read_snapshot(&self.pool, |tx| {
            load_one_book(tx, " WHERE b.slug = ?", vec![Value::Text(slug.to_string())])
        })
    }

    fn get_by_owner_and_slug(&self, owner_id: UserId, slug: &str) -> RepoResult<Option<Book>> {
        read_snapshot(&self.pool, |tx| {
            load_one_book(
                tx,
                " WHERE b.slug = ? AND b.uploaded_by_id = ?",
                vec![Value::Text(slug.to_string()), Value::Integer(owner_id)],
            )
        })
    }

    fn create(&self, book: &NewBook) -> RepoResult<Book> {
        let started_at = Instant::now();
        let result = write_transaction(&self.pool, |tx| {
            if !user_exists(tx, book.owner_id)? {
                return Err(RepoError::not_found("user", book.owner_id));
            }

            tx.execute(
                "INSERT INTO books (
                    slug,
                    title,
                    description,
                    image,
                    file,
                    uploaded_by_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    book.slug.as_str(),
                    book.title.as_str(),
                    book.description.as_deref(),
                    book.image.as_deref(),
                    book.file.as_deref(),
                    book.owner_id,
                ],
            )?;
            let book_id = tx.last_insert_rowid();

            attach_tags(tx, book_id, &book.tags)?;
            reload_book(tx, book_id)
        });
        log_mutation("book_create", started_at, &result);
        result
    }

    fn update(&self, book_id: BookId, patch: &BookPatch, tags: &[String]) -> RepoResult<Book> {
        let started_at = Instant::now();
        let result = write_transaction(&self.pool, |tx| {
            let changed = tx.execute(
                &format!(
                    "UPDATE books
                     SET
                        slug = COALESCE(?2, slug),
                        title = COALESCE(?3, title),
                        description = COALESCE(?4, description),
                        image = COALESCE(?5, image),
                        file = COALESCE(?6, file),
                        download_count = COALESCE(?7, download_count),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![
                    book_id,
                    patch.slug.as_deref(),
                    patch.title.as_deref(),
                    patch.description.as_deref(),
                    patch.image.as_deref(),
                    patch.file.as_deref(),
                    patch.download_count,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::not_found("book", book_id));
            }

            replace_tags(tx, book_id, tags)?;
            reload_book(tx, book_id)
        });
        log_mutation("book_update", started_at, &result);
        result
    }

    fn delete(&self, book_id: BookId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self
            .pool
            .get()
            .map_err(RepoError::from)
            .and_then(|conn| {
                let removed = conn.execute("DELETE FROM books WHERE id = ?1;", [book_id])?;
                if removed == 0 {
                    return Err(RepoError::not_found("book", book_id));
                }
                Ok(())
            });
        log_mutation("book_delete", started_at, &result);
        result
    }

    fn increment_download_count(&self, book_id: BookId) -> RepoResult<i64> {
        let conn = self.pool.get()?;
        conn.query_row(
            "UPDATE books
             SET download_count = download_count + 1
             WHERE id = ?1
             RETURNING download_count;",
            [book_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RepoError::not_found("book", book_id))
    }

    fn list(&self, page: PageRequest) -> RepoResult<Page<Book>> {
        read_snapshot(&self.pool, |tx| {
            let items = query_books(tx, "", Vec::new(), Some(page))?;
            let total = count_books(tx, "", Vec::new())?;
            Ok(Page { items, total })
        })
    }

    fn list_by_tag(&self, tag: &str, page: PageRequest) -> RepoResult<Page<Book>> {
        read_snapshot(&self.pool, |tx| {
            let tag = find_tag_by_name(tx, tag)?.ok_or_else(|| RepoError::not_found("tag", tag))?;
            let items = query_books(
                tx,
                " WHERE EXISTS (
                    SELECT 1
                    FROM book_tags bt
                    WHERE bt.book_id = b.id AND bt.tag_id = ?
                )",
                vec![Value::Integer(tag.id)],
                Some(page),
            )?;
            let total = count_books_for_tag(tx, &tag)?;
            Ok(Page { items, total })
        })
    }

    fn list_by_author(&self, username: &str, page: PageRequest) -> RepoResult<Page<Book>> {
        read_snapshot(&self.pool, |tx| {
            let owner_id: UserId = tx
                .query_row(
                    "SELECT id FROM users WHERE username = ?1;",
                    [username],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| RepoError::not_found("user", username))?;

            let where_sql = " WHERE b.uploaded_by_id = ?";
            let items = query_books(tx, where_sql, vec![Value::Integer(owner_id)], Some(page))?;
            let total = count_books(tx, where_sql, vec![Value::Integer(owner_id)])?;
            Ok(Page { items, total })
        })
    }

    fn list_feed(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<Book>> {
        read_snapshot(&self.pool, |tx| compose_feed(tx, user_id, page))
    }

    fn add_comment(&self, book_id: BookId, review: &NewReview) -> RepoResult<Review> {
        let started_at = Instant::now();
        let result = write_transaction(&self.pool, |tx| {
            if !book_exists(tx, book_id)? {
                return Err(RepoError::not_found("book", book_id));
            }
            if !user_exists(tx, review.user_id)? {
                return Err(RepoError::not_found("user", review.user_id));
            }

            tx.execute(
                "INSERT INTO reviews (book_id, user_id, title, body, score)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    book_id,
                    review.user_id,
                    review.title.as_str(),
                    review.body.as_str(),
                    review.score,
                ],
            )?;
            let review_id = tx.last_insert_rowid();
            load_review(tx, review_id)?.ok_or_else(|| {
                RepoError::InvalidData(format!("review {review_id} missing after insert"))
            })
        });
        log_mutation("review_create", started_at, &result);
        result
    }

    fn get_comments_by_slug(&self, slug: &str) -> RepoResult<Option<Vec<Review>>> {
        read_snapshot(&self.pool, |tx| {
            let book_id: Option<BookId> = tx
                .query_row("SELECT id FROM books WHERE slug = ?1;", [slug], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(book_id) = book_id else {
                return Ok(None);
            };

            let mut stmt = tx.prepare(&format!(
                "{REVIEW_SELECT_SQL}
                 WHERE r.book_id = ?1
                 ORDER BY r.created_at ASC, r.id ASC;"
            ))?;
            let mut rows = stmt.query([book_id])?;
            let mut reviews = Vec::new();
            while let Some(row) = rows.next()? {
                reviews.push(parse_review_row(row)?);
            }
            Ok(Some(reviews))
        })
    }

    fn get_comment_by_id(&self, review_id: ReviewId) -> RepoResult<Option<Review>> {
        let conn = self.pool.get()?;
        load_review(&conn, review_id)
    }

    fn delete_comment(&self, review_id: ReviewId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self
            .pool
            .get()
            .map_err(RepoError::from)
            .and_then(|conn| {
                let removed = conn.execute("DELETE FROM reviews WHERE id = ?1;", [review_id])?;
                if removed == 0 {
                    return Err(RepoError::not_found("review", review_id));
                }
                Ok(())
            });
        log_mutation("review_delete", started_at, &result);
        result
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let conn = self.pool.get()?;
        list_all_tags(&conn)
    }
}

/// Runs one book query with owner joined and tags preloaded.
///
/// `where_sql` must reference books as `b` and use positional `?` binds
/// matching `bind_values`.
pub(crate) fn query_books(
    conn: &Connection,
    where_sql: &str,
    mut bind_values: Vec<Value>,
    page: Option<PageRequest>,
) -> RepoResult<Vec<Book>> {
    let mut sql = format!("{BOOK_SELECT_SQL}{where_sql}{BOOK_ORDER_SQL}");
    if let Some(page) = page {
        sql.push_str(" LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(page.effective_limit())));
        bind_values.push(Value::Integer(i64::from(page.offset)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut books = Vec::new();
    while let Some(row) = rows.next()? {
        books.push(parse_book_row(row)?);
    }

    preload_tags(conn, &mut books)?;
    Ok(books)
}

/// Counts books matching `where_sql` without any pagination window.
pub(crate) fn count_books(
    conn: &Connection,
    where_sql: &str,
    bind_values: Vec<Value>,
) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM books b{where_sql};"),
        params_from_iter(bind_values),
        |row| row.get(0),
    )?;
    u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative book count {count}")))
}

fn load_one_book(
    conn: &Connection,
    where_sql: &str,
    bind_values: Vec<Value>,
) -> RepoResult<Option<Book>> {
    Ok(query_books(conn, where_sql, bind_values, None)?
        .into_iter()
        .next())
}

fn reload_book(conn: &Connection, book_id: BookId) -> RepoResult<Book> {
    load_one_book(conn, " WHERE b.id = ?", vec![Value::Integer(book_id)])?
        .ok_or_else(|| RepoError::InvalidData(format!("book {book_id} missing after write")))
}

fn load_review(conn: &Connection, review_id: ReviewId) -> RepoResult<Option<Review>> {
    let review = conn
        .query_row(
            &format!("{REVIEW_SELECT_SQL} WHERE r.id = ?1;"),
            [review_id],
            parse_review_row,
        )
        .optional()?;
    Ok(review)
}

fn book_exists(conn: &Connection, book_id: BookId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1);",
        [book_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
