//! Book, tag and review models.
//!
//! # Invariants
//! - `Book::tags` is sorted by tag name ascending.
//! - Tags are shared rows; two books naming the same tag reference one `Tag`.

use crate::model::user::{User, UserId};
use serde::{Deserialize, Serialize};

/// Row identity of a book.
pub type BookId = i64;
/// Row identity of a tag.
pub type TagId = i64;
/// Row identity of a review.
pub type ReviewId = i64;

/// Persisted book with owner and tags preloaded.
///
/// Reviews are not part of this read model; load them with
/// `BookRepository::get_comments_by_slug`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    /// Unique URL-safe identifier.
    pub slug: String,
    /// Unique across all books.
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    /// Storage path of the uploaded file.
    pub file: Option<String>,
    pub download_count: i64,
    pub owner: User,
    /// Sorted by name ascending.
    pub tags: Vec<Tag>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Book {
    /// Tag names in the stored (alphabetical) order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Input for creating a book together with its tag set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewBook {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub file: Option<String>,
    pub owner_id: UserId,
    /// Tag names in caller order; duplicates are collapsed.
    pub tags: Vec<String>,
}

impl NewBook {
    pub fn new(owner_id: UserId, slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            owner_id,
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial book update. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookPatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub file: Option<String>,
    pub download_count: Option<i64>,
}

/// Shared tag row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Unique, matched exactly.
    pub name: String,
}

/// Review with its author preloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub book_id: BookId,
    pub user: User,
    pub title: String,
    pub body: String,
    pub score: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Input for adding a review to a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub score: i64,
}
