//! Entity model for the book-sharing catalog.
//!
//! # Responsibility
//! - Define read models returned by repositories with relations preloaded.
//! - Define write models accepted by repository mutations.
//!
//! # Invariants
//! - Every persisted entity is identified by a stable row id.
//! - Read models never carry half-loaded relations: a `Book` always has its
//!   owner and its full tag set.

pub mod book;
pub mod page;
pub mod user;
