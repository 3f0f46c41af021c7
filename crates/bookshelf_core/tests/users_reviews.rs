use bookshelf_core::{
    open_pool_in_memory, BookRepository, NewBook, NewReview, NewUser, RepoError,
    SqliteBookRepository, SqliteUserRepository, UserPatch, UserRepository,
};

fn repos() -> (SqliteBookRepository, SqliteUserRepository) {
    let pool = open_pool_in_memory().unwrap();
    (
        SqliteBookRepository::try_new(pool.clone()).unwrap(),
        SqliteUserRepository::try_new(pool).unwrap(),
    )
}

fn review(user_id: i64, title: &str, score: i64) -> NewReview {
    NewReview {
        user_id,
        title: title.to_string(),
        body: format!("{title} body"),
        score,
    }
}

#[test]
fn create_and_lookup_user_by_id_email_and_username() {
    let (_, users) = repos();
    let mut new_user = NewUser::new("alice", "alice@example.com");
    new_user.bio = Some("reads a lot".to_string());
    let created = users.create(&new_user).unwrap();

    assert_eq!(users.get_by_id(created.id).unwrap(), Some(created.clone()));
    assert_eq!(
        users.get_by_email("alice@example.com").unwrap(),
        Some(created.clone())
    );
    let profile = users.get_by_username("alice").unwrap().unwrap();
    assert_eq!(profile.user.bio.as_deref(), Some("reads a lot"));
    assert!(profile.follower_ids.is_empty());

    assert!(users.get_by_id(404).unwrap().is_none());
    assert!(users.get_by_email("nobody@example.com").unwrap().is_none());
    assert!(users.get_by_username("nobody").unwrap().is_none());
}

#[test]
fn duplicate_username_or_email_is_conflict() {
    let (_, users) = repos();
    users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();

    let username_err = users
        .create(&NewUser::new("alice", "other@example.com"))
        .unwrap_err();
    assert!(username_err.is_conflict(), "got {username_err:?}");

    let email_err = users
        .create(&NewUser::new("alicia", "alice@example.com"))
        .unwrap_err();
    assert!(email_err.is_conflict(), "got {email_err:?}");
}

#[test]
fn update_user_applies_only_provided_fields() {
    let (_, users) = repos();
    let created = users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();

    let updated = users
        .update(
            created.id,
            &UserPatch {
                image: Some("avatars/alice.png".to_string()),
                ..UserPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.username, "alice");
    assert_eq!(updated.image.as_deref(), Some("avatars/alice.png"));

    let err = users.update(404, &UserPatch::default()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn deleting_user_that_owns_books_is_rejected_by_storage() {
    let pool = open_pool_in_memory().unwrap();
    let books = SqliteBookRepository::try_new(pool.clone()).unwrap();
    let users = SqliteUserRepository::try_new(pool.clone()).unwrap();
    let owner = users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();
    books
        .create(&NewBook::new(owner.id, "dune", "Dune"))
        .unwrap();

    let conn = pool.get().unwrap();
    let err = conn
        .execute("DELETE FROM users WHERE id = ?1;", [owner.id])
        .unwrap_err();
    assert!(matches!(RepoError::from(err), RepoError::Storage(_)));
}

#[test]
fn add_comment_returns_review_with_author_preloaded() {
    let (books, users) = repos();
    let owner = users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();
    let reader = users
        .create(&NewUser::new("bob", "bob@example.com"))
        .unwrap();
    let book = books
        .create(&NewBook::new(owner.id, "dune", "Dune"))
        .unwrap();

    let added = books
        .add_comment(book.id, &review(reader.id, "Great", 5))
        .unwrap();
    assert_eq!(added.book_id, book.id);
    assert_eq!(added.user, reader);
    assert_eq!(added.score, 5);

    assert_eq!(books.get_comment_by_id(added.id).unwrap(), Some(added));
}

#[test]
fn add_comment_to_missing_book_or_by_missing_user_is_not_found() {
    let (books, users) = repos();
    let owner = users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();
    let book = books
        .create(&NewBook::new(owner.id, "dune", "Dune"))
        .unwrap();

    let missing_book = books
        .add_comment(404, &review(owner.id, "Lost", 1))
        .unwrap_err();
    assert!(matches!(
        missing_book,
        RepoError::NotFound { entity: "book", .. }
    ));

    let missing_user = books
        .add_comment(book.id, &review(404, "Ghost", 1))
        .unwrap_err();
    assert!(matches!(
        missing_user,
        RepoError::NotFound { entity: "user", .. }
    ));
}

#[test]
fn comments_by_slug_are_oldest_first_and_none_for_missing_book() {
    let (books, users) = repos();
    let owner = users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();
    let book = books
        .create(&NewBook::new(owner.id, "dune", "Dune"))
        .unwrap();
    books
        .create(&NewBook::new(owner.id, "emma", "Emma"))
        .unwrap();
    books
        .add_comment(book.id, &review(owner.id, "First", 4))
        .unwrap();
    books
        .add_comment(book.id, &review(owner.id, "Second", 3))
        .unwrap();

    let reviews = books.get_comments_by_slug("dune").unwrap().unwrap();
    let titles: Vec<&str> = reviews.iter().map(|review| review.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Second"]);
    assert!(reviews.iter().all(|review| review.user.id == owner.id));

    assert_eq!(books.get_comments_by_slug("emma").unwrap(), Some(Vec::new()));
    assert!(books.get_comments_by_slug("missing").unwrap().is_none());
}

#[test]
fn delete_comment_removes_only_that_review() {
    let (books, users) = repos();
    let owner = users
        .create(&NewUser::new("alice", "alice@example.com"))
        .unwrap();
    let book = books
        .create(&NewBook::new(owner.id, "dune", "Dune"))
        .unwrap();
    let first = books
        .add_comment(book.id, &review(owner.id, "First", 4))
        .unwrap();
    let second = books
        .add_comment(book.id, &review(owner.id, "Second", 3))
        .unwrap();

    books.delete_comment(first.id).unwrap();
    assert!(books.get_comment_by_id(first.id).unwrap().is_none());
    assert_eq!(books.get_comments_by_slug("dune").unwrap(), Some(vec![second]));

    assert!(books.delete_comment(first.id).unwrap_err().is_not_found());
}
