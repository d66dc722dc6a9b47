mod common;

use common::{open_counted_fixture, open_fixture, seed_library, AUTHOR, BOOK};
use modellayer_core::{ErrorKind, FetchMode, ModelError, Params, Record, Role, Value};
use std::sync::atomic::Ordering;

fn titles(record: &Record) -> Vec<String> {
    record
        .rows()
        .into_iter()
        .map(|row| row["title"].to_string())
        .collect()
}

#[test]
fn find_prefixes_qualified_primary_key() {
    let (_dir, db) = open_fixture();
    let mut book = db.entity(BOOK).unwrap();

    book.find("title");
    assert_eq!(book.query_string(), "SELECT book.id, title FROM book");

    book.find("*");
    assert_eq!(book.query_string(), "SELECT * FROM book");

    book.find("id, title");
    assert_eq!(book.query_string(), "SELECT id, title FROM book");
}

#[test]
fn chain_renders_in_call_order_and_fetches() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let mut book = db.entity(BOOK).unwrap();

    book.find("*")
        .r#where("author_id = :author", Params::new().bind("author", 1))
        .order("title")
        .limit(1)
        .offset(1);
    assert_eq!(
        book.query_string(),
        "SELECT * FROM book WHERE author_id = :author ORDER BY title LIMIT 1 OFFSET 1"
    );

    book.fetch(FetchMode::All).unwrap();
    assert_eq!(titles(book.record()), vec!["The Dispossessed"]);
    assert_eq!(book.count().unwrap(), 1);
}

#[test]
fn group_clause_is_appended() {
    let (_dir, db) = open_fixture();
    let mut book = db.entity(BOOK).unwrap();

    book.find("id").group("author_id").order("author_id");
    assert_eq!(
        book.query_string(),
        "SELECT id FROM book GROUP BY author_id ORDER BY author_id"
    );
}

#[test]
fn join_on_links_primary_key_to_joined_column() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let book_schema = db.schema(BOOK).unwrap();
    let mut author = db.entity(AUTHOR).unwrap();

    author
        .find("author.name, book.title")
        .inner_join(&book_schema)
        .on("author_id")
        .unwrap()
        .order("book.title");
    assert_eq!(
        author.query_string(),
        "SELECT author.id, author.name, book.title FROM author \
         INNER JOIN book ON author.id = book.author_id ORDER BY book.title"
    );

    let rows = author.fetch_get(FetchMode::All).unwrap();
    assert_eq!(titles(&rows), vec!["Earthsea", "Kindred", "The Dispossessed"]);
    assert_eq!(author.record(), &Record::Absent);
}

#[test]
fn left_join_keeps_authors_without_books() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let book_schema = db.schema(BOOK).unwrap();
    let mut author = db.entity(AUTHOR).unwrap();

    author
        .find("author.name, book.title")
        .left_join(&book_schema)
        .on("author_id")
        .unwrap()
        .r#where("book.id IS NULL", Params::new());

    let rows = author.fetch_get(FetchMode::All).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows()[0]["name"], Value::from("Anonymous"));
}

#[test]
fn on_requires_a_join() {
    let (_dir, db) = open_fixture();
    let mut author = db.entity(AUTHOR).unwrap();

    author.find("*");
    let err = author.on("author_id").unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)));
    assert_eq!(author.error().unwrap().kind, ErrorKind::Configuration);
}

#[test]
fn on_rejects_columns_of_other_schemas() {
    let (_dir, db) = open_fixture();
    let book_schema = db.schema(BOOK).unwrap();
    let mut author = db.entity(AUTHOR).unwrap();

    author.find("*").inner_join(&book_schema);
    let err = author.on("slug").unwrap_err();
    assert!(matches!(err, ModelError::Configuration(message) if message.contains("slug")));
}

#[test]
fn find_discards_a_pending_join() {
    let (_dir, db) = open_fixture();
    let book_schema = db.schema(BOOK).unwrap();
    let mut author = db.entity(AUTHOR).unwrap();

    author.find("*").inner_join(&book_schema);
    author.find("*");
    assert!(author.on("author_id").is_err());
}

#[test]
fn raw_query_takes_decoded_params() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let mut book = db.entity(BOOK).unwrap();

    let params = Params::decode("min=200").unwrap();
    let rows = book
        .query(
            "SELECT title FROM book WHERE pages > :min ORDER BY title",
            params,
        )
        .fetch_get(FetchMode::All)
        .unwrap();
    assert_eq!(titles(&rows), vec!["Kindred", "The Dispossessed"]);
}

#[test]
fn unbound_placeholder_is_rejected_before_connecting() {
    let (_dir, db, connects) = open_counted_fixture();
    let before = connects.load(Ordering::SeqCst);
    let mut book = db.entity(BOOK).unwrap();

    let err = book
        .query("SELECT * FROM book WHERE id = :id", Params::new())
        .fetch(FetchMode::One)
        .unwrap_err();
    assert!(matches!(err, ModelError::Configuration(message) if message.contains(":id")));
    assert_eq!(connects.load(Ordering::SeqCst), before);
    assert_eq!(book.last_statement().unwrap().sql, "SELECT * FROM book WHERE id = :id");
}

#[test]
fn fetch_without_a_chain_is_usage_error() {
    let (_dir, db) = open_fixture();
    let mut book = db.entity(BOOK).unwrap();
    assert!(matches!(book.fetch(FetchMode::All), Err(ModelError::Usage(_))));
}

#[test]
fn fetch_one_loads_a_single_row() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let mut book = db.entity(BOOK).unwrap();

    book.find("*")
        .r#where("title = :title", Params::new().bind("title", "Kindred"))
        .fetch(FetchMode::One)
        .unwrap();
    assert!(book.exist().unwrap());
    assert_eq!(book.get("author_slug"), Some(&Value::from("octavia")));
}

#[test]
fn driver_errors_are_captured_with_code() {
    let (_dir, db) = open_fixture();
    let mut book = db.entity(BOOK).unwrap();

    let err = book
        .query("SELECT missing_column FROM book", Params::new())
        .fetch(FetchMode::All)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(book.error().unwrap().kind, ErrorKind::Execution);
    assert!(book.sql_state().is_some());
}

#[test]
fn colon_words_in_string_literals_are_not_placeholders() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let mut book = db.entity(BOOK).unwrap();

    let rows = book
        .find("*")
        .r#where("title = 'x :y'", Params::new())
        .fetch_get(FetchMode::All)
        .unwrap();
    assert!(rows.is_empty());
    assert!(book.error().is_none());
}

#[test]
fn prepare_errors_from_batches_keep_their_code() {
    let (_dir, db) = open_fixture();

    let err = db
        .execute_batch(Role::Root, "SELECT missing_column FROM book;")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.sql_state(), Some(rusqlite::ffi::SQLITE_ERROR));
}

#[test]
fn fetched_rows_keep_projection_order() {
    let (_dir, db) = open_fixture();
    seed_library(&db);
    let mut book = db.entity(BOOK).unwrap();

    let rows = book
        .find("title, pages, author_id")
        .order("id")
        .fetch_get(FetchMode::One)
        .unwrap();
    let columns: Vec<&str> = rows.rows()[0].keys().map(String::as_str).collect();
    assert_eq!(columns, vec!["id", "title", "pages", "author_id"]);
}
