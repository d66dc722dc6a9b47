#![allow(dead_code)]

use modellayer_core::{
    ColumnOptions, ColumnType, ConnectionRouter, Connector, Credentials, Database, DbConfig,
    DbResult, EntitySchema, Role, RoutingPolicy, SchemaRegistry, SqliteConnector,
};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const AUTHOR: &str = "models::Author";
pub const BOOK: &str = "models::Book";

const FIXTURE_DDL: &str = "
    CREATE TABLE author (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT UNIQUE,
        created_at TEXT,
        updated_at TEXT
    );
    CREATE TABLE book (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author_id INTEGER REFERENCES author(id),
        author_slug TEXT,
        pages TEXT
    );
";

pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            EntitySchema::builder(AUTHOR, "author", "id")
                .column("name", ColumnOptions::new())
                .column(
                    "slug",
                    ColumnOptions::new()
                        .nullable()
                        .references(BOOK)
                        .foreign_key("author_slug")
                        .has_many()
                        .attach_as("books"),
                )
                .column("created_at", ColumnOptions::new().created_timestamp())
                .column("updated_at", ColumnOptions::new().updated_timestamp()),
        )
        .unwrap();
    registry
        .register(
            EntitySchema::builder(BOOK, "book", "id")
                .column("title", ColumnOptions::new())
                .column("author_id", ColumnOptions::new().nullable().references(AUTHOR))
                .column("author_slug", ColumnOptions::new().nullable())
                .column(
                    "pages",
                    ColumnOptions::new().nullable().typed(ColumnType::Integer),
                ),
        )
        .unwrap();
    registry
}

pub fn open_fixture() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::sqlite(dir.path().join("library.db"));
    let db = Database::open(config, registry()).unwrap();
    db.execute_batch(Role::Root, FIXTURE_DDL).unwrap();
    (dir, db)
}

/// Opens the fixture through a connector that counts connect calls.
pub fn open_counted_fixture() -> (TempDir, Database, Arc<AtomicUsize>) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::sqlite(dir.path().join("library.db"));
    let connects = Arc::new(AtomicUsize::new(0));
    let router = ConnectionRouter::with_connector(
        config,
        RoutingPolicy::PerRole,
        Box::new(CountingConnector {
            connects: Arc::clone(&connects),
        }),
    )
    .unwrap();
    let db = Database::with_router(router, registry());
    db.execute_batch(Role::Root, FIXTURE_DDL).unwrap();
    (dir, db, connects)
}

pub struct CountingConnector {
    pub connects: Arc<AtomicUsize>,
}

impl Connector for CountingConnector {
    fn connect(
        &self,
        config: &DbConfig,
        role: Role,
        credentials: &Credentials,
    ) -> DbResult<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        SqliteConnector.connect(config, role, credentials)
    }
}

pub fn seed_library(db: &Database) {
    db.execute_batch(
        Role::Root,
        "
        INSERT INTO author (name, slug) VALUES ('Ursula', 'ursula');
        INSERT INTO author (name, slug) VALUES ('Octavia', 'octavia');
        INSERT INTO author (name, slug) VALUES ('Anonymous', NULL);
        INSERT INTO book (title, author_id, author_slug, pages) VALUES ('Earthsea', 1, 'ursula', '183');
        INSERT INTO book (title, author_id, author_slug, pages) VALUES ('The Dispossessed', 1, 'ursula', '387');
        INSERT INTO book (title, author_id, author_slug, pages) VALUES ('Kindred', 2, 'octavia', '264');
        INSERT INTO book (title, author_id, author_slug, pages) VALUES ('Beowulf', NULL, NULL, NULL);
        ",
    )
    .unwrap();
}
