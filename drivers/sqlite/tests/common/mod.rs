use std::str::FromStr;

use anyhow::Result;
use condql::{mk_select_options, SelectOptions, Where};
use condql_sqlite::SqliteWhere;
use rusqlite::{params_from_iter, Connection};
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    // if LOG_LEVEL env var is set, use it
    let level = std::env::var("LOG_LEVEL").ok().and_then(|level| Level::from_str(&level).ok()).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).with_test_writer().init();
}

/// In-memory library database: people write books, books carry tags and reviews.
pub fn fixture() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        r#"
        CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, country TEXT);
        CREATE TABLE books (
            id INTEGER PRIMARY KEY,
            title TEXT,
            body TEXT,
            author INTEGER REFERENCES people(id),
            year INTEGER,
            price REAL,
            status TEXT,
            attrs TEXT,
            lat REAL,
            lng REAL,
            archived INTEGER,
            published TEXT
        );
        CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE book_tags (id INTEGER PRIMARY KEY, book INTEGER REFERENCES books(id), tag INTEGER REFERENCES tags(id));
        CREATE TABLE reviews (id INTEGER PRIMARY KEY, book INTEGER REFERENCES books(id), stars INTEGER);

        INSERT INTO people VALUES (1, 'Ann', 'NZ'), (2, 'Bob', 'US'), (3, 'Cy', 'NZ');
        INSERT INTO books VALUES
            (1, 'Rust in Action', 'systems programming', 1, 2021, 39.5, 'open',
             '{"size": 3, "color": "red", "dims": [10, 20]}', -36.85, 174.76, 0, '2021-06-01T00:00:00.000Z'),
            (2, 'Hello World', 'intro', 2, 2015, 10, 'closed',
             '{"size": 7, "color": "Blue"}', 40.7, -74.0, 1, '2015-01-01T00:00:00.000Z'),
            (3, 'Programming Rust', NULL, 3, 2019, 45, NULL,
             '{"size": 5, "color": "green", "dims": [30]}', -41.29, 174.78, 0, '2019-03-01T00:00:00.000Z');
        INSERT INTO tags VALUES (1, 'systems'), (2, 'beginner');
        INSERT INTO book_tags VALUES (1, 1, 1), (2, 3, 1), (3, 2, 2);
        INSERT INTO reviews VALUES (1, 1, 5), (2, 2, 2), (3, 3, 4);
        "#,
    )?;
    Ok(conn)
}

/// Ids of the rows of `table` matching `w`, in id order.
#[allow(unused)]
pub fn ids(conn: &Connection, table: &str, w: &Where) -> Result<Vec<i64>> {
    let compiled = SqliteWhere::compile(w)?;
    let sql = format!("SELECT id FROM {} {} ORDER BY id", table, compiled.clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(&compiled.params), |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<i64>, _>>()?)
}

/// Like [`ids`], from the JSON form of the where object.
#[allow(unused)]
pub fn ids_json(conn: &Connection, table: &str, w: serde_json::Value) -> Result<Vec<i64>> { ids(conn, table, &Where::try_from(w)?) }

/// Ids in the order produced by `options`.
#[allow(unused)]
pub fn ordered_ids(conn: &Connection, table: &str, options: &SelectOptions) -> Result<Vec<i64>> {
    let sql = format!("SELECT id FROM {} {}", table, mk_select_options(options));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<i64>, _>>()?)
}
