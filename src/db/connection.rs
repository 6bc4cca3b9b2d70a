use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (creating if needed) the SQLite file at `path` and make sure the
/// schema exists. Missing parent directories are created first.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Private in-memory database with the full schema. Nothing survives the
/// connection.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the tables if they are missing and turn on `PRAGMA foreign_keys`
/// so deleting a book cascades to its links.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            isbn TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Available',
            copies INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )
    .context("failed to create books table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS book_links (
            a TEXT NOT NULL,
            b TEXT NOT NULL,
            PRIMARY KEY (a, b),
            FOREIGN KEY(a) REFERENCES books(isbn) ON DELETE CASCADE,
            FOREIGN KEY(b) REFERENCES books(isbn) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create book_links table")?;

    Ok(())
}
