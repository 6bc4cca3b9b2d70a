use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// Links are undirected; store each pair once with the smaller ISBN first.
fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn fetch_links(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT a, b FROM book_links ORDER BY rowid")
        .context("failed to prepare links query")?;

    let links = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .context("failed to iterate links")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect links")?;

    Ok(links)
}

/// `INSERT OR IGNORE` keeps repeated link requests idempotent.
pub fn link_books(conn: &Connection, a: &str, b: &str) -> Result<()> {
    let (a, b) = ordered(a, b);
    conn.execute(
        "INSERT OR IGNORE INTO book_links (a, b) VALUES (?1, ?2)",
        params![a, b],
    )
    .context("failed to link books")?;
    Ok(())
}

/// Returns whether a stored link was removed.
pub fn unlink_books(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    let (a, b) = ordered(a, b);
    let deleted = conn
        .execute(
            "DELETE FROM book_links WHERE a = ?1 AND b = ?2",
            params![a, b],
        )
        .context("failed to unlink books")?;
    Ok(deleted > 0)
}
