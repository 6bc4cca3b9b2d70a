use anyhow::{Context, Result};
use rusqlite::{params, Connection, Error as SqlError, ErrorCode};

use crate::error::CatalogError;
use crate::models::{BookStatus, StoredBook};

/// Every stored book, ordered case-insensitively by title.
pub fn fetch_books(conn: &Connection) -> Result<Vec<StoredBook>> {
    let mut stmt = conn
        .prepare(
            "SELECT isbn, title, author, status, copies
             FROM books
             ORDER BY title COLLATE NOCASE, isbn",
        )
        .context("failed to prepare books query")?;

    let books = stmt
        .query_map([], |row| {
            let status: String = row.get(3)?;
            Ok(StoredBook {
                isbn: row.get(0)?,
                title: row.get(1)?,
                author: row.get(2)?,
                status: BookStatus::parse(&status),
                copies: row.get(4)?,
            })
        })
        .context("failed to iterate books")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect books")?;

    Ok(books)
}

/// Insert a new book row. A clashing ISBN surfaces as
/// [`CatalogError::DuplicateKey`] inside the returned error.
pub fn create_book(conn: &Connection, isbn: &str, title: &str, author: &str, copies: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO books (isbn, title, author, status, copies) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![isbn, title, author, BookStatus::Available.as_str(), copies],
    )
    .map_err(|err| map_unique_constraint(err, isbn))
    .context("failed to insert book")?;
    Ok(())
}

pub fn update_book(conn: &Connection, isbn: &str, title: &str, author: &str) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE books SET title = ?1, author = ?2 WHERE isbn = ?3",
            params![title, author, isbn],
        )
        .context("failed to update book")?;
    require_row(updated, isbn)
}

/// Remove a book. Links cascade through the foreign keys.
pub fn delete_book(conn: &Connection, isbn: &str) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM books WHERE isbn = ?1", params![isbn])
        .context("failed to delete book")?;
    require_row(deleted, isbn)
}

pub fn set_book_status(conn: &Connection, isbn: &str, status: BookStatus) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE books SET status = ?1 WHERE isbn = ?2",
            params![status.as_str(), isbn],
        )
        .context("failed to update book status")?;
    require_row(updated, isbn)
}

pub fn set_book_copies(conn: &Connection, isbn: &str, copies: u32) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE books SET copies = ?1 WHERE isbn = ?2",
            params![copies, isbn],
        )
        .context("failed to update book copies")?;
    require_row(updated, isbn)
}

fn require_row(touched: usize, isbn: &str) -> Result<()> {
    if touched == 0 {
        Err(CatalogError::book_not_found(isbn).into())
    } else {
        Ok(())
    }
}

/// The only constraint on `books` besides NOT NULL is the unique ISBN, so a
/// constraint violation here means a duplicate key.
fn map_unique_constraint(err: SqlError, isbn: &str) -> anyhow::Error {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        CatalogError::DuplicateKey(isbn.to_string()).into()
    } else {
        err.into()
    }
}
