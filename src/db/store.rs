use std::path::Path;

use rusqlite::Connection;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{BookStatus, StoredBook};

use super::books::{
    create_book, delete_book, fetch_books, set_book_copies, set_book_status, update_book,
};
use super::connection::{open_database, open_in_memory};
use super::links::{fetch_links, link_books, unlink_books};

/// The durable record store the catalog reads on startup and writes on every
/// mutation. Failures come back as [`CatalogError`] values, never panics.
pub trait Persistence {
    fn load_all(&self) -> CatalogResult<Vec<StoredBook>>;
    fn load_links(&self) -> CatalogResult<Vec<(String, String)>>;
    /// Fails with [`CatalogError::DuplicateKey`] when the ISBN is taken.
    fn insert(&self, isbn: &str, title: &str, author: &str, copies: u32) -> CatalogResult<()>;
    fn update(&self, isbn: &str, title: &str, author: &str) -> CatalogResult<()>;
    fn delete(&self, isbn: &str) -> CatalogResult<()>;
    fn set_status(&self, isbn: &str, status: BookStatus) -> CatalogResult<()>;
    fn set_copies(&self, isbn: &str, copies: u32) -> CatalogResult<()>;
    fn link(&self, a: &str, b: &str) -> CatalogResult<()>;
    fn unlink(&self, a: &str, b: &str) -> CatalogResult<bool>;
}

/// [`Persistence`] over a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: open_database(path)?,
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Pull a typed catalog error back out of an adapter error, or wrap the
/// storage failure as-is.
fn into_catalog_error(err: anyhow::Error) -> CatalogError {
    match err.downcast::<CatalogError>() {
        Ok(typed) => typed,
        Err(other) => CatalogError::Persistence(other),
    }
}

impl Persistence for SqliteStore {
    fn load_all(&self) -> CatalogResult<Vec<StoredBook>> {
        fetch_books(&self.conn).map_err(into_catalog_error)
    }

    fn load_links(&self) -> CatalogResult<Vec<(String, String)>> {
        fetch_links(&self.conn).map_err(into_catalog_error)
    }

    fn insert(&self, isbn: &str, title: &str, author: &str, copies: u32) -> CatalogResult<()> {
        create_book(&self.conn, isbn, title, author, copies).map_err(into_catalog_error)
    }

    fn update(&self, isbn: &str, title: &str, author: &str) -> CatalogResult<()> {
        update_book(&self.conn, isbn, title, author).map_err(into_catalog_error)
    }

    fn delete(&self, isbn: &str) -> CatalogResult<()> {
        delete_book(&self.conn, isbn).map_err(into_catalog_error)
    }

    fn set_status(&self, isbn: &str, status: BookStatus) -> CatalogResult<()> {
        set_book_status(&self.conn, isbn, status).map_err(into_catalog_error)
    }

    fn set_copies(&self, isbn: &str, copies: u32) -> CatalogResult<()> {
        set_book_copies(&self.conn, isbn, copies).map_err(into_catalog_error)
    }

    fn link(&self, a: &str, b: &str) -> CatalogResult<()> {
        link_books(&self.conn, a, b).map_err(into_catalog_error)
    }

    fn unlink(&self, a: &str, b: &str) -> CatalogResult<bool> {
        unlink_books(&self.conn, a, b).map_err(into_catalog_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_isbn_maps_to_duplicate_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("001", "Atomic Habits", "James Clear", 1).unwrap();
        let err = store.insert("001", "Other", "Someone", 1).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(ref isbn) if isbn == "001"));

        let rows = store.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Atomic Habits");
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(store.update("404", "t", "a"), Err(CatalogError::NotFound(_))));
        assert!(matches!(store.delete("404"), Err(CatalogError::NotFound(_))));
        assert!(matches!(
            store.set_status("404", BookStatus::CheckedOut),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn status_and_copies_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("001", "Dune", "Frank Herbert", 1).unwrap();
        store.set_status("001", BookStatus::CheckedOut).unwrap();
        store.set_copies("001", 3).unwrap();

        let row = &store.load_all().unwrap()[0];
        assert_eq!(row.status, BookStatus::CheckedOut);
        assert_eq!(row.copies, 3);
        assert!(!row.to_book().available);
    }

    #[test]
    fn links_are_undirected_and_cascade_on_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        for isbn in ["a", "b", "c"] {
            store.insert(isbn, isbn, "author", 1).unwrap();
        }
        store.link("b", "a").unwrap();
        store.link("a", "b").unwrap();
        store.link("b", "c").unwrap();
        assert_eq!(
            store.load_links().unwrap(),
            vec![
                ("a".to_string(), "b".to_string()),
                ("b".to_string(), "c".to_string())
            ]
        );

        store.delete("b").unwrap();
        assert!(store.load_links().unwrap().is_empty());
        assert!(!store.unlink("a", "b").unwrap());
    }

    #[test]
    fn linking_unknown_books_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("a", "A", "author", 1).unwrap();
        assert!(matches!(store.link("a", "ghost"), Err(CatalogError::Persistence(_))));
    }
}
