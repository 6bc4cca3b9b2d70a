use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Book, BookSummary};

/// Authoritative ISBN → record map. Existence and field values are decided
/// here and nowhere else.
#[derive(Debug, Default)]
pub struct RecordStore {
    books: HashMap<String, Book>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record. An existing key is left untouched.
    pub fn put(&mut self, isbn: &str, title: &str, author: &str) -> CatalogResult<()> {
        match self.books.entry(isbn.to_string()) {
            Entry::Occupied(_) => Err(CatalogError::DuplicateKey(isbn.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Book::new(isbn, title, author));
                Ok(())
            }
        }
    }

    /// Seed a record loaded from storage, keeping its stored availability.
    pub(crate) fn restore(&mut self, book: Book) -> CatalogResult<()> {
        match self.books.entry(book.isbn.clone()) {
            Entry::Occupied(_) => Err(CatalogError::DuplicateKey(book.isbn)),
            Entry::Vacant(slot) => {
                slot.insert(book);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, isbn: &str) -> Option<Book> {
        self.books.remove(isbn)
    }

    pub fn get(&self, isbn: &str) -> Option<&Book> {
        self.books.get(isbn)
    }

    pub fn contains(&self, isbn: &str) -> bool {
        self.books.contains_key(isbn)
    }

    pub fn update(&mut self, isbn: &str, title: &str, author: &str) -> CatalogResult<()> {
        let book = self
            .books
            .get_mut(isbn)
            .ok_or_else(|| CatalogError::book_not_found(isbn))?;
        book.title = title.to_string();
        book.author = author.to_string();
        Ok(())
    }

    pub fn set_available(&mut self, isbn: &str, available: bool) -> CatalogResult<()> {
        let book = self
            .books
            .get_mut(isbn)
            .ok_or_else(|| CatalogError::book_not_found(isbn))?;
        book.available = available;
        Ok(())
    }

    /// Every record, in no particular order.
    pub fn all(&self) -> Vec<Book> {
        self.books.values().cloned().collect()
    }

    pub fn summaries(&self) -> impl Iterator<Item = BookSummary> + '_ {
        self.books.values().map(Book::summary)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.books.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_put_keeps_original_record() {
        let mut store = RecordStore::new();
        store.put("001", "Atomic Habits", "James Clear").unwrap();

        let err = store.put("001", "Other", "Someone").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(ref key) if key == "001"));

        let book = store.get("001").unwrap();
        assert_eq!(book.title, "Atomic Habits");
        assert_eq!(book.author, "James Clear");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_and_remove() {
        let mut store = RecordStore::new();
        store.put("001", "Draft", "Anon").unwrap();
        store.update("001", "Final", "Author").unwrap();
        assert_eq!(store.get("001").unwrap().title, "Final");

        assert!(matches!(
            store.update("404", "x", "y"),
            Err(CatalogError::NotFound(_))
        ));

        let removed = store.remove("001").unwrap();
        assert_eq!(removed.author, "Author");
        assert!(store.remove("001").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn new_records_start_available() {
        let mut store = RecordStore::new();
        store.put("001", "A", "B").unwrap();
        assert!(store.get("001").unwrap().available);
        store.set_available("001", false).unwrap();
        assert!(!store.get("001").unwrap().available);
    }
}
