//! Error taxonomy for catalog operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("A book with ISBN {0} already exists.")]
    DuplicateKey(String),

    #[error("{0} not found.")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Invalid(String),

    #[error("storage failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn book_not_found(isbn: &str) -> Self {
        CatalogError::NotFound(format!("Book {isbn}"))
    }
}

/// Result alias used across the catalog core.
pub type CatalogResult<T> = Result<T, CatalogError>;
