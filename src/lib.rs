//! Library catalog core with a SQLite-backed store and a terminal front end.
//!
//! [`Catalog`] keeps a record store, an ISBN-ordered tree, a title prefix
//! index, lending queues, a similarity graph and a bounded activity log in
//! step with each other and with the [`Persistence`] backend.
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod ui;

pub use catalog::Catalog;
pub use config::{AppConfig, CatalogSettings};
pub use db::{Persistence, SqliteStore};
pub use error::{CatalogError, CatalogResult};
pub use models::{ActivityEntry, Book, BookSummary, LendingSnapshot, Traversal};
pub use ui::{run_app, App};
