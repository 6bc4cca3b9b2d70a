//! SQLite persistence split across logical submodules. The catalog only
//! talks to it through the [`Persistence`] trait.

mod books;
mod connection;
mod links;
mod store;

pub use books::{
    create_book, delete_book, fetch_books, set_book_copies, set_book_status, update_book,
};
pub use connection::{ensure_schema, open_database, open_in_memory};
pub use links::{fetch_links, link_books, unlink_books};
pub use store::{Persistence, SqliteStore};
