//! Domain models shared by the catalog core, the SQLite adapter and the TUI.
//! These stay plain data holders; the structures in `catalog` decide how they
//! are indexed and the persistence layer decides how they are stored.

use std::fmt;

use chrono::{DateTime, Local};

/// Timestamp layout used for activity entries and exported logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Canonical catalog record. Only the `RecordStore` owns these; every index
/// keeps a [`BookSummary`] copy or the ISBN instead.
pub struct Book {
    /// Unique key. Never changes once the book exists.
    pub isbn: String,
    pub title: String,
    pub author: String,
    /// Mirrors the lending state: `false` once every copy is out.
    pub available: bool,
}

impl Book {
    pub fn new(isbn: &str, title: &str, author: &str) -> Self {
        Self {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            available: true,
        }
    }

    pub fn status(&self) -> BookStatus {
        BookStatus::from_available(self.available)
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            isbn: self.isbn.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The immutable slice of a record that search indexes carry around. It
/// deliberately leaves out `available` so an index can never go stale on a
/// lending transition.
pub struct BookSummary {
    pub isbn: String,
    pub title: String,
    pub author: String,
}

impl BookSummary {
    /// `Title - Author`, dropping the hyphen when the author is blank.
    pub fn display_title(&self) -> String {
        if self.author.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.author)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A `books` row as the persistence layer hands it back on startup.
pub struct StoredBook {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
    /// Total copies owned, fed to the lending coordinator.
    pub copies: u32,
}

impl StoredBook {
    pub fn to_book(&self) -> Book {
        Book {
            isbn: self.isbn.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            available: self.status.is_available(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Persisted availability flag. Stored as text in the `status` column.
pub enum BookStatus {
    Available,
    CheckedOut,
}

impl BookStatus {
    pub fn from_available(available: bool) -> Self {
        if available {
            BookStatus::Available
        } else {
            BookStatus::CheckedOut
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "Available",
            BookStatus::CheckedOut => "Checked Out",
        }
    }

    /// Parse the stored column. Anything unrecognised counts as available so
    /// a hand-edited row never locks a book forever.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("checked out") {
            BookStatus::CheckedOut
        } else {
            BookStatus::Available
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, BookStatus::Available)
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Tag attached to every activity entry.
pub enum ActivityAction {
    Load,
    Add,
    Update,
    Delete,
    Checkout,
    Waitlist,
    Return,
    Cancel,
    Copies,
    Link,
    Unlink,
    Repair,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Load => "LOAD",
            ActivityAction::Add => "ADD",
            ActivityAction::Update => "UPDATE",
            ActivityAction::Delete => "DELETE",
            ActivityAction::Checkout => "CHECKOUT",
            ActivityAction::Waitlist => "WAITLIST",
            ActivityAction::Return => "RETURN",
            ActivityAction::Cancel => "CANCEL",
            ActivityAction::Copies => "COPIES",
            ActivityAction::Link => "LINK",
            ActivityAction::Unlink => "UNLINK",
            ActivityAction::Repair => "REPAIR",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One line of the recent-activity log.
pub struct ActivityEntry {
    pub action: ActivityAction,
    pub details: String,
    pub timestamp: DateTime<Local>,
}

impl ActivityEntry {
    pub fn new(action: ActivityAction, details: impl Into<String>) -> Self {
        Self {
            action,
            details: details.into(),
            timestamp: Local::now(),
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.formatted_timestamp(),
            self.action,
            self.details
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lending state of a single item.
pub enum LendingState {
    /// The coordinator has never heard of the key.
    NoCopiesConfigured,
    Available,
    FullyCheckedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Read-only view of one lending entry for the presentation layer.
pub struct LendingSnapshot {
    pub isbn: String,
    pub title: String,
    pub total_copies: u32,
    pub available_copies: u32,
    pub holders: Vec<String>,
    pub waitlist: Vec<String>,
}

impl LendingSnapshot {
    pub fn state(&self) -> LendingState {
        if self.available_copies > 0 {
            LendingState::Available
        } else {
            LendingState::FullyCheckedOut
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a checkout request.
pub enum CheckoutOutcome {
    CheckedOut,
    AlreadyHolding,
    /// No copy free; the holder joined the waitlist at this 1-based position.
    Waitlisted { position: usize },
    AlreadyWaitlisted { position: usize },
    UnknownItem,
}

impl CheckoutOutcome {
    /// Whether the requester holds a copy after the call.
    pub fn is_checked_out(&self) -> bool {
        matches!(
            self,
            CheckoutOutcome::CheckedOut | CheckoutOutcome::AlreadyHolding
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a successful return.
pub enum ReturnOutcome {
    /// The copy went straight to the next waitlisted holder.
    Promoted(String),
    /// Nobody was waiting; the copy is back on the shelf.
    Restocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Traversal orders offered by the ordered index.
pub enum Traversal {
    Inorder,
    Preorder,
    Postorder,
}

impl Traversal {
    pub fn label(&self) -> &'static str {
        match self {
            Traversal::Inorder => "Inorder",
            Traversal::Preorder => "Preorder",
            Traversal::Postorder => "Postorder",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Traversal::Inorder => Traversal::Preorder,
            Traversal::Preorder => Traversal::Postorder,
            Traversal::Postorder => Traversal::Inorder,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Counters shown on the structure screen.
pub struct CatalogStats {
    pub total_books: usize,
    pub available_books: usize,
    pub checked_out_books: usize,
    pub tree_nodes: usize,
    pub tree_height: usize,
    pub indexed_titles: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub activity_entries: usize,
    pub activity_capacity: usize,
}
