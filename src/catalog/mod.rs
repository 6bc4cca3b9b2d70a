//! The in-memory catalog core.
//!
//! [`Catalog`] owns the authoritative [`RecordStore`] plus every secondary
//! structure, and is the only place that mutates them. Each mutating call
//! writes through to [`Persistence`] first, then the record store, then the
//! indexes, and finally pushes a single activity entry. Queries read the
//! indexes directly.

pub mod activity;
pub mod lending;
pub mod ordered;
pub mod prefix;
pub mod records;
pub mod similarity;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::CatalogSettings;
use crate::db::Persistence;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    ActivityAction, ActivityEntry, Book, BookStatus, BookSummary, CatalogStats, CheckoutOutcome,
    LendingSnapshot, ReturnOutcome, Traversal,
};

pub use activity::ActivityLog;
pub use lending::{LendingCheckpoint, LendingCoordinator};
pub use ordered::OrderedIndex;
pub use prefix::PrefixIndex;
pub use records::RecordStore;
pub use similarity::SimilarityGraph;

pub struct Catalog<P: Persistence> {
    store: P,
    settings: CatalogSettings,
    records: RecordStore,
    by_isbn: OrderedIndex<String, BookSummary>,
    titles: PrefixIndex<BookSummary>,
    lending: LendingCoordinator,
    similar: SimilarityGraph,
    activity: ActivityLog,
}

impl<P: Persistence> Catalog<P> {
    /// Seed every structure from `store`.
    pub fn load(store: P, settings: CatalogSettings) -> CatalogResult<Self> {
        let rows = store.load_all()?;
        let links = store.load_links()?;

        let mut catalog = Self {
            activity: ActivityLog::with_capacity(settings.activity_capacity),
            store,
            settings,
            records: RecordStore::new(),
            by_isbn: OrderedIndex::new(),
            titles: PrefixIndex::new(),
            lending: LendingCoordinator::new(),
            similar: SimilarityGraph::new(),
        };

        for row in &rows {
            let book = row.to_book();
            if let Err(err) = catalog.records.restore(book.clone()) {
                warn!(isbn = %row.isbn, "skipping stored row: {err}");
                continue;
            }
            catalog.index_book(&book);
            catalog
                .lending
                .add_item(&book.isbn, &book.title, row.copies);
            // Holders are not persisted, so a stored "Checked Out" status
            // from a previous session falls back to what the copies allow.
            catalog.sync_availability(&book.isbn)?;
        }

        for (a, b) in &links {
            if !catalog.similar.add_edge(a, b) {
                warn!(a = %a, b = %b, "ignoring link to unknown book");
            }
        }

        info!(books = rows.len(), links = links.len(), "catalog loaded");
        catalog.activity.push(
            ActivityAction::Load,
            format!("Loaded {} books from database", catalog.records.len()),
        );
        Ok(catalog)
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    // --- record mutations -------------------------------------------------

    pub fn add_book(&mut self, isbn: &str, title: &str, author: &str) -> CatalogResult<Book> {
        let (isbn, title, author) = required_fields(isbn, title, author)?;
        if self.records.contains(isbn) {
            return Err(CatalogError::DuplicateKey(isbn.to_string()));
        }

        let copies = self.settings.default_copies;
        self.store.insert(isbn, title, author, copies)?;
        if let Err(err) = self.records.put(isbn, title, author) {
            warn!(isbn, "record store rejected a persisted book: {err}");
            self.rebuild_indexes();
            return Err(err);
        }

        let book = Book::new(isbn, title, author);
        self.index_book(&book);
        self.lending.add_item(isbn, title, copies);
        self.sync_availability(isbn)?;
        self.reconcile();

        info!(isbn, title, "book added");
        self.activity.push(
            ActivityAction::Add,
            format!("Added book: {title} (ISBN: {isbn})"),
        );
        Ok(book)
    }

    pub fn update_book(&mut self, isbn: &str, title: &str, author: &str) -> CatalogResult<()> {
        let (isbn, title, author) = required_fields(isbn, title, author)?;
        if !self.records.contains(isbn) {
            return Err(CatalogError::book_not_found(isbn));
        }

        self.store.update(isbn, title, author)?;
        self.records.update(isbn, title, author)?;
        self.by_isbn.insert(
            isbn.to_string(),
            BookSummary {
                isbn: isbn.to_string(),
                title: title.to_string(),
                author: author.to_string(),
            },
        );
        self.rebuild_titles();
        self.lending.rename_item(isbn, title);
        self.reconcile();

        info!(isbn, title, "book updated");
        self.activity.push(
            ActivityAction::Update,
            format!("Updated book: {title} by {author} (ISBN: {isbn})"),
        );
        Ok(())
    }

    /// Delete a book and cascade to every structure that references it.
    pub fn delete_book(&mut self, isbn: &str) -> CatalogResult<Book> {
        let isbn = isbn.trim();
        if !self.records.contains(isbn) {
            return Err(CatalogError::book_not_found(isbn));
        }

        self.store.delete(isbn)?;
        let book = self
            .records
            .remove(isbn)
            .ok_or_else(|| CatalogError::book_not_found(isbn))?;
        self.by_isbn.delete(&book.isbn);
        self.rebuild_titles();
        self.similar.remove_node(isbn);
        if let Some(lending) = self.lending.remove_item(isbn) {
            if !lending.holders.is_empty() || !lending.waitlist.is_empty() {
                warn!(
                    isbn,
                    holders = lending.holders.len(),
                    waiting = lending.waitlist.len(),
                    "deleted a book with outstanding loans"
                );
            }
        }
        self.reconcile();

        info!(isbn, "book deleted");
        self.activity.push(
            ActivityAction::Delete,
            format!("Deleted book: {} (ISBN: {isbn})", book.title),
        );
        Ok(book)
    }

    // --- lending ----------------------------------------------------------

    pub fn check_out(&mut self, isbn: &str, holder: &str) -> CatalogResult<CheckoutOutcome> {
        let (isbn, holder) = lending_fields(isbn, holder)?;
        if !self.records.contains(isbn) {
            return Err(CatalogError::book_not_found(isbn));
        }

        let checkpoint = self.lending.checkpoint(isbn);
        let outcome = self.lending.request(holder, isbn);
        let (action, details) = match &outcome {
            CheckoutOutcome::CheckedOut => (
                ActivityAction::Checkout,
                format!("Book {isbn} checked out to {holder}"),
            ),
            CheckoutOutcome::AlreadyHolding => (
                ActivityAction::Checkout,
                format!("{holder} already holds book {isbn}"),
            ),
            CheckoutOutcome::Waitlisted { position } => (
                ActivityAction::Waitlist,
                format!("Book {isbn} not available - {holder} added to queue at position {position}"),
            ),
            CheckoutOutcome::AlreadyWaitlisted { position } => (
                ActivityAction::Waitlist,
                format!("{holder} is already waiting for book {isbn} at position {position}"),
            ),
            CheckoutOutcome::UnknownItem => {
                return Err(CatalogError::NotFound(format!("Lending record {isbn}")));
            }
        };

        self.sync_or_restore(isbn, checkpoint)?;
        info!(isbn, holder, ?outcome, "checkout");
        self.activity.push(action, details);
        Ok(outcome)
    }

    pub fn return_book(&mut self, isbn: &str, holder: &str) -> CatalogResult<ReturnOutcome> {
        let (isbn, holder) = lending_fields(isbn, holder)?;
        let checkpoint = self.lending.checkpoint(isbn);
        let outcome = self.lending.return_item(isbn, holder)?;
        let details = match &outcome {
            ReturnOutcome::Promoted(next) => {
                format!("Book {isbn} returned by {holder}; now checked out to {next}")
            }
            ReturnOutcome::Restocked => format!("Book {isbn} returned by {holder}"),
        };

        self.sync_or_restore(isbn, checkpoint)?;
        info!(isbn, holder, ?outcome, "return");
        self.activity.push(ActivityAction::Return, details);
        Ok(outcome)
    }

    /// Reconfigure how many copies of `isbn` exist. Returns the holders
    /// promoted off the waitlist by the extra copies.
    pub fn set_copies(&mut self, isbn: &str, total: u32) -> CatalogResult<Vec<String>> {
        let isbn = isbn.trim();
        if !self.records.contains(isbn) {
            return Err(CatalogError::book_not_found(isbn));
        }

        let Some(snapshot) = self.lending.snapshot(isbn) else {
            return Err(CatalogError::NotFound(format!("Lending record {isbn}")));
        };
        let held = snapshot.holders.len();
        if (total as usize) < held {
            return Err(CatalogError::InvalidState(format!(
                "{isbn} has {held} copies checked out; cannot reduce to {total}"
            )));
        }

        self.store.set_copies(isbn, total)?;
        let checkpoint = self.lending.checkpoint(isbn);
        let promoted = self.lending.set_total_copies(isbn, total)?;
        if let Err(err) = self.sync_or_restore(isbn, checkpoint) {
            if let Err(undo) = self.store.set_copies(isbn, snapshot.total_copies) {
                warn!(isbn, "could not restore stored copies: {undo}");
            }
            return Err(err);
        }

        let mut details = format!("Book {isbn} now has {total} copies");
        if !promoted.is_empty() {
            details.push_str(&format!("; checked out to {}", promoted.join(", ")));
        }
        info!(isbn, total, promoted = promoted.len(), "copies changed");
        self.activity.push(ActivityAction::Copies, details);
        Ok(promoted)
    }

    pub fn cancel_reservation(&mut self, isbn: &str, holder: &str) -> CatalogResult<()> {
        let (isbn, holder) = lending_fields(isbn, holder)?;
        self.lending.cancel_reservation(isbn, holder)?;
        info!(isbn, holder, "reservation cancelled");
        self.activity.push(
            ActivityAction::Cancel,
            format!("{holder} left the queue for book {isbn}"),
        );
        Ok(())
    }

    // --- similarity -------------------------------------------------------

    /// Mark two books as similar. `Ok(false)` when they already were.
    pub fn link_books(&mut self, a: &str, b: &str) -> CatalogResult<bool> {
        let (a, b) = self.link_endpoints(a, b)?;
        if self.similar.has_edge(a, b) {
            return Ok(false);
        }

        self.store.link(a, b)?;
        self.similar.add_edge(a, b);
        info!(a, b, "books linked");
        self.activity
            .push(ActivityAction::Link, format!("Linked {a} and {b} as similar"));
        Ok(true)
    }

    /// `Ok(false)` when the two books were not linked.
    pub fn unlink_books(&mut self, a: &str, b: &str) -> CatalogResult<bool> {
        let (a, b) = self.link_endpoints(a, b)?;
        if !self.similar.has_edge(a, b) {
            return Ok(false);
        }

        self.store.unlink(a, b)?;
        self.similar.remove_edge(a, b);
        info!(a, b, "books unlinked");
        self.activity
            .push(ActivityAction::Unlink, format!("Unlinked {a} and {b}"));
        Ok(true)
    }

    // --- queries ----------------------------------------------------------

    pub fn find_by_isbn(&self, isbn: &str) -> Option<BookSummary> {
        self.by_isbn.search(&isbn.trim().to_string()).cloned()
    }

    pub fn search_title(&self, prefix: &str) -> Vec<BookSummary> {
        self.titles.search_prefix(prefix.trim())
    }

    /// Case-insensitive substring match on author, in ISBN order.
    pub fn search_author(&self, term: &str) -> Vec<BookSummary> {
        let needle = term.trim().to_lowercase();
        self.by_isbn
            .inorder()
            .filter(|(_, summary)| summary.author.to_lowercase().contains(&needle))
            .map(|(_, summary)| summary.clone())
            .collect()
    }

    pub fn recommend(&self, isbn: &str) -> Vec<BookSummary> {
        let ids = self
            .similar
            .recommend(isbn.trim(), self.settings.recommend_limit);
        self.summaries_for(ids)
    }

    /// Directly linked books only.
    pub fn similar_to(&self, isbn: &str) -> Vec<BookSummary> {
        self.summaries_for(self.similar.neighbors(isbn.trim()))
    }

    pub fn traverse(&self, order: Traversal) -> Vec<BookSummary> {
        let walk: Box<dyn Iterator<Item = (&String, &BookSummary)> + '_> = match order {
            Traversal::Inorder => Box::new(self.by_isbn.inorder()),
            Traversal::Preorder => Box::new(self.by_isbn.preorder()),
            Traversal::Postorder => Box::new(self.by_isbn.postorder()),
        };
        walk.map(|(_, summary)| summary.clone()).collect()
    }

    // --- presentation outputs ---------------------------------------------

    /// Every record, sorted case-insensitively by title.
    pub fn books(&self) -> Vec<Book> {
        let mut books = self.records.all();
        books.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.isbn.cmp(&b.isbn))
        });
        books
    }

    pub fn book(&self, isbn: &str) -> Option<&Book> {
        self.records.get(isbn)
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.activity.all()
    }

    pub fn activity_tail(&self, count: usize) -> Vec<ActivityEntry> {
        self.activity.tail(count)
    }

    pub fn latest_activity(&self) -> Option<&ActivityEntry> {
        self.activity.peek()
    }

    pub fn clear_activity(&mut self) {
        self.activity.clear();
    }

    /// Drop the newest log entry. The logged operation itself stays done.
    pub fn undo_last_activity(&mut self) -> Option<ActivityEntry> {
        self.activity.pop()
    }

    /// Write the activity log, newest first, to `path`.
    pub fn export_activity(&self, path: &Path) -> CatalogResult<usize> {
        let lines = self.activity.render_lines();
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(lines.len())
    }

    pub fn lending_status(&self, isbn: &str) -> Option<LendingSnapshot> {
        self.lending.snapshot(isbn.trim())
    }

    pub fn lending_overview(&self) -> Vec<LendingSnapshot> {
        self.lending.snapshots()
    }

    pub fn stats(&self) -> CatalogStats {
        let available = self
            .records
            .all()
            .iter()
            .filter(|book| book.available)
            .count();
        CatalogStats {
            total_books: self.records.len(),
            available_books: available,
            checked_out_books: self.records.len() - available,
            tree_nodes: self.by_isbn.len(),
            tree_height: self.by_isbn.height(),
            indexed_titles: self.titles.len(),
            graph_nodes: self.similar.node_count(),
            graph_edges: self.similar.edge_count(),
            activity_entries: self.activity.len(),
            activity_capacity: self.activity.capacity(),
        }
    }

    // --- consistency ------------------------------------------------------

    /// Rebuild the ISBN tree, title trie and graph nodes from the record
    /// store. Edges between surviving books are kept.
    pub fn rebuild_indexes(&mut self) {
        warn!(books = self.records.len(), "rebuilding indexes from record store");
        self.by_isbn
            .rebuild(self.records.summaries().map(|summary| (summary.isbn.clone(), summary)));
        self.rebuild_titles();

        let edges = self.similar.edges();
        self.similar.rebuild(
            self.records.keys(),
            edges.iter().map(|(a, b)| (a.as_str(), b.as_str())),
        );

        let stored_copies: HashMap<String, u32> = match self.store.load_all() {
            Ok(rows) => rows.into_iter().map(|row| (row.isbn, row.copies)).collect(),
            Err(err) => {
                warn!("could not read stored copies, using defaults: {err}");
                HashMap::new()
            }
        };
        for book in self.records.all() {
            if !self.lending.contains(&book.isbn) {
                let copies = stored_copies
                    .get(&book.isbn)
                    .copied()
                    .unwrap_or(self.settings.default_copies);
                self.lending.add_item(&book.isbn, &book.title, copies);
            }
        }
        let orphaned: Vec<String> = self
            .lending
            .snapshots()
            .into_iter()
            .map(|snapshot| snapshot.isbn)
            .filter(|isbn| !self.records.contains(isbn))
            .collect();
        for isbn in orphaned {
            self.lending.remove_item(&isbn);
        }
    }

    /// Cheap size comparison between the record store and each index; any
    /// mismatch means a partial update slipped through and triggers a rebuild.
    fn reconcile(&mut self) {
        let expected = self.records.len();
        let consistent = self.by_isbn.len() == expected
            && self.titles.len() == expected
            && self.similar.node_count() == expected
            && self.lending.len() == expected;
        if !consistent {
            warn!(
                records = expected,
                tree = self.by_isbn.len(),
                trie = self.titles.len(),
                graph = self.similar.node_count(),
                lending = self.lending.len(),
                "index sizes diverged from record store"
            );
            self.rebuild_indexes();
            self.activity
                .push(ActivityAction::Repair, "Rebuilt indexes from record store");
        }
    }

    fn index_book(&mut self, book: &Book) {
        let summary = book.summary();
        self.by_isbn.insert(book.isbn.clone(), summary.clone());
        self.titles.insert(&book.title, summary);
        self.similar.add_node(&book.isbn);
    }

    fn rebuild_titles(&mut self) {
        let mut entries: Vec<BookSummary> = self.records.summaries().collect();
        entries.sort_by(|a, b| a.isbn.cmp(&b.isbn));
        self.titles
            .rebuild(entries.into_iter().map(|summary| (summary.title.clone(), summary)));
    }

    /// Mirror the lending state into the record's `available` flag and the
    /// stored status column.
    fn sync_availability(&mut self, isbn: &str) -> CatalogResult<()> {
        let available = self
            .lending
            .available_copies(isbn)
            .is_some_and(|copies| copies > 0);
        let changed = self
            .records
            .get(isbn)
            .is_some_and(|book| book.available != available);
        if changed {
            self.store
                .set_status(isbn, BookStatus::from_available(available))?;
            self.records.set_available(isbn, available)?;
            debug!(isbn, available, "availability changed");
        }
        Ok(())
    }

    /// Mirror availability after a lending transition, or put the item's
    /// lending state back if the write-through fails.
    fn sync_or_restore(
        &mut self,
        isbn: &str,
        checkpoint: Option<LendingCheckpoint>,
    ) -> CatalogResult<()> {
        if let Err(err) = self.sync_availability(isbn) {
            warn!(isbn, "availability write failed, undoing lending change: {err}");
            if let Some(checkpoint) = checkpoint {
                self.lending.restore(checkpoint);
            }
            return Err(err);
        }
        Ok(())
    }

    fn link_endpoints<'a>(&self, a: &'a str, b: &'a str) -> CatalogResult<(&'a str, &'a str)> {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return Err(CatalogError::Invalid("Both ISBNs are required!".to_string()));
        }
        if a == b {
            return Err(CatalogError::Invalid(
                "A book cannot be similar to itself.".to_string(),
            ));
        }
        for isbn in [a, b] {
            if !self.records.contains(isbn) {
                return Err(CatalogError::book_not_found(isbn));
            }
        }
        Ok((a, b))
    }

    fn summaries_for(&self, ids: Vec<String>) -> Vec<BookSummary> {
        ids.into_iter()
            .filter_map(|id| self.by_isbn.search(&id).cloned())
            .collect()
    }
}

fn required_fields<'a>(
    isbn: &'a str,
    title: &'a str,
    author: &'a str,
) -> CatalogResult<(&'a str, &'a str, &'a str)> {
    let fields = (isbn.trim(), title.trim(), author.trim());
    if fields.0.is_empty() || fields.1.is_empty() || fields.2.is_empty() {
        return Err(CatalogError::Invalid("All fields are required!".to_string()));
    }
    Ok(fields)
}

fn lending_fields<'a>(isbn: &'a str, holder: &'a str) -> CatalogResult<(&'a str, &'a str)> {
    let (isbn, holder) = (isbn.trim(), holder.trim());
    if isbn.is_empty() || holder.is_empty() {
        return Err(CatalogError::Invalid(
            "Book ID and User ID are required!".to_string(),
        ));
    }
    Ok((isbn, holder))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use anyhow::anyhow;

    use super::*;
    use crate::db::SqliteStore;

    /// Records every write and can be told to fail the next one.
    #[derive(Default)]
    struct FlakyStore {
        fail: Cell<bool>,
        /// Fail only status writes, letting every other write through.
        fail_status: Cell<bool>,
        writes: RefCell<Vec<String>>,
    }

    impl FlakyStore {
        fn write(&self, what: String) -> CatalogResult<()> {
            if self.fail.get() {
                return Err(CatalogError::Persistence(anyhow!("disk full")));
            }
            self.writes.borrow_mut().push(what);
            Ok(())
        }
    }

    impl Persistence for FlakyStore {
        fn load_all(&self) -> CatalogResult<Vec<crate::models::StoredBook>> {
            Ok(Vec::new())
        }
        fn load_links(&self) -> CatalogResult<Vec<(String, String)>> {
            Ok(Vec::new())
        }
        fn insert(&self, isbn: &str, _: &str, _: &str, _: u32) -> CatalogResult<()> {
            self.write(format!("insert {isbn}"))
        }
        fn update(&self, isbn: &str, _: &str, _: &str) -> CatalogResult<()> {
            self.write(format!("update {isbn}"))
        }
        fn delete(&self, isbn: &str) -> CatalogResult<()> {
            self.write(format!("delete {isbn}"))
        }
        fn set_status(&self, isbn: &str, status: BookStatus) -> CatalogResult<()> {
            if self.fail_status.get() {
                return Err(CatalogError::Persistence(anyhow!("status column locked")));
            }
            self.write(format!("status {isbn} {status}"))
        }
        fn set_copies(&self, isbn: &str, copies: u32) -> CatalogResult<()> {
            self.write(format!("copies {isbn} {copies}"))
        }
        fn link(&self, a: &str, b: &str) -> CatalogResult<()> {
            self.write(format!("link {a} {b}"))
        }
        fn unlink(&self, a: &str, b: &str) -> CatalogResult<bool> {
            self.write(format!("unlink {a} {b}")).map(|_| true)
        }
    }

    fn sqlite_catalog() -> Catalog<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        Catalog::load(store, CatalogSettings::default()).unwrap()
    }

    fn isbns(summaries: &[BookSummary]) -> Vec<&str> {
        summaries.iter().map(|summary| summary.isbn.as_str()).collect()
    }

    #[test]
    fn added_book_is_visible_everywhere() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();

        assert_eq!(catalog.find_by_isbn("001").unwrap().title, "Atomic Habits");
        assert_eq!(isbns(&catalog.search_title("atomic")), vec!["001"]);
        assert_eq!(catalog.lending_status("001").unwrap().available_copies, 1);
        assert_eq!(
            catalog.latest_activity().map(|entry| entry.action),
            Some(ActivityAction::Add)
        );

        let stats = catalog.stats();
        assert_eq!(stats.total_books, 1);
        assert_eq!(stats.tree_nodes, 1);
        assert_eq!(stats.indexed_titles, 1);
        assert_eq!(stats.graph_nodes, 1);
    }

    #[test]
    fn duplicate_add_leaves_catalog_untouched() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        let before = catalog.activity().len();

        let err = catalog.add_book("001", "Other", "Someone").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(_)));
        assert_eq!(catalog.find_by_isbn("001").unwrap().title, "Atomic Habits");
        assert!(catalog.search_title("other").is_empty());
        assert_eq!(catalog.activity().len(), before);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut catalog = sqlite_catalog();
        assert!(matches!(
            catalog.add_book("  ", "Title", "Author"),
            Err(CatalogError::Invalid(_))
        ));
        assert!(matches!(
            catalog.check_out("001", ""),
            Err(CatalogError::Invalid(_))
        ));
        assert!(catalog.books().is_empty());
    }

    #[test]
    fn update_moves_the_title_in_the_trie() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Draft", "Anon").unwrap();
        catalog.update_book("001", "Final Cut", "Author").unwrap();

        assert!(catalog.search_title("draft").is_empty());
        assert_eq!(isbns(&catalog.search_title("fin")), vec!["001"]);
        assert_eq!(catalog.find_by_isbn("001").unwrap().author, "Author");
        assert_eq!(catalog.lending_status("001").unwrap().title, "Final Cut");
        assert!(matches!(
            catalog.update_book("404", "x", "y"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn delete_cascades_to_every_index() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("A", "Alpha", "One").unwrap();
        catalog.add_book("B", "Beta", "Two").unwrap();
        catalog.add_book("C", "Gamma", "Three").unwrap();
        catalog.link_books("A", "B").unwrap();
        catalog.link_books("B", "C").unwrap();
        assert_eq!(isbns(&catalog.recommend("A")), vec!["B", "C"]);

        catalog.delete_book("B").unwrap();
        assert!(catalog.find_by_isbn("B").is_none());
        assert!(catalog.search_title("beta").is_empty());
        assert!(catalog.recommend("A").is_empty());
        assert!(catalog.lending_status("B").is_none());
        assert_eq!(catalog.stats().graph_edges, 0);
        assert!(matches!(
            catalog.delete_book("B"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn lending_flow_syncs_availability() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();

        assert_eq!(catalog.check_out("001", "U1").unwrap(), CheckoutOutcome::CheckedOut);
        assert!(!catalog.book("001").unwrap().available);
        assert_eq!(
            catalog.check_out("001", "U2").unwrap(),
            CheckoutOutcome::Waitlisted { position: 1 }
        );
        assert_eq!(
            catalog.latest_activity().map(|entry| entry.action),
            Some(ActivityAction::Waitlist)
        );

        assert_eq!(
            catalog.return_book("001", "U1").unwrap(),
            ReturnOutcome::Promoted("U2".to_string())
        );
        assert!(!catalog.book("001").unwrap().available);
        assert_eq!(catalog.return_book("001", "U2").unwrap(), ReturnOutcome::Restocked);
        assert!(catalog.book("001").unwrap().available);

        let stored = catalog.store().load_all().unwrap();
        assert_eq!(stored[0].status, BookStatus::Available);
    }

    #[test]
    fn over_return_is_rejected() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        let before = catalog.activity().len();

        let err = catalog.return_book("001", "U9").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidState(_)));
        assert_eq!(catalog.lending_status("001").unwrap().available_copies, 1);
        assert_eq!(catalog.activity().len(), before);
    }

    #[test]
    fn extra_copies_promote_the_waitlist() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        catalog.check_out("001", "U1").unwrap();
        catalog.check_out("001", "U2").unwrap();

        assert!(matches!(
            catalog.set_copies("001", 0),
            Err(CatalogError::InvalidState(_))
        ));
        assert_eq!(catalog.set_copies("001", 3).unwrap(), vec!["U2".to_string()]);

        let status = catalog.lending_status("001").unwrap();
        assert_eq!(status.available_copies, 1);
        assert!(status.waitlist.is_empty());
        assert!(catalog.book("001").unwrap().available);
        assert_eq!(catalog.store().load_all().unwrap()[0].copies, 3);
    }

    #[test]
    fn cancel_reservation_drops_the_waiter() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        catalog.check_out("001", "U1").unwrap();
        catalog.check_out("001", "U2").unwrap();

        catalog.cancel_reservation("001", "U2").unwrap();
        assert!(catalog.lending_status("001").unwrap().waitlist.is_empty());
        assert!(matches!(
            catalog.cancel_reservation("001", "U2"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn links_need_two_known_distinct_books() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("A", "Alpha", "One").unwrap();
        catalog.add_book("B", "Beta", "Two").unwrap();

        assert!(matches!(catalog.link_books("A", "A"), Err(CatalogError::Invalid(_))));
        assert!(matches!(catalog.link_books("A", "Z"), Err(CatalogError::NotFound(_))));
        assert!(catalog.link_books("A", "B").unwrap());
        assert!(!catalog.link_books("B", "A").unwrap());
        assert_eq!(isbns(&catalog.similar_to("B")), vec!["A"]);

        assert!(catalog.unlink_books("B", "A").unwrap());
        assert!(!catalog.unlink_books("A", "B").unwrap());
        assert!(catalog.similar_to("A").is_empty());
    }

    #[test]
    fn author_search_and_traversals_follow_isbn_order() {
        let mut catalog = sqlite_catalog();
        for (isbn, title, author) in [
            ("5", "Five", "Ann Lee"),
            ("3", "Three", "Bo Chan"),
            ("7", "Seven", "ann marsh"),
        ] {
            catalog.add_book(isbn, title, author).unwrap();
        }

        assert_eq!(isbns(&catalog.search_author("ANN")), vec!["5", "7"]);
        assert_eq!(isbns(&catalog.traverse(Traversal::Inorder)), vec!["3", "5", "7"]);
        assert_eq!(isbns(&catalog.traverse(Traversal::Preorder)), vec!["5", "3", "7"]);
        assert_eq!(isbns(&catalog.traverse(Traversal::Postorder)), vec!["3", "7", "5"]);
    }

    #[test]
    fn books_sort_by_title_ignoring_case() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("1", "zebra", "A").unwrap();
        catalog.add_book("2", "Apple", "B").unwrap();
        catalog.add_book("3", "mango", "C").unwrap();

        let titles: Vec<String> = catalog.books().into_iter().map(|book| book.title).collect();
        assert_eq!(titles, vec!["Apple", "mango", "zebra"]);
    }

    #[test]
    fn persistence_failure_changes_nothing() {
        let store = FlakyStore::default();
        let mut catalog = Catalog::load(store, CatalogSettings::default()).unwrap();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        let before = catalog.activity().len();

        catalog.store().fail.set(true);
        assert!(matches!(
            catalog.add_book("002", "Dune", "Frank Herbert"),
            Err(CatalogError::Persistence(_))
        ));
        assert!(matches!(
            catalog.delete_book("001"),
            Err(CatalogError::Persistence(_))
        ));
        assert!(matches!(
            catalog.set_copies("001", 4),
            Err(CatalogError::Persistence(_))
        ));

        assert!(catalog.find_by_isbn("002").is_none());
        assert!(catalog.find_by_isbn("001").is_some());
        assert_eq!(catalog.lending_status("001").unwrap().total_copies, 1);
        assert_eq!(catalog.activity().len(), before);
    }

    #[test]
    fn failed_checkout_write_leaves_the_copy_on_the_shelf() {
        let mut catalog = Catalog::load(FlakyStore::default(), CatalogSettings::default()).unwrap();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        let before = catalog.activity().len();

        catalog.store().fail.set(true);
        assert!(matches!(
            catalog.check_out("001", "U1"),
            Err(CatalogError::Persistence(_))
        ));
        let status = catalog.lending_status("001").unwrap();
        assert!(status.holders.is_empty());
        assert_eq!(status.available_copies, 1);
        assert!(catalog.book("001").unwrap().available);
        assert_eq!(catalog.activity().len(), before);

        catalog.store().fail.set(false);
        assert_eq!(catalog.check_out("001", "U1").unwrap(), CheckoutOutcome::CheckedOut);
    }

    #[test]
    fn failed_return_write_keeps_the_holder_and_waitlist() {
        let mut catalog = Catalog::load(FlakyStore::default(), CatalogSettings::default()).unwrap();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        catalog.check_out("001", "U1").unwrap();

        catalog.store().fail.set(true);
        assert!(matches!(
            catalog.return_book("001", "U1"),
            Err(CatalogError::Persistence(_))
        ));
        let status = catalog.lending_status("001").unwrap();
        assert_eq!(status.holders, vec!["U1"]);
        assert_eq!(status.available_copies, 0);
        assert!(!catalog.book("001").unwrap().available);

        catalog.store().fail.set(false);
        catalog.check_out("001", "U2").unwrap();
        catalog.store().fail.set(true);
        assert!(catalog.return_book("001", "U1").is_ok());
        assert_eq!(catalog.lending_status("001").unwrap().holders, vec!["U2"]);
    }

    #[test]
    fn failed_status_write_rolls_back_copies() {
        let mut catalog = Catalog::load(FlakyStore::default(), CatalogSettings::default()).unwrap();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        catalog.check_out("001", "U1").unwrap();

        catalog.store().fail_status.set(true);
        assert!(matches!(
            catalog.set_copies("001", 3),
            Err(CatalogError::Persistence(_))
        ));
        let status = catalog.lending_status("001").unwrap();
        assert_eq!(status.total_copies, 1);
        assert_eq!(status.available_copies, 0);
        assert!(!catalog.book("001").unwrap().available);
        assert_eq!(
            catalog.store().writes.borrow().last().map(String::as_str),
            Some("copies 001 1")
        );
    }

    #[test]
    fn repair_keeps_stored_copy_counts() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        catalog.set_copies("001", 4).unwrap();

        catalog.lending.remove_item("001");
        catalog.reconcile();

        assert_eq!(catalog.lending_status("001").unwrap().total_copies, 4);
        assert_eq!(
            catalog.latest_activity().map(|entry| entry.action),
            Some(ActivityAction::Repair)
        );
    }

    #[test]
    fn each_mutation_logs_one_entry() {
        let mut catalog = Catalog::load(FlakyStore::default(), CatalogSettings::default()).unwrap();
        assert_eq!(catalog.activity().len(), 1);

        catalog.add_book("A", "Alpha", "One").unwrap();
        catalog.add_book("B", "Beta", "Two").unwrap();
        catalog.link_books("A", "B").unwrap();
        catalog.check_out("A", "U1").unwrap();
        assert_eq!(catalog.activity().len(), 5);

        let popped = catalog.undo_last_activity().unwrap();
        assert_eq!(popped.action, ActivityAction::Checkout);
        assert_eq!(catalog.activity().len(), 4);
        assert!(!catalog.book("A").unwrap().available);

        catalog.clear_activity();
        assert!(catalog.activity().is_empty());
        assert_eq!(
            catalog.store().writes.borrow().first().map(String::as_str),
            Some("insert A")
        );
    }

    #[test]
    fn activity_export_writes_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.log");
        let mut catalog = sqlite_catalog();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();

        assert_eq!(catalog.export_activity(&path).unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("ADD: Added book: Atomic Habits (ISBN: 001)"));
        assert!(lines[1].contains("LOAD: Loaded 0 books from database"));
    }

    #[test]
    fn rebuild_restores_indexes_from_records() {
        let mut catalog = sqlite_catalog();
        catalog.add_book("A", "Alpha", "One").unwrap();
        catalog.add_book("B", "Beta", "Two").unwrap();
        catalog.link_books("A", "B").unwrap();

        catalog.by_isbn.clear();
        catalog.titles.clear();
        catalog.reconcile();

        assert_eq!(catalog.find_by_isbn("B").unwrap().title, "Beta");
        assert_eq!(isbns(&catalog.search_title("al")), vec!["A"]);
        assert_eq!(isbns(&catalog.similar_to("A")), vec!["B"]);
        assert_eq!(
            catalog.latest_activity().map(|entry| entry.action),
            Some(ActivityAction::Repair)
        );
    }
}
