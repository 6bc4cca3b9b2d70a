use library_manager::models::{BookStatus, CheckoutOutcome, ReturnOutcome, Traversal};
use library_manager::{Catalog, CatalogError, CatalogSettings, Persistence, SqliteStore};

fn open(path: &std::path::Path) -> Catalog<SqliteStore> {
    let store = SqliteStore::open(path).unwrap();
    Catalog::load(store, CatalogSettings::default()).unwrap()
}

fn isbns(catalog: &Catalog<SqliteStore>, order: Traversal) -> Vec<String> {
    catalog
        .traverse(order)
        .into_iter()
        .map(|summary| summary.isbn)
        .collect()
}

#[test]
fn catalog_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("library.sqlite");

    {
        let mut catalog = open(&path);
        catalog.add_book("002", "Dune", "Frank Herbert").unwrap();
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        catalog.add_book("003", "Deep Work", "Cal Newport").unwrap();
        catalog.link_books("001", "003").unwrap();
        catalog.set_copies("002", 4).unwrap();
        catalog.update_book("003", "Deep Work (2nd ed.)", "Cal Newport").unwrap();
    }

    let catalog = open(&path);
    assert_eq!(isbns(&catalog, Traversal::Inorder), vec!["001", "002", "003"]);
    assert_eq!(
        catalog.search_title("deep work (2").first().map(|hit| hit.isbn.as_str()),
        Some("003")
    );
    assert_eq!(
        catalog
            .similar_to("001")
            .into_iter()
            .map(|hit| hit.isbn)
            .collect::<Vec<_>>(),
        vec!["003"]
    );
    assert_eq!(catalog.lending_status("002").unwrap().total_copies, 4);
    assert_eq!(catalog.stats().graph_edges, 1);

    let log = catalog.activity();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].details, "Loaded 3 books from database");
}

#[test]
fn stale_checked_out_status_is_reset_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.sqlite");

    {
        let mut catalog = open(&path);
        catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();
        assert_eq!(catalog.check_out("001", "U1").unwrap(), CheckoutOutcome::CheckedOut);
        let rows = catalog.store().load_all().unwrap();
        assert_eq!(rows[0].status, BookStatus::CheckedOut);
    }

    let catalog = open(&path);
    assert!(catalog.book("001").unwrap().available);
    assert_eq!(catalog.lending_status("001").unwrap().available_copies, 1);
    assert_eq!(
        catalog.store().load_all().unwrap()[0].status,
        BookStatus::Available
    );
}

#[test]
fn deleting_a_book_removes_its_links_from_storage() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut catalog = Catalog::load(store, CatalogSettings::default()).unwrap();
    catalog.add_book("A", "Alpha", "One").unwrap();
    catalog.add_book("B", "Beta", "Two").unwrap();
    catalog.add_book("C", "Gamma", "Three").unwrap();
    catalog.link_books("A", "B").unwrap();
    catalog.link_books("C", "B").unwrap();

    catalog.delete_book("B").unwrap();
    assert!(catalog.store().load_links().unwrap().is_empty());
    assert_eq!(catalog.store().load_all().unwrap().len(), 2);
    assert!(catalog.recommend("A").is_empty());
}

#[test]
fn single_copy_waitlist_hands_over_on_return() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut catalog = Catalog::load(store, CatalogSettings::default()).unwrap();
    catalog.add_book("B1", "Book One", "Someone").unwrap();

    assert!(catalog.check_out("B1", "U1").unwrap().is_checked_out());
    assert!(!catalog.check_out("B1", "U2").unwrap().is_checked_out());
    assert_eq!(catalog.lending_status("B1").unwrap().waitlist, vec!["U2"]);

    assert_eq!(
        catalog.return_book("B1", "U1").unwrap(),
        ReturnOutcome::Promoted("U2".to_string())
    );
    let status = catalog.lending_status("B1").unwrap();
    assert_eq!(status.holders, vec!["U2"]);
    assert!(status.waitlist.is_empty());
    assert_eq!(status.available_copies, 0);

    assert!(matches!(
        catalog.return_book("B1", "U1"),
        Err(CatalogError::InvalidState(_))
    ));
}

#[test]
fn configured_settings_shape_the_catalog() {
    let settings = CatalogSettings {
        activity_capacity: 3,
        default_copies: 2,
        recommend_limit: 1,
    };
    let store = SqliteStore::open_in_memory().unwrap();
    let mut catalog = Catalog::load(store, settings).unwrap();

    for (isbn, title) in [("1", "One"), ("2", "Two"), ("3", "Three")] {
        catalog.add_book(isbn, title, "Author").unwrap();
    }
    catalog.link_books("1", "2").unwrap();
    catalog.link_books("2", "3").unwrap();

    assert_eq!(catalog.activity().len(), 3);
    assert_eq!(catalog.lending_status("1").unwrap().total_copies, 2);
    assert_eq!(catalog.store().load_all().unwrap()[0].copies, 2);
    assert_eq!(catalog.recommend("1").len(), 1);
}

#[test]
fn duplicate_isbn_is_rejected_end_to_end() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut catalog = Catalog::load(store, CatalogSettings::default()).unwrap();
    catalog.add_book("001", "Atomic Habits", "James Clear").unwrap();

    let err = catalog.add_book("001", "Again", "Nobody").unwrap_err();
    assert_eq!(err.to_string(), "A book with ISBN 001 already exists.");
    assert_eq!(catalog.store().load_all().unwrap().len(), 1);
    assert_eq!(catalog.books().len(), 1);
}
