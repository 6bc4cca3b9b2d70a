//! Binary entry point: read configuration, start file logging, open the
//! database, load the catalog and hand it to the terminal UI.
use anyhow::Context;
use library_manager::{logging, run_app, App, AppConfig, Catalog, SqliteStore};
use tracing::info;

/// File the activity log is exported to, inside the data directory.
const ACTIVITY_EXPORT_FILE: &str = "library_activity.log";

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let data_dir = config.data_dir()?;
    let _log_guard = logging::init(&config.logging, &data_dir)?;

    let db_path = config.db_path()?;
    info!(path = %db_path.display(), "opening catalog database");
    let store = SqliteStore::open(&db_path)?;
    let catalog = Catalog::load(store, config.catalog.clone())
        .context("failed to load catalog from database")?;

    let mut app = App::new(catalog, data_dir.join(ACTIVITY_EXPORT_FILE));
    run_app(&mut app)
}
