//! Runtime configuration: built-in defaults, then an optional `config.toml`
//! in the data directory, then `LIBRARY_*` environment variables
//! (`LIBRARY_CATALOG__DEFAULT_COPIES=3`).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use directories::BaseDirs;
use serde::Deserialize;

use crate::catalog::activity::DEFAULT_ACTIVITY_CAPACITY;
use crate::catalog::similarity::DEFAULT_RECOMMENDATIONS;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".library-manager";
/// Optional configuration file looked up inside the data directory.
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides `~/.library-manager` when set.
    pub data_dir: Option<PathBuf>,
    pub db_file: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogSettings {
    pub activity_capacity: usize,
    /// Copies registered with the lending coordinator for a new book.
    pub default_copies: u32,
    pub recommend_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when present.
    pub level: String,
    pub file: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub catalog: CatalogSettings,
    pub logging: LoggingConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_file: "library.sqlite".to_string(),
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            default_copies: 1,
            recommend_limit: DEFAULT_RECOMMENDATIONS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "library-manager.log".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the default data directory and the process environment.
    pub fn load() -> Result<Self> {
        let data_dir = default_data_dir()?;
        Self::load_from(&data_dir)
    }

    /// Load using `data_dir` as the place to look for `config.toml`.
    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(data_dir.join(CONFIG_FILE_NAME)).required(false))
            .add_source(
                Environment::with_prefix("LIBRARY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        let mut app: AppConfig = config
            .try_deserialize()
            .context("invalid configuration")?;
        if app.storage.data_dir.is_none() {
            app.storage.data_dir = Some(data_dir.to_path_buf());
        }
        Ok(app)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(&self.storage.db_file))
    }
}

/// Resolve `~/.library-manager`.
fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.catalog, CatalogSettings::default());
        assert_eq!(config.catalog.activity_capacity, 10);
        assert_eq!(config.catalog.recommend_limit, 5);
        assert_eq!(config.db_path().unwrap(), dir.path().join("library.sqlite"));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[catalog]\ndefault_copies = 3\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.catalog.default_copies, 3);
        assert_eq!(config.catalog.activity_capacity, 10);
        assert_eq!(config.logging.level, "debug");
    }
}
