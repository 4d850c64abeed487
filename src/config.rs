use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, SpineError};

lazy_static! {
    static ref SQLITE_URL: Regex = Regex::new(r"^sqlite://(?:/(?P<path>.*))?$").unwrap();
}

/// Settings for opening a [`DatabaseMapping`](crate::mapping::DatabaseMapping).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// `sqlite://` for an in-memory store, `sqlite:///<path>` or a bare path.
    pub db_url: String,
    /// Writer identity stamped on commits and id reservations.
    pub username: String,
    pub busy_timeout_ms: u64,
    pub log_filter: String,
    /// Bootstrap the schema when the store is empty.
    pub create: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite://".to_string(),
            username: "anon".to_string(),
            busy_timeout_ms: 0,
            log_filter: "info".to_string(),
            create: false,
        }
    }
}

impl MappingConfig {
    /// Defaults, then the optional file, then `SPINEDB_*` variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = MappingConfig::default();
        let mut builder = config::Config::builder()
            .set_default("db_url", defaults.db_url)?
            .set_default("username", defaults.username)?
            .set_default("busy_timeout_ms", defaults.busy_timeout_ms)?
            .set_default("log_filter", defaults.log_filter)?
            .set_default("create", defaults.create)?;
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("SPINEDB"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// A file backed configuration with every other setting at its default.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            db_url: format!("sqlite:///{}", path.as_ref().display()),
            ..Self::default()
        }
    }

    pub fn persistence(&self) -> Result<PersistenceMode> {
        PersistenceMode::parse(&self.db_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(PathBuf),
}

impl PersistenceMode {
    pub fn parse(db_url: &str) -> Result<Self> {
        let db_url = db_url.trim();
        if db_url.is_empty() {
            return Err(SpineError::Config("empty database url".to_string()));
        }
        if db_url == ":memory:" {
            return Ok(PersistenceMode::InMemory);
        }
        if let Some(captures) = SQLITE_URL.captures(db_url) {
            return Ok(match captures.name("path").map(|p| p.as_str()) {
                None | Some("") => PersistenceMode::InMemory,
                Some(path) => PersistenceMode::File(PathBuf::from(path)),
            });
        }
        if db_url.contains("://") {
            return Err(SpineError::Config(format!("unsupported database url '{db_url}'")));
        }
        Ok(PersistenceMode::File(PathBuf::from(db_url)))
    }
}

/// Installs a fmt subscriber; later calls leave the first one in place.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_select_the_persistence_mode() {
        assert_eq!(PersistenceMode::parse("sqlite://").unwrap(), PersistenceMode::InMemory);
        assert_eq!(PersistenceMode::parse(":memory:").unwrap(), PersistenceMode::InMemory);
        assert_eq!(
            PersistenceMode::parse("sqlite:///tmp/model.sqlite").unwrap(),
            PersistenceMode::File(PathBuf::from("tmp/model.sqlite"))
        );
        assert_eq!(
            PersistenceMode::parse("sqlite:////tmp/model.sqlite").unwrap(),
            PersistenceMode::File(PathBuf::from("/tmp/model.sqlite"))
        );
        assert_eq!(
            PersistenceMode::parse("model.sqlite").unwrap(),
            PersistenceMode::File(PathBuf::from("model.sqlite"))
        );
        assert!(PersistenceMode::parse("postgresql://host/db").is_err());
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let config = MappingConfig::load(None).expect("defaults load");
        assert_eq!(config.username, "anon");
        assert_eq!(config.busy_timeout_ms, 0);
    }
}
