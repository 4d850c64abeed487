use thiserror::Error;

use crate::model::Id;

/// A candidate item violates a modeled invariant.
///
/// Carries the offending field(s) and, for uniqueness violations, the id of
/// the existing row the candidate collides with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct IntegrityError {
    pub message: String,
    pub fields: Vec<&'static str>,
    pub id: Option<Id>,
}

impl IntegrityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Vec::new(),
            id: None,
        }
    }
    pub fn on(mut self, fields: &[&'static str]) -> Self {
        self.fields.extend_from_slice(fields);
        self
    }
    pub fn conflicting(mut self, id: Option<Id>) -> Self {
        self.id = id;
        self
    }
}

#[derive(Error, Debug)]
pub enum SpineError {
    #[error("Missing from the database schema: {}", describe_missing(.tables, .columns))]
    SchemaMissing {
        tables: Vec<String>,
        columns: Vec<String>,
    },

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("Unable to reserve ids for {table}: {message}")]
    ConcurrentAllocation { table: String, message: String },

    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Nothing to commit.")]
    NothingToCommit,

    #[error("Nothing to rollback.")]
    NothingToRollback,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

fn describe_missing(tables: &[String], columns: &[String]) -> String {
    let mut parts = Vec::new();
    if !tables.is_empty() {
        parts.push(format!("tables {}", tables.join(", ")));
    }
    if !columns.is_empty() {
        parts.push(format!("columns {}", columns.join(", ")));
    }
    parts.join("; ")
}

pub type Result<T> = std::result::Result<T, SpineError>;

impl From<rusqlite::Error> for SpineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<config::ConfigError> for SpineError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
