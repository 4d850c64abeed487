//! One consistent, unfiltered read of the merged state.
//!
//! Checker lookups, update targets and cascades are always computed from
//! here, so an installed filter can never hide an existing row from the
//! integrity checks.
use rusqlite::Connection;

use crate::error::Result;
use crate::model::Record;
use crate::staging::StagingSession;
use crate::view::{MergedProvider, ViewCache, Views};

pub struct Snapshot<'a> {
    conn: &'a Connection,
    staging: &'a StagingSession,
    cache: ViewCache,
}

impl<'a> Snapshot<'a> {
    pub fn new(conn: &'a Connection, staging: &'a StagingSession) -> Self {
        Self {
            conn,
            staging,
            cache: ViewCache::default(),
        }
    }

    pub fn records<R: Record>(&mut self) -> Result<Vec<R>> {
        let subquery = Views::new(&MergedProvider, &mut self.cache, self.staging).view(R::VIEW)?;
        subquery.fetch(self.conn)
    }
}
