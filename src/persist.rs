// used for persistence
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params};
use tracing::info;

use crate::error::Result;
use crate::model::Id;
use crate::schema::Table;
use crate::staging::StagingSession;
use crate::view::id_literals;

// ------------- Persistence -------------
/// Moves a staging session's shadow rows into the original tables.
///
/// Everything happens in one write transaction: for every table the session
/// touched, the superseded and removed original rows are deleted, the shadow
/// rows are copied over and the shadow table is emptied. A failure leaves
/// both the originals and the shadow tables as they were.
pub struct Persistor<'db> {
    pub db: &'db mut Connection,
}

impl<'db> Persistor<'db> {
    pub fn new(connection: &'db mut Connection) -> Persistor<'db> {
        Persistor { db: connection }
    }

    /// Writes the final comment, writer and timestamp onto the staged commit row.
    pub fn stamp_commit(&self, commit_id: Id, comment: &str, user: &str) -> Result<()> {
        self.db.execute(
            &format!(
                "update {} set comment = ?1, user = ?2, date = ?3 where id = ?4",
                Table::Commit.shadow()
            ),
            params![comment, user, Utc::now(), commit_id],
        )?;
        Ok(())
    }

    /// Returns the number of rows written to the original tables.
    pub fn merge(&mut self, staging: &StagingSession) -> Result<usize> {
        let touched = staging.touched();
        let tx = self
            .db
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut written = 0;
        for table in &touched {
            let excluded = staging.excluded(*table);
            if !excluded.is_empty() {
                tx.execute(
                    &format!(
                        "delete from {} where {} in ({})",
                        table.original(),
                        table.id_column(),
                        id_literals(excluded.iter())
                    ),
                    [],
                )?;
            }
            written += tx.execute(
                &format!(
                    "insert into {} ({columns}) select {columns} from {}",
                    table.original(),
                    table.shadow(),
                    columns = table.column_list()
                ),
                [],
            )?;
            tx.execute(&format!("delete from {}", table.shadow()), [])?;
        }
        tx.commit()?;
        info!(tables = touched.len(), rows = written, "staged rows merged");
        Ok(written)
    }
}
