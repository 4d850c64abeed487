//! Collision-free id reservation shared by every writer of a store.
//!
//! The `next_id` row holds one watermark per id-bearing table. A reservation
//! takes the store's write lock, advances the watermark and commits straight
//! away, so the new watermark is visible to every other writer before any
//! of the reserved ids are used. Losing the race for the lock is reported to
//! the caller, who decides whether to retry.
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, warn};

use crate::error::{Result, SpineError};
use crate::model::Id;
use crate::schema::{NEXT_ID, Table, quoted};

fn is_contention(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

#[derive(Debug, Clone)]
pub struct IdAllocator {
    user: String,
}

impl IdAllocator {
    /// `user` is the writer identity stamped on the counter row.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Reserves `count` consecutive ids for `table` and returns the first.
    pub fn reserve(&self, conn: &mut Connection, table: Table, count: usize) -> Result<Id> {
        let column = table.next_id_column().ok_or_else(|| {
            SpineError::Persistence(format!("{table} shares its ids with its owning rows"))
        })?;
        let raced = |e: rusqlite::Error| {
            if is_contention(&e) {
                warn!(%table, error = %e, "lost the race for the id counter");
                SpineError::ConcurrentAllocation {
                    table: table.name().to_string(),
                    message: e.to_string(),
                }
            } else {
                SpineError::from(e)
            }
        };

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(raced)?;
        let counter: Option<Option<Id>> = tx
            .query_row(&format!("select {column} from {NEXT_ID} limit 1"), [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(raced)?;
        let first = match counter.flatten() {
            Some(next) => next,
            None => {
                let max: Option<Id> = tx
                    .query_row(
                        &format!(
                            "select max({}) from {}",
                            quoted(table.id_column()),
                            table.original()
                        ),
                        [],
                        |row| row.get(0),
                    )
                    .map_err(raced)?;
                max.map_or(1, |max| max + 1)
            }
        };
        let watermark = first + count as Id;
        let now = Utc::now();
        if counter.is_some() {
            tx.execute(
                &format!("update {NEXT_ID} set user = ?1, date = ?2, {column} = ?3"),
                params![self.user, now, watermark],
            )
            .map_err(raced)?;
        } else {
            tx.execute(
                &format!("insert into {NEXT_ID} (user, date, {column}) values (?1, ?2, ?3)"),
                params![self.user, now, watermark],
            )
            .map_err(raced)?;
        }
        tx.commit().map_err(raced)?;
        debug!(%table, first, count, "ids reserved");
        Ok(first)
    }
}
