//! Diff staging.
//!
//! Writes never touch the original tables. They land in connection-private
//! shadow tables (`temp.diff_<table>`) while a [`StagingSession`] tracks, per
//! table, which ids were added, which original rows were superseded by an
//! update and which were removed. The merged views read shadow rows plus the
//! original rows that are neither dirty nor removed.
use std::collections::{BTreeMap, BTreeSet};

use roaring::RoaringTreemap;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::error::Result;
use crate::model::Id;
use crate::schema::Table;
use crate::view::id_literals;

fn bit(id: Id) -> u64 {
    id as u64
}

/// Ids tracked for one table during a staging session.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackedIds {
    /// Only exist in shadow storage.
    pub added: RoaringTreemap,
    /// Authoritative row lives in shadow storage, a stale copy in the original.
    pub updated: RoaringTreemap,
    /// Original rows excluded from the merged view.
    pub dirty: RoaringTreemap,
    pub removed: RoaringTreemap,
}

impl TrackedIds {
    fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.dirty.is_empty()
            && self.removed.is_empty()
    }
}

/// One row bound for shadow storage, values in [`Table::columns`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRow {
    pub table: Table,
    pub id: Id,
    pub values: Vec<Value>,
}

impl StagedRow {
    pub fn new(table: Table, id: Id, values: Vec<Value>) -> Self {
        Self { table, id, values }
    }
}

#[derive(Debug, Default)]
pub struct StagingSession {
    tracked: BTreeMap<Table, TrackedIds>,
    commit_id: Option<Id>,
}

impl StagingSession {
    pub fn is_active(&self) -> bool {
        self.commit_id.is_some()
    }
    /// The commit every row staged in this session references.
    pub fn commit_id(&self) -> Option<Id> {
        self.commit_id
    }
    pub fn begin(&mut self, commit_id: Id) {
        self.commit_id = Some(commit_id);
    }
    /// Closes the session and returns the tables it touched.
    pub fn end(&mut self) -> BTreeSet<Table> {
        let touched = self.touched();
        self.tracked.clear();
        self.commit_id = None;
        touched
    }
    pub fn tracked(&self, table: Table) -> Option<&TrackedIds> {
        self.tracked.get(&table)
    }
    pub fn touched(&self) -> BTreeSet<Table> {
        self.tracked
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(table, _)| *table)
            .collect()
    }
    /// Original ids the merged view must skip: dirty union removed.
    pub fn excluded(&self, table: Table) -> RoaringTreemap {
        match self.tracked.get(&table) {
            Some(ids) => {
                let mut excluded = ids.dirty.clone();
                excluded.extend(ids.removed.iter());
                excluded
            }
            None => RoaringTreemap::new(),
        }
    }
    pub fn is_removed(&self, table: Table, id: Id) -> bool {
        self.tracked
            .get(&table)
            .is_some_and(|ids| ids.removed.contains(bit(id)))
    }
    pub fn mark_added(&mut self, table: Table, ids: &[Id]) {
        let tracked = self.tracked.entry(table).or_default();
        tracked.added.extend(ids.iter().map(|id| bit(*id)));
    }
    /// Splits updated ids into those whose shadow rows get overwritten and
    /// those that supersede an original row.
    pub fn partition_updates(&self, table: Table, ids: &[Id]) -> (Vec<Id>, Vec<Id>) {
        let tracked = self.tracked.get(&table);
        ids.iter().copied().partition(|id| {
            tracked.is_some_and(|t| t.added.contains(bit(*id)) || t.updated.contains(bit(*id)))
        })
    }
    pub fn mark_superseded(&mut self, table: Table, ids: &[Id]) {
        let tracked = self.tracked.entry(table).or_default();
        for id in ids {
            tracked.updated.insert(bit(*id));
            tracked.dirty.insert(bit(*id));
        }
    }
    pub fn mark_removed(&mut self, table: Table, ids: &[Id]) {
        let tracked = self.tracked.entry(table).or_default();
        for id in ids {
            tracked.added.remove(bit(*id));
            tracked.updated.remove(bit(*id));
            tracked.removed.insert(bit(*id));
        }
    }
}

// ------------- Shadow storage -------------
pub(crate) fn create_shadow_tables(conn: &Connection) -> Result<()> {
    for table in Table::ALL {
        conn.execute_batch(&format!(
            "create temp table if not exists {} as select {} from {} where 0;",
            table.shadow(),
            table.column_list(),
            table.original()
        ))?;
    }
    Ok(())
}

pub(crate) fn insert_rows(conn: &Connection, rows: &[StagedRow]) -> Result<()> {
    for row in rows {
        let placeholders = (1..=row.values.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare_cached(&format!(
            "insert into {} ({}) values ({placeholders})",
            row.table.shadow(),
            row.table.column_list()
        ))?;
        stmt.execute(params_from_iter(row.values.iter()))?;
    }
    debug!(rows = rows.len(), "shadow rows written");
    Ok(())
}

pub(crate) fn delete_rows(conn: &Connection, table: Table, ids: &[Id]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let deleted = conn.execute(
        &format!(
            "delete from {} where {} in ({})",
            table.shadow(),
            table.id_column(),
            id_literals(ids.iter().map(|id| bit(*id)))
        ),
        [],
    )?;
    Ok(deleted)
}

pub(crate) fn clear_shadow(conn: &Connection, tables: &BTreeSet<Table>) -> Result<()> {
    for table in tables {
        conn.execute(&format!("delete from {}", table.shadow()), [])?;
    }
    Ok(())
}
