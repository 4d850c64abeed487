//! The public surface: reads through composed views, checked writes into a
//! staging session, commit and rollback, and filter installation.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::{debug, info};

use crate::allocator::IdAllocator;
use crate::check::*;
use crate::config::{MappingConfig, PersistenceMode};
use crate::error::{IntegrityError, Result, SpineError};
use crate::filter::{self, FilterState, NameOrId};
use crate::kinds::{ItemKind, Kind, cascade};
use crate::model::*;
use crate::persist::Persistor;
use crate::schema::{self, Table};
use crate::snapshot::Snapshot;
use crate::staging::{self, StagedRow, StagingSession};
use crate::value::{JsonCodec, ValueCodec};
use crate::view::{MergedProvider, Subquery, ViewCache, ViewName, ViewProvider, Views};

/// What a batch write hands back: the items as now visible, and one entry
/// per rejected item.
pub type Written<R> = (Vec<R>, Vec<IntegrityError>);

pub struct DatabaseMapping {
    conn: Connection,
    codec: Arc<dyn ValueCodec>,
    allocator: IdAllocator,
    staging: StagingSession,
    cache: ViewCache,
    provider: Box<dyn ViewProvider>,
    filters: Vec<FilterState>,
}

macro_rules! kind_writers {
    ($($item:ty => $add:ident, $update:ident;)*) => {
        $(
            pub fn $add(&mut self, items: Vec<$item>, mode: Mode) -> Result<Written<<$item as Kind>::Record>> {
                self.add_items(items, mode)
            }
            pub fn $update(&mut self, items: Vec<$item>, mode: Mode) -> Result<Written<<$item as Kind>::Record>> {
                self.update_items(items, mode)
            }
        )*
    };
}

impl DatabaseMapping {
    pub fn open(config: &MappingConfig) -> Result<Self> {
        let conn = match config.persistence()? {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        if config.create {
            schema::create_new_database(&conn)?;
        }
        Self::from_connection(conn, &config.username)
    }

    /// Wraps an open connection whose schema is already in place.
    pub fn from_connection(conn: Connection, username: &str) -> Result<Self> {
        Self::with_codec(conn, username, Arc::new(JsonCodec))
    }

    pub fn with_codec(conn: Connection, username: &str, codec: Arc<dyn ValueCodec>) -> Result<Self> {
        schema::verify(&conn)?;
        staging::create_shadow_tables(&conn)?;
        let mut mapping = Self {
            conn,
            codec,
            allocator: IdAllocator::new(username),
            staging: StagingSession::default(),
            cache: ViewCache::default(),
            provider: Box::new(MergedProvider),
            filters: Vec::new(),
        };
        mapping.views().prime()?;
        info!(user = username, views = mapping.cache.len(), "database mapping ready");
        Ok(mapping)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
    pub fn view_cache(&self) -> &ViewCache {
        &self.cache
    }
    pub fn filters(&self) -> &[FilterState] {
        &self.filters
    }

    fn views(&mut self) -> Views<'_> {
        Views::new(self.provider.as_ref(), &mut self.cache, &self.staging)
    }

    fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(&self.conn, &self.staging)
    }

    // ------------- Reads -------------
    /// The named view as currently composed, filters included.
    pub fn subquery(&mut self, name: ViewName) -> Result<Subquery> {
        self.views().view(name)
    }

    pub fn query<R: Record>(&mut self) -> Result<Vec<R>> {
        let subquery = self.subquery(R::VIEW)?;
        subquery.fetch(&self.conn)
    }

    /// Records of the kind with the given ids, ignoring filters.
    fn read_back<K: Kind>(&self, ids: &[Id]) -> Result<Vec<K::Record>> {
        let wanted: BTreeSet<Id> = ids.iter().copied().collect();
        Ok(self
            .snapshot()
            .records::<K::Record>()?
            .into_iter()
            .filter(|record| wanted.contains(&record.id()))
            .collect())
    }

    // ------------- Writes -------------
    /// Checks and stages new items. Ids are reserved for the accepted ones;
    /// with `return_dups` the ids of existing duplicates are read back too.
    /// A duplicate of another kind sharing the unique space (an object class
    /// clashing with a relationship class) is only reported in the errors.
    pub fn add_items<K: Kind>(&mut self, items: Vec<K>, mode: Mode) -> Result<Written<K::Record>> {
        let mut lookups = K::lookups(&mut self.snapshot(), &self.codec)?;
        let (mut valid, errors) = check_batch(items, &mut lookups, mode.strict)?;
        let mut ids = Vec::with_capacity(valid.len());
        if !valid.is_empty() {
            let first = self.allocator.reserve(&mut self.conn, K::TABLE, valid.len())?;
            let commit_id = self.begin_session()?;
            let mut rows = Vec::new();
            for (offset, item) in valid.iter_mut().enumerate() {
                let id = first + offset as Id;
                item.set_id(id);
                rows.extend(item.rows(id, commit_id, &lookups));
                ids.push(id);
            }
            self.stage_added(&rows)?;
            info!(kind = K::LABEL, count = ids.len(), rejected = errors.len(), "staged additions");
        }
        if mode.return_dups {
            ids.extend(errors.iter().filter_map(|e| e.id));
        }
        let records = self.read_back::<K>(&ids)?;
        if mode.return_dups && records.len() < ids.len() {
            let found: BTreeSet<Id> = records.iter().map(|r| r.id()).collect();
            let foreign: Vec<Id> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
            debug!(kind = K::LABEL, ?foreign, "duplicates of another kind left out");
        }
        Ok((records, errors))
    }

    /// Checks and stages updates. Each item names its target by id and
    /// carries only the fields to change.
    pub fn update_items<K: Kind>(&mut self, items: Vec<K>, mode: Mode) -> Result<Written<K::Record>> {
        let (mut lookups, existing) = {
            let mut snapshot = self.snapshot();
            (K::lookups(&mut snapshot, &self.codec)?, K::existing(&mut snapshot)?)
        };
        let mut pairs: Vec<(K, K)> = Vec::new();
        let mut positions: HashMap<Id, usize, LookupHasher> = HashMap::default();
        let mut errors = Vec::new();
        for item in items {
            let rejected = match item.id() {
                None => IntegrityError::new(format!("Missing id for {} update.", K::LABEL)).on(&["id"]),
                Some(id) if self.staging.is_removed(K::TABLE, id) => {
                    return Err(SpineError::StaleReference(format!(
                        "{} {id} was removed in this session",
                        K::LABEL
                    )));
                }
                // Repeated targets fold into one update, later fields winning.
                Some(id) if positions.contains_key(&id) => {
                    let pair = &mut pairs[positions[&id]];
                    pair.1 = pair.1.clone().merge(item);
                    continue;
                }
                Some(id) => match existing.get(&id) {
                    Some(current) => {
                        positions.insert(id, pairs.len());
                        pairs.push((current.clone(), current.clone().merge(item)));
                        continue;
                    }
                    None => IntegrityError::new(format!("{} {id} not found.", K::LABEL)).on(&["id"]),
                },
            };
            if mode.strict {
                return Err(rejected.into());
            }
            errors.push(rejected);
        }
        let (valid, rejected) = check_update_batch(pairs, &mut lookups, mode.strict)?;
        errors.extend(rejected);

        let mut ids = Vec::with_capacity(valid.len());
        if !valid.is_empty() {
            let commit_id = self.begin_session()?;
            let mut rows = Vec::new();
            for item in &valid {
                if let Some(id) = item.id() {
                    rows.extend(item.rows(id, commit_id, &lookups));
                    ids.push(id);
                }
            }
            self.stage_updated(&rows)?;
            info!(kind = K::LABEL, count = ids.len(), rejected = errors.len(), "staged updates");
        }
        if mode.return_dups {
            ids.extend(errors.iter().filter_map(|e| e.id));
        }
        Ok((self.read_back::<K>(&ids)?, errors))
    }

    /// Removes the items and everything referring to them. Returns the
    /// number of removed ids per table.
    pub fn remove_items(&mut self, kind: ItemKind, ids: &[Id]) -> Result<BTreeMap<Table, usize>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let removed = cascade(&mut self.snapshot(), kind, ids)?;
        self.begin_session()?;
        let mut counts = BTreeMap::new();
        for (table, ids) in &removed {
            let ids: Vec<Id> = ids.iter().copied().collect();
            staging::delete_rows(&self.conn, *table, &ids)?;
            self.staging.mark_removed(*table, &ids);
            counts.insert(*table, ids.len());
        }
        let tables: BTreeSet<Table> = removed.into_keys().collect();
        self.cache.invalidate_tables(&tables);
        info!(?kind, ?counts, "staged removals");
        Ok(counts)
    }

    kind_writers! {
        AlternativeItem => add_alternatives, update_alternatives;
        ScenarioItem => add_scenarios, update_scenarios;
        ScenarioAlternativeItem => add_scenario_alternatives, update_scenario_alternatives;
        ObjectClassItem => add_object_classes, update_object_classes;
        RelationshipClassItem => add_relationship_classes, update_relationship_classes;
        ObjectItem => add_objects, update_objects;
        RelationshipItem => add_relationships, update_relationships;
        EntityGroupItem => add_entity_groups, update_entity_groups;
        ParameterDefinitionItem => add_parameter_definitions, update_parameter_definitions;
        ParameterValueItem => add_parameter_values, update_parameter_values;
        ParameterValueListItem => add_parameter_value_lists, update_parameter_value_lists;
        ParameterTagItem => add_parameter_tags, update_parameter_tags;
        ParameterDefinitionTagItem => add_parameter_definition_tags, update_parameter_definition_tags;
        ToolItem => add_tools, update_tools;
        FeatureItem => add_features, update_features;
        ToolFeatureItem => add_tool_features, update_tool_features;
        ToolFeatureMethodItem => add_tool_feature_methods, update_tool_feature_methods;
    }

    // ------------- Staging -------------
    /// Starts the staging session at its first write: reserves the commit id
    /// and stages the commit row every later row refers to.
    fn begin_session(&mut self) -> Result<Id> {
        if let Some(commit_id) = self.staging.commit_id() {
            return Ok(commit_id);
        }
        let commit_id = self.allocator.reserve(&mut self.conn, Table::Commit, 1)?;
        let row = StagedRow::new(
            Table::Commit,
            commit_id,
            vec![
                commit_id.into(),
                Value::Text(String::new()),
                Value::Text(Utc::now().to_rfc3339()),
                self.allocator.user().to_string().into(),
            ],
        );
        staging::insert_rows(&self.conn, &[row])?;
        self.staging.begin(commit_id);
        self.staging.mark_added(Table::Commit, &[commit_id]);
        self.cache.invalidate_tables(&BTreeSet::from([Table::Commit]));
        debug!(commit_id, "staging session started");
        Ok(commit_id)
    }

    fn stage_added(&mut self, rows: &[StagedRow]) -> Result<()> {
        staging::insert_rows(&self.conn, rows)?;
        for (table, ids) in ids_by_table(rows) {
            self.staging.mark_added(table, &ids);
        }
        self.cache.invalidate_tables(&tables_of(rows));
        Ok(())
    }

    fn stage_updated(&mut self, rows: &[StagedRow]) -> Result<()> {
        for (table, ids) in ids_by_table(rows) {
            let (overwrite, supersede) = self.staging.partition_updates(table, &ids);
            staging::delete_rows(&self.conn, table, &overwrite)?;
            self.staging.mark_superseded(table, &supersede);
        }
        staging::insert_rows(&self.conn, rows)?;
        self.cache.invalidate_tables(&tables_of(rows));
        Ok(())
    }

    pub fn has_pending_changes(&self) -> bool {
        self.staging.is_active()
    }

    pub fn staging(&self) -> &StagingSession {
        &self.staging
    }

    /// Stamps the session's commit row and merges every staged row into the
    /// original tables.
    pub fn commit_session(&mut self, comment: &str) -> Result<()> {
        let commit_id = self.staging.commit_id().ok_or(SpineError::NothingToCommit)?;
        let mut persistor = Persistor::new(&mut self.conn);
        persistor.stamp_commit(commit_id, comment, self.allocator.user())?;
        let written = persistor.merge(&self.staging)?;
        let touched = self.staging.end();
        self.cache.invalidate_tables(&touched);
        info!(commit_id, rows = written, comment, "session committed");
        Ok(())
    }

    pub fn rollback_session(&mut self) -> Result<()> {
        if !self.staging.is_active() {
            return Err(SpineError::NothingToRollback);
        }
        staging::clear_shadow(&self.conn, &self.staging.touched())?;
        let touched = self.staging.end();
        self.cache.invalidate_tables(&touched);
        info!(tables = touched.len(), "session rolled back");
        Ok(())
    }

    // ------------- Filters -------------
    pub fn apply_scenario_filter(&mut self, scenario: impl Into<NameOrId>) -> Result<()> {
        let state = filter::resolve_scenario(&mut self.snapshot(), &scenario.into())?;
        self.install(state)
    }

    pub fn apply_alternative_filter<I, T>(&mut self, alternatives: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<NameOrId>,
    {
        let keys: Vec<NameOrId> = alternatives.into_iter().map(Into::into).collect();
        let state = filter::resolve_alternatives(&mut self.snapshot(), &keys)?;
        self.install(state)
    }

    pub fn apply_tool_filter(&mut self, tool: impl Into<NameOrId>) -> Result<()> {
        let state = filter::resolve_tool(&mut self.snapshot(), &tool.into())?;
        self.install(state)
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.provider = Box::new(MergedProvider);
        for name in ViewName::all().into_iter().filter(|n| n.is_overridable()) {
            self.cache.invalidate_view(name);
        }
        info!("filters cleared");
    }

    /// Replaces a filter of the same kind in place or stacks a new one, then
    /// rebuilds the provider chain.
    fn install(&mut self, state: FilterState) -> Result<()> {
        match self.filters.iter_mut().find(|f| f.same_kind(&state)) {
            Some(installed) => *installed = state.clone(),
            None => self.filters.push(state.clone()),
        }
        self.provider = self
            .filters
            .iter()
            .fold(Box::new(MergedProvider) as Box<dyn ViewProvider>, |inner, f| f.wrap(inner));
        for name in state.overrides() {
            self.cache.invalidate_view(*name);
        }
        info!(filter = ?state, installed = self.filters.len(), "filter applied");
        Ok(())
    }
}

fn ids_by_table(rows: &[StagedRow]) -> BTreeMap<Table, Vec<Id>> {
    let mut ids: BTreeMap<Table, BTreeSet<Id>> = BTreeMap::new();
    for row in rows {
        ids.entry(row.table).or_default().insert(row.id);
    }
    ids.into_iter()
        .map(|(table, ids)| (table, ids.into_iter().collect()))
        .collect()
}

fn tables_of(rows: &[StagedRow]) -> BTreeSet<Table> {
    rows.iter().map(|row| row.table).collect()
}
