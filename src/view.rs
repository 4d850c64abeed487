//! Composed read views ("subqueries") over the normalized schema.
//!
//! Every base table has a merged view that unions its shadow rows with the
//! original rows staging has not superseded. Composed views are built on top
//! of those, never on the raw tables. Four views are produced by a
//! [`ViewProvider`] so that filters can replace them: entity classes,
//! entities, parameter definitions and parameter values.
//!
//! Views are memoized by name in a [`ViewCache`]. Each built [`Subquery`]
//! records which tables and views it reads, which gives the cache its
//! dependency graph: a write to a table drops exactly the memoized views
//! whose reads include that table.
use std::collections::{BTreeSet, HashMap};
use std::hash::BuildHasherDefault;

use rusqlite::Connection;
use seahash::SeaHasher;
use tracing::debug;

use crate::error::Result;
use crate::model::{EntityClassType, EntityType, Record};
use crate::schema::Table;
use crate::staging::StagingSession;

pub type ViewHasher = BuildHasherDefault<SeaHasher>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewName {
    /// Shadow rows union the non-superseded original rows of one table.
    Merged(Table),
    EntityClass,
    Entity,
    ParameterDefinition,
    ParameterValue,
    ObjectClass,
    Object,
    RelationshipClass,
    Relationship,
    WideScenario,
    WideParameterValueList,
    WideParameterDefinitionTag,
    ObjectParameterDefinition,
    RelationshipParameterDefinition,
    ObjectParameterValue,
    RelationshipParameterValue,
    ObjectGroup,
}

impl ViewName {
    pub fn all() -> Vec<ViewName> {
        let mut names: Vec<ViewName> = Table::ALL.iter().map(|t| ViewName::Merged(*t)).collect();
        names.extend([
            ViewName::EntityClass,
            ViewName::Entity,
            ViewName::ParameterDefinition,
            ViewName::ParameterValue,
            ViewName::ObjectClass,
            ViewName::Object,
            ViewName::RelationshipClass,
            ViewName::Relationship,
            ViewName::WideScenario,
            ViewName::WideParameterValueList,
            ViewName::WideParameterDefinitionTag,
            ViewName::ObjectParameterDefinition,
            ViewName::RelationshipParameterDefinition,
            ViewName::ObjectParameterValue,
            ViewName::RelationshipParameterValue,
            ViewName::ObjectGroup,
        ]);
        names
    }
    /// Views a [`ViewProvider`] may replace.
    pub fn is_overridable(self) -> bool {
        matches!(
            self,
            ViewName::EntityClass
                | ViewName::Entity
                | ViewName::ParameterDefinition
                | ViewName::ParameterValue
        )
    }
}

/// A composed select statement together with everything it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    sql: String,
    tables: BTreeSet<Table>,
    views: BTreeSet<ViewName>,
}

impl Subquery {
    pub(crate) fn compose(sql: String) -> Self {
        Self {
            sql,
            tables: BTreeSet::new(),
            views: BTreeSet::new(),
        }
    }
    /// Takes over the reads of a subquery embedded in this one.
    pub(crate) fn over(mut self, part: &Subquery) -> Self {
        self.tables.extend(part.tables.iter().copied());
        self.views.extend(part.views.iter().copied());
        self
    }
    /// Like [`Subquery::over`] for a part obtained by name from the cache.
    pub(crate) fn over_view(self, name: ViewName, part: &Subquery) -> Self {
        let mut composed = self.over(part);
        composed.views.insert(name);
        composed
    }
    pub fn sql(&self) -> &str {
        &self.sql
    }
    /// Every table read, directly or through other views.
    pub fn tables(&self) -> &BTreeSet<Table> {
        &self.tables
    }
    /// Every named view read, directly or transitively.
    pub fn views(&self) -> &BTreeSet<ViewName> {
        &self.views
    }
    pub fn reads(&self, table: Table) -> bool {
        self.tables.contains(&table)
    }
    /// The statement parenthesised for use in a `from` clause.
    pub(crate) fn nested(&self) -> String {
        format!("({})", self.sql)
    }
    pub fn fetch<R: Record>(&self, conn: &Connection) -> Result<Vec<R>> {
        let sql = format!("select * from {} order by {}", self.nested(), R::ORDER_BY);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], |row| R::from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

// ------------- Dependency graph -------------
/// Which tables and views each built view reads.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    reads: HashMap<ViewName, BTreeSet<Table>, ViewHasher>,
    depends_on: HashMap<ViewName, BTreeSet<ViewName>, ViewHasher>,
}

impl DependencyGraph {
    pub fn record(&mut self, name: ViewName, subquery: &Subquery) {
        self.reads.insert(name, subquery.tables.clone());
        self.depends_on.insert(name, subquery.views.clone());
    }
    pub fn tables_read_by(&self, name: ViewName) -> Option<&BTreeSet<Table>> {
        self.reads.get(&name)
    }
    /// Views whose reads intersect the given tables.
    pub fn readers_of(&self, tables: &BTreeSet<Table>) -> BTreeSet<ViewName> {
        self.reads
            .iter()
            .filter(|(_, read)| !read.is_disjoint(tables))
            .map(|(name, _)| *name)
            .collect()
    }
    /// The view itself plus every view built on top of it.
    pub fn dependents_of(&self, name: ViewName) -> BTreeSet<ViewName> {
        let mut dependents: BTreeSet<ViewName> = self
            .depends_on
            .iter()
            .filter(|(_, used)| used.contains(&name))
            .map(|(view, _)| *view)
            .collect();
        dependents.insert(name);
        dependents
    }
}

// ------------- View cache -------------
#[derive(Debug, Default)]
pub struct ViewCache {
    memo: HashMap<ViewName, Subquery, ViewHasher>,
    graph: DependencyGraph,
}

impl ViewCache {
    pub fn get(&self, name: ViewName) -> Option<&Subquery> {
        self.memo.get(&name)
    }
    pub fn is_cached(&self, name: ViewName) -> bool {
        self.memo.contains_key(&name)
    }
    pub fn len(&self) -> usize {
        self.memo.len()
    }
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
    fn insert(&mut self, name: ViewName, subquery: Subquery) {
        self.graph.record(name, &subquery);
        self.memo.insert(name, subquery);
    }
    /// Drops every memoized view reading any of the tables.
    pub fn invalidate_tables(&mut self, tables: &BTreeSet<Table>) -> usize {
        let stale = self.graph.readers_of(tables);
        let dropped = stale.iter().filter(|name| self.memo.remove(name).is_some()).count();
        if dropped > 0 {
            debug!(?tables, dropped, "view cache invalidated");
        }
        dropped
    }
    /// Drops a view and everything composed from it.
    pub fn invalidate_view(&mut self, name: ViewName) -> usize {
        let stale = self.graph.dependents_of(name);
        let dropped = stale.iter().filter(|view| self.memo.remove(view).is_some()).count();
        debug!(?name, dropped, "view replaced");
        dropped
    }
}

// ------------- Providers -------------
/// Builds the four replaceable views. Filters implement this by wrapping
/// the provider installed before them.
pub trait ViewProvider {
    fn entity_class_sq(&self, views: &mut Views<'_>) -> Result<Subquery>;
    fn entity_sq(&self, views: &mut Views<'_>) -> Result<Subquery>;
    fn parameter_definition_sq(&self, views: &mut Views<'_>) -> Result<Subquery>;
    fn parameter_value_sq(&self, views: &mut Views<'_>) -> Result<Subquery>;
}

/// The unfiltered provider: every replaceable view is its merged table.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergedProvider;

impl MergedProvider {
    fn merged(views: &mut Views<'_>, table: Table) -> Result<Subquery> {
        let name = ViewName::Merged(table);
        let merged = views.view(name)?;
        Ok(Subquery::compose(merged.sql.clone()).over_view(name, &merged))
    }
}

impl ViewProvider for MergedProvider {
    fn entity_class_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        Self::merged(views, Table::EntityClass)
    }
    fn entity_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        Self::merged(views, Table::Entity)
    }
    fn parameter_definition_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        Self::merged(views, Table::ParameterDefinition)
    }
    fn parameter_value_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        Self::merged(views, Table::ParameterValue)
    }
}

/// Prefixes every column of a table with an alias.
pub(crate) fn qualified_columns(table: Table, alias: &str) -> String {
    table
        .columns()
        .iter()
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn id_literals(ids: impl IntoIterator<Item = u64>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn merged_sq(table: Table, staging: &StagingSession) -> Subquery {
    let columns = table.column_list();
    let mut sql = format!(
        "select {columns} from {} union all select {columns} from {}",
        table.shadow(),
        table.original()
    );
    let excluded = staging.excluded(table);
    if !excluded.is_empty() {
        sql.push_str(&format!(
            " where {} not in ({})",
            table.id_column(),
            id_literals(excluded.iter())
        ));
    }
    let mut subquery = Subquery::compose(sql);
    subquery.tables.insert(table);
    subquery
}

// ------------- Views -------------
/// Everything needed to build views: the provider chain, the memo and the
/// staging state the merged views are built from.
pub struct Views<'a> {
    provider: &'a dyn ViewProvider,
    cache: &'a mut ViewCache,
    staging: &'a StagingSession,
}

impl<'a> Views<'a> {
    pub fn new(
        provider: &'a dyn ViewProvider,
        cache: &'a mut ViewCache,
        staging: &'a StagingSession,
    ) -> Self {
        Self {
            provider,
            cache,
            staging,
        }
    }

    pub fn view(&mut self, name: ViewName) -> Result<Subquery> {
        if let Some(subquery) = self.cache.get(name) {
            return Ok(subquery.clone());
        }
        let subquery = self.build(name)?;
        self.cache.insert(name, subquery.clone());
        Ok(subquery)
    }

    /// Builds every view once so the dependency graph is complete.
    pub fn prime(&mut self) -> Result<()> {
        for name in ViewName::all() {
            self.view(name)?;
        }
        Ok(())
    }

    fn build(&mut self, name: ViewName) -> Result<Subquery> {
        let provider = self.provider;
        match name {
            ViewName::Merged(table) => Ok(merged_sq(table, self.staging)),
            ViewName::EntityClass => provider.entity_class_sq(self),
            ViewName::Entity => provider.entity_sq(self),
            ViewName::ParameterDefinition => provider.parameter_definition_sq(self),
            ViewName::ParameterValue => provider.parameter_value_sq(self),
            ViewName::ObjectClass => self.object_class_sq(),
            ViewName::Object => self.object_sq(),
            ViewName::RelationshipClass => self.wide_relationship_class_sq(),
            ViewName::Relationship => self.wide_relationship_sq(),
            ViewName::WideScenario => self.wide_scenario_sq(),
            ViewName::WideParameterValueList => self.wide_parameter_value_list_sq(),
            ViewName::WideParameterDefinitionTag => self.wide_parameter_definition_tag_sq(),
            ViewName::ObjectParameterDefinition => self.object_parameter_definition_sq(),
            ViewName::RelationshipParameterDefinition => self.relationship_parameter_definition_sq(),
            ViewName::ObjectParameterValue => self.object_parameter_value_sq(),
            ViewName::RelationshipParameterValue => self.relationship_parameter_value_sq(),
            ViewName::ObjectGroup => self.object_group_sq(),
        }
    }

    fn object_class_sq(&mut self) -> Result<Subquery> {
        let classes = self.view(ViewName::EntityClass)?;
        let sql = format!(
            "select id, name, description, display_order, hidden, commit_id from {} where type_id = {}",
            classes.nested(),
            EntityClassType::ObjectClass as i64
        );
        Ok(Subquery::compose(sql).over_view(ViewName::EntityClass, &classes))
    }

    fn object_sq(&mut self) -> Result<Subquery> {
        let entities = self.view(ViewName::Entity)?;
        let sql = format!(
            "select id, class_id, name, description, commit_id from {} where type_id = {}",
            entities.nested(),
            EntityType::Object as i64
        );
        Ok(Subquery::compose(sql).over_view(ViewName::Entity, &entities))
    }

    fn wide_relationship_class_sq(&mut self) -> Result<Subquery> {
        let classes = self.view(ViewName::EntityClass)?;
        let members = self.view(ViewName::Merged(Table::RelationshipEntityClass))?;
        let sql = format!(
            "select rc.id as id, rc.name as name, rc.description as description, \
             rc.display_order as display_order, rc.hidden as hidden, rc.commit_id as commit_id, \
             group_concat(m.member_class_id, ',' order by m.dimension) as object_class_id_list, \
             group_concat(oc.name, ',' order by m.dimension) as object_class_name_list \
             from {classes} as rc \
             join {members} as m on m.entity_class_id = rc.id \
             join {classes} as oc on oc.id = m.member_class_id \
             where rc.type_id = {relationship} \
             group by rc.id",
            classes = classes.nested(),
            members = members.nested(),
            relationship = EntityClassType::RelationshipClass as i64,
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::EntityClass, &classes)
            .over_view(ViewName::Merged(Table::RelationshipEntityClass), &members))
    }

    fn wide_relationship_sq(&mut self) -> Result<Subquery> {
        let entities = self.view(ViewName::Entity)?;
        let members = self.view(ViewName::Merged(Table::RelationshipEntity))?;
        let sql = format!(
            "select r.id as id, r.class_id as class_id, r.name as name, \
             r.description as description, r.commit_id as commit_id, \
             group_concat(m.member_id, ',' order by m.dimension) as object_id_list, \
             group_concat(o.name, ',' order by m.dimension) as object_name_list, \
             group_concat(m.member_class_id, ',' order by m.dimension) as object_class_id_list \
             from {entities} as r \
             join {members} as m on m.entity_id = r.id \
             join {entities} as o on o.id = m.member_id \
             where r.type_id = {relationship} \
             group by r.id",
            entities = entities.nested(),
            members = members.nested(),
            relationship = EntityType::Relationship as i64,
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::Entity, &entities)
            .over_view(ViewName::Merged(Table::RelationshipEntity), &members))
    }

    fn wide_scenario_sq(&mut self) -> Result<Subquery> {
        let scenarios = self.view(ViewName::Merged(Table::Scenario))?;
        let ranks = self.view(ViewName::Merged(Table::ScenarioAlternative))?;
        let alternatives = self.view(ViewName::Merged(Table::Alternative))?;
        let sql = format!(
            "select s.id as id, s.name as name, s.description as description, \
             s.active as active, s.commit_id as commit_id, \
             group_concat(sa.alternative_id, ',' order by sa.rank) as alternative_id_list, \
             group_concat(a.name, ',' order by sa.rank) as alternative_name_list \
             from {} as s \
             left join {} as sa on sa.scenario_id = s.id \
             left join {} as a on a.id = sa.alternative_id \
             group by s.id",
            scenarios.nested(),
            ranks.nested(),
            alternatives.nested(),
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::Merged(Table::Scenario), &scenarios)
            .over_view(ViewName::Merged(Table::ScenarioAlternative), &ranks)
            .over_view(ViewName::Merged(Table::Alternative), &alternatives))
    }

    fn wide_parameter_value_list_sq(&mut self) -> Result<Subquery> {
        let lists = self.view(ViewName::Merged(Table::ParameterValueList))?;
        let sql = format!(
            "select id, name, max(commit_id) as commit_id, \
             group_concat(value_index, ',' order by value_index) as value_index_list, \
             group_concat(hex(value), ',' order by value_index) as value_list \
             from {} group by id",
            lists.nested()
        );
        Ok(Subquery::compose(sql).over_view(ViewName::Merged(Table::ParameterValueList), &lists))
    }

    /// Every parameter definition with its tags, tagged or not.
    fn wide_parameter_definition_tag_sq(&mut self) -> Result<Subquery> {
        let definitions = self.view(ViewName::ParameterDefinition)?;
        let links = self.view(ViewName::Merged(Table::ParameterDefinitionTag))?;
        let tags = self.view(ViewName::Merged(Table::ParameterTag))?;
        let sql = format!(
            "select pd.id as id, \
             group_concat(pt.id, ',' order by pt.id) as parameter_tag_id_list, \
             group_concat(pt.tag, ',' order by pt.id) as parameter_tag_list \
             from {} as pd \
             left join {} as pdt on pdt.parameter_definition_id = pd.id \
             left join {} as pt on pt.id = pdt.parameter_tag_id \
             group by pd.id",
            definitions.nested(),
            links.nested(),
            tags.nested(),
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::ParameterDefinition, &definitions)
            .over_view(ViewName::Merged(Table::ParameterDefinitionTag), &links)
            .over_view(ViewName::Merged(Table::ParameterTag), &tags))
    }

    /// Definitions joined with their class, value list and tags. `class_columns`
    /// selects from the class view aliased `c`.
    fn parameter_definition_of(&mut self, classes: ViewName, class_columns: &str) -> Result<Subquery> {
        let definitions = self.view(ViewName::ParameterDefinition)?;
        let class_view = self.view(classes)?;
        let tags = self.view(ViewName::WideParameterDefinitionTag)?;
        let lists = self.view(ViewName::WideParameterValueList)?;
        let sql = format!(
            "select pd.id as id, pd.entity_class_id as entity_class_id, {class_columns}, \
             pd.name as parameter_name, pd.parameter_value_list_id as value_list_id, \
             vl.name as value_list_name, t.parameter_tag_id_list as parameter_tag_id_list, \
             t.parameter_tag_list as parameter_tag_list, pd.default_value as default_value, \
             pd.default_type as default_type, pd.description as description, pd.commit_id as commit_id \
             from {definitions} as pd \
             join {classes} as c on c.id = pd.entity_class_id \
             join {tags} as t on t.id = pd.id \
             left join {lists} as vl on vl.id = pd.parameter_value_list_id",
            definitions = definitions.nested(),
            classes = class_view.nested(),
            tags = tags.nested(),
            lists = lists.nested(),
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::ParameterDefinition, &definitions)
            .over_view(classes, &class_view)
            .over_view(ViewName::WideParameterDefinitionTag, &tags)
            .over_view(ViewName::WideParameterValueList, &lists))
    }

    fn object_parameter_definition_sq(&mut self) -> Result<Subquery> {
        self.parameter_definition_of(ViewName::ObjectClass, "c.name as object_class_name")
    }

    fn relationship_parameter_definition_sq(&mut self) -> Result<Subquery> {
        self.parameter_definition_of(
            ViewName::RelationshipClass,
            "c.name as relationship_class_name, c.object_class_id_list as object_class_id_list, \
             c.object_class_name_list as object_class_name_list",
        )
    }

    /// Values joined with the names of their class, entity, definition and
    /// alternative. `class_columns` and `entity_columns` select from the
    /// class view aliased `c` and the entity view aliased `e`.
    fn parameter_value_of(
        &mut self,
        classes: ViewName,
        entities: ViewName,
        class_columns: &str,
        entity_columns: &str,
    ) -> Result<Subquery> {
        let values = self.view(ViewName::ParameterValue)?;
        let definitions = self.view(ViewName::ParameterDefinition)?;
        let class_view = self.view(classes)?;
        let entity_view = self.view(entities)?;
        let alternatives = self.view(ViewName::Merged(Table::Alternative))?;
        let sql = format!(
            "select pv.id as id, pv.entity_class_id as entity_class_id, {class_columns}, \
             pv.entity_id as entity_id, {entity_columns}, \
             pd.id as parameter_id, pd.name as parameter_name, \
             pv.alternative_id as alternative_id, a.name as alternative_name, \
             pv.value as value, pv.type as type, pv.commit_id as commit_id \
             from {values} as pv \
             join {definitions} as pd on pd.id = pv.parameter_definition_id \
             join {classes} as c on c.id = pv.entity_class_id \
             join {entities} as e on e.id = pv.entity_id \
             join {alternatives} as a on a.id = pv.alternative_id",
            values = values.nested(),
            definitions = definitions.nested(),
            classes = class_view.nested(),
            entities = entity_view.nested(),
            alternatives = alternatives.nested(),
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::ParameterValue, &values)
            .over_view(ViewName::ParameterDefinition, &definitions)
            .over_view(classes, &class_view)
            .over_view(entities, &entity_view)
            .over_view(ViewName::Merged(Table::Alternative), &alternatives))
    }

    fn object_parameter_value_sq(&mut self) -> Result<Subquery> {
        self.parameter_value_of(
            ViewName::ObjectClass,
            ViewName::Object,
            "c.name as object_class_name",
            "e.name as object_name",
        )
    }

    fn relationship_parameter_value_sq(&mut self) -> Result<Subquery> {
        self.parameter_value_of(
            ViewName::RelationshipClass,
            ViewName::Relationship,
            "c.name as relationship_class_name, c.object_class_id_list as object_class_id_list, \
             c.object_class_name_list as object_class_name_list",
            "e.object_id_list as object_id_list, e.object_name_list as object_name_list",
        )
    }

    fn object_group_sq(&mut self) -> Result<Subquery> {
        let groups = self.view(ViewName::Merged(Table::EntityGroup))?;
        let classes = self.view(ViewName::ObjectClass)?;
        let objects = self.view(ViewName::Object)?;
        let sql = format!(
            "select g.id as id, g.entity_class_id as class_id, g.entity_id as group_id, \
             g.member_id as member_id, c.name as class_name, grp.name as group_name, \
             mem.name as member_name, g.commit_id as commit_id \
             from {groups} as g \
             join {classes} as c on c.id = g.entity_class_id \
             join {objects} as grp on grp.id = g.entity_id \
             join {objects} as mem on mem.id = g.member_id",
            groups = groups.nested(),
            classes = classes.nested(),
            objects = objects.nested(),
        );
        Ok(Subquery::compose(sql)
            .over_view(ViewName::Merged(Table::EntityGroup), &groups)
            .over_view(ViewName::ObjectClass, &classes)
            .over_view(ViewName::Object, &objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(views: &mut Views<'_>, name: ViewName) -> Subquery {
        views.view(name).expect("view builds")
    }

    #[test]
    fn composed_views_record_their_tables() {
        let staging = StagingSession::default();
        let mut cache = ViewCache::default();
        let mut views = Views::new(&MergedProvider, &mut cache, &staging);
        let relationships = built(&mut views, ViewName::Relationship);
        assert!(relationships.reads(Table::Entity));
        assert!(relationships.reads(Table::RelationshipEntity));
        assert!(!relationships.reads(Table::ParameterValue));
        assert!(relationships.views().contains(&ViewName::Entity));
    }

    #[test]
    fn table_writes_only_drop_dependent_views() {
        let staging = StagingSession::default();
        let mut cache = ViewCache::default();
        Views::new(&MergedProvider, &mut cache, &staging)
            .prime()
            .expect("all views build");
        let total = cache.len();
        let dropped = cache.invalidate_tables(&BTreeSet::from([Table::Alternative]));
        assert_eq!(dropped, 4, "merged alternative, wide scenario and both named value views");
        assert_eq!(cache.len(), total - 4);
        assert!(!cache.is_cached(ViewName::WideScenario));
        assert!(cache.is_cached(ViewName::Object));
    }

    #[test]
    fn replacing_a_view_drops_what_is_built_on_it() {
        let staging = StagingSession::default();
        let mut cache = ViewCache::default();
        Views::new(&MergedProvider, &mut cache, &staging)
            .prime()
            .expect("all views build");
        cache.invalidate_view(ViewName::Entity);
        assert!(!cache.is_cached(ViewName::Entity));
        assert!(!cache.is_cached(ViewName::Object));
        assert!(!cache.is_cached(ViewName::Relationship));
        assert!(cache.is_cached(ViewName::ObjectClass));
        assert!(cache.is_cached(ViewName::Merged(Table::Entity)));
    }

    #[test]
    fn merged_views_exclude_superseded_rows() {
        let mut staging = StagingSession::default();
        staging.begin(7);
        staging.mark_removed(Table::Alternative, &[3, 5]);
        let subquery = merged_sq(Table::Alternative, &staging);
        assert!(subquery.sql().contains("not in (3, 5)"));
        let untouched = merged_sq(Table::Scenario, &staging);
        assert!(!untouched.sql().contains("not in"));
    }
}
