//! Filters replace one of the replaceable views by wrapping the provider
//! installed before them. The mapping keeps the resolved [`FilterState`]s in
//! installation order and folds them over the merged provider; every filter
//! composes with whatever is below it, staged rows included.
use std::fmt;

use bimap::BiHashMap;

use crate::error::{IntegrityError, Result, SpineError};
use crate::model::{Alternative, Id, Identified, Scenario, ScenarioAlternative, Tool};
use crate::schema::Table;
use crate::snapshot::Snapshot;
use crate::view::{Subquery, ViewName, ViewProvider, Views, qualified_columns};

/// Refers to an item by name or by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameOrId {
    Name(String),
    Id(Id),
}

impl From<&str> for NameOrId {
    fn from(name: &str) -> Self {
        NameOrId::Name(name.to_string())
    }
}
impl From<String> for NameOrId {
    fn from(name: String) -> Self {
        NameOrId::Name(name)
    }
}
impl From<Id> for NameOrId {
    fn from(id: Id) -> Self {
        NameOrId::Id(id)
    }
}

impl fmt::Display for NameOrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrId::Name(name) => write!(f, "'{name}'"),
            NameOrId::Id(id) => write!(f, "id {id}"),
        }
    }
}

/// Names and ids of one kind, resolvable both ways.
pub struct Directory {
    entries: BiHashMap<String, Id>,
}

impl Directory {
    pub fn new<R: Identified>(records: &[R], name: impl Fn(&R) -> &str) -> Self {
        let mut entries = BiHashMap::new();
        for record in records {
            entries.insert(name(record).to_string(), record.id());
        }
        Self { entries }
    }
    pub fn resolve(&self, key: &NameOrId) -> Option<Id> {
        match key {
            NameOrId::Name(name) => self.entries.get_by_left(name).copied(),
            NameOrId::Id(id) => self.entries.contains_right(id).then_some(*id),
        }
    }
    pub fn name(&self, id: Id) -> Option<&str> {
        self.entries.get_by_right(&id).map(String::as_str)
    }
}

/// An installed filter with its names already resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterState {
    Scenario(Id),
    Alternatives(Vec<Id>),
    Tool(Id),
}

impl FilterState {
    /// Whether the two states are of the same kind, so one replaces the other.
    pub fn same_kind(&self, other: &FilterState) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
    /// The views this filter replaces.
    pub fn overrides(&self) -> &'static [ViewName] {
        match self {
            FilterState::Scenario(_) | FilterState::Alternatives(_) => &[ViewName::ParameterValue],
            FilterState::Tool(_) => &[ViewName::Entity],
        }
    }
    pub fn wrap(&self, inner: Box<dyn ViewProvider>) -> Box<dyn ViewProvider> {
        match self {
            FilterState::Scenario(scenario_id) => Box::new(ScenarioFilter {
                inner,
                scenario_id: *scenario_id,
            }),
            FilterState::Alternatives(alternative_ids) => Box::new(AlternativeFilter {
                inner,
                alternative_ids: alternative_ids.clone(),
            }),
            FilterState::Tool(tool_id) => Box::new(ToolFilter {
                inner,
                tool_id: *tool_id,
            }),
        }
    }
}

// ------------- Resolution -------------
pub fn resolve_scenario(snapshot: &mut Snapshot<'_>, key: &NameOrId) -> Result<FilterState> {
    let scenarios = snapshot.records::<Scenario>()?;
    let directory = Directory::new(&scenarios, |s| &s.name);
    let scenario_id = directory.resolve(key).ok_or_else(|| match key {
        NameOrId::Name(name) => SpineError::NotFound(format!("Scenario '{name}' not found")),
        NameOrId::Id(id) => SpineError::NotFound(format!("Scenario id {id} not found")),
    })?;
    let mut ranks: Vec<i64> = snapshot
        .records::<ScenarioAlternative>()?
        .into_iter()
        .filter(|sa| sa.scenario_id == scenario_id)
        .map(|sa| sa.rank)
        .collect();
    ranks.sort_unstable();
    if let Some(pair) = ranks.windows(2).find(|pair| pair[0] == pair[1]) {
        let name = directory.name(scenario_id).unwrap_or_default();
        return Err(IntegrityError::new(format!(
            "Scenario '{name}' ranks more than one alternative at {}.",
            pair[0]
        ))
        .on(&["rank"])
        .conflicting(Some(scenario_id))
        .into());
    }
    Ok(FilterState::Scenario(scenario_id))
}

/// Resolves every key, reporting all the unresolved ones together.
pub fn resolve_alternatives(snapshot: &mut Snapshot<'_>, keys: &[NameOrId]) -> Result<FilterState> {
    let alternatives = snapshot.records::<Alternative>()?;
    let directory = Directory::new(&alternatives, |a| &a.name);
    let mut ids = Vec::new();
    let mut missing_names = Vec::new();
    let mut missing_ids = Vec::new();
    for key in keys {
        match (directory.resolve(key), key) {
            (Some(id), _) => ids.push(id),
            (None, NameOrId::Name(name)) => missing_names.push(name.clone()),
            (None, NameOrId::Id(id)) => missing_ids.push(id.to_string()),
        }
    }
    let mut problems = Vec::new();
    if !missing_names.is_empty() {
        problems.push(format!("Alternative(s) {} not found", missing_names.join(", ")));
    }
    if !missing_ids.is_empty() {
        problems.push(format!("Alternative id(s) {} not found", missing_ids.join(", ")));
    }
    if !problems.is_empty() {
        return Err(SpineError::NotFound(problems.join("; ")));
    }
    Ok(FilterState::Alternatives(ids))
}

pub fn resolve_tool(snapshot: &mut Snapshot<'_>, key: &NameOrId) -> Result<FilterState> {
    let tools = snapshot.records::<Tool>()?;
    Directory::new(&tools, |t| &t.name)
        .resolve(key)
        .map(FilterState::Tool)
        .ok_or_else(|| match key {
            NameOrId::Name(name) => SpineError::NotFound(format!("Tool '{name}' not found.")),
            NameOrId::Id(id) => SpineError::NotFound(format!("Tool id {id} not found.")),
        })
}

// ------------- Providers -------------
macro_rules! delegate {
    ($($method:ident),* $(,)?) => {
        $(fn $method(&self, views: &mut Views<'_>) -> Result<Subquery> {
            self.inner.$method(views)
        })*
    };
}

/// Keeps, per entity and parameter, the value of the highest ranked
/// alternative in the scenario.
pub struct ScenarioFilter {
    inner: Box<dyn ViewProvider>,
    scenario_id: Id,
}

impl ViewProvider for ScenarioFilter {
    delegate!(entity_class_sq, entity_sq, parameter_definition_sq);

    fn parameter_value_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        let values = self.inner.parameter_value_sq(views)?;
        let ranks = views.view(ViewName::Merged(Table::ScenarioAlternative))?;
        let sql = format!(
            "select {columns} from (\
             select {pv_columns}, row_number() over (\
             partition by pv.parameter_definition_id, pv.entity_id order by sa.rank desc) as winner \
             from {values} as pv \
             join {ranks} as sa on sa.alternative_id = pv.alternative_id \
             where sa.scenario_id = {scenario_id}) \
             where winner = 1",
            columns = Table::ParameterValue.column_list(),
            pv_columns = qualified_columns(Table::ParameterValue, "pv"),
            values = values.nested(),
            ranks = ranks.nested(),
            scenario_id = self.scenario_id,
        );
        Ok(Subquery::compose(sql)
            .over(&values)
            .over_view(ViewName::Merged(Table::ScenarioAlternative), &ranks))
    }
}

/// Keeps the values of the listed alternatives, all of them.
pub struct AlternativeFilter {
    inner: Box<dyn ViewProvider>,
    alternative_ids: Vec<Id>,
}

impl ViewProvider for AlternativeFilter {
    delegate!(entity_class_sq, entity_sq, parameter_definition_sq);

    fn parameter_value_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        let values = self.inner.parameter_value_sq(views)?;
        let condition = if self.alternative_ids.is_empty() {
            "0".to_string()
        } else {
            let ids: Vec<String> = self.alternative_ids.iter().map(Id::to_string).collect();
            format!("alternative_id in ({})", ids.join(", "))
        };
        let sql = format!(
            "select {} from {} where {condition}",
            Table::ParameterValue.column_list(),
            values.nested()
        );
        Ok(Subquery::compose(sql).over(&values))
    }
}

/// Keeps the entities the tool can work with: their class has at least one
/// of the tool's features and none of those features fails. A feature fails
/// when it is required and the entity has no value for it, or when it has
/// methods and the entity's value is not one of them.
pub struct ToolFilter {
    inner: Box<dyn ViewProvider>,
    tool_id: Id,
}

impl ViewProvider for ToolFilter {
    delegate!(entity_class_sq, parameter_definition_sq, parameter_value_sq);

    fn entity_sq(&self, views: &mut Views<'_>) -> Result<Subquery> {
        let entities = self.inner.entity_sq(views)?;
        let tool_features = views.view(ViewName::Merged(Table::ToolFeature))?;
        let features = views.view(ViewName::Merged(Table::Feature))?;
        let definitions = views.view(ViewName::Merged(Table::ParameterDefinition))?;
        let methods = views.view(ViewName::Merged(Table::ToolFeatureMethod))?;
        let lists = views.view(ViewName::Merged(Table::ParameterValueList))?;
        let values = views.view(ViewName::Merged(Table::ParameterValue))?;

        let tool_features_sql = format!(
            "(select tf.id as tool_feature_id, tf.required as required, \
             f.parameter_definition_id as parameter_definition_id, pd.entity_class_id as entity_class_id \
             from {} as tf \
             join {} as f on f.id = tf.feature_id \
             join {} as pd on pd.id = f.parameter_definition_id \
             where tf.tool_id = {})",
            tool_features.nested(),
            features.nested(),
            definitions.nested(),
            self.tool_id
        );
        let methods_sql = format!(
            "(select m.tool_feature_id as tool_feature_id, l.value as method \
             from {} as m \
             join {} as l on l.id = m.parameter_value_list_id and l.value_index = m.method_index)",
            methods.nested(),
            lists.nested()
        );
        let values_sql = values.nested();
        let sql = format!(
            "select {columns} from {entities} as e \
             where exists (select 1 from {tool_features} as tf where tf.entity_class_id = e.class_id) \
             and not exists (\
             select 1 from {tool_features} as tf where tf.entity_class_id = e.class_id and (\
             (tf.required and not exists (\
             select 1 from {values} as pv \
             where pv.entity_id = e.id and pv.parameter_definition_id = tf.parameter_definition_id)) \
             or (exists (select 1 from {methods} as m where m.tool_feature_id = tf.tool_feature_id) \
             and exists (\
             select 1 from {values} as pv \
             where pv.entity_id = e.id and pv.parameter_definition_id = tf.parameter_definition_id \
             and pv.value not in (\
             select m.method from {methods} as m where m.tool_feature_id = tf.tool_feature_id)))))",
            columns = qualified_columns(Table::Entity, "e"),
            entities = entities.nested(),
            tool_features = tool_features_sql,
            values = values_sql,
            methods = methods_sql,
        );
        Ok(Subquery::compose(sql)
            .over(&entities)
            .over_view(ViewName::Merged(Table::ToolFeature), &tool_features)
            .over_view(ViewName::Merged(Table::Feature), &features)
            .over_view(ViewName::Merged(Table::ParameterDefinition), &definitions)
            .over_view(ViewName::Merged(Table::ToolFeatureMethod), &methods)
            .over_view(ViewName::Merged(Table::ParameterValueList), &lists)
            .over_view(ViewName::Merged(Table::ParameterValue), &values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::StagingSession;
    use crate::view::{MergedProvider, ViewCache};

    fn chain(states: &[FilterState]) -> Box<dyn ViewProvider> {
        states
            .iter()
            .fold(Box::new(MergedProvider) as Box<dyn ViewProvider>, |inner, state| {
                state.wrap(inner)
            })
    }

    #[test]
    fn stacked_filters_read_what_they_wrap() {
        let provider = chain(&[FilterState::Tool(4), FilterState::Scenario(2)]);
        let staging = StagingSession::default();
        let mut cache = ViewCache::default();
        let mut views = Views::new(provider.as_ref(), &mut cache, &staging);
        let values = views.view(ViewName::ParameterValue).expect("values build");
        assert!(values.sql().contains("sa.scenario_id = 2"));
        assert!(values.reads(Table::ScenarioAlternative));
        let entities = views.view(ViewName::Entity).expect("entities build");
        assert!(entities.sql().contains("tf.tool_id = 4"));
        assert!(entities.reads(Table::ToolFeatureMethod));
        let objects = views.view(ViewName::Object).expect("objects build");
        assert!(objects.reads(Table::ToolFeature), "objects are built on the filtered entities");
    }

    #[test]
    fn an_empty_alternative_list_hides_every_value() {
        let provider = chain(&[FilterState::Alternatives(Vec::new())]);
        let staging = StagingSession::default();
        let mut cache = ViewCache::default();
        let values = Views::new(provider.as_ref(), &mut cache, &staging)
            .view(ViewName::ParameterValue)
            .expect("values build");
        assert!(values.sql().ends_with("where 0"));
    }

    #[test]
    fn directories_resolve_both_ways() {
        let tools = vec![Tool {
            id: 3,
            name: "solver".into(),
            description: None,
            commit_id: None,
        }];
        let directory = Directory::new(&tools, |t| &t.name);
        assert_eq!(directory.resolve(&"solver".into()), Some(3));
        assert_eq!(directory.resolve(&NameOrId::Id(3)), Some(3));
        assert_eq!(directory.resolve(&NameOrId::Id(4)), None);
        assert_eq!(directory.name(3), Some("solver"));
    }

    #[test]
    fn filters_of_a_kind_replace_each_other() {
        assert!(FilterState::Scenario(1).same_kind(&FilterState::Scenario(2)));
        assert!(!FilterState::Scenario(1).same_kind(&FilterState::Alternatives(vec![1])));
    }
}
