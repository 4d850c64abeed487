//! Item kinds: how each candidate type is looked up, read back and laid out
//! as rows, plus the cascade followed when items are removed.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use rusqlite::types::Value;

use crate::check::*;
use crate::error::{IntegrityError, Result, SpineError};
use crate::model::*;
use crate::schema::{BASE_ALTERNATIVE, Table};
use crate::snapshot::Snapshot;
use crate::staging::StagedRow;
use crate::value::ValueCodec;

pub const DEFAULT_DISPLAY_ORDER: i64 = 99;

/// A candidate type the mapping can add, update and read back.
pub trait Kind: Candidate + Merge + Clone {
    type Record: Record + Identified;
    const LABEL: &'static str;
    /// The table holding the kind's ids.
    const TABLE: Table;

    fn id(&self) -> Option<Id>;
    fn set_id(&mut self, id: Id);
    fn lookups(snapshot: &mut Snapshot<'_>, codec: &Arc<dyn ValueCodec>) -> Result<Self::Lookups>;
    fn from_record(record: &Self::Record) -> Self;
    /// Current items by id, as update targets.
    fn existing(snapshot: &mut Snapshot<'_>) -> Result<HashMap<Id, Self, LookupHasher>> {
        Ok(snapshot
            .records::<Self::Record>()?
            .iter()
            .map(|record| (record.id(), Self::from_record(record)))
            .collect())
    }
    /// Rows for every table the item is stored in.
    fn rows(&self, id: Id, commit_id: Id, lookups: &Self::Lookups) -> Vec<StagedRow>;
}

macro_rules! identity {
    () => {
        fn id(&self) -> Option<Id> {
            self.id
        }
        fn set_id(&mut self, id: Id) {
            self.id = Some(id);
        }
    };
}

// ------------- Lookup helpers -------------
fn by_key<R: Identified, K: Hash + Eq>(records: &[R], key: impl Fn(&R) -> K) -> Lookup<K, Option<Id>> {
    records.iter().map(|r| (key(r), Some(r.id()))).collect()
}

fn names<R: Identified>(records: &[R], name: impl Fn(&R) -> &str) -> Lookup<Id, String> {
    records.iter().map(|r| (r.id(), name(r).to_string())).collect()
}

fn entity_refs(records: &[Entity]) -> Lookup<Id, EntityRef> {
    records
        .iter()
        .map(|e| {
            (
                e.id,
                EntityRef {
                    class_id: e.class_id,
                    name: e.name.clone(),
                },
            )
        })
        .collect()
}

fn definition_refs(snapshot: &mut Snapshot<'_>) -> Result<Lookup<Id, DefinitionRef>> {
    Ok(snapshot
        .records::<ParameterDefinition>()?
        .into_iter()
        .map(|d| {
            (
                d.id,
                DefinitionRef {
                    name: d.name,
                    entity_class_id: d.entity_class_id,
                    parameter_value_list_id: d.parameter_value_list_id,
                },
            )
        })
        .collect())
}

fn value_list_entries(snapshot: &mut Snapshot<'_>) -> Result<BTreeMap<Id, Vec<ParameterValueListEntry>>> {
    let mut lists: BTreeMap<Id, Vec<ParameterValueListEntry>> = BTreeMap::new();
    for entry in snapshot.records::<ParameterValueListEntry>()? {
        lists.entry(entry.id).or_default().push(entry);
    }
    Ok(lists)
}

fn trimmed(name: &Option<String>) -> Value {
    name.as_deref().map(|n| n.trim().to_string()).into()
}

fn row(table: Table, id: Id, values: Vec<Value>) -> StagedRow {
    StagedRow::new(table, id, values)
}

// ------------- Alternatives and scenarios -------------
impl Kind for AlternativeItem {
    type Record = Alternative;
    const LABEL: &'static str = "Alternative";
    const TABLE: Table = Table::Alternative;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let alternatives = snapshot.records::<Alternative>()?;
        Ok(AlternativeLookups {
            ids_by_name: by_key(&alternatives, |a| a.name.clone()),
        })
    }
    fn from_record(record: &Alternative) -> Self {
        Self {
            id: Some(record.id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::Alternative,
            id,
            vec![id.into(), trimmed(&self.name), self.description.clone().into(), commit_id.into()],
        )]
    }
}

impl Kind for ScenarioItem {
    type Record = Scenario;
    const LABEL: &'static str = "Scenario";
    const TABLE: Table = Table::Scenario;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let scenarios = snapshot.records::<Scenario>()?;
        Ok(ScenarioLookups {
            ids_by_name: by_key(&scenarios, |s| s.name.clone()),
        })
    }
    fn from_record(record: &Scenario) -> Self {
        Self {
            id: Some(record.id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
            active: Some(record.active),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::Scenario,
            id,
            vec![
                id.into(),
                trimmed(&self.name),
                self.description.clone().into(),
                self.active.unwrap_or(false).into(),
                commit_id.into(),
            ],
        )]
    }
}

impl Kind for ScenarioAlternativeItem {
    type Record = ScenarioAlternative;
    const LABEL: &'static str = "Scenario alternative";
    const TABLE: Table = Table::ScenarioAlternative;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let scenarios = snapshot.records::<Scenario>()?;
        let alternatives = snapshot.records::<Alternative>()?;
        let ranks = snapshot.records::<ScenarioAlternative>()?;
        Ok(ScenarioAlternativeLookups {
            scenario_names: names(&scenarios, |s| &s.name),
            alternative_names: names(&alternatives, |a| &a.name),
            ids_by_scenario_and_alternative: by_key(&ranks, |sa| (sa.scenario_id, sa.alternative_id)),
            ids_by_scenario_and_rank: by_key(&ranks, |sa| (sa.scenario_id, sa.rank)),
        })
    }
    fn from_record(record: &ScenarioAlternative) -> Self {
        Self {
            id: Some(record.id),
            scenario_id: Some(record.scenario_id),
            alternative_id: Some(record.alternative_id),
            rank: Some(record.rank),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::ScenarioAlternative,
            id,
            vec![
                id.into(),
                self.scenario_id.into(),
                self.alternative_id.into(),
                self.rank.into(),
                commit_id.into(),
            ],
        )]
    }
}

// ------------- Entity classes -------------
fn class_row(
    id: Id,
    class_type: EntityClassType,
    name: &Option<String>,
    description: &Option<String>,
    display_order: Option<i64>,
    hidden: Option<bool>,
    commit_id: Id,
) -> StagedRow {
    row(
        Table::EntityClass,
        id,
        vec![
            id.into(),
            (class_type as i64).into(),
            trimmed(name),
            description.clone().into(),
            display_order.unwrap_or(DEFAULT_DISPLAY_ORDER).into(),
            hidden.unwrap_or(false).into(),
            commit_id.into(),
        ],
    )
}

fn entity_class_ids_by_name(snapshot: &mut Snapshot<'_>) -> Result<Lookup<String, Option<Id>>> {
    let classes = snapshot.records::<EntityClass>()?;
    Ok(by_key(&classes, |c| c.name.clone()))
}

impl Kind for ObjectClassItem {
    type Record = ObjectClass;
    const LABEL: &'static str = "Object class";
    const TABLE: Table = Table::EntityClass;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        Ok(ObjectClassLookups {
            entity_class_ids_by_name: entity_class_ids_by_name(snapshot)?,
        })
    }
    fn from_record(record: &ObjectClass) -> Self {
        Self {
            id: Some(record.id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
            display_order: Some(record.display_order),
            hidden: Some(record.hidden),
            type_id: Some(EntityClassType::ObjectClass),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![class_row(
            id,
            EntityClassType::ObjectClass,
            &self.name,
            &self.description,
            self.display_order,
            self.hidden,
            commit_id,
        )]
    }
}

impl Kind for RelationshipClassItem {
    type Record = RelationshipClass;
    const LABEL: &'static str = "Relationship class";
    const TABLE: Table = Table::EntityClass;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let object_classes = snapshot.records::<ObjectClass>()?;
        Ok(RelationshipClassLookups {
            entity_class_ids_by_name: entity_class_ids_by_name(snapshot)?,
            object_class_names: names(&object_classes, |c| &c.name),
        })
    }
    fn from_record(record: &RelationshipClass) -> Self {
        Self {
            id: Some(record.id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
            display_order: Some(record.display_order),
            hidden: Some(record.hidden),
            object_class_id_list: Some(record.object_class_id_list.clone()),
            type_id: Some(EntityClassType::RelationshipClass),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        let mut rows = vec![class_row(
            id,
            EntityClassType::RelationshipClass,
            &self.name,
            &self.description,
            self.display_order,
            self.hidden,
            commit_id,
        )];
        for (dimension, member_class_id) in self.object_class_id_list.iter().flatten().enumerate() {
            rows.push(row(
                Table::RelationshipEntityClass,
                id,
                vec![id.into(), (dimension as i64).into(), (*member_class_id).into()],
            ));
        }
        rows
    }
}

// ------------- Entities -------------
fn entity_row(
    id: Id,
    entity_type: EntityType,
    class_id: Option<Id>,
    name: &Option<String>,
    description: &Option<String>,
    commit_id: Id,
) -> StagedRow {
    row(
        Table::Entity,
        id,
        vec![
            id.into(),
            (entity_type as i64).into(),
            class_id.into(),
            trimmed(name),
            description.clone().into(),
            commit_id.into(),
        ],
    )
}

impl Kind for ObjectItem {
    type Record = Object;
    const LABEL: &'static str = "Object";
    const TABLE: Table = Table::Entity;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let object_classes = snapshot.records::<ObjectClass>()?;
        let entities = snapshot.records::<Entity>()?;
        Ok(ObjectLookups {
            object_class_names: names(&object_classes, |c| &c.name),
            entity_ids_by_class_and_name: by_key(&entities, |e| (e.class_id, e.name.clone())),
        })
    }
    fn from_record(record: &Object) -> Self {
        Self {
            id: Some(record.id),
            class_id: Some(record.class_id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
            type_id: Some(EntityType::Object),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![entity_row(
            id,
            EntityType::Object,
            self.class_id,
            &self.name,
            &self.description,
            commit_id,
        )]
    }
}

impl Kind for RelationshipItem {
    type Record = Relationship;
    const LABEL: &'static str = "Relationship";
    const TABLE: Table = Table::Entity;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let classes = snapshot.records::<RelationshipClass>()?;
        let objects = snapshot.records::<Object>()?;
        let entities = snapshot.records::<Entity>()?;
        let relationships = snapshot.records::<Relationship>()?;
        Ok(RelationshipLookups {
            relationship_classes: classes
                .into_iter()
                .map(|c| {
                    (
                        c.id,
                        RelationshipClassRef {
                            name: c.name,
                            object_class_id_list: c.object_class_id_list,
                        },
                    )
                })
                .collect(),
            objects: objects
                .into_iter()
                .map(|o| {
                    (
                        o.id,
                        EntityRef {
                            class_id: o.class_id,
                            name: o.name,
                        },
                    )
                })
                .collect(),
            entity_ids_by_class_and_name: by_key(&entities, |e| (e.class_id, e.name.clone())),
            ids_by_class_and_members: by_key(&relationships, |r| (r.class_id, r.object_id_list.clone())),
        })
    }
    fn from_record(record: &Relationship) -> Self {
        Self {
            id: Some(record.id),
            class_id: Some(record.class_id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
            object_id_list: Some(record.object_id_list.clone()),
            type_id: Some(EntityType::Relationship),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, lookups: &Self::Lookups) -> Vec<StagedRow> {
        let mut rows = vec![entity_row(
            id,
            EntityType::Relationship,
            self.class_id,
            &self.name,
            &self.description,
            commit_id,
        )];
        for (dimension, member_id) in self.object_id_list.iter().flatten().enumerate() {
            let member_class_id = lookups.objects.get(member_id).map(|o| o.class_id);
            rows.push(row(
                Table::RelationshipEntity,
                id,
                vec![
                    id.into(),
                    self.class_id.into(),
                    (dimension as i64).into(),
                    (*member_id).into(),
                    member_class_id.into(),
                ],
            ));
        }
        rows
    }
}

impl Kind for EntityGroupItem {
    type Record = EntityGroup;
    const LABEL: &'static str = "Entity group";
    const TABLE: Table = Table::EntityGroup;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let classes = snapshot.records::<EntityClass>()?;
        let entities = snapshot.records::<Entity>()?;
        let groups = snapshot.records::<EntityGroup>()?;
        Ok(EntityGroupLookups {
            entity_class_names: names(&classes, |c| &c.name),
            entities: entity_refs(&entities),
            ids_by_entity_and_member: by_key(&groups, |g| (g.entity_id, g.member_id)),
        })
    }
    fn from_record(record: &EntityGroup) -> Self {
        Self {
            id: Some(record.id),
            entity_class_id: Some(record.entity_class_id),
            entity_id: Some(record.entity_id),
            member_id: Some(record.member_id),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::EntityGroup,
            id,
            vec![
                id.into(),
                self.entity_class_id.into(),
                self.entity_id.into(),
                self.member_id.into(),
                commit_id.into(),
            ],
        )]
    }
}

// ------------- Parameters -------------
impl Kind for ParameterDefinitionItem {
    type Record = ParameterDefinition;
    const LABEL: &'static str = "Parameter definition";
    const TABLE: Table = Table::ParameterDefinition;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, codec: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let classes = snapshot.records::<EntityClass>()?;
        let definitions = snapshot.records::<ParameterDefinition>()?;
        let value_list_names = value_list_entries(snapshot)?
            .into_iter()
            .filter_map(|(id, entries)| entries.into_iter().next().map(|e| (id, e.name)))
            .collect();
        Ok(ParameterDefinitionLookups {
            codec: Arc::clone(codec),
            entity_class_names: names(&classes, |c| &c.name),
            value_list_names,
            ids_by_class_and_name: by_key(&definitions, |d| (d.entity_class_id, d.name.clone())),
        })
    }
    fn from_record(record: &ParameterDefinition) -> Self {
        Self {
            id: Some(record.id),
            entity_class_id: Some(record.entity_class_id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
            default_value: record.default_value.clone(),
            parameter_value_list_id: record.parameter_value_list_id,
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        let default = self.default_value.clone();
        vec![row(
            Table::ParameterDefinition,
            id,
            vec![
                id.into(),
                self.entity_class_id.into(),
                trimmed(&self.name),
                self.description.clone().into(),
                default.as_ref().map(|v| v.bytes.clone()).into(),
                default.and_then(|v| v.type_tag).into(),
                self.parameter_value_list_id.into(),
                commit_id.into(),
            ],
        )]
    }
}

impl Kind for ParameterValueItem {
    type Record = ParameterValue;
    const LABEL: &'static str = "Parameter value";
    const TABLE: Table = Table::ParameterValue;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, codec: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let alternatives = snapshot.records::<Alternative>()?;
        let entities = snapshot.records::<Entity>()?;
        let values = snapshot.records::<ParameterValue>()?;
        let value_lists = value_list_entries(snapshot)?
            .into_iter()
            .map(|(id, entries)| (id, entries.into_iter().map(|e| e.value).collect()))
            .collect();
        Ok(ParameterValueLookups {
            codec: Arc::clone(codec),
            base_alternative_id: alternatives
                .iter()
                .find(|a| a.name == BASE_ALTERNATIVE)
                .map(|a| a.id),
            definitions: definition_refs(snapshot)?,
            entities: entity_refs(&entities),
            alternative_names: names(&alternatives, |a| &a.name),
            value_lists,
            ids_by_entity_definition_and_alternative: by_key(&values, |v| {
                (v.entity_id, v.parameter_definition_id, v.alternative_id)
            }),
        })
    }
    fn from_record(record: &ParameterValue) -> Self {
        Self {
            id: Some(record.id),
            parameter_definition_id: Some(record.parameter_definition_id),
            entity_id: Some(record.entity_id),
            alternative_id: Some(record.alternative_id),
            value: Some(record.value.clone()),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, lookups: &Self::Lookups) -> Vec<StagedRow> {
        let entity_class_id = self
            .entity_id
            .and_then(|e| lookups.entities.get(&e))
            .map(|e| e.class_id);
        let value = self.value.clone();
        vec![row(
            Table::ParameterValue,
            id,
            vec![
                id.into(),
                self.parameter_definition_id.into(),
                entity_class_id.into(),
                self.entity_id.into(),
                self.alternative_id.into(),
                value.as_ref().map(|v| v.bytes.clone()).into(),
                value.and_then(|v| v.type_tag).into(),
                commit_id.into(),
            ],
        )]
    }
}

impl Kind for ParameterValueListItem {
    type Record = ParameterValueList;
    const LABEL: &'static str = "Parameter value list";
    const TABLE: Table = Table::ParameterValueList;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, codec: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let entries = snapshot.records::<ParameterValueListEntry>()?;
        let mut ids_by_name = Lookup::default();
        for entry in entries {
            ids_by_name.insert(entry.name, Some(entry.id));
        }
        Ok(ParameterValueListLookups {
            codec: Arc::clone(codec),
            ids_by_name,
        })
    }
    fn from_record(record: &ParameterValueList) -> Self {
        Self {
            id: Some(record.id),
            name: Some(record.name.clone()),
            value_list: Some(record.value_list.clone()),
        }
    }
    // The wide view joins values as text; read the stored bytes instead.
    fn existing(snapshot: &mut Snapshot<'_>) -> Result<HashMap<Id, Self, LookupHasher>> {
        Ok(value_list_entries(snapshot)?
            .into_iter()
            .filter_map(|(id, entries)| {
                let name = entries.first()?.name.clone();
                Some((
                    id,
                    Self {
                        id: Some(id),
                        name: Some(name),
                        value_list: Some(entries.into_iter().map(|e| e.value).collect()),
                    },
                ))
            })
            .collect())
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        self.value_list
            .iter()
            .flatten()
            .enumerate()
            .map(|(index, value)| {
                row(
                    Table::ParameterValueList,
                    id,
                    vec![
                        id.into(),
                        trimmed(&self.name),
                        (index as i64).into(),
                        value.clone().into(),
                        commit_id.into(),
                    ],
                )
            })
            .collect()
    }
}

impl Kind for ParameterTagItem {
    type Record = ParameterTag;
    const LABEL: &'static str = "Parameter tag";
    const TABLE: Table = Table::ParameterTag;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let tags = snapshot.records::<ParameterTag>()?;
        Ok(ParameterTagLookups {
            ids_by_tag: by_key(&tags, |t| t.tag.clone()),
        })
    }
    fn from_record(record: &ParameterTag) -> Self {
        Self {
            id: Some(record.id),
            tag: Some(record.tag.clone()),
            description: record.description.clone(),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::ParameterTag,
            id,
            vec![id.into(), trimmed(&self.tag), self.description.clone().into(), commit_id.into()],
        )]
    }
}

impl Kind for ParameterDefinitionTagItem {
    type Record = ParameterDefinitionTag;
    const LABEL: &'static str = "Parameter definition tag";
    const TABLE: Table = Table::ParameterDefinitionTag;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let definitions = snapshot.records::<ParameterDefinition>()?;
        let tags = snapshot.records::<ParameterTag>()?;
        let pairs = snapshot.records::<ParameterDefinitionTag>()?;
        Ok(ParameterDefinitionTagLookups {
            definition_names: names(&definitions, |d| &d.name),
            tags: names(&tags, |t| &t.tag),
            ids_by_definition_and_tag: by_key(&pairs, |p| (p.parameter_definition_id, p.parameter_tag_id)),
        })
    }
    fn from_record(record: &ParameterDefinitionTag) -> Self {
        Self {
            id: Some(record.id),
            parameter_definition_id: Some(record.parameter_definition_id),
            parameter_tag_id: Some(record.parameter_tag_id),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::ParameterDefinitionTag,
            id,
            vec![
                id.into(),
                self.parameter_definition_id.into(),
                self.parameter_tag_id.into(),
                commit_id.into(),
            ],
        )]
    }
}

// ------------- Tools -------------
impl Kind for ToolItem {
    type Record = Tool;
    const LABEL: &'static str = "Tool";
    const TABLE: Table = Table::Tool;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let tools = snapshot.records::<Tool>()?;
        Ok(ToolLookups {
            ids_by_name: by_key(&tools, |t| t.name.clone()),
        })
    }
    fn from_record(record: &Tool) -> Self {
        Self {
            id: Some(record.id),
            name: Some(record.name.clone()),
            description: record.description.clone(),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::Tool,
            id,
            vec![id.into(), trimmed(&self.name), self.description.clone().into(), commit_id.into()],
        )]
    }
}

impl Kind for FeatureItem {
    type Record = Feature;
    const LABEL: &'static str = "Feature";
    const TABLE: Table = Table::Feature;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let features = snapshot.records::<Feature>()?;
        Ok(FeatureLookups {
            definitions: definition_refs(snapshot)?,
            ids_by_definition: by_key(&features, |f| f.parameter_definition_id),
        })
    }
    fn from_record(record: &Feature) -> Self {
        Self {
            id: Some(record.id),
            parameter_definition_id: Some(record.parameter_definition_id),
            parameter_value_list_id: Some(record.parameter_value_list_id),
            description: record.description.clone(),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::Feature,
            id,
            vec![
                id.into(),
                self.parameter_definition_id.into(),
                self.parameter_value_list_id.into(),
                self.description.clone().into(),
                commit_id.into(),
            ],
        )]
    }
}

/// Features bound to their value lists, named after their parameter.
fn feature_bindings(snapshot: &mut Snapshot<'_>) -> Result<Lookup<Id, ListBinding>> {
    let definitions = definition_refs(snapshot)?;
    Ok(snapshot
        .records::<Feature>()?
        .into_iter()
        .map(|f| {
            let name = definitions
                .get(&f.parameter_definition_id)
                .map(|d| d.name.clone())
                .unwrap_or_default();
            (
                f.id,
                ListBinding {
                    name,
                    parameter_value_list_id: f.parameter_value_list_id,
                },
            )
        })
        .collect())
}

impl Kind for ToolFeatureItem {
    type Record = ToolFeature;
    const LABEL: &'static str = "Tool feature";
    const TABLE: Table = Table::ToolFeature;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let tools = snapshot.records::<Tool>()?;
        let tool_features = snapshot.records::<ToolFeature>()?;
        Ok(ToolFeatureLookups {
            tool_names: names(&tools, |t| &t.name),
            features: feature_bindings(snapshot)?,
            ids_by_tool_and_feature: by_key(&tool_features, |tf| (tf.tool_id, tf.feature_id)),
        })
    }
    fn from_record(record: &ToolFeature) -> Self {
        Self {
            id: Some(record.id),
            tool_id: Some(record.tool_id),
            feature_id: Some(record.feature_id),
            parameter_value_list_id: Some(record.parameter_value_list_id),
            required: Some(record.required),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::ToolFeature,
            id,
            vec![
                id.into(),
                self.tool_id.into(),
                self.feature_id.into(),
                self.parameter_value_list_id.into(),
                self.required.unwrap_or(false).into(),
                commit_id.into(),
            ],
        )]
    }
}

impl Kind for ToolFeatureMethodItem {
    type Record = ToolFeatureMethod;
    const LABEL: &'static str = "Tool feature method";
    const TABLE: Table = Table::ToolFeatureMethod;
    identity!();

    fn lookups(snapshot: &mut Snapshot<'_>, _: &Arc<dyn ValueCodec>) -> Result<Self::Lookups> {
        let features = feature_bindings(snapshot)?;
        let tool_features = snapshot
            .records::<ToolFeature>()?
            .into_iter()
            .map(|tf| {
                let name = features
                    .get(&tf.feature_id)
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                (
                    tf.id,
                    ListBinding {
                        name,
                        parameter_value_list_id: tf.parameter_value_list_id,
                    },
                )
            })
            .collect();
        let value_list_indices = value_list_entries(snapshot)?
            .into_iter()
            .map(|(id, entries)| (id, entries.iter().map(|e| e.value_index).collect()))
            .collect();
        let methods = snapshot.records::<ToolFeatureMethod>()?;
        Ok(ToolFeatureMethodLookups {
            tool_features,
            value_list_indices,
            ids_by_tool_feature_and_method: by_key(&methods, |m| (m.tool_feature_id, m.method_index)),
        })
    }
    fn from_record(record: &ToolFeatureMethod) -> Self {
        Self {
            id: Some(record.id),
            tool_feature_id: Some(record.tool_feature_id),
            parameter_value_list_id: Some(record.parameter_value_list_id),
            method_index: Some(record.method_index),
        }
    }
    fn rows(&self, id: Id, commit_id: Id, _: &Self::Lookups) -> Vec<StagedRow> {
        vec![row(
            Table::ToolFeatureMethod,
            id,
            vec![
                id.into(),
                self.tool_feature_id.into(),
                self.parameter_value_list_id.into(),
                self.method_index.into(),
                commit_id.into(),
            ],
        )]
    }
}

// ------------- Removal -------------
/// What [`remove_items`](crate::mapping::DatabaseMapping::remove_items) can
/// target. Object and relationship classes are both entity classes, objects
/// and relationships both entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Alternative,
    Scenario,
    ScenarioAlternative,
    EntityClass,
    Entity,
    EntityGroup,
    ParameterDefinition,
    ParameterValue,
    ParameterValueList,
    ParameterTag,
    ParameterDefinitionTag,
    Tool,
    Feature,
    ToolFeature,
    ToolFeatureMethod,
}

impl ItemKind {
    pub fn table(self) -> Table {
        match self {
            ItemKind::Alternative => Table::Alternative,
            ItemKind::Scenario => Table::Scenario,
            ItemKind::ScenarioAlternative => Table::ScenarioAlternative,
            ItemKind::EntityClass => Table::EntityClass,
            ItemKind::Entity => Table::Entity,
            ItemKind::EntityGroup => Table::EntityGroup,
            ItemKind::ParameterDefinition => Table::ParameterDefinition,
            ItemKind::ParameterValue => Table::ParameterValue,
            ItemKind::ParameterValueList => Table::ParameterValueList,
            ItemKind::ParameterTag => Table::ParameterTag,
            ItemKind::ParameterDefinitionTag => Table::ParameterDefinitionTag,
            ItemKind::Tool => Table::Tool,
            ItemKind::Feature => Table::Feature,
            ItemKind::ToolFeature => Table::ToolFeature,
            ItemKind::ToolFeatureMethod => Table::ToolFeatureMethod,
        }
    }
}

fn ids_of<R: Record + Identified>(snapshot: &mut Snapshot<'_>) -> Result<BTreeSet<Id>> {
    Ok(snapshot.records::<R>()?.iter().map(Identified::id).collect())
}

fn visible_ids(snapshot: &mut Snapshot<'_>, kind: ItemKind) -> Result<BTreeSet<Id>> {
    match kind {
        ItemKind::Alternative => ids_of::<Alternative>(snapshot),
        ItemKind::Scenario => ids_of::<Scenario>(snapshot),
        ItemKind::ScenarioAlternative => ids_of::<ScenarioAlternative>(snapshot),
        ItemKind::EntityClass => ids_of::<EntityClass>(snapshot),
        ItemKind::Entity => ids_of::<Entity>(snapshot),
        ItemKind::EntityGroup => ids_of::<EntityGroup>(snapshot),
        ItemKind::ParameterDefinition => ids_of::<ParameterDefinition>(snapshot),
        ItemKind::ParameterValue => ids_of::<ParameterValue>(snapshot),
        ItemKind::ParameterValueList => Ok(value_list_entries(snapshot)?.into_keys().collect()),
        ItemKind::ParameterTag => ids_of::<ParameterTag>(snapshot),
        ItemKind::ParameterDefinitionTag => ids_of::<ParameterDefinitionTag>(snapshot),
        ItemKind::Tool => ids_of::<Tool>(snapshot),
        ItemKind::Feature => ids_of::<Feature>(snapshot),
        ItemKind::ToolFeature => ids_of::<ToolFeature>(snapshot),
        ItemKind::ToolFeatureMethod => ids_of::<ToolFeatureMethod>(snapshot),
    }
}

/// `(referrer table, referrer id, referenced table, referenced id)`
type Reference = (Table, Id, Table, Id);

fn references(snapshot: &mut Snapshot<'_>) -> Result<Vec<Reference>> {
    use Table::*;
    let mut refs = Vec::new();
    for sa in snapshot.records::<crate::model::ScenarioAlternative>()? {
        refs.push((ScenarioAlternative, sa.id, Alternative, sa.alternative_id));
        refs.push((ScenarioAlternative, sa.id, Scenario, sa.scenario_id));
    }
    for member in snapshot.records::<MemberClass>()? {
        let class_id = member.relationship_class_id;
        refs.push((RelationshipEntityClass, class_id, EntityClass, class_id));
        refs.push((EntityClass, class_id, EntityClass, member.member_class_id));
    }
    for entity in snapshot.records::<crate::model::Entity>()? {
        refs.push((Entity, entity.id, EntityClass, entity.class_id));
    }
    for member in snapshot.records::<MemberEntity>()? {
        let relationship_id = member.relationship_id;
        refs.push((RelationshipEntity, relationship_id, Entity, relationship_id));
        refs.push((Entity, relationship_id, Entity, member.member_id));
    }
    for group in snapshot.records::<crate::model::EntityGroup>()? {
        refs.push((EntityGroup, group.id, EntityClass, group.entity_class_id));
        refs.push((EntityGroup, group.id, Entity, group.entity_id));
        refs.push((EntityGroup, group.id, Entity, group.member_id));
    }
    for definition in snapshot.records::<crate::model::ParameterDefinition>()? {
        refs.push((ParameterDefinition, definition.id, EntityClass, definition.entity_class_id));
    }
    for value in snapshot.records::<crate::model::ParameterValue>()? {
        refs.push((ParameterValue, value.id, Alternative, value.alternative_id));
        refs.push((ParameterValue, value.id, Entity, value.entity_id));
        refs.push((ParameterValue, value.id, ParameterDefinition, value.parameter_definition_id));
    }
    for tag in snapshot.records::<crate::model::ParameterDefinitionTag>()? {
        refs.push((ParameterDefinitionTag, tag.id, ParameterDefinition, tag.parameter_definition_id));
        refs.push((ParameterDefinitionTag, tag.id, ParameterTag, tag.parameter_tag_id));
    }
    for feature in snapshot.records::<crate::model::Feature>()? {
        refs.push((Feature, feature.id, ParameterDefinition, feature.parameter_definition_id));
        refs.push((Feature, feature.id, ParameterValueList, feature.parameter_value_list_id));
    }
    for tool_feature in snapshot.records::<crate::model::ToolFeature>()? {
        refs.push((ToolFeature, tool_feature.id, Tool, tool_feature.tool_id));
        refs.push((ToolFeature, tool_feature.id, Feature, tool_feature.feature_id));
        refs.push((ToolFeature, tool_feature.id, ParameterValueList, tool_feature.parameter_value_list_id));
    }
    for method in snapshot.records::<crate::model::ToolFeatureMethod>()? {
        refs.push((ToolFeatureMethod, method.id, ToolFeature, method.tool_feature_id));
        refs.push((ToolFeatureMethod, method.id, ParameterValueList, method.parameter_value_list_id));
    }
    Ok(refs)
}

/// Everything that goes when `ids` of `kind` are removed, by table.
pub(crate) fn cascade(
    snapshot: &mut Snapshot<'_>,
    kind: ItemKind,
    ids: &[Id],
) -> Result<BTreeMap<Table, BTreeSet<Id>>> {
    let visible = visible_ids(snapshot, kind)?;
    let stale: Vec<String> = ids
        .iter()
        .filter(|id| !visible.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !stale.is_empty() {
        return Err(SpineError::StaleReference(format!(
            "{} id(s) {} are not present",
            kind.table(),
            stale.join(", ")
        )));
    }
    if kind == ItemKind::Alternative {
        let base = snapshot
            .records::<Alternative>()?
            .into_iter()
            .find(|a| a.name == BASE_ALTERNATIVE && ids.contains(&a.id));
        if let Some(base) = base {
            return Err(IntegrityError::new(format!("Can't remove the {BASE_ALTERNATIVE} alternative."))
                .conflicting(Some(base.id))
                .into());
        }
    }

    let refs = references(snapshot)?;
    let mut removed: BTreeMap<Table, BTreeSet<Id>> = BTreeMap::new();
    removed.entry(kind.table()).or_default().extend(ids.iter().copied());
    loop {
        let mut reached = Vec::new();
        for (referrer, referrer_id, referenced, referenced_id) in &refs {
            let target_gone = removed.get(referenced).is_some_and(|ids| ids.contains(referenced_id));
            let already = removed.get(referrer).is_some_and(|ids| ids.contains(referrer_id));
            if target_gone && !already {
                reached.push((*referrer, *referrer_id));
            }
        }
        if reached.is_empty() {
            break;
        }
        for (table, id) in reached {
            removed.entry(table).or_default().insert(id);
        }
    }
    Ok(removed)
}
