//! Typed records read back through the views.
//!
//! Objects and relationships share the generic `entity` table and object and
//! relationship classes share `entity_class`; the discriminants below tell
//! them apart and the composed views reassemble the specialised records.
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use serde::Deserialize;

use crate::schema::Table;
use crate::value::EncodedValue;
use crate::view::ViewName;

pub type Id = i64;

/// Delimiter of id and name lists in wide views.
pub const LIST_DELIMITER: char = ',';

// ------------- Discriminants -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum EntityClassType {
    ObjectClass = 1,
    RelationshipClass = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum EntityType {
    Object = 1,
    Relationship = 2,
}

impl ToSql for EntityClassType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as i64))
    }
}
impl FromSql for EntityClassType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            1 => Ok(EntityClassType::ObjectClass),
            2 => Ok(EntityClassType::RelationshipClass),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}
impl ToSql for EntityType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as i64))
    }
}
impl FromSql for EntityType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            1 => Ok(EntityType::Object),
            2 => Ok(EntityType::Relationship),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

/// A row type that can be read from one of the views.
pub trait Record: Sized {
    const VIEW: ViewName;
    const ORDER_BY: &'static str = "id";
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Records carrying their own id, used to pick freshly written items back
/// out of a view.
pub trait Identified {
    fn id(&self) -> Id;
}

fn id_list(row: &Row<'_>, column: &str) -> rusqlite::Result<Vec<Id>> {
    let joined: Option<String> = row.get(column)?;
    joined
        .as_deref()
        .filter(|j| !j.is_empty())
        .map(|j| {
            j.split(LIST_DELIMITER)
                .map(|id| {
                    id.trim().parse::<Id>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })
                })
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

fn name_list(row: &Row<'_>, column: &str) -> rusqlite::Result<Vec<String>> {
    let joined: Option<String> = row.get(column)?;
    Ok(joined
        .map(|j| j.split(LIST_DELIMITER).map(str::to_string).collect())
        .unwrap_or_default())
}

/// Blobs listed by the wide views as hex, so any byte survives the join.
fn blob_list(row: &Row<'_>, column: &str) -> rusqlite::Result<Vec<Vec<u8>>> {
    let joined: Option<String> = row.get(column)?;
    joined
        .as_deref()
        .map(|j| {
            j.split(LIST_DELIMITER)
                .map(|blob| {
                    hex::decode(blob)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
                })
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

// ------------- Commit -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub id: Id,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub user: Option<String>,
}
impl Record for Commit {
    const VIEW: ViewName = ViewName::Merged(Table::Commit);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            comment: row.get("comment")?,
            date: row.get("date")?,
            user: row.get("user")?,
        })
    }
}

// ------------- Alternatives and scenarios -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for Alternative {
    const VIEW: ViewName = ViewName::Merged(Table::Alternative);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub commit_id: Option<Id>,
}
impl Record for Scenario {
    const VIEW: ViewName = ViewName::Merged(Table::Scenario);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            active: row.get("active")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioAlternative {
    pub id: Id,
    pub scenario_id: Id,
    pub alternative_id: Id,
    pub rank: i64,
    pub commit_id: Option<Id>,
}
impl Record for ScenarioAlternative {
    const VIEW: ViewName = ViewName::Merged(Table::ScenarioAlternative);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            scenario_id: row.get("scenario_id")?,
            alternative_id: row.get("alternative_id")?,
            rank: row.get("rank")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

/// A scenario with its alternatives listed in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct WideScenario {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub alternative_id_list: Vec<Id>,
    pub alternative_name_list: Vec<String>,
}
impl Record for WideScenario {
    const VIEW: ViewName = ViewName::WideScenario;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            active: row.get("active")?,
            alternative_id_list: id_list(row, "alternative_id_list")?,
            alternative_name_list: name_list(row, "alternative_name_list")?,
        })
    }
}

// ------------- Entity classes -------------
#[derive(Debug, Clone, PartialEq)]
pub struct EntityClass {
    pub id: Id,
    pub class_type: EntityClassType,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i64,
    pub hidden: bool,
    pub commit_id: Option<Id>,
}
impl Record for EntityClass {
    const VIEW: ViewName = ViewName::EntityClass;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            class_type: row.get("type_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            display_order: row.get("display_order")?,
            hidden: row.get("hidden")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectClass {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i64,
    pub hidden: bool,
    pub commit_id: Option<Id>,
}
impl Record for ObjectClass {
    const VIEW: ViewName = ViewName::ObjectClass;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            display_order: row.get("display_order")?,
            hidden: row.get("hidden")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

/// One dimension of a relationship class.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberClass {
    pub relationship_class_id: Id,
    pub dimension: i64,
    pub member_class_id: Id,
}
impl Record for MemberClass {
    const VIEW: ViewName = ViewName::Merged(Table::RelationshipEntityClass);
    const ORDER_BY: &'static str = "entity_class_id, dimension";
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            relationship_class_id: row.get("entity_class_id")?,
            dimension: row.get("dimension")?,
            member_class_id: row.get("member_class_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipClass {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i64,
    pub hidden: bool,
    pub object_class_id_list: Vec<Id>,
    pub object_class_name_list: Vec<String>,
    pub commit_id: Option<Id>,
}
impl Record for RelationshipClass {
    const VIEW: ViewName = ViewName::RelationshipClass;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            display_order: row.get("display_order")?,
            hidden: row.get("hidden")?,
            object_class_id_list: id_list(row, "object_class_id_list")?,
            object_class_name_list: name_list(row, "object_class_name_list")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

// ------------- Entities -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Id,
    pub entity_type: EntityType,
    pub class_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for Entity {
    const VIEW: ViewName = ViewName::Entity;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            entity_type: row.get("type_id")?,
            class_id: row.get("class_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub id: Id,
    pub class_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for Object {
    const VIEW: ViewName = ViewName::Object;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            class_id: row.get("class_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

/// One dimension of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEntity {
    pub relationship_id: Id,
    pub relationship_class_id: Id,
    pub dimension: i64,
    pub member_id: Id,
    pub member_class_id: Id,
}
impl Record for MemberEntity {
    const VIEW: ViewName = ViewName::Merged(Table::RelationshipEntity);
    const ORDER_BY: &'static str = "entity_id, dimension";
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            relationship_id: row.get("entity_id")?,
            relationship_class_id: row.get("entity_class_id")?,
            dimension: row.get("dimension")?,
            member_id: row.get("member_id")?,
            member_class_id: row.get("member_class_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: Id,
    pub class_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub object_id_list: Vec<Id>,
    pub object_name_list: Vec<String>,
    pub object_class_id_list: Vec<Id>,
    pub commit_id: Option<Id>,
}
impl Record for Relationship {
    const VIEW: ViewName = ViewName::Relationship;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            class_id: row.get("class_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            object_id_list: id_list(row, "object_id_list")?,
            object_name_list: name_list(row, "object_name_list")?,
            object_class_id_list: id_list(row, "object_class_id_list")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    pub id: Id,
    pub entity_class_id: Id,
    pub entity_id: Id,
    pub member_id: Id,
    pub commit_id: Option<Id>,
}
impl Record for EntityGroup {
    const VIEW: ViewName = ViewName::Merged(Table::EntityGroup);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            entity_class_id: row.get("entity_class_id")?,
            entity_id: row.get("entity_id")?,
            member_id: row.get("member_id")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

// ------------- Parameters -------------
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub id: Id,
    pub entity_class_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub default_value: Option<EncodedValue>,
    pub parameter_value_list_id: Option<Id>,
    pub commit_id: Option<Id>,
}
impl Record for ParameterDefinition {
    const VIEW: ViewName = ViewName::ParameterDefinition;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            entity_class_id: row.get("entity_class_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            default_value: EncodedValue::from_columns(
                row.get("default_value")?,
                row.get("default_type")?,
            ),
            parameter_value_list_id: row.get("parameter_value_list_id")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValue {
    pub id: Id,
    pub parameter_definition_id: Id,
    pub entity_class_id: Id,
    pub entity_id: Id,
    pub alternative_id: Id,
    pub value: EncodedValue,
    pub commit_id: Option<Id>,
}
impl Record for ParameterValue {
    const VIEW: ViewName = ViewName::ParameterValue;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            parameter_definition_id: row.get("parameter_definition_id")?,
            entity_class_id: row.get("entity_class_id")?,
            entity_id: row.get("entity_id")?,
            alternative_id: row.get("alternative_id")?,
            value: EncodedValue {
                bytes: row.get("value")?,
                type_tag: row.get("type")?,
            },
            commit_id: row.get("commit_id")?,
        })
    }
}

/// One allowed value of a value list, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValueListEntry {
    pub id: Id,
    pub name: String,
    pub value_index: i64,
    pub value: Vec<u8>,
    pub commit_id: Option<Id>,
}
impl Record for ParameterValueListEntry {
    const VIEW: ViewName = ViewName::Merged(Table::ParameterValueList);
    const ORDER_BY: &'static str = "id, value_index";
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            value_index: row.get("value_index")?,
            value: row.get("value")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

/// A value list with its values in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValueList {
    pub id: Id,
    pub name: String,
    pub value_index_list: Vec<i64>,
    pub value_list: Vec<Vec<u8>>,
    pub commit_id: Option<Id>,
}
impl Record for ParameterValueList {
    const VIEW: ViewName = ViewName::WideParameterValueList;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            value_index_list: id_list(row, "value_index_list")?,
            value_list: blob_list(row, "value_list")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTag {
    pub id: Id,
    pub tag: String,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for ParameterTag {
    const VIEW: ViewName = ViewName::Merged(Table::ParameterTag);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            tag: row.get("tag")?,
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinitionTag {
    pub id: Id,
    pub parameter_definition_id: Id,
    pub parameter_tag_id: Id,
    pub commit_id: Option<Id>,
}
impl Record for ParameterDefinitionTag {
    const VIEW: ViewName = ViewName::Merged(Table::ParameterDefinitionTag);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            parameter_definition_id: row.get("parameter_definition_id")?,
            parameter_tag_id: row.get("parameter_tag_id")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

// ------------- Named parameter views -------------
/// A parameter definition with its tags in tag id order.
#[derive(Debug, Clone, PartialEq)]
pub struct WideParameterDefinitionTag {
    pub id: Id,
    pub parameter_tag_id_list: Vec<Id>,
    pub parameter_tag_list: Vec<String>,
}
impl Record for WideParameterDefinitionTag {
    const VIEW: ViewName = ViewName::WideParameterDefinitionTag;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            parameter_tag_id_list: id_list(row, "parameter_tag_id_list")?,
            parameter_tag_list: name_list(row, "parameter_tag_list")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectParameterDefinition {
    pub id: Id,
    pub object_class_id: Id,
    pub object_class_name: String,
    pub parameter_name: String,
    pub value_list_id: Option<Id>,
    pub value_list_name: Option<String>,
    pub parameter_tag_id_list: Vec<Id>,
    pub parameter_tag_list: Vec<String>,
    pub default_value: Option<EncodedValue>,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for ObjectParameterDefinition {
    const VIEW: ViewName = ViewName::ObjectParameterDefinition;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            object_class_id: row.get("entity_class_id")?,
            object_class_name: row.get("object_class_name")?,
            parameter_name: row.get("parameter_name")?,
            value_list_id: row.get("value_list_id")?,
            value_list_name: row.get("value_list_name")?,
            parameter_tag_id_list: id_list(row, "parameter_tag_id_list")?,
            parameter_tag_list: name_list(row, "parameter_tag_list")?,
            default_value: EncodedValue::from_columns(row.get("default_value")?, row.get("default_type")?),
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipParameterDefinition {
    pub id: Id,
    pub relationship_class_id: Id,
    pub relationship_class_name: String,
    pub object_class_id_list: Vec<Id>,
    pub object_class_name_list: Vec<String>,
    pub parameter_name: String,
    pub value_list_id: Option<Id>,
    pub value_list_name: Option<String>,
    pub parameter_tag_id_list: Vec<Id>,
    pub parameter_tag_list: Vec<String>,
    pub default_value: Option<EncodedValue>,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for RelationshipParameterDefinition {
    const VIEW: ViewName = ViewName::RelationshipParameterDefinition;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            relationship_class_id: row.get("entity_class_id")?,
            relationship_class_name: row.get("relationship_class_name")?,
            object_class_id_list: id_list(row, "object_class_id_list")?,
            object_class_name_list: name_list(row, "object_class_name_list")?,
            parameter_name: row.get("parameter_name")?,
            value_list_id: row.get("value_list_id")?,
            value_list_name: row.get("value_list_name")?,
            parameter_tag_id_list: id_list(row, "parameter_tag_id_list")?,
            parameter_tag_list: name_list(row, "parameter_tag_list")?,
            default_value: EncodedValue::from_columns(row.get("default_value")?, row.get("default_type")?),
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

/// A value with the names of everything it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectParameterValue {
    pub id: Id,
    pub object_class_id: Id,
    pub object_class_name: String,
    pub object_id: Id,
    pub object_name: String,
    pub parameter_id: Id,
    pub parameter_name: String,
    pub alternative_id: Id,
    pub alternative_name: String,
    pub value: EncodedValue,
    pub commit_id: Option<Id>,
}
impl Record for ObjectParameterValue {
    const VIEW: ViewName = ViewName::ObjectParameterValue;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            object_class_id: row.get("entity_class_id")?,
            object_class_name: row.get("object_class_name")?,
            object_id: row.get("entity_id")?,
            object_name: row.get("object_name")?,
            parameter_id: row.get("parameter_id")?,
            parameter_name: row.get("parameter_name")?,
            alternative_id: row.get("alternative_id")?,
            alternative_name: row.get("alternative_name")?,
            value: EncodedValue {
                bytes: row.get("value")?,
                type_tag: row.get("type")?,
            },
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipParameterValue {
    pub id: Id,
    pub relationship_class_id: Id,
    pub relationship_class_name: String,
    pub object_class_id_list: Vec<Id>,
    pub object_class_name_list: Vec<String>,
    pub relationship_id: Id,
    pub object_id_list: Vec<Id>,
    pub object_name_list: Vec<String>,
    pub parameter_id: Id,
    pub parameter_name: String,
    pub alternative_id: Id,
    pub alternative_name: String,
    pub value: EncodedValue,
    pub commit_id: Option<Id>,
}
impl Record for RelationshipParameterValue {
    const VIEW: ViewName = ViewName::RelationshipParameterValue;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            relationship_class_id: row.get("entity_class_id")?,
            relationship_class_name: row.get("relationship_class_name")?,
            object_class_id_list: id_list(row, "object_class_id_list")?,
            object_class_name_list: name_list(row, "object_class_name_list")?,
            relationship_id: row.get("entity_id")?,
            object_id_list: id_list(row, "object_id_list")?,
            object_name_list: name_list(row, "object_name_list")?,
            parameter_id: row.get("parameter_id")?,
            parameter_name: row.get("parameter_name")?,
            alternative_id: row.get("alternative_id")?,
            alternative_name: row.get("alternative_name")?,
            value: EncodedValue {
                bytes: row.get("value")?,
                type_tag: row.get("type")?,
            },
            commit_id: row.get("commit_id")?,
        })
    }
}

/// A group membership between objects, with names.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub id: Id,
    pub class_id: Id,
    pub group_id: Id,
    pub member_id: Id,
    pub class_name: String,
    pub group_name: String,
    pub member_name: String,
    pub commit_id: Option<Id>,
}
impl Record for ObjectGroup {
    const VIEW: ViewName = ViewName::ObjectGroup;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            class_id: row.get("class_id")?,
            group_id: row.get("group_id")?,
            member_id: row.get("member_id")?,
            class_name: row.get("class_name")?,
            group_name: row.get("group_name")?,
            member_name: row.get("member_name")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

// ------------- Tools -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for Tool {
    const VIEW: ViewName = ViewName::Merged(Table::Tool);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Id,
    pub parameter_definition_id: Id,
    pub parameter_value_list_id: Id,
    pub description: Option<String>,
    pub commit_id: Option<Id>,
}
impl Record for Feature {
    const VIEW: ViewName = ViewName::Merged(Table::Feature);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            parameter_definition_id: row.get("parameter_definition_id")?,
            parameter_value_list_id: row.get("parameter_value_list_id")?,
            description: row.get("description")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolFeature {
    pub id: Id,
    pub tool_id: Id,
    pub feature_id: Id,
    pub parameter_value_list_id: Id,
    pub required: bool,
    pub commit_id: Option<Id>,
}
impl Record for ToolFeature {
    const VIEW: ViewName = ViewName::Merged(Table::ToolFeature);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            tool_id: row.get("tool_id")?,
            feature_id: row.get("feature_id")?,
            parameter_value_list_id: row.get("parameter_value_list_id")?,
            required: row.get("required")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolFeatureMethod {
    pub id: Id,
    pub tool_feature_id: Id,
    pub parameter_value_list_id: Id,
    pub method_index: i64,
    pub commit_id: Option<Id>,
}
impl Record for ToolFeatureMethod {
    const VIEW: ViewName = ViewName::Merged(Table::ToolFeatureMethod);
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            tool_feature_id: row.get("tool_feature_id")?,
            parameter_value_list_id: row.get("parameter_value_list_id")?,
            method_index: row.get("method_index")?,
            commit_id: row.get("commit_id")?,
        })
    }
}

macro_rules! identified {
    ($($record:ty),* $(,)?) => {
        $(impl Identified for $record {
            fn id(&self) -> Id {
                self.id
            }
        })*
    };
}

identified!(
    Commit,
    Alternative,
    Scenario,
    ScenarioAlternative,
    WideScenario,
    EntityClass,
    ObjectClass,
    RelationshipClass,
    Entity,
    Object,
    Relationship,
    EntityGroup,
    ParameterDefinition,
    ParameterValue,
    ParameterValueList,
    ParameterTag,
    ParameterDefinitionTag,
    WideParameterDefinitionTag,
    ObjectParameterDefinition,
    RelationshipParameterDefinition,
    ObjectParameterValue,
    RelationshipParameterValue,
    ObjectGroup,
    Tool,
    Feature,
    ToolFeature,
    ToolFeatureMethod,
);
