//! Integrity checks for candidate items.
//!
//! Each kind has a candidate type, a lookups type describing the current
//! state its checks need and a pure `check_<kind>` function. The lookups are
//! filled by the caller from one consistent snapshot; nothing here touches
//! the store. [`check_batch`] runs a batch in strict or collect mode and
//! registers each accepted item in the lookups, so duplicates within the same
//! batch are caught too.
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use seahash::SeaHasher;
use serde::Deserialize;

use crate::error::IntegrityError;
use crate::model::{EntityClassType, EntityType, Id};
use crate::value::{EncodedValue, ValueCodec};

pub type LookupHasher = BuildHasherDefault<SeaHasher>;
/// Keys of current state; `None` values stand for items accepted earlier in
/// the same batch that do not have an id yet.
pub type Lookup<K, V> = HashMap<K, V, LookupHasher>;

/// How a batch reacts to violations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    /// Raise on the first violation instead of collecting them.
    pub strict: bool,
    /// Return the ids of existing duplicates along with the new items.
    pub return_dups: bool,
}

impl Mode {
    pub fn strict() -> Self {
        Self {
            strict: true,
            return_dups: false,
        }
    }
    pub fn collect() -> Self {
        Self::default()
    }
    pub fn get_or_add() -> Self {
        Self {
            strict: false,
            return_dups: true,
        }
    }
}

pub trait Candidate: Sized {
    type Lookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError>;
    /// Fills fields the caller may leave out.
    fn complete(&mut self, _lookups: &Self::Lookups) {}
    /// Makes the item visible to the checks of later items.
    fn register(&self, lookups: &mut Self::Lookups);
    /// Takes the item's keys back out of the lookups.
    fn unregister(&self, lookups: &mut Self::Lookups);
}

/// Checks a batch of new items. Strict mode returns the first violation as
/// the error; otherwise the valid items come back with one log entry per
/// rejected item.
pub fn check_batch<C: Candidate>(
    items: Vec<C>,
    lookups: &mut C::Lookups,
    strict: bool,
) -> Result<(Vec<C>, Vec<IntegrityError>), IntegrityError> {
    let mut valid = Vec::new();
    let mut errors = Vec::new();
    for mut item in items {
        item.complete(lookups);
        match item.check(lookups) {
            Ok(()) => {
                item.register(lookups);
                valid.push(item);
            }
            Err(e) if strict => return Err(e),
            Err(e) => errors.push(e),
        }
    }
    Ok((valid, errors))
}

/// Checks updates given as `(existing, merged)` pairs. The existing version
/// is taken out of the lookups while its replacement is checked, and put
/// back if the replacement is rejected.
pub fn check_update_batch<C: Candidate>(
    pairs: Vec<(C, C)>,
    lookups: &mut C::Lookups,
    strict: bool,
) -> Result<(Vec<C>, Vec<IntegrityError>), IntegrityError> {
    let mut valid = Vec::new();
    let mut errors = Vec::new();
    for (existing, merged) in pairs {
        existing.unregister(lookups);
        match merged.check(lookups) {
            Ok(()) => {
                merged.register(lookups);
                valid.push(merged);
            }
            Err(e) => {
                existing.register(lookups);
                if strict {
                    return Err(e);
                }
                errors.push(e);
            }
        }
    }
    Ok((valid, errors))
}

// ------------- Helpers -------------
fn required_name<'a>(name: Option<&'a str>, kind: &str) -> Result<&'a str, IntegrityError> {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(IntegrityError::new(format!("Missing {kind} name.")).on(&["name"])),
    }
}

fn required<T: Copy>(value: Option<T>, field: &'static str, kind: &str) -> Result<T, IntegrityError> {
    value.ok_or_else(|| IntegrityError::new(format!("Missing {field} for {kind}.")).on(&[field]))
}

fn unique<K: std::hash::Hash + Eq>(
    index: &Lookup<K, Option<Id>>,
    key: &K,
    field: &[&'static str],
    message: impl FnOnce() -> String,
) -> Result<(), IntegrityError> {
    match index.get(key) {
        Some(existing) => Err(IntegrityError::new(message()).on(field).conflicting(*existing)),
        None => Ok(()),
    }
}

fn forget<K: std::hash::Hash + Eq>(index: &mut Lookup<K, Option<Id>>, key: &K, id: Option<Id>) {
    if index.get(key) == Some(&id) {
        index.remove(key);
    }
}

fn decodes(
    codec: &dyn ValueCodec,
    value: &EncodedValue,
    field: &'static str,
    what: &str,
) -> Result<(), IntegrityError> {
    codec
        .decode(value)
        .map(|_| ())
        .map_err(|e| IntegrityError::new(format!("Invalid {what} '{value}': {e}")).on(&[field]))
}

fn display_list(values: &[Vec<u8>]) -> String {
    values
        .iter()
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Overlays the fields set in `update` on an existing item.
pub trait Merge {
    fn merge(self, update: Self) -> Self;
}

macro_rules! mergeable {
    ($item:ident { $($field:ident),* $(,)? }) => {
        impl Merge for $item {
            fn merge(self, update: Self) -> Self {
                Self {
                    $($field: update.$field.or(self.$field),)*
                }
            }
        }
    };
}

/// What the checks of composite kinds need to know about an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub class_id: Id,
    pub name: String,
}

/// A relationship class and its member classes in dimension order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipClassRef {
    pub name: String,
    pub object_class_id_list: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRef {
    pub name: String,
    pub entity_class_id: Id,
    pub parameter_value_list_id: Option<Id>,
}

/// A feature or tool feature together with the value list it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBinding {
    pub name: String,
    pub parameter_value_list_id: Id,
}

// ------------- Alternative -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlternativeItem {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
}
mergeable!(AlternativeItem { id, name, description });

#[derive(Debug, Clone, Default)]
pub struct AlternativeLookups {
    pub ids_by_name: Lookup<String, Option<Id>>,
}

pub fn check_alternative(item: &AlternativeItem, lookups: &AlternativeLookups) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "alternative")?;
    unique(&lookups.ids_by_name, &name.to_string(), &["name"], || {
        format!("There can't be more than one alternative called '{name}'.")
    })
}

impl Candidate for AlternativeItem {
    type Lookups = AlternativeLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_alternative(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            lookups.ids_by_name.insert(name.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            forget(&mut lookups.ids_by_name, &name.trim().to_string(), self.id);
        }
    }
}

// ------------- Scenario -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScenarioItem {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}
mergeable!(ScenarioItem { id, name, description, active });

#[derive(Debug, Clone, Default)]
pub struct ScenarioLookups {
    pub ids_by_name: Lookup<String, Option<Id>>,
}

pub fn check_scenario(item: &ScenarioItem, lookups: &ScenarioLookups) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "scenario")?;
    unique(&lookups.ids_by_name, &name.to_string(), &["name"], || {
        format!("There can't be more than one scenario called '{name}'.")
    })
}

impl Candidate for ScenarioItem {
    type Lookups = ScenarioLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_scenario(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            lookups.ids_by_name.insert(name.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            forget(&mut lookups.ids_by_name, &name.trim().to_string(), self.id);
        }
    }
}

// ------------- Scenario alternative -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScenarioAlternativeItem {
    pub id: Option<Id>,
    pub scenario_id: Option<Id>,
    pub alternative_id: Option<Id>,
    pub rank: Option<i64>,
}
mergeable!(ScenarioAlternativeItem { id, scenario_id, alternative_id, rank });

#[derive(Debug, Clone, Default)]
pub struct ScenarioAlternativeLookups {
    pub scenario_names: Lookup<Id, String>,
    pub alternative_names: Lookup<Id, String>,
    pub ids_by_scenario_and_alternative: Lookup<(Id, Id), Option<Id>>,
    pub ids_by_scenario_and_rank: Lookup<(Id, i64), Option<Id>>,
}

pub fn check_scenario_alternative(
    item: &ScenarioAlternativeItem,
    lookups: &ScenarioAlternativeLookups,
) -> Result<(), IntegrityError> {
    let kind = "scenario alternative";
    let scenario_id = required(item.scenario_id, "scenario_id", kind)?;
    let alternative_id = required(item.alternative_id, "alternative_id", kind)?;
    let rank = required(item.rank, "rank", kind)?;
    if rank < 1 {
        return Err(IntegrityError::new(format!("Rank {rank} must be a positive integer.")).on(&["rank"]));
    }
    let scenario = lookups
        .scenario_names
        .get(&scenario_id)
        .ok_or_else(|| IntegrityError::new("Scenario not found.").on(&["scenario_id"]))?;
    let alternative = lookups
        .alternative_names
        .get(&alternative_id)
        .ok_or_else(|| IntegrityError::new("Alternative not found.").on(&["alternative_id"]))?;
    unique(
        &lookups.ids_by_scenario_and_alternative,
        &(scenario_id, alternative_id),
        &["scenario_id", "alternative_id"],
        || format!("Alternative {alternative} already exists in scenario {scenario}."),
    )?;
    unique(
        &lookups.ids_by_scenario_and_rank,
        &(scenario_id, rank),
        &["scenario_id", "rank"],
        || format!("Rank {rank} already exists in scenario {scenario}."),
    )
}

impl Candidate for ScenarioAlternativeItem {
    type Lookups = ScenarioAlternativeLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_scenario_alternative(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(s), Some(a)) = (self.scenario_id, self.alternative_id) {
            lookups.ids_by_scenario_and_alternative.insert((s, a), self.id);
        }
        if let (Some(s), Some(r)) = (self.scenario_id, self.rank) {
            lookups.ids_by_scenario_and_rank.insert((s, r), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(s), Some(a)) = (self.scenario_id, self.alternative_id) {
            forget(&mut lookups.ids_by_scenario_and_alternative, &(s, a), self.id);
        }
        if let (Some(s), Some(r)) = (self.scenario_id, self.rank) {
            forget(&mut lookups.ids_by_scenario_and_rank, &(s, r), self.id);
        }
    }
}

// ------------- Object class -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObjectClassItem {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i64>,
    pub hidden: Option<bool>,
    pub type_id: Option<EntityClassType>,
}
mergeable!(ObjectClassItem { id, name, description, display_order, hidden, type_id });

/// Entity class names are unique across object and relationship classes.
#[derive(Debug, Clone, Default)]
pub struct ObjectClassLookups {
    pub entity_class_ids_by_name: Lookup<String, Option<Id>>,
}

pub fn check_object_class(item: &ObjectClassItem, lookups: &ObjectClassLookups) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "object class")?;
    if item.type_id.is_some_and(|t| t != EntityClassType::ObjectClass) {
        return Err(
            IntegrityError::new(format!("Class '{name}' is not of the object class type.")).on(&["type_id"]),
        );
    }
    unique(&lookups.entity_class_ids_by_name, &name.to_string(), &["name"], || {
        format!("There can't be more than one object class called '{name}'.")
    })
}

impl Candidate for ObjectClassItem {
    type Lookups = ObjectClassLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_object_class(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            lookups.entity_class_ids_by_name.insert(name.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            forget(&mut lookups.entity_class_ids_by_name, &name.trim().to_string(), self.id);
        }
    }
}

// ------------- Relationship class -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelationshipClassItem {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i64>,
    pub hidden: Option<bool>,
    pub object_class_id_list: Option<Vec<Id>>,
    pub type_id: Option<EntityClassType>,
}
mergeable!(RelationshipClassItem {
    id,
    name,
    description,
    display_order,
    hidden,
    object_class_id_list,
    type_id
});

#[derive(Debug, Clone, Default)]
pub struct RelationshipClassLookups {
    pub entity_class_ids_by_name: Lookup<String, Option<Id>>,
    pub object_class_names: Lookup<Id, String>,
}

pub fn check_relationship_class(
    item: &RelationshipClassItem,
    lookups: &RelationshipClassLookups,
) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "relationship class")?;
    if item.type_id.is_some_and(|t| t != EntityClassType::RelationshipClass) {
        return Err(
            IntegrityError::new(format!("Class '{name}' is not of the relationship class type."))
                .on(&["type_id"]),
        );
    }
    let members = item.object_class_id_list.as_deref().unwrap_or_default();
    if members.is_empty() {
        return Err(IntegrityError::new(format!(
            "At least one object class is needed for relationship class '{name}'."
        ))
        .on(&["object_class_id_list"]));
    }
    let missing: Vec<String> = members
        .iter()
        .filter(|id| !lookups.object_class_names.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IntegrityError::new(format!(
            "Object class id(s) {} not found for relationship class '{name}'.",
            missing.join(", ")
        ))
        .on(&["object_class_id_list"]));
    }
    unique(&lookups.entity_class_ids_by_name, &name.to_string(), &["name"], || {
        format!("There can't be more than one relationship class called '{name}'.")
    })
}

impl Candidate for RelationshipClassItem {
    type Lookups = RelationshipClassLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_relationship_class(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            lookups.entity_class_ids_by_name.insert(name.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            forget(&mut lookups.entity_class_ids_by_name, &name.trim().to_string(), self.id);
        }
    }
}

// ------------- Object -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObjectItem {
    pub id: Option<Id>,
    pub class_id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub type_id: Option<EntityType>,
}
mergeable!(ObjectItem { id, class_id, name, description, type_id });

#[derive(Debug, Clone, Default)]
pub struct ObjectLookups {
    pub object_class_names: Lookup<Id, String>,
    pub entity_ids_by_class_and_name: Lookup<(Id, String), Option<Id>>,
}

pub fn check_object(item: &ObjectItem, lookups: &ObjectLookups) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "object")?;
    if item.type_id.is_some_and(|t| t != EntityType::Object) {
        return Err(IntegrityError::new(format!("Entity '{name}' is not of the object type.")).on(&["type_id"]));
    }
    let class_id = required(item.class_id, "class_id", "object")?;
    if !lookups.object_class_names.contains_key(&class_id) {
        return Err(IntegrityError::new(format!("Object class not found for object '{name}'.")).on(&["class_id"]));
    }
    unique(
        &lookups.entity_ids_by_class_and_name,
        &(class_id, name.to_string()),
        &["class_id", "name"],
        || format!("There's already an object called '{name}' in the same object class."),
    )
}

impl Candidate for ObjectItem {
    type Lookups = ObjectLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_object(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(class_id), Some(name)) = (self.class_id, &self.name) {
            lookups
                .entity_ids_by_class_and_name
                .insert((class_id, name.trim().to_string()), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(class_id), Some(name)) = (self.class_id, &self.name) {
            forget(
                &mut lookups.entity_ids_by_class_and_name,
                &(class_id, name.trim().to_string()),
                self.id,
            );
        }
    }
}

// ------------- Relationship -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelationshipItem {
    pub id: Option<Id>,
    pub class_id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_id_list: Option<Vec<Id>>,
    pub type_id: Option<EntityType>,
}
mergeable!(RelationshipItem { id, class_id, name, description, object_id_list, type_id });

#[derive(Debug, Clone, Default)]
pub struct RelationshipLookups {
    pub relationship_classes: Lookup<Id, RelationshipClassRef>,
    pub objects: Lookup<Id, EntityRef>,
    pub entity_ids_by_class_and_name: Lookup<(Id, String), Option<Id>>,
    pub ids_by_class_and_members: Lookup<(Id, Vec<Id>), Option<Id>>,
}

pub fn check_relationship(item: &RelationshipItem, lookups: &RelationshipLookups) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "relationship")?;
    if item.type_id.is_some_and(|t| t != EntityType::Relationship) {
        return Err(
            IntegrityError::new(format!("Entity '{name}' is not of the relationship type.")).on(&["type_id"]),
        );
    }
    let class_id = required(item.class_id, "class_id", "relationship")?;
    unique(
        &lookups.entity_ids_by_class_and_name,
        &(class_id, name.to_string()),
        &["class_id", "name"],
        || format!("There's already a relationship called '{name}' in the same class."),
    )?;
    let class = lookups.relationship_classes.get(&class_id).ok_or_else(|| {
        IntegrityError::new(format!("Relationship class not found for relationship '{name}'.")).on(&["class_id"])
    })?;
    let members = item.object_id_list.as_deref().unwrap_or_default();
    let mut member_names = Vec::with_capacity(members.len());
    let mut member_classes = Vec::with_capacity(members.len());
    for member in members {
        let object = lookups.objects.get(member).ok_or_else(|| {
            IntegrityError::new(format!("Object id {member} not found for relationship '{name}'."))
                .on(&["object_id_list"])
        })?;
        member_names.push(object.name.as_str());
        member_classes.push(object.class_id);
    }
    if member_classes != class.object_class_id_list {
        return Err(IntegrityError::new(format!(
            "Incorrect objects '{}' for relationship class '{}'.",
            member_names.join(", "),
            class.name
        ))
        .on(&["object_id_list"]));
    }
    unique(
        &lookups.ids_by_class_and_members,
        &(class_id, members.to_vec()),
        &["class_id", "object_id_list"],
        || {
            format!(
                "There's already a relationship between objects {} in class {}.",
                member_names.join(", "),
                class.name
            )
        },
    )
}

impl Candidate for RelationshipItem {
    type Lookups = RelationshipLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_relationship(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(class_id) = self.class_id {
            if let Some(name) = &self.name {
                lookups
                    .entity_ids_by_class_and_name
                    .insert((class_id, name.trim().to_string()), self.id);
            }
            if let Some(members) = &self.object_id_list {
                lookups
                    .ids_by_class_and_members
                    .insert((class_id, members.clone()), self.id);
            }
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(class_id) = self.class_id {
            if let Some(name) = &self.name {
                forget(
                    &mut lookups.entity_ids_by_class_and_name,
                    &(class_id, name.trim().to_string()),
                    self.id,
                );
            }
            if let Some(members) = &self.object_id_list {
                forget(
                    &mut lookups.ids_by_class_and_members,
                    &(class_id, members.clone()),
                    self.id,
                );
            }
        }
    }
}

// ------------- Entity group -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntityGroupItem {
    pub id: Option<Id>,
    pub entity_class_id: Option<Id>,
    pub entity_id: Option<Id>,
    pub member_id: Option<Id>,
}
mergeable!(EntityGroupItem { id, entity_class_id, entity_id, member_id });

#[derive(Debug, Clone, Default)]
pub struct EntityGroupLookups {
    pub entity_class_names: Lookup<Id, String>,
    pub entities: Lookup<Id, EntityRef>,
    pub ids_by_entity_and_member: Lookup<(Id, Id), Option<Id>>,
}

pub fn check_entity_group(item: &EntityGroupItem, lookups: &EntityGroupLookups) -> Result<(), IntegrityError> {
    let kind = "entity group";
    let class_id = required(item.entity_class_id, "entity_class_id", kind)?;
    let entity_id = required(item.entity_id, "entity_id", kind)?;
    let member_id = required(item.member_id, "member_id", kind)?;
    if !lookups.entity_class_names.contains_key(&class_id) {
        return Err(IntegrityError::new("Entity class not found for entity group.").on(&["entity_class_id"]));
    }
    let in_class = |id: Id, field: &'static str, role: &str| {
        lookups
            .entities
            .get(&id)
            .filter(|entity| entity.class_id == class_id)
            .ok_or_else(|| IntegrityError::new(format!("{role} {id} not found in the entity class.")).on(&[field]))
    };
    let entity = in_class(entity_id, "entity_id", "Entity")?;
    let member = in_class(member_id, "member_id", "Member")?;
    unique(
        &lookups.ids_by_entity_and_member,
        &(entity_id, member_id),
        &["entity_id", "member_id"],
        || format!("{} is already a member in {}.", member.name, entity.name),
    )
}

impl Candidate for EntityGroupItem {
    type Lookups = EntityGroupLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_entity_group(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(e), Some(m)) = (self.entity_id, self.member_id) {
            lookups.ids_by_entity_and_member.insert((e, m), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(e), Some(m)) = (self.entity_id, self.member_id) {
            forget(&mut lookups.ids_by_entity_and_member, &(e, m), self.id);
        }
    }
}

// ------------- Parameter definition -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParameterDefinitionItem {
    pub id: Option<Id>,
    pub entity_class_id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_value: Option<EncodedValue>,
    pub parameter_value_list_id: Option<Id>,
}
mergeable!(ParameterDefinitionItem {
    id,
    entity_class_id,
    name,
    description,
    default_value,
    parameter_value_list_id
});

#[derive(Clone)]
pub struct ParameterDefinitionLookups {
    pub codec: Arc<dyn ValueCodec>,
    pub entity_class_names: Lookup<Id, String>,
    pub value_list_names: Lookup<Id, String>,
    pub ids_by_class_and_name: Lookup<(Id, String), Option<Id>>,
}

pub fn check_parameter_definition(
    item: &ParameterDefinitionItem,
    lookups: &ParameterDefinitionLookups,
) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "parameter")?;
    let class_id = required(item.entity_class_id, "entity_class_id", "parameter definition")?;
    let class = lookups.entity_class_names.get(&class_id).ok_or_else(|| {
        IntegrityError::new(format!("Entity class not found for parameter '{name}'.")).on(&["entity_class_id"])
    })?;
    unique(
        &lookups.ids_by_class_and_name,
        &(class_id, name.to_string()),
        &["entity_class_id", "name"],
        || format!("There's already a parameter called '{name}' in entity class '{class}'."),
    )?;
    if let Some(list_id) = item.parameter_value_list_id {
        if !lookups.value_list_names.contains_key(&list_id) {
            return Err(IntegrityError::new(format!("Invalid parameter value list for parameter '{name}'."))
                .on(&["parameter_value_list_id"]));
        }
    }
    if let Some(default) = &item.default_value {
        decodes(lookups.codec.as_ref(), default, "default_value", "default value")?;
    }
    Ok(())
}

impl Candidate for ParameterDefinitionItem {
    type Lookups = ParameterDefinitionLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_parameter_definition(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(class_id), Some(name)) = (self.entity_class_id, &self.name) {
            lookups
                .ids_by_class_and_name
                .insert((class_id, name.trim().to_string()), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(class_id), Some(name)) = (self.entity_class_id, &self.name) {
            forget(
                &mut lookups.ids_by_class_and_name,
                &(class_id, name.trim().to_string()),
                self.id,
            );
        }
    }
}

// ------------- Parameter value -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParameterValueItem {
    pub id: Option<Id>,
    pub parameter_definition_id: Option<Id>,
    pub entity_id: Option<Id>,
    /// Left out, the value goes to the `Base` alternative.
    pub alternative_id: Option<Id>,
    pub value: Option<EncodedValue>,
}
mergeable!(ParameterValueItem {
    id,
    parameter_definition_id,
    entity_id,
    alternative_id,
    value
});

#[derive(Clone)]
pub struct ParameterValueLookups {
    pub codec: Arc<dyn ValueCodec>,
    pub base_alternative_id: Option<Id>,
    pub definitions: Lookup<Id, DefinitionRef>,
    pub entities: Lookup<Id, EntityRef>,
    pub alternative_names: Lookup<Id, String>,
    /// Allowed encoded values per value list, in index order.
    pub value_lists: Lookup<Id, Vec<Vec<u8>>>,
    pub ids_by_entity_definition_and_alternative: Lookup<(Id, Id, Id), Option<Id>>,
}

pub fn check_parameter_value(
    item: &ParameterValueItem,
    lookups: &ParameterValueLookups,
) -> Result<(), IntegrityError> {
    let kind = "parameter value";
    let definition_id = required(item.parameter_definition_id, "parameter_definition_id", kind)?;
    let definition = lookups.definitions.get(&definition_id).ok_or_else(|| {
        IntegrityError::new(format!("Parameter definition {definition_id} not found.")).on(&["parameter_definition_id"])
    })?;
    let alternative_id = required(item.alternative_id, "alternative_id", kind)?;
    let alternative = lookups.alternative_names.get(&alternative_id).ok_or_else(|| {
        IntegrityError::new(format!("Alternative {alternative_id} not found.")).on(&["alternative_id"])
    })?;
    let value = item
        .value
        .as_ref()
        .ok_or_else(|| IntegrityError::new(format!("Missing value for {kind}.")).on(&["value"]))?;
    decodes(lookups.codec.as_ref(), value, "value", "value")?;
    if let Some(list_id) = definition.parameter_value_list_id {
        let allowed = lookups.value_lists.get(&list_id).map(Vec::as_slice).unwrap_or_default();
        if !allowed.contains(&value.bytes) {
            return Err(IntegrityError::new(format!(
                "The value '{value}' is not a valid value for parameter '{}' (valid values are: {})",
                definition.name,
                display_list(allowed)
            ))
            .on(&["value"]));
        }
    }
    let entity_id = required(item.entity_id, "entity_id", kind)?;
    let entity = lookups
        .entities
        .get(&entity_id)
        .ok_or_else(|| IntegrityError::new(format!("Entity {entity_id} not found.")).on(&["entity_id"]))?;
    if entity.class_id != definition.entity_class_id {
        return Err(IntegrityError::new(format!(
            "Incorrect entity '{}' for parameter '{}'.",
            entity.name, definition.name
        ))
        .on(&["entity_id"]));
    }
    unique(
        &lookups.ids_by_entity_definition_and_alternative,
        &(entity_id, definition_id, alternative_id),
        &["entity_id", "parameter_definition_id", "alternative_id"],
        || {
            format!(
                "The value of parameter '{}' for entity '{}' is already specified for alternative '{alternative}'.",
                definition.name, entity.name
            )
        },
    )
}

impl Candidate for ParameterValueItem {
    type Lookups = ParameterValueLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_parameter_value(self, lookups)
    }
    fn complete(&mut self, lookups: &Self::Lookups) {
        if self.alternative_id.is_none() {
            self.alternative_id = lookups.base_alternative_id;
        }
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(e), Some(d), Some(a)) = (self.entity_id, self.parameter_definition_id, self.alternative_id) {
            lookups
                .ids_by_entity_definition_and_alternative
                .insert((e, d, a), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(e), Some(d), Some(a)) = (self.entity_id, self.parameter_definition_id, self.alternative_id) {
            forget(
                &mut lookups.ids_by_entity_definition_and_alternative,
                &(e, d, a),
                self.id,
            );
        }
    }
}

// ------------- Parameter value list -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParameterValueListItem {
    pub id: Option<Id>,
    pub name: Option<String>,
    /// Encoded values in index order.
    pub value_list: Option<Vec<Vec<u8>>>,
}
mergeable!(ParameterValueListItem { id, name, value_list });

#[derive(Clone)]
pub struct ParameterValueListLookups {
    pub codec: Arc<dyn ValueCodec>,
    pub ids_by_name: Lookup<String, Option<Id>>,
}

pub fn check_parameter_value_list(
    item: &ParameterValueListItem,
    lookups: &ParameterValueListLookups,
) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "parameter value list")?;
    unique(&lookups.ids_by_name, &name.to_string(), &["name"], || {
        format!("There can't be more than one parameter value list called '{name}'.")
    })?;
    let values = item.value_list.as_deref().unwrap_or_default();
    if values.is_empty() {
        return Err(IntegrityError::new(format!("Value list '{name}' has no values.")).on(&["value_list"]));
    }
    let distinct: HashSet<&Vec<u8>, LookupHasher> = values.iter().collect();
    if distinct.len() != values.len() {
        return Err(IntegrityError::new("Values must be unique.").on(&["value_list"]));
    }
    for value in values {
        decodes(
            lookups.codec.as_ref(),
            &EncodedValue::new(value.clone(), None),
            "value_list",
            "value",
        )?;
    }
    Ok(())
}

impl Candidate for ParameterValueListItem {
    type Lookups = ParameterValueListLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_parameter_value_list(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            lookups.ids_by_name.insert(name.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            forget(&mut lookups.ids_by_name, &name.trim().to_string(), self.id);
        }
    }
}

// ------------- Tags -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParameterTagItem {
    pub id: Option<Id>,
    pub tag: Option<String>,
    pub description: Option<String>,
}
mergeable!(ParameterTagItem { id, tag, description });

#[derive(Debug, Clone, Default)]
pub struct ParameterTagLookups {
    pub ids_by_tag: Lookup<String, Option<Id>>,
}

pub fn check_parameter_tag(item: &ParameterTagItem, lookups: &ParameterTagLookups) -> Result<(), IntegrityError> {
    let tag = match item.tag.as_deref().map(str::trim) {
        Some(tag) if !tag.is_empty() => tag,
        _ => return Err(IntegrityError::new("Missing parameter tag.").on(&["tag"])),
    };
    unique(&lookups.ids_by_tag, &tag.to_string(), &["tag"], || {
        format!("There can't be more than one '{tag}' tag.")
    })
}

impl Candidate for ParameterTagItem {
    type Lookups = ParameterTagLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_parameter_tag(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(tag) = &self.tag {
            lookups.ids_by_tag.insert(tag.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(tag) = &self.tag {
            forget(&mut lookups.ids_by_tag, &tag.trim().to_string(), self.id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParameterDefinitionTagItem {
    pub id: Option<Id>,
    pub parameter_definition_id: Option<Id>,
    pub parameter_tag_id: Option<Id>,
}
mergeable!(ParameterDefinitionTagItem { id, parameter_definition_id, parameter_tag_id });

#[derive(Debug, Clone, Default)]
pub struct ParameterDefinitionTagLookups {
    pub definition_names: Lookup<Id, String>,
    pub tags: Lookup<Id, String>,
    pub ids_by_definition_and_tag: Lookup<(Id, Id), Option<Id>>,
}

pub fn check_parameter_definition_tag(
    item: &ParameterDefinitionTagItem,
    lookups: &ParameterDefinitionTagLookups,
) -> Result<(), IntegrityError> {
    let kind = "parameter definition tag";
    let definition_id = required(item.parameter_definition_id, "parameter_definition_id", kind)?;
    let tag_id = required(item.parameter_tag_id, "parameter_tag_id", kind)?;
    let definition = lookups.definition_names.get(&definition_id).ok_or_else(|| {
        IntegrityError::new(format!("Parameter definition {definition_id} not found.")).on(&["parameter_definition_id"])
    })?;
    let tag = lookups
        .tags
        .get(&tag_id)
        .ok_or_else(|| IntegrityError::new(format!("Parameter tag {tag_id} not found.")).on(&["parameter_tag_id"]))?;
    unique(
        &lookups.ids_by_definition_and_tag,
        &(definition_id, tag_id),
        &["parameter_definition_id", "parameter_tag_id"],
        || format!("Parameter '{definition}' already has the tag '{tag}'."),
    )
}

impl Candidate for ParameterDefinitionTagItem {
    type Lookups = ParameterDefinitionTagLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_parameter_definition_tag(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(d), Some(t)) = (self.parameter_definition_id, self.parameter_tag_id) {
            lookups.ids_by_definition_and_tag.insert((d, t), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(d), Some(t)) = (self.parameter_definition_id, self.parameter_tag_id) {
            forget(&mut lookups.ids_by_definition_and_tag, &(d, t), self.id);
        }
    }
}

// ------------- Tools and features -------------
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolItem {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub description: Option<String>,
}
mergeable!(ToolItem { id, name, description });

#[derive(Debug, Clone, Default)]
pub struct ToolLookups {
    pub ids_by_name: Lookup<String, Option<Id>>,
}

pub fn check_tool(item: &ToolItem, lookups: &ToolLookups) -> Result<(), IntegrityError> {
    let name = required_name(item.name.as_deref(), "tool")?;
    unique(&lookups.ids_by_name, &name.to_string(), &["name"], || {
        format!("There can't be more than one tool called '{name}'.")
    })
}

impl Candidate for ToolItem {
    type Lookups = ToolLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_tool(self, lookups)
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            lookups.ids_by_name.insert(name.trim().to_string(), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(name) = &self.name {
            forget(&mut lookups.ids_by_name, &name.trim().to_string(), self.id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureItem {
    pub id: Option<Id>,
    pub parameter_definition_id: Option<Id>,
    pub parameter_value_list_id: Option<Id>,
    pub description: Option<String>,
}
mergeable!(FeatureItem { id, parameter_definition_id, parameter_value_list_id, description });

#[derive(Debug, Clone, Default)]
pub struct FeatureLookups {
    pub definitions: Lookup<Id, DefinitionRef>,
    pub ids_by_definition: Lookup<Id, Option<Id>>,
}

pub fn check_feature(item: &FeatureItem, lookups: &FeatureLookups) -> Result<(), IntegrityError> {
    let kind = "feature";
    let definition_id = required(item.parameter_definition_id, "parameter_definition_id", kind)?;
    let definition = lookups.definitions.get(&definition_id).ok_or_else(|| {
        IntegrityError::new(format!("Parameter definition {definition_id} not found.")).on(&["parameter_definition_id"])
    })?;
    let list_id = required(item.parameter_value_list_id, "parameter_value_list_id", kind)?;
    if definition.parameter_value_list_id != Some(list_id) {
        return Err(IntegrityError::new(format!(
            "Feature's value list must be the value list of parameter '{}'.",
            definition.name
        ))
        .on(&["parameter_value_list_id"]));
    }
    unique(&lookups.ids_by_definition, &definition_id, &["parameter_definition_id"], || {
        format!("There's already a feature defined for parameter '{}'.", definition.name)
    })
}

impl Candidate for FeatureItem {
    type Lookups = FeatureLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_feature(self, lookups)
    }
    fn complete(&mut self, lookups: &Self::Lookups) {
        if self.parameter_value_list_id.is_none() {
            self.parameter_value_list_id = self
                .parameter_definition_id
                .and_then(|d| lookups.definitions.get(&d))
                .and_then(|d| d.parameter_value_list_id);
        }
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let Some(d) = self.parameter_definition_id {
            lookups.ids_by_definition.insert(d, self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let Some(d) = self.parameter_definition_id {
            forget(&mut lookups.ids_by_definition, &d, self.id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolFeatureItem {
    pub id: Option<Id>,
    pub tool_id: Option<Id>,
    pub feature_id: Option<Id>,
    pub parameter_value_list_id: Option<Id>,
    pub required: Option<bool>,
}
mergeable!(ToolFeatureItem { id, tool_id, feature_id, parameter_value_list_id, required });

#[derive(Debug, Clone, Default)]
pub struct ToolFeatureLookups {
    pub tool_names: Lookup<Id, String>,
    pub features: Lookup<Id, ListBinding>,
    pub ids_by_tool_and_feature: Lookup<(Id, Id), Option<Id>>,
}

pub fn check_tool_feature(item: &ToolFeatureItem, lookups: &ToolFeatureLookups) -> Result<(), IntegrityError> {
    let kind = "tool feature";
    let tool_id = required(item.tool_id, "tool_id", kind)?;
    let feature_id = required(item.feature_id, "feature_id", kind)?;
    let tool = lookups
        .tool_names
        .get(&tool_id)
        .ok_or_else(|| IntegrityError::new(format!("Tool {tool_id} not found.")).on(&["tool_id"]))?;
    let feature = lookups
        .features
        .get(&feature_id)
        .ok_or_else(|| IntegrityError::new(format!("Feature {feature_id} not found.")).on(&["feature_id"]))?;
    unique(
        &lookups.ids_by_tool_and_feature,
        &(tool_id, feature_id),
        &["tool_id", "feature_id"],
        || format!("Tool '{tool}' already has feature '{}'.", feature.name),
    )?;
    let list_id = required(item.parameter_value_list_id, "parameter_value_list_id", kind)?;
    if list_id != feature.parameter_value_list_id {
        return Err(IntegrityError::new(format!(
            "Tool feature's value list must be the value list of feature '{}'.",
            feature.name
        ))
        .on(&["parameter_value_list_id"]));
    }
    Ok(())
}

impl Candidate for ToolFeatureItem {
    type Lookups = ToolFeatureLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_tool_feature(self, lookups)
    }
    fn complete(&mut self, lookups: &Self::Lookups) {
        if self.parameter_value_list_id.is_none() {
            self.parameter_value_list_id = self
                .feature_id
                .and_then(|f| lookups.features.get(&f))
                .map(|f| f.parameter_value_list_id);
        }
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(t), Some(f)) = (self.tool_id, self.feature_id) {
            lookups.ids_by_tool_and_feature.insert((t, f), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(t), Some(f)) = (self.tool_id, self.feature_id) {
            forget(&mut lookups.ids_by_tool_and_feature, &(t, f), self.id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolFeatureMethodItem {
    pub id: Option<Id>,
    pub tool_feature_id: Option<Id>,
    pub parameter_value_list_id: Option<Id>,
    pub method_index: Option<i64>,
}
mergeable!(ToolFeatureMethodItem { id, tool_feature_id, parameter_value_list_id, method_index });

#[derive(Debug, Clone, Default)]
pub struct ToolFeatureMethodLookups {
    pub tool_features: Lookup<Id, ListBinding>,
    /// Value indices per value list.
    pub value_list_indices: Lookup<Id, Vec<i64>>,
    pub ids_by_tool_feature_and_method: Lookup<(Id, i64), Option<Id>>,
}

pub fn check_tool_feature_method(
    item: &ToolFeatureMethodItem,
    lookups: &ToolFeatureMethodLookups,
) -> Result<(), IntegrityError> {
    let kind = "tool feature method";
    let tool_feature_id = required(item.tool_feature_id, "tool_feature_id", kind)?;
    let method_index = required(item.method_index, "method_index", kind)?;
    let tool_feature = lookups.tool_features.get(&tool_feature_id).ok_or_else(|| {
        IntegrityError::new(format!("Tool feature {tool_feature_id} not found.")).on(&["tool_feature_id"])
    })?;
    let list_id = required(item.parameter_value_list_id, "parameter_value_list_id", kind)?;
    let indices = lookups.value_list_indices.get(&list_id).ok_or_else(|| {
        IntegrityError::new(format!("Parameter value list {list_id} not found.")).on(&["parameter_value_list_id"])
    })?;
    unique(
        &lookups.ids_by_tool_feature_and_method,
        &(tool_feature_id, method_index),
        &["tool_feature_id", "method_index"],
        || format!("Tool feature '{}' already has method {method_index}.", tool_feature.name),
    )?;
    if list_id != tool_feature.parameter_value_list_id {
        return Err(IntegrityError::new(format!(
            "Tool feature method's value list must be the value list of tool feature '{}'.",
            tool_feature.name
        ))
        .on(&["parameter_value_list_id"]));
    }
    if !indices.contains(&method_index) {
        return Err(IntegrityError::new(format!(
            "Method index {method_index} is not in the value list of tool feature '{}'.",
            tool_feature.name
        ))
        .on(&["method_index"]));
    }
    Ok(())
}

impl Candidate for ToolFeatureMethodItem {
    type Lookups = ToolFeatureMethodLookups;
    fn check(&self, lookups: &Self::Lookups) -> Result<(), IntegrityError> {
        check_tool_feature_method(self, lookups)
    }
    fn complete(&mut self, lookups: &Self::Lookups) {
        if self.parameter_value_list_id.is_none() {
            self.parameter_value_list_id = self
                .tool_feature_id
                .and_then(|tf| lookups.tool_features.get(&tf))
                .map(|tf| tf.parameter_value_list_id);
        }
    }
    fn register(&self, lookups: &mut Self::Lookups) {
        if let (Some(tf), Some(m)) = (self.tool_feature_id, self.method_index) {
            lookups.ids_by_tool_feature_and_method.insert((tf, m), self.id);
        }
    }
    fn unregister(&self, lookups: &mut Self::Lookups) {
        if let (Some(tf), Some(m)) = (self.tool_feature_id, self.method_index) {
            forget(&mut lookups.ids_by_tool_feature_and_method, &(tf, m), self.id);
        }
    }
}
