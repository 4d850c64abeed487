#![allow(dead_code)]

use std::path::PathBuf;

use serde_json::json;
use spinedb::check::*;
use spinedb::config::{MappingConfig, init_tracing};
use spinedb::mapping::DatabaseMapping;
use spinedb::model::{Id, Identified};
use spinedb::value::EncodedValue;
use tempfile::TempDir;

pub fn memory_db() -> DatabaseMapping {
    let config = MappingConfig {
        create: true,
        ..MappingConfig::default()
    };
    init_tracing(&config.log_filter);
    DatabaseMapping::open(&config).expect("in-memory db")
}

pub fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("spine.sqlite")
}

/// Opens (and on first use creates) the store in `dir`.
pub fn file_db(dir: &TempDir) -> DatabaseMapping {
    let config = MappingConfig {
        create: true,
        ..MappingConfig::for_path(store_path(dir))
    };
    init_tracing(&config.log_filter);
    DatabaseMapping::open(&config).expect("file db")
}

pub fn ids<R: Identified>(records: &[R]) -> Vec<Id> {
    records.iter().map(Identified::id).collect()
}

pub fn number(value: f64) -> EncodedValue {
    EncodedValue::json(&json!(value))
}

pub fn alternative(name: &str) -> AlternativeItem {
    AlternativeItem {
        name: Some(name.into()),
        ..Default::default()
    }
}

pub fn scenario(name: &str) -> ScenarioItem {
    ScenarioItem {
        name: Some(name.into()),
        ..Default::default()
    }
}

pub fn ranked(scenario_id: Id, alternative_id: Id, rank: i64) -> ScenarioAlternativeItem {
    ScenarioAlternativeItem {
        scenario_id: Some(scenario_id),
        alternative_id: Some(alternative_id),
        rank: Some(rank),
        ..Default::default()
    }
}

pub fn object_class(name: &str) -> ObjectClassItem {
    ObjectClassItem {
        name: Some(name.into()),
        ..Default::default()
    }
}

pub fn object(class_id: Id, name: &str) -> ObjectItem {
    ObjectItem {
        class_id: Some(class_id),
        name: Some(name.into()),
        ..Default::default()
    }
}

pub fn relationship_class(name: &str, members: &[Id]) -> RelationshipClassItem {
    RelationshipClassItem {
        name: Some(name.into()),
        object_class_id_list: Some(members.to_vec()),
        ..Default::default()
    }
}

pub fn relationship(class_id: Id, name: &str, members: &[Id]) -> RelationshipItem {
    RelationshipItem {
        class_id: Some(class_id),
        name: Some(name.into()),
        object_id_list: Some(members.to_vec()),
        ..Default::default()
    }
}

pub fn parameter(class_id: Id, name: &str) -> ParameterDefinitionItem {
    ParameterDefinitionItem {
        entity_class_id: Some(class_id),
        name: Some(name.into()),
        ..Default::default()
    }
}

pub fn value(definition_id: Id, entity_id: Id, alternative_id: Option<Id>, value: EncodedValue) -> ParameterValueItem {
    ParameterValueItem {
        parameter_definition_id: Some(definition_id),
        entity_id: Some(entity_id),
        alternative_id,
        value: Some(value),
        ..Default::default()
    }
}

/// Adds items that must all be accepted and returns their ids.
macro_rules! added {
    ($db:expr, $method:ident, $($item:expr),+ $(,)?) => {{
        let (records, errors) = $db
            .$method(vec![$($item),+], spinedb::check::Mode::strict())
            .expect(stringify!($method));
        assert!(errors.is_empty(), "{errors:?}");
        common::ids(&records)
    }};
}
