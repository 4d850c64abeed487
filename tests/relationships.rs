#[macro_use]
mod common;

use common::*;
use spinedb::check::{
    EntityGroupItem, Mode, ParameterDefinitionTagItem, ParameterTagItem, ParameterValueListItem, RelationshipItem,
};
use spinedb::model::{
    MemberEntity, ObjectGroup, ObjectParameterDefinition, ParameterValueList, Relationship, RelationshipClass,
    RelationshipParameterDefinition, RelationshipParameterValue, WideParameterDefinitionTag, WideScenario,
};

fn unit_node_classes(db: &mut spinedb::mapping::DatabaseMapping) -> (i64, i64, i64) {
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    let node = added!(db, add_object_classes, object_class("node"))[0];
    let unit_node = added!(db, add_relationship_classes, relationship_class("unit__node", &[unit, node]))[0];
    (unit, node, unit_node)
}

#[test]
fn members_must_follow_the_class_dimensions_in_order() {
    let mut db = memory_db();
    let (unit, node, unit_node) = unit_node_classes(&mut db);
    let u1 = added!(db, add_objects, object(unit, "u1"))[0];
    let n1 = added!(db, add_objects, object(node, "n1"))[0];

    let (added, errors) = db
        .add_relationships(
            vec![
                relationship(unit_node, "swapped", &[n1, u1]),
                relationship(unit_node, "short", &[u1]),
                relationship(unit_node, "u1__n1", &[u1, n1]),
            ],
            Mode::collect(),
        )
        .expect("add");
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].name, "u1__n1");
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0].message,
        "Incorrect objects 'n1, u1' for relationship class 'unit__node'."
    );
    assert_eq!(errors[1].message, "Incorrect objects 'u1' for relationship class 'unit__node'.");
    assert_eq!(errors[0].fields, vec!["object_id_list"]);
}

#[test]
fn the_same_members_cannot_be_related_twice() {
    let mut db = memory_db();
    let (unit, node, unit_node) = unit_node_classes(&mut db);
    let u1 = added!(db, add_objects, object(unit, "u1"))[0];
    let n1 = added!(db, add_objects, object(node, "n1"))[0];
    let first = added!(db, add_relationships, relationship(unit_node, "first", &[u1, n1]))[0];
    let (added, errors) = db
        .add_relationships(vec![relationship(unit_node, "second", &[u1, n1])], Mode::collect())
        .expect("add");
    assert!(added.is_empty());
    assert_eq!(errors[0].id, Some(first));
}

#[test]
fn wide_records_list_members_by_dimension() {
    let mut db = memory_db();
    let (unit, node, unit_node) = unit_node_classes(&mut db);
    let objects = added!(db, add_objects, object(unit, "u1"), object(node, "n1"), object(node, "n2"));
    added!(
        db,
        add_relationships,
        relationship(unit_node, "u1__n2", &[objects[0], objects[2]]),
        relationship(unit_node, "u1__n1", &[objects[0], objects[1]])
    );
    db.commit_session("relationships").expect("commit");

    let classes = db.query::<RelationshipClass>().expect("read");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].object_class_id_list, vec![unit, node]);
    assert_eq!(classes[0].object_class_name_list, vec!["unit", "node"]);

    let relationships = db.query::<Relationship>().expect("read");
    let u1_n2 = relationships.iter().find(|r| r.name == "u1__n2").expect("u1__n2");
    assert_eq!(u1_n2.object_id_list, vec![objects[0], objects[2]]);
    assert_eq!(u1_n2.object_name_list, vec!["u1", "n2"]);
    assert_eq!(u1_n2.object_class_id_list, vec![unit, node]);

    let members: Vec<MemberEntity> = db
        .query::<MemberEntity>()
        .expect("read")
        .into_iter()
        .filter(|m| m.relationship_id == u1_n2.id)
        .collect();
    assert_eq!(members.iter().map(|m| m.dimension).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn renaming_a_member_shows_up_in_the_wide_view() {
    let mut db = memory_db();
    let (unit, node, unit_node) = unit_node_classes(&mut db);
    let objects = added!(db, add_objects, object(unit, "u1"), object(node, "n1"));
    let id = added!(db, add_relationships, relationship(unit_node, "link", &objects))[0];
    db.update_objects(
        vec![spinedb::check::ObjectItem {
            id: Some(objects[1]),
            name: Some("hub".into()),
            ..Default::default()
        }],
        Mode::strict(),
    )
    .expect("rename");
    let relationships = db.query::<Relationship>().expect("read");
    assert_eq!(relationships[0].id, id);
    assert_eq!(relationships[0].object_name_list, vec!["u1", "hub"]);
}

#[test]
fn updating_members_rechecks_the_class() {
    let mut db = memory_db();
    let (unit, node, unit_node) = unit_node_classes(&mut db);
    let objects = added!(db, add_objects, object(unit, "u1"), object(node, "n1"), object(unit, "u2"));
    let id = added!(db, add_relationships, relationship(unit_node, "link", &objects[..2]))[0];
    let (updated, errors) = db
        .update_relationships(
            vec![RelationshipItem {
                id: Some(id),
                object_id_list: Some(vec![objects[0], objects[2]]),
                ..Default::default()
            }],
            Mode::collect(),
        )
        .expect("update");
    assert!(updated.is_empty());
    assert_eq!(
        errors[0].message,
        "Incorrect objects 'u1, u2' for relationship class 'unit__node'."
    );
}

#[test]
fn wide_scenarios_and_value_lists_keep_their_order() {
    let mut db = memory_db();
    let alternatives = added!(db, add_alternatives, alternative("low"), alternative("high"));
    let s = added!(db, add_scenarios, scenario("stress"))[0];
    added!(
        db,
        add_scenario_alternatives,
        ranked(s, alternatives[1], 2),
        ranked(s, alternatives[0], 1)
    );
    added!(
        db,
        add_parameter_value_lists,
        ParameterValueListItem {
            name: Some("sizes".into()),
            value_list: Some(vec![b"\"s\"".to_vec(), b"\"m\"".to_vec(), b"\"l\"".to_vec()]),
            ..Default::default()
        }
    );

    let scenarios = db.query::<WideScenario>().expect("read");
    assert_eq!(scenarios[0].alternative_id_list, vec![alternatives[0], alternatives[1]]);
    assert_eq!(scenarios[0].alternative_name_list, vec!["low", "high"]);

    let lists = db.query::<ParameterValueList>().expect("read");
    assert_eq!(lists[0].value_index_list, vec![0, 1, 2]);
    assert_eq!(
        lists[0].value_list,
        vec![b"\"s\"".to_vec(), b"\"m\"".to_vec(), b"\"l\"".to_vec()]
    );
}

#[test]
fn value_lists_read_back_every_byte() {
    let mut db = memory_db();
    let values = vec![br#"{"a;b": 1, "c,d": 2}"#.to_vec(), b"\"x;y\"".to_vec()];
    let (added, errors) = db
        .add_parameter_value_lists(
            vec![ParameterValueListItem {
                name: Some("awkward".into()),
                value_list: Some(values.clone()),
                ..Default::default()
            }],
            Mode::strict(),
        )
        .expect("add");
    assert!(errors.is_empty());
    assert_eq!(added[0].value_list, values);
    assert_eq!(db.query::<ParameterValueList>().expect("read")[0].value_list, values);
}

fn tag(name: &str) -> ParameterTagItem {
    ParameterTagItem {
        tag: Some(name.into()),
        ..Default::default()
    }
}

fn tagged(definition: i64, tag: i64) -> ParameterDefinitionTagItem {
    ParameterDefinitionTagItem {
        parameter_definition_id: Some(definition),
        parameter_tag_id: Some(tag),
        ..Default::default()
    }
}

#[test]
fn named_views_carry_classes_members_tags_and_groups() {
    let mut db = memory_db();
    let (unit, node, unit_node) = unit_node_classes(&mut db);
    let units = added!(db, add_objects, object(unit, "u1"), object(unit, "fleet"));
    let n1 = added!(db, add_objects, object(node, "n1"))[0];
    let link = added!(db, add_relationships, relationship(unit_node, "u1__n1", &[units[0], n1]))[0];
    let sizes = added!(
        db,
        add_parameter_value_lists,
        ParameterValueListItem {
            name: Some("sizes".into()),
            value_list: Some(vec![b"\"s\"".to_vec(), b"\"l\"".to_vec()]),
            ..Default::default()
        }
    )[0];
    let mut capacity = parameter(unit, "capacity");
    capacity.parameter_value_list_id = Some(sizes);
    let capacity = added!(db, add_parameter_definitions, capacity)[0];
    let flow = added!(db, add_parameter_definitions, parameter(unit_node, "flow"))[0];
    let tags = added!(db, add_parameter_tags, tag("physical"), tag("economic"));
    added!(
        db,
        add_parameter_definition_tags,
        tagged(capacity, tags[1]),
        tagged(capacity, tags[0])
    );
    added!(db, add_parameter_values, value(flow, link, None, number(1.5)));
    added!(
        db,
        add_entity_groups,
        EntityGroupItem {
            entity_class_id: Some(unit),
            entity_id: Some(units[1]),
            member_id: Some(units[0]),
            ..Default::default()
        }
    );

    let wide_tags = db.query::<WideParameterDefinitionTag>().expect("read");
    assert_eq!(wide_tags.len(), 2, "untagged definitions are listed too");
    let definitions = db.query::<ObjectParameterDefinition>().expect("read");
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].object_class_name, "unit");
    assert_eq!(definitions[0].parameter_name, "capacity");
    assert_eq!(definitions[0].value_list_name.as_deref(), Some("sizes"));
    assert_eq!(definitions[0].parameter_tag_id_list, tags);
    assert_eq!(definitions[0].parameter_tag_list, vec!["physical", "economic"]);

    let definitions = db.query::<RelationshipParameterDefinition>().expect("read");
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].relationship_class_name, "unit__node");
    assert_eq!(definitions[0].object_class_name_list, vec!["unit", "node"]);
    assert!(definitions[0].parameter_tag_list.is_empty());
    assert_eq!(definitions[0].value_list_id, None);

    let values = db.query::<RelationshipParameterValue>().expect("read");
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].relationship_id, link);
    assert_eq!(values[0].object_id_list, vec![units[0], n1]);
    assert_eq!(values[0].object_name_list, vec!["u1", "n1"]);
    assert_eq!(values[0].alternative_name, "Base");
    assert_eq!(values[0].value, number(1.5));

    let groups = db.query::<ObjectGroup>().expect("read");
    assert_eq!(groups.len(), 1);
    assert_eq!(
        (groups[0].class_name.as_str(), groups[0].group_name.as_str(), groups[0].member_name.as_str()),
        ("unit", "fleet", "u1")
    );
}
