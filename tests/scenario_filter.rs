#[macro_use]
mod common;

use common::*;
use rusqlite::Connection;
use serde_json::json;
use spinedb::check::{FeatureItem, ParameterValueListItem, ToolFeatureItem, ToolFeatureMethodItem, ToolItem};
use spinedb::error::SpineError;
use spinedb::filter::{FilterState, NameOrId};
use spinedb::mapping::DatabaseMapping;
use spinedb::model::{Id, Object, ObjectParameterValue, ParameterValue};
use spinedb::schema;
use spinedb::value::EncodedValue;

struct Fixture {
    db: DatabaseMapping,
    u1: Id,
    capacity: Id,
    a1: Id,
    a2: Id,
    scenario: Id,
}

/// `u1.capacity` is 10 in A1 (rank 1) and 20 in A2 (rank 2) of scenario `S`.
fn fixture() -> Fixture {
    let mut db = memory_db();
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    let u1 = added!(db, add_objects, object(unit, "u1"))[0];
    let capacity = added!(db, add_parameter_definitions, parameter(unit, "capacity"))[0];
    let alternatives = added!(db, add_alternatives, alternative("A1"), alternative("A2"));
    let (a1, a2) = (alternatives[0], alternatives[1]);
    let scenario = added!(db, add_scenarios, common::scenario("S"))[0];
    added!(db, add_scenario_alternatives, ranked(scenario, a1, 1), ranked(scenario, a2, 2));
    added!(
        db,
        add_parameter_values,
        value(capacity, u1, Some(a1), number(10.0)),
        value(capacity, u1, Some(a2), number(20.0))
    );
    db.commit_session("fixture").expect("commit");
    Fixture {
        db,
        u1,
        capacity,
        a1,
        a2,
        scenario,
    }
}

fn values(db: &mut DatabaseMapping) -> Vec<EncodedValue> {
    db.query::<ParameterValue>()
        .expect("read")
        .into_iter()
        .map(|v| v.value)
        .collect()
}

#[test]
fn the_highest_ranked_alternative_wins() {
    let mut f = fixture();
    f.db.apply_scenario_filter("S").expect("filter");
    assert_eq!(values(&mut f.db), vec![number(20.0)]);
    assert_eq!(f.db.filters(), &[FilterState::Scenario(f.scenario)]);

    f.db.apply_scenario_filter(f.scenario).expect("filter by id");
    assert_eq!(values(&mut f.db), vec![number(20.0)]);
}

#[test]
fn named_value_rows_follow_the_scenario_filter() {
    let mut f = fixture();
    assert_eq!(f.db.query::<ObjectParameterValue>().expect("read").len(), 2);
    f.db.apply_scenario_filter("S").expect("filter");
    let kept = f.db.query::<ObjectParameterValue>().expect("read");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].object_class_name, "unit");
    assert_eq!(kept[0].object_name, "u1");
    assert_eq!(kept[0].parameter_id, f.capacity);
    assert_eq!(kept[0].parameter_name, "capacity");
    assert_eq!(kept[0].alternative_name, "A2");
    assert_eq!(kept[0].value, number(20.0));
}

#[test]
fn an_alternative_filter_keeps_only_the_listed_alternatives() {
    let mut f = fixture();
    f.db.apply_alternative_filter(["A1"]).expect("filter");
    let kept = f.db.query::<ParameterValue>().expect("read");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].alternative_id, f.a1);
    assert_eq!(kept[0].value, number(10.0));

    f.db.apply_alternative_filter([f.a1, f.a2]).expect("filter by ids");
    assert_eq!(values(&mut f.db).len(), 2);
    assert_eq!(f.db.filters().len(), 1, "re-applying replaces the installed filter");
}

#[test]
fn every_unresolved_alternative_is_reported() {
    let mut f = fixture();
    match f.db.apply_alternative_filter(["A1", "nope", "gone"]) {
        Err(SpineError::NotFound(message)) => assert_eq!(message, "Alternative(s) nope, gone not found"),
        other => panic!("expected not found, got {other:?}"),
    }
    let keys = vec![NameOrId::from("nope"), NameOrId::Id(99)];
    match f.db.apply_alternative_filter(keys) {
        Err(SpineError::NotFound(message)) => {
            assert_eq!(message, "Alternative(s) nope not found; Alternative id(s) 99 not found")
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(f.db.filters().is_empty(), "failed filters are not installed");
}

#[test]
fn an_unknown_scenario_is_not_found() {
    let mut f = fixture();
    match f.db.apply_scenario_filter("X") {
        Err(SpineError::NotFound(message)) => assert_eq!(message, "Scenario 'X' not found"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn a_scenario_ranking_two_alternatives_alike_is_rejected() {
    let conn = Connection::open_in_memory().expect("open");
    schema::create_new_database(&conn).expect("create");
    conn.execute_batch(
        "insert into alternative (id, name, description, commit_id) values (2, 'A1', null, 1), (3, 'A2', null, 1);
         insert into scenario (id, name, description, active, commit_id) values (1, 'S', null, 0, 1);
         drop table scenario_alternative;
         create table scenario_alternative (
             id integer not null primary key,
             scenario_id integer not null,
             alternative_id integer not null,
             rank integer not null,
             commit_id integer
         );
         insert into scenario_alternative values (1, 1, 2, 1, 1), (2, 1, 3, 1, 1);",
    )
    .expect("seed clashing ranks");
    let mut db = DatabaseMapping::from_connection(conn, "anon").expect("mapping");
    match db.apply_scenario_filter("S") {
        Err(SpineError::Integrity(error)) => {
            assert_eq!(error.message, "Scenario 'S' ranks more than one alternative at 1.");
            assert_eq!(error.id, Some(1));
        }
        other => panic!("expected an integrity error, got {other:?}"),
    }
    assert!(db.filters().is_empty());
}

#[test]
fn filters_compose_with_staged_rows() {
    let mut f = fixture();
    f.db.apply_scenario_filter("S").expect("filter");
    let a3 = added!(f.db, add_alternatives, alternative("A3"))[0];
    added!(f.db, add_scenario_alternatives, ranked(f.scenario, a3, 3));
    added!(f.db, add_parameter_values, value(f.capacity, f.u1, Some(a3), number(30.0)));
    assert_eq!(values(&mut f.db), vec![number(30.0)]);

    f.db.rollback_session().expect("rollback");
    assert_eq!(values(&mut f.db), vec![number(20.0)]);
}

#[test]
fn scenario_and_alternative_filters_stack() {
    let mut f = fixture();
    f.db.apply_scenario_filter("S").expect("scenario");
    f.db.apply_alternative_filter(["A1"]).expect("alternatives");
    assert_eq!(f.db.filters().len(), 2);
    assert!(values(&mut f.db).is_empty(), "the winner is not in the listed alternatives");

    f.db.clear_filters();
    assert!(f.db.filters().is_empty());
    assert_eq!(values(&mut f.db), vec![number(10.0), number(20.0)]);
}

#[test]
fn filtered_reads_do_not_affect_checks() {
    let mut f = fixture();
    f.db.apply_alternative_filter(Vec::<&str>::new()).expect("empty filter");
    assert!(values(&mut f.db).is_empty());
    let (added, errors) = f
        .db
        .add_parameter_values(
            vec![value(f.capacity, f.u1, Some(f.a1), number(11.0))],
            spinedb::check::Mode::collect(),
        )
        .expect("add");
    assert!(added.is_empty());
    assert!(errors[0].message.contains("already specified for alternative 'A1'"));
}

#[test]
fn a_tool_filter_keeps_entities_fit_for_the_tool() {
    let mut db = memory_db();
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    let node = added!(db, add_object_classes, object_class("node"))[0];
    let units = added!(db, add_objects, object(unit, "u1"), object(unit, "u2"), object(unit, "u3"));
    added!(db, add_objects, object(node, "n1"));
    let modes = added!(
        db,
        add_parameter_value_lists,
        ParameterValueListItem {
            name: Some("modes".into()),
            value_list: Some(vec![b"\"fast\"".to_vec(), b"\"slow\"".to_vec()]),
            ..Default::default()
        }
    )[0];
    let mut mode = parameter(unit, "mode");
    mode.parameter_value_list_id = Some(modes);
    let mode = added!(db, add_parameter_definitions, mode)[0];
    added!(
        db,
        add_parameter_values,
        value(mode, units[0], None, EncodedValue::json(&json!("fast"))),
        value(mode, units[1], None, EncodedValue::json(&json!("slow")))
    );
    let solver = added!(
        db,
        add_tools,
        ToolItem {
            name: Some("solver".into()),
            ..Default::default()
        }
    )[0];
    let feature = added!(
        db,
        add_features,
        FeatureItem {
            parameter_definition_id: Some(mode),
            ..Default::default()
        }
    )[0];
    let tool_feature = added!(
        db,
        add_tool_features,
        ToolFeatureItem {
            tool_id: Some(solver),
            feature_id: Some(feature),
            required: Some(true),
            ..Default::default()
        }
    )[0];
    added!(
        db,
        add_tool_feature_methods,
        ToolFeatureMethodItem {
            tool_feature_id: Some(tool_feature),
            method_index: Some(0),
            ..Default::default()
        }
    );

    db.apply_tool_filter("solver").expect("tool filter");
    let names: Vec<String> = db.query::<Object>().expect("read").into_iter().map(|o| o.name).collect();
    assert_eq!(names, vec!["u1".to_string()]);

    match db.apply_tool_filter("x") {
        Err(SpineError::NotFound(message)) => assert_eq!(message, "Tool 'x' not found."),
        other => panic!("expected not found, got {other:?}"),
    }
    db.clear_filters();
    assert_eq!(db.query::<Object>().expect("read").len(), 4);
}
