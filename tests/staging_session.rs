#[macro_use]
mod common;

use common::*;
use spinedb::check::{AlternativeItem, Mode, ObjectClassItem};
use spinedb::error::SpineError;
use spinedb::kinds::ItemKind;
use spinedb::model::{
    Alternative, Commit, Entity, EntityClass, Object, ObjectClass, ParameterValue, Relationship, RelationshipClass,
};
use spinedb::schema::Table;
use spinedb::view::ViewName;
use tempfile::tempdir;

#[test]
fn staged_items_stay_private_until_commit() {
    let dir = tempdir().expect("tempdir");
    let mut writer = file_db(&dir);
    added!(writer, add_alternatives, alternative("draft"));
    assert!(writer.query::<Alternative>().expect("read").iter().any(|a| a.name == "draft"));

    let mut reader = file_db(&dir);
    let seen = reader.query::<Alternative>().expect("read");
    assert!(seen.iter().all(|a| a.name != "draft"), "staged rows are invisible elsewhere");

    writer.commit_session("draft").expect("commit");
    let mut fresh = file_db(&dir);
    assert!(fresh.query::<Alternative>().expect("read").iter().any(|a| a.name == "draft"));
}

#[test]
fn rollback_restores_the_merged_view() {
    let mut db = memory_db();
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    added!(db, add_objects, object(unit, "u1"), object(unit, "u2"));
    db.commit_session("seed").expect("commit");
    let classes = db.query::<EntityClass>().expect("read");
    let entities = db.query::<Entity>().expect("read");

    added!(db, add_objects, object(unit, "u3"));
    let (updated, _) = db
        .update_object_classes(
            vec![ObjectClassItem {
                id: Some(unit),
                description: Some("units".into()),
                ..Default::default()
            }],
            Mode::strict(),
        )
        .expect("update");
    assert_eq!(updated[0].description.as_deref(), Some("units"));
    let u1 = entities.iter().find(|e| e.name == "u1").expect("u1").id;
    db.remove_items(ItemKind::Entity, &[u1]).expect("remove");
    assert!(db.has_pending_changes());

    db.rollback_session().expect("rollback");
    assert_eq!(db.query::<EntityClass>().expect("read"), classes);
    assert_eq!(db.query::<Entity>().expect("read"), entities);
    assert!(!db.has_pending_changes());
    assert!(matches!(db.rollback_session(), Err(SpineError::NothingToRollback)));
}

#[test]
fn commit_writes_one_commit_row_and_survives_reopening() {
    let dir = tempdir().expect("tempdir");
    let mut db = file_db(&dir);
    let commits_before = db.query::<Commit>().expect("read").len();
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    let ids = added!(db, add_objects, object(unit, "u1"), object(unit, "u2"));
    db.update_objects(
        vec![spinedb::check::ObjectItem {
            id: Some(ids[0]),
            name: Some("first".into()),
            ..Default::default()
        }],
        Mode::strict(),
    )
    .expect("update");
    db.remove_items(ItemKind::Entity, &[ids[1]]).expect("remove");
    let staged = db.query::<Object>().expect("read");
    db.commit_session("c").expect("commit");
    assert!(!db.has_pending_changes());

    let mut reopened = file_db(&dir);
    assert_eq!(reopened.query::<Object>().expect("read"), staged);
    let commits = reopened.query::<Commit>().expect("read");
    assert_eq!(commits.len(), commits_before + 1);
    let new: Vec<&Commit> = commits.iter().filter(|c| c.comment == "c").collect();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].user.as_deref(), Some("anon"));
    assert!(
        staged.iter().all(|o| o.commit_id == Some(new[0].id)),
        "every staged row references the session commit"
    );
}

#[test]
fn updates_of_fresh_items_overwrite_their_shadow_row() {
    let mut db = memory_db();
    let id = added!(db, add_alternatives, alternative("draft"))[0];
    for description in ["one", "two"] {
        db.update_alternatives(
            vec![AlternativeItem {
                id: Some(id),
                description: Some(description.into()),
                ..Default::default()
            }],
            Mode::strict(),
        )
        .expect("update");
    }
    let shadow_rows: i64 = db
        .connection()
        .query_row(
            &format!("select count(*) from {} where id = ?1", Table::Alternative.shadow()),
            [id],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(shadow_rows, 1);
    let visible: Vec<Alternative> = db
        .query::<Alternative>()
        .expect("read")
        .into_iter()
        .filter(|a| a.id == id)
        .collect();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].description.as_deref(), Some("two"));
}

#[test]
fn updates_of_committed_items_supersede_the_original() {
    let mut db = memory_db();
    let id = added!(db, add_alternatives, alternative("draft"))[0];
    db.commit_session("seed").expect("commit");
    db.update_alternatives(
        vec![AlternativeItem {
            id: Some(id),
            name: Some("final".into()),
            ..Default::default()
        }],
        Mode::strict(),
    )
    .expect("update");
    let names: Vec<String> = db.query::<Alternative>().expect("read").into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["Base".to_string(), "final".to_string()]);
    let tracked = db.staging().tracked(Table::Alternative).expect("tracked");
    assert!(tracked.dirty.contains(id as u64));
}

#[test]
fn repeated_targets_in_one_batch_fold_into_a_single_update() {
    let mut db = memory_db();
    let id = added!(db, add_alternatives, alternative("a"))[0];
    db.commit_session("seed").expect("commit");
    let (updated, errors) = db
        .update_alternatives(
            vec![
                AlternativeItem {
                    id: Some(id),
                    name: Some("renamed".into()),
                    description: Some("x".into()),
                    ..Default::default()
                },
                AlternativeItem {
                    id: Some(id),
                    description: Some("y".into()),
                    ..Default::default()
                },
            ],
            Mode::collect(),
        )
        .expect("update");
    assert!(errors.is_empty());
    assert_eq!(updated.len(), 1);
    let visible: Vec<Alternative> = db
        .query::<Alternative>()
        .expect("read")
        .into_iter()
        .filter(|a| a.id == id)
        .collect();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].name, "renamed");
    assert_eq!(visible[0].description.as_deref(), Some("y"));

    db.commit_session("twice").expect("commit");
    assert_eq!(db.query::<Alternative>().expect("read").len(), 2);
}

#[test]
fn updating_a_removed_item_is_a_stale_reference() {
    let mut db = memory_db();
    let id = added!(db, add_alternatives, alternative("draft"))[0];
    db.remove_items(ItemKind::Alternative, &[id]).expect("remove");
    let result = db.update_alternatives(
        vec![AlternativeItem {
            id: Some(id),
            description: Some("late".into()),
            ..Default::default()
        }],
        Mode::collect(),
    );
    assert!(matches!(result, Err(SpineError::StaleReference(_))));
    assert!(matches!(
        db.remove_items(ItemKind::Alternative, &[id]),
        Err(SpineError::StaleReference(_))
    ));
}

#[test]
fn unknown_update_targets_are_logged() {
    let mut db = memory_db();
    let (updated, errors) = db
        .update_alternatives(
            vec![AlternativeItem {
                id: Some(404),
                name: Some("ghost".into()),
                ..Default::default()
            }],
            Mode::collect(),
        )
        .expect("collect");
    assert!(updated.is_empty());
    assert_eq!(errors[0].message, "Alternative 404 not found.");
}

#[test]
fn nothing_to_commit_on_a_clean_mapping() {
    let mut db = memory_db();
    assert!(!db.has_pending_changes());
    assert!(matches!(db.commit_session("empty"), Err(SpineError::NothingToCommit)));
}

#[test]
fn removing_a_class_cascades_to_everything_built_on_it() {
    let mut db = memory_db();
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    let node = added!(db, add_object_classes, object_class("node"))[0];
    let u1 = added!(db, add_objects, object(unit, "u1"))[0];
    let n1 = added!(db, add_objects, object(node, "n1"))[0];
    let unit_node = added!(db, add_relationship_classes, relationship_class("unit__node", &[unit, node]))[0];
    added!(db, add_relationships, relationship(unit_node, "u1__n1", &[u1, n1]));
    let capacity = added!(db, add_parameter_definitions, parameter(unit, "capacity"))[0];
    added!(db, add_parameter_values, value(capacity, u1, None, number(5.0)));
    db.commit_session("seed").expect("commit");

    let counts = db.remove_items(ItemKind::EntityClass, &[unit]).expect("remove");
    assert_eq!(counts.get(&Table::EntityClass), Some(&2), "unit and unit__node");
    assert_eq!(counts.get(&Table::Entity), Some(&2), "u1 and u1__n1");
    assert!(db.query::<RelationshipClass>().expect("read").is_empty());
    assert!(db.query::<Relationship>().expect("read").is_empty());
    assert!(db.query::<ParameterValue>().expect("read").is_empty());
    let classes: Vec<String> = db.query::<ObjectClass>().expect("read").into_iter().map(|c| c.name).collect();
    assert_eq!(classes, vec!["node".to_string()]);
    assert_eq!(db.query::<Object>().expect("read").len(), 1);
}

#[test]
fn the_base_alternative_cannot_be_removed() {
    let mut db = memory_db();
    match db.remove_items(ItemKind::Alternative, &[1]) {
        Err(SpineError::Integrity(e)) => assert_eq!(e.message, "Can't remove the Base alternative."),
        other => panic!("expected an integrity error, got {other:?}"),
    }
}

#[test]
fn staging_only_invalidates_views_reading_the_touched_tables() {
    let mut db = memory_db();
    let unit = added!(db, add_object_classes, object_class("unit"))[0];
    db.query::<Object>().expect("read");
    let read = db
        .view_cache()
        .graph()
        .tables_read_by(ViewName::Object)
        .cloned()
        .expect("object view recorded");
    assert!(read.contains(&Table::Entity));
    assert!(!read.contains(&Table::Alternative));

    added!(db, add_alternatives, alternative("A1"));
    assert!(db.view_cache().is_cached(ViewName::Object));

    added!(db, add_objects, object(unit, "u1"));
    assert!(!db.view_cache().is_cached(ViewName::Object));
    assert_eq!(db.query::<Object>().expect("read").len(), 1);
}
