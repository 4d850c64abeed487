#[macro_use]
mod common;

use std::time::Duration;

use common::*;
use rusqlite::Connection;
use spinedb::allocator::IdAllocator;
use spinedb::check::Mode;
use spinedb::config::MappingConfig;
use spinedb::error::SpineError;
use spinedb::mapping::DatabaseMapping;
use spinedb::model::Alternative;
use spinedb::schema::{self, Table};
use tempfile::tempdir;

#[test]
fn two_writers_never_share_an_id() {
    let dir = tempdir().expect("tempdir");
    let mut first = file_db(&dir);
    let mut second = file_db(&dir);
    let a = added!(first, add_alternatives, alternative("from first"));
    let b = added!(second, add_alternatives, alternative("from second"));
    let c = added!(first, add_alternatives, alternative("first again"));
    assert!(a[0] < b[0] && b[0] < c[0], "{a:?} {b:?} {c:?}");

    second.commit_session("second").expect("commit");
    first.commit_session("first").expect("commit");
    let mut reader = file_db(&dir);
    let names: Vec<String> = reader
        .query::<Alternative>()
        .expect("read")
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["Base", "from first", "from second", "first again"]);
}

#[test]
fn a_missing_counter_falls_back_to_the_highest_id() {
    let mut conn = Connection::open_in_memory().expect("open");
    schema::create_new_database(&conn).expect("create");
    conn.execute(
        "insert into alternative (id, name, description, commit_id) values (41, 'imported', null, 1)",
        [],
    )
    .expect("insert");
    let allocator = IdAllocator::new("tester");
    assert_eq!(allocator.reserve(&mut conn, Table::Alternative, 2).expect("reserve"), 42);
    assert_eq!(allocator.reserve(&mut conn, Table::Alternative, 1).expect("reserve"), 44);
    assert_eq!(allocator.reserve(&mut conn, Table::Scenario, 1).expect("reserve"), 1);

    let user: String = conn
        .query_row("select user from next_id", [], |row| row.get(0))
        .expect("counter row");
    assert_eq!(user, "tester");
}

#[test]
fn member_rows_have_no_counter_of_their_own() {
    let mut conn = Connection::open_in_memory().expect("open");
    schema::create_new_database(&conn).expect("create");
    let allocator = IdAllocator::new("tester");
    assert!(matches!(
        allocator.reserve(&mut conn, Table::RelationshipEntity, 1),
        Err(SpineError::Persistence(_))
    ));
}

#[test]
fn a_locked_store_reports_concurrent_allocation() {
    let dir = tempdir().expect("tempdir");
    drop(file_db(&dir));
    let blocker = Connection::open(store_path(&dir)).expect("open");
    blocker.execute_batch("begin immediate;").expect("take the write lock");

    let mut conn = Connection::open(store_path(&dir)).expect("open");
    conn.busy_timeout(Duration::ZERO).expect("busy timeout");
    let allocator = IdAllocator::new("tester");
    match allocator.reserve(&mut conn, Table::Alternative, 1) {
        Err(SpineError::ConcurrentAllocation { table, .. }) => assert_eq!(table, "alternative"),
        other => panic!("expected concurrent allocation, got {other:?}"),
    }

    let config = MappingConfig {
        busy_timeout_ms: 0,
        ..MappingConfig::for_path(store_path(&dir))
    };
    let mut db = DatabaseMapping::open(&config).expect("open mapping");
    let result = db.add_alternatives(vec![alternative("blocked")], Mode::strict());
    assert!(matches!(result, Err(SpineError::ConcurrentAllocation { .. })));
    assert!(!db.has_pending_changes());

    blocker.execute_batch("rollback;").expect("release");
    added!(db, add_alternatives, alternative("unblocked"));
}
