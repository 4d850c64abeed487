use rusqlite::Connection;
use spinedb::config::MappingConfig;
use spinedb::error::SpineError;
use spinedb::mapping::DatabaseMapping;
use spinedb::schema::{self, NEXT_ID, Table};

#[test]
fn an_empty_store_lists_every_table() {
    let conn = Connection::open_in_memory().expect("open");
    match DatabaseMapping::from_connection(conn, "anon") {
        Err(SpineError::SchemaMissing { tables, columns }) => {
            let mut expected: Vec<String> = Table::ALL.iter().map(|t| t.name().to_string()).collect();
            expected.push(NEXT_ID.to_string());
            assert_eq!(tables, expected);
            assert!(columns.is_empty());
        }
        other => panic!("expected a missing schema, got {:?}", other.err()),
    }
}

#[test]
fn tables_and_columns_are_reported_together() {
    let conn = Connection::open_in_memory().expect("open");
    schema::create_new_database(&conn).expect("create");
    conn.execute_batch(
        "drop table tool;
         alter table entity drop column description;",
    )
    .expect("damage the schema");
    let error = match DatabaseMapping::from_connection(conn, "anon") {
        Err(e) => e,
        Ok(_) => panic!("a damaged schema must be rejected"),
    };
    assert_eq!(
        error.to_string(),
        "Missing from the database schema: tables tool; columns entity.description"
    );
}

#[test]
fn opening_without_create_does_not_bootstrap() {
    let config = MappingConfig::default();
    assert!(!config.create);
    assert!(matches!(
        DatabaseMapping::open(&config),
        Err(SpineError::SchemaMissing { .. })
    ));
}

#[test]
fn bootstrapping_twice_keeps_a_single_base() {
    let conn = Connection::open_in_memory().expect("open");
    schema::create_new_database(&conn).expect("create");
    schema::create_new_database(&conn).expect("create again");
    let bases: i64 = conn
        .query_row("select count(*) from alternative where name = 'Base'", [], |row| row.get(0))
        .expect("count");
    assert_eq!(bases, 1);
    let mut db = DatabaseMapping::from_connection(conn, "anon").expect("mapping");
    assert_eq!(db.query::<spinedb::model::Commit>().expect("read").len(), 1);
}
