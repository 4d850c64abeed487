use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use serde_json::json;
use spinedb::check::{Mode, ObjectClassItem, ObjectItem, ParameterDefinitionItem, ParameterValueItem};
use spinedb::config::MappingConfig;
use spinedb::mapping::DatabaseMapping;
use spinedb::model::{Id, Object, ParameterValue};
use spinedb::value::EncodedValue;

fn fresh() -> DatabaseMapping {
    let config = MappingConfig {
        create: true,
        ..MappingConfig::default()
    };
    DatabaseMapping::open(&config).expect("in-memory db")
}

fn objects(class_id: Id, n: usize) -> Vec<ObjectItem> {
    (0..n)
        .map(|i| ObjectItem {
            class_id: Some(class_id),
            name: Some(format!("unit_{i}")),
            ..Default::default()
        })
        .collect()
}

/// A store with `n` units, each with a committed capacity, plus the same
/// number of staged ones on top.
fn populated(n: usize) -> DatabaseMapping {
    let mut db = fresh();
    let (classes, _) = db
        .add_object_classes(
            vec![ObjectClassItem {
                name: Some("unit".into()),
                ..Default::default()
            }],
            Mode::strict(),
        )
        .expect("class");
    let unit = classes[0].id;
    let (definitions, _) = db
        .add_parameter_definitions(
            vec![ParameterDefinitionItem {
                entity_class_id: Some(unit),
                name: Some("capacity".into()),
                ..Default::default()
            }],
            Mode::strict(),
        )
        .expect("definition");
    let (units, _) = db.add_objects(objects(unit, 2 * n), Mode::strict()).expect("objects");
    let values: Vec<ParameterValueItem> = units
        .iter()
        .enumerate()
        .map(|(i, u)| ParameterValueItem {
            parameter_definition_id: Some(definitions[0].id),
            entity_id: Some(u.id),
            value: Some(EncodedValue::json(&json!(i))),
            ..Default::default()
        })
        .collect();
    let (committed, staged) = values.split_at(n);
    db.add_parameter_values(committed.to_vec(), Mode::strict()).expect("values");
    db.commit_session("benchmark").expect("commit");
    db.add_parameter_values(staged.to_vec(), Mode::strict()).expect("staged values");
    db
}

pub fn criterion_benchmark(c: &mut Criterion) {
    for n in [10, 1000, 10000] {
        c.bench_function(&format!("stage {n} objects"), |b| {
            b.iter_batched(
                || {
                    let mut db = fresh();
                    let (classes, _) = db
                        .add_object_classes(
                            vec![ObjectClassItem {
                                name: Some("unit".into()),
                                ..Default::default()
                            }],
                            Mode::strict(),
                        )
                        .expect("class");
                    (db, classes[0].id)
                },
                |(mut db, unit)| black_box(db.add_objects(objects(unit, n), Mode::strict()).expect("objects")),
                BatchSize::LargeInput,
            )
        });
    }
    for n in [10, 1000, 10000] {
        let mut db = populated(n);
        c.bench_function(&format!("merged read {n}+{n} values"), |b| {
            b.iter(|| black_box(db.query::<ParameterValue>().expect("read")))
        });
        c.bench_function(&format!("merged read {} objects", 2 * n), |b| {
            b.iter(|| black_box(db.query::<Object>().expect("read")))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
