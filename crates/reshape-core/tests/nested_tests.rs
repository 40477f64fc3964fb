use pretty_assertions::assert_eq;
use reshape_core::{
    AddNestedArray, AddNestedObject, NestedKind, SchemaEvolver, SCHEMA_EVOLUTION_COUNT_TAG,
};
use reshape_schema::FieldSchema;
use reshape_test_utils::{
    as_record, assert_replays_cleanly, create_address_evolver, create_test_evolver,
};
use serde_json::json;

fn with_items() -> SchemaEvolver {
    create_test_evolver()
        .add_nested_array(AddNestedArray::new(
            "items",
            FieldSchema::any(),
            &create_address_evolver(),
        ))
        .unwrap()
}

fn with_home(step: impl FnOnce(AddNestedObject) -> AddNestedObject) -> SchemaEvolver {
    create_test_evolver()
        .add_nested(step(AddNestedObject::new(
            "home",
            FieldSchema::any(),
            json!({}),
            &create_address_evolver(),
        )))
        .unwrap()
}

#[test]
fn test_absent_nested_array_stays_absent() {
    let evolver = with_items();
    assert_eq!(evolver.transform(json!({})), json!({ "name": "", "age": 0 }));
}

#[test]
fn test_nested_array_items_migrate_independently() {
    let evolver = with_items();
    let output = evolver.transform(json!({
        "name": "Jon",
        "age": 3,
        "items": [{}, { "street": "Main" }, 7]
    }));
    assert_eq!(
        output,
        json!({
            "name": "Jon",
            "age": 3,
            "items": [
                { "street": "", "city": "" },
                { "street": "Main", "city": "" },
                7
            ]
        })
    );
}

#[test]
fn test_nested_array_default() {
    let evolver = create_test_evolver()
        .add_nested_array(
            AddNestedArray::new("items", FieldSchema::any(), &create_address_evolver())
                .with_default(vec![json!({ "street": "Elm" })]),
        )
        .unwrap();

    let paths = evolver.pipeline().paths();
    let entry = paths.get("items").unwrap();
    assert_eq!(entry.nested_migrator().unwrap().kind(), NestedKind::Array);

    assert_eq!(
        evolver.transform(json!({ "name": "", "age": 0 })),
        json!({ "name": "", "age": 0, "items": [{ "street": "Elm", "city": "" }] })
    );
}

#[test]
fn test_nested_object_default_is_migrated() {
    let evolver = with_home(|step| step);
    assert_eq!(
        evolver.transform(json!({})),
        json!({ "name": "", "age": 0, "home": { "street": "", "city": "" } })
    );
    assert_replays_cleanly(&evolver, &json!({}));
}

#[test]
fn test_nested_object_null_handling() {
    let strict = with_home(|step| step);
    assert_eq!(
        strict.transform(json!({ "name": "", "age": 0, "home": null })),
        json!({ "name": "", "age": 0, "home": { "street": "", "city": "" } })
    );

    let nullable = with_home(AddNestedObject::nullable);
    assert_eq!(
        nullable.transform(json!({ "name": "", "age": 0, "home": null })),
        json!({ "name": "", "age": 0, "home": null })
    );

    let optional = with_home(AddNestedObject::optional);
    assert_eq!(
        optional.transform(json!({ "name": "", "age": 0 })),
        json!({ "name": "", "age": 0 })
    );
}

#[test]
fn test_stale_nested_record_under_current_parent() {
    let evolver = with_home(|step| step);
    let record = json!({
        SCHEMA_EVOLUTION_COUNT_TAG: 3,
        "name": "Jon",
        "age": 1,
        "home": { "street": "Main" }
    });
    assert_eq!(
        evolver.transform(record),
        json!({ "name": "Jon", "age": 1, "home": { "street": "Main", "city": "" } })
    );
}

#[test]
fn test_nested_pipeline_evolves_on_its_own_timeline() {
    let street_only = SchemaEvolver::new()
        .add("street", FieldSchema::string(), json!(""))
        .unwrap();
    let old_parent = create_test_evolver()
        .add_nested(AddNestedObject::new("home", FieldSchema::any(), json!({}), &street_only))
        .unwrap();
    let new_parent = with_home(|step| step);

    let stored = old_parent.prepare_for_persistence(&json!({
        "name": "Jon",
        "age": 1,
        "home": { "street": "Main" }
    }));
    assert_eq!(stored["home"][SCHEMA_EVOLUTION_COUNT_TAG], json!(1));

    assert_eq!(
        new_parent.transform(stored),
        json!({ "name": "Jon", "age": 1, "home": { "street": "Main", "city": "" } })
    );
}

#[test]
fn test_renamed_nested_field_is_found_under_any_alias() {
    let evolver = with_home(|step| step).rename("home", "house").unwrap();

    let legacy = json!({ "name": "", "age": 0, "home": { "street": "Main" } });
    assert_eq!(
        evolver.transform(legacy),
        json!({ "name": "", "age": 0, "house": { "street": "Main", "city": "" } })
    );

    let stamped = evolver.prepare_for_persistence(&json!({
        "name": "",
        "age": 0,
        "house": { "street": "Main", "city": "" }
    }));
    assert_eq!(stamped["house"][SCHEMA_EVOLUTION_COUNT_TAG], json!(2));

    let stale = json!({
        SCHEMA_EVOLUTION_COUNT_TAG: 4,
        "name": "",
        "age": 0,
        "house": { "street": "Main" }
    });
    assert_eq!(
        evolver.transform(stale),
        json!({ "name": "", "age": 0, "house": { "street": "Main", "city": "" } })
    );
}

#[test]
fn test_removed_nested_field_is_not_reinserted() {
    let evolver = with_home(|step| step).remove("home").unwrap();

    assert_eq!(evolver.transform(json!({})), json!({ "name": "", "age": 0 }));
    assert_eq!(
        evolver.transform(json!({ SCHEMA_EVOLUTION_COUNT_TAG: 4, "name": "", "age": 0 })),
        json!({ "name": "", "age": 0 })
    );
    assert_eq!(
        evolver.transform(json!({ "name": "", "age": 0, "home": { "street": "x" } })),
        json!({ "name": "", "age": 0 })
    );
}

#[test]
fn test_nested_stamping_recurses_into_arrays() {
    let evolver = with_items();
    let stamped = evolver.prepare_for_persistence(&json!({
        "name": "",
        "age": 0,
        "items": [{ "street": "", "city": "" }, "not-a-record"]
    }));

    assert_eq!(stamped[SCHEMA_EVOLUTION_COUNT_TAG], json!(3));
    assert_eq!(stamped["items"][0][SCHEMA_EVOLUTION_COUNT_TAG], json!(2));
    assert_eq!(stamped["items"][1], json!("not-a-record"));

    assert_eq!(
        evolver.transform(stamped),
        json!({
            "name": "",
            "age": 0,
            "items": [{ "street": "", "city": "" }, "not-a-record"]
        })
    );
}

#[test]
fn test_fully_migrated_parent_with_stale_child_needs_migration() {
    let evolver = with_home(|step| step);
    let record = as_record(json!({
        "name": "",
        "age": 0,
        "home": { "street": "" }
    }));
    assert!(evolver.pipeline().needs_migration(&record));
    assert_eq!(evolver.pipeline().first_invalid(&record), Some(2));
}
