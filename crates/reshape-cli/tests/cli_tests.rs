use pretty_assertions::assert_eq;
use reshape_cli::{
    encode_records, inspect, load_evolver, migrate_records, read_records, select_codec,
    stamp_records, MigrateOptions, PathSummary,
};
use reshape_codec::{default_codecs, DocumentShape};
use reshape_core::SCHEMA_EVOLUTION_COUNT_TAG;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PIPELINE: &str = r#"
ending_schema:
  type: object
  properties:
    fullName: { type: string }
    age: { type: number }
  required: [fullName, age]
nested:
  tag:
    steps:
      - { op: add, path: label, default: "" }
steps:
  - { op: add, path: name, schema: { type: string }, default: "" }
  - { op: add, path: age, schema: { type: number }, default: 0 }
  - { op: release_version, version: 1 }
  - { op: rename, from: name, to: fullName }
  - { op: add_nested_array, path: tags, pipeline: tag, default: [] }
"#;

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn options(strip_markers: bool, validate: bool) -> MigrateOptions {
    MigrateOptions {
        strip_markers,
        validate,
    }
}

#[test]
fn test_migrate_file_of_records() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = write(&dir, "pipeline.yaml", PIPELINE);
    let input = write(
        &dir,
        "people.json",
        r#"[{ "name": "Jon" }, { "fullName": "Ann", "age": 4, "tags": [{}] }]"#,
    );

    let evolver = load_evolver(&pipeline).unwrap();
    let registry = default_codecs();
    let codec = select_codec(&registry, Some(input.as_path()), "yaml").unwrap();
    assert_eq!(codec.format(), "json");

    let (records, shape) = read_records(Some(input.as_path()), codec).unwrap();
    assert_eq!(shape, DocumentShape::Array);
    let migrated = migrate_records(&evolver, records, options(true, true)).unwrap();
    assert_eq!(
        migrated,
        vec![
            json!({ "age": 0, "fullName": "Jon", "tags": [] }),
            json!({ "fullName": "Ann", "age": 4, "tags": [{ "label": "" }] }),
        ]
    );

    let text = encode_records(migrated, shape, codec).unwrap();
    let decoded: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded.as_array().map(Vec::len), Some(2));
}

#[test]
fn test_single_record_array_stays_an_array() {
    let dir = tempfile::tempdir().unwrap();
    let evolver = load_evolver(&write(&dir, "pipeline.yaml", PIPELINE)).unwrap();
    let input = write(&dir, "one.json", r#"[{ "fullName": "Ann", "age": 4, "tags": [] }]"#);
    let registry = default_codecs();
    let codec = select_codec(&registry, Some(input.as_path()), "json").unwrap();

    let (records, shape) = read_records(Some(input.as_path()), codec).unwrap();
    let migrated = migrate_records(&evolver, records, options(true, false)).unwrap();
    let text = encode_records(migrated, shape, codec).unwrap();
    let decoded: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, json!([{ "fullName": "Ann", "age": 4, "tags": [] }]));

    let bare = write(&dir, "bare.json", r#"{ "fullName": "Ann", "age": 4, "tags": [] }"#);
    let (records, shape) = read_records(Some(bare.as_path()), codec).unwrap();
    let text = encode_records(records, shape, codec).unwrap();
    assert!(serde_json::from_str::<Value>(&text).unwrap().is_object());
}

#[test]
fn test_validate_reports_bad_record() {
    let dir = tempfile::tempdir().unwrap();
    let evolver = load_evolver(&write(&dir, "pipeline.yaml", PIPELINE)).unwrap();

    let err = migrate_records(&evolver, vec![json!({ "name": 5 })], options(true, true)).unwrap_err();
    assert!(format!("{err:#}").contains("record 0 failed validation"));

    let unchecked = migrate_records(&evolver, vec![json!({ "name": 5 })], options(true, false)).unwrap();
    assert_eq!(unchecked[0]["fullName"], json!(5));
}

#[test]
fn test_stamp_then_migrate_keeps_markers_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let evolver = load_evolver(&write(&dir, "pipeline.json", &yaml_to_json(PIPELINE))).unwrap();

    let stamped = stamp_records(&evolver, &[json!({ "fullName": "Jon", "age": 1, "tags": [] })]);
    assert_eq!(stamped[0][SCHEMA_EVOLUTION_COUNT_TAG], json!(4));

    let kept = migrate_records(&evolver, stamped.clone(), options(false, false)).unwrap();
    assert_eq!(kept, stamped);

    let stripped = migrate_records(&evolver, stamped, options(true, false)).unwrap();
    assert_eq!(stripped, vec![json!({ "fullName": "Jon", "age": 1, "tags": [] })]);
}

#[test]
fn test_inspect_report() {
    let dir = tempfile::tempdir().unwrap();
    let evolver = load_evolver(&write(&dir, "pipeline.yml", PIPELINE)).unwrap();
    let report = inspect(&evolver);

    assert_eq!(report.evolution_count, 4);
    assert_eq!(report.mutators, vec!["add", "add", "rename", "add_nested_array"]);
    assert_eq!(
        report.paths,
        vec![
            PathSummary { name: "fullName".to_string(), nested: None },
            PathSummary { name: "age".to_string(), nested: None },
            PathSummary { name: "tags".to_string(), nested: Some("array") },
        ]
    );
    assert_eq!(report.renames, vec![("name".to_string(), "fullName".to_string())]);
    assert_eq!(report.versions, vec![(1, 2)]);
}

#[test]
fn test_bad_pipeline_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = write(&dir, "broken.yaml", "steps: [{ op: remove, path: ghost }]");
    let err = load_evolver(&pipeline).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("broken.yaml"));
    assert!(message.contains("Path ghost not found"));
}

#[test]
fn test_unknown_input_extension() {
    let registry = default_codecs();
    assert!(select_codec(&registry, Some(Path::new("people.csv")), "json").is_err());
    assert_eq!(select_codec(&registry, None, "yaml").unwrap().format(), "yaml");
}

fn yaml_to_json(yaml: &str) -> String {
    let definition = reshape_core::PipelineDefinition::from_yaml_str(yaml).unwrap();
    serde_json::to_string(&definition).unwrap()
}
