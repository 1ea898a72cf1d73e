use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

const SCHEMA: &str = r#"{
    "entities": [
        { "name": "LegoSet", "properties": [
            { "name": "id", "kind": "simple", "sql_type": "integer", "id": true },
            { "name": "name", "kind": "simple", "sql_type": "text" },
            { "name": "manuals", "kind": "list", "entity": "Manual" }
        ]},
        { "name": "Manual", "properties": [
            { "name": "content", "kind": "simple", "sql_type": "text" },
            { "name": "pages", "kind": "list", "entity": "Page" }
        ]},
        { "name": "Page", "properties": [
            { "name": "number", "kind": "simple", "sql_type": "integer" }
        ]}
    ]
}"#;

fn write_schema(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("schema.json");
    fs::write(&path, content).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_schema-tool"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_paths_lists_table_naming() {
    let dir = tempdir().unwrap();
    let schema = write_schema(dir.path(), SCHEMA);

    let output = run(&["paths", "--schema", schema.to_str().unwrap(), "--root", "LegoSet"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "LegoSet table=lego_set id=id");
    assert!(lines.contains(
        &"LegoSet.manuals table=manual reverse=lego_set qualifier=lego_set_key (INTEGER)"
    ));
    assert!(lines.contains(
        &"LegoSet.manuals.pages table=page reverse=lego_set qualifier=manual_key (INTEGER)"
    ));
    assert!(lines.contains(&"LegoSet.name table=lego_set id=id column=name"));
}

#[test]
fn test_sql_renders_statements_per_table() {
    let dir = tempdir().unwrap();
    let schema = write_schema(dir.path(), SCHEMA);

    let output = run(&["sql", "--schema", schema.to_str().unwrap(), "--root", "LegoSet"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("-- LegoSet\nINSERT INTO lego_set (id, name) VALUES (:id, :name);"));
    assert!(stdout.contains("SELECT * FROM lego_set WHERE id = :id;"));
    assert!(stdout.contains(
        "INSERT INTO page (lego_set, lego_set_key, manual_key, number) VALUES (:lego_set, :lego_set_key, :manual_key, :number);"
    ));
    assert!(stdout.contains(
        "SELECT * FROM page WHERE lego_set = :lego_set AND lego_set_key = :lego_set_key ORDER BY manual_key;"
    ));
    assert!(stdout.contains("DELETE FROM page WHERE lego_set = :lego_set;"));
}

#[test]
fn test_out_writes_report_file() {
    let dir = tempdir().unwrap();
    let schema = write_schema(dir.path(), SCHEMA);
    let out = dir.path().join("reports").join("lego.sql");

    let output = run(&[
        "sql",
        "--schema",
        schema.to_str().unwrap(),
        "--root",
        "LegoSet",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().starts_with("Written "));

    let report = fs::read_to_string(&out).unwrap();
    assert!(report.contains("-- LegoSet.manuals\n"));
    assert!(report.contains("DELETE FROM manual WHERE lego_set = :lego_set;"));
}

#[test]
fn test_invalid_schema_fails() {
    let dir = tempdir().unwrap();
    let schema = write_schema(
        dir.path(),
        r#"{ "entities": [ { "name": "A", "properties": [
            { "name": "bs", "kind": "list", "entity": "Missing" }
        ]} ] }"#,
    );

    let output = run(&["paths", "--schema", schema.to_str().unwrap(), "--root", "A"]);
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().contains("Invalid schema"));
}

#[test]
fn test_unknown_root_fails() {
    let dir = tempdir().unwrap();
    let schema = write_schema(dir.path(), SCHEMA);

    let output = run(&["paths", "--schema", schema.to_str().unwrap(), "--root", "Spaceship"]);
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().contains("Unknown entity 'Spaceship'"));
}
