//! CLI integration tests for aiiinotate-cli.
//!
//! These tests run the actual binary against temporary input files. Imports
//! run offline against the in-memory store, so no database or network is used.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a Command for the aiiinotate binary with no database configured.
fn aiiinotate() -> Command {
    let mut cmd = Command::cargo_bin("aiiinotate").unwrap();
    cmd.env_remove("DATABASE_URL").env_remove("AIIINOTATE_BASE_URL");
    cmd
}

fn annotation_json(canvas: &str, chars: &str) -> String {
    format!(
        r#"{{
            "@type": "oa:Annotation",
            "motivation": "commenting",
            "on": "https://iiif.example.org/m1/canvas/{canvas}#xywh=0,0,10,10",
            "resource": {{ "@type": "dctypes:Text", "chars": "{chars}" }}
        }}"#
    )
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    aiiinotate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IIIF annotation server tooling"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_help_shows_exit_codes() {
    aiiinotate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_version_displays_version() {
    aiiinotate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aiiinotate"));
}

#[test]
fn test_import_help_lists_types() {
    aiiinotate()
        .args(["import", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--list-file"))
        .stdout(predicate::str::contains("--offline"))
        .stdout(predicate::str::contains("annotation-list"))
        .stdout(predicate::str::contains("manifest-array"));
}

// ============================================================================
// Import Tests
// ============================================================================

#[test]
fn test_import_annotation_offline() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "a.json", &annotation_json("c1", "hello"));

    aiiinotate()
        .args(["import", "--type", "annotation", "--offline", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Inserted"))
        .stdout(predicate::str::contains("1 document(s)"))
        .stdout(predicate::str::contains(
            "http://localhost:3000/data/2/m1/annotation/c1_",
        ))
        .stderr(predicate::str::contains("in-memory store"));
}

#[test]
fn test_import_uses_base_url_from_env() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "a.json", &annotation_json("c1", "hello"));

    aiiinotate()
        .env("AIIINOTATE_BASE_URL", "https://annotations.example.org/")
        .args(["import", "--type", "annotation", "--offline", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://annotations.example.org/data/2/m1/annotation/c1_",
        ));
}

#[test]
fn test_import_annotation_array_as_json() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "[{}, {}]",
        annotation_json("c1", "one"),
        annotation_json("c2", "two")
    );
    let file = write(&dir, "many.json", &content);

    let output = aiiinotate()
        .args(["import", "--type", "annotation-array", "--offline", "--json", "--file"])
        .arg(&file)
        .output()
        .unwrap();

    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["insertedCount"], 2);
    assert_eq!(result["insertedIds"].as_array().unwrap().len(), 2);
}

#[test]
fn test_import_list_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.json", &annotation_json("c1", "one"));
    write(&dir, "b.json", &annotation_json("c2", "two"));
    let list = write(&dir, "files.txt", "a.json\n\n# comment\nb.json\n");

    aiiinotate()
        .args(["import", "--type", "annotation", "--offline", "--list-file", "--file"])
        .arg(&list)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 document(s)"));
}

#[test]
fn test_import_manifest() {
    let dir = TempDir::new().unwrap();
    let manifest = r#"{
        "@context": "http://iiif.io/api/presentation/2/context.json",
        "@id": "https://iiif.example.org/m1/manifest.json",
        "@type": "sc:Manifest",
        "sequences": [{ "canvases": [
            { "@id": "https://iiif.example.org/m1/canvas/c0", "@type": "sc:Canvas" }
        ]}]
    }"#;
    let file = write(&dir, "manifest.json", manifest);

    aiiinotate()
        .args(["import", "--type", "manifest", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://iiif.example.org/m1/manifest.json"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_missing_file_exits_with_input_error() {
    let dir = TempDir::new().unwrap();
    let present = write(&dir, "a.json", &annotation_json("c1", "one"));

    aiiinotate()
        .args(["import", "--type", "annotation", "--offline", "--file"])
        .arg(&present)
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(66)
        .stderr(predicate::str::contains("missing.json"))
        .stdout(predicate::str::contains("Inserted").not());
}

#[test]
fn test_missing_list_file_exits_with_input_error() {
    aiiinotate()
        .args([
            "import",
            "--type",
            "annotation",
            "--list-file",
            "--file",
            "/nonexistent/files.txt",
        ])
        .assert()
        .code(66);
}

#[test]
fn test_invalid_json_exits_with_data_error() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "bad.json", "{ not json");

    aiiinotate()
        .args(["import", "--type", "annotation", "--offline", "--file"])
        .arg(&file)
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse JSON"));
}

#[test]
fn test_malformed_annotation_exits_with_data_error() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "a.json", r#"{ "@type": "oa:Annotation", "on": null }"#);

    aiiinotate()
        .args(["import", "--type", "annotation", "--offline", "--file"])
        .arg(&file)
        .assert()
        .code(65)
        .stderr(predicate::str::contains("a.json"));
}

#[test]
fn test_malformed_annotation_list_exits_with_data_error() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "list.json", r#"{ "@type": "sc:Manifest", "resources": [] }"#);

    aiiinotate()
        .args(["import", "--type", "annotation-list", "--offline", "--file"])
        .arg(&file)
        .assert()
        .code(65);
}

#[test]
fn test_migrate_requires_database_url() {
    aiiinotate()
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--database-url"));
}
