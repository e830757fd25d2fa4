//! CLI Integration Tests
//!
//! Runs the sheetmap binary against workbooks built with the library.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use predicates::prelude::*;
use royalbit_sheetmap::{record, write_file, EncodeOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Employee {
        #[tag(excel = "id")]
        pub id: i64,
        #[tag(excel = "name")]
        pub name: String,
        #[tag(excel = "skills")]
        pub skills: Vec<String>,
    }
}

fn fixture(dir: &Path) -> PathBuf {
    let path = dir.join("staff.xlsx");
    let staff = vec![
        Employee {
            id: 1,
            name: "Ada".to_string(),
            skills: vec!["math".to_string(), "engines".to_string()],
        },
        Employee {
            id: 2,
            name: "Grace".to_string(),
            skills: vec!["cobol".to_string()],
        },
    ];
    write_file(&path, &staff, EncodeOptions::default().with_sheet("Staff")).unwrap();
    path
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMMANDS"))
        .stdout(predicate::str::contains("dump"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sheetmap"));
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sheets_lists_names() {
    let dir = TempDir::new().unwrap();
    let path = fixture(dir.path());

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.arg("sheets")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Staff"));
}

#[test]
fn test_headers_show_column_letters() {
    let dir = TempDir::new().unwrap();
    let path = fixture(dir.path());

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["headers", "--sheet", "Staff"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("skills"))
        .stdout(predicate::str::contains("C, D"))
        .stdout(predicate::str::contains("2 data rows"));
}

#[test]
fn test_dump_json() {
    let dir = TempDir::new().unwrap();
    let path = fixture(dir.path());

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["dump", "--sheet", "Staff", "--format", "json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Grace\""))
        .stdout(predicate::str::contains("\"engines\""));
}

#[test]
fn test_dump_yaml_with_config() {
    let dir = TempDir::new().unwrap();
    let path = fixture(dir.path());
    let config = dir.path().join("sheet.yaml");
    std::fs::write(&config, "sheet: Staff\ntitle_row: 1\n").unwrap();

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["dump", "--format", "yaml", "--config"])
        .arg(&config)
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("- Ada"));
}

#[test]
fn test_load_then_dump() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("records.yaml");
    let output = dir.path().join("out.xlsx");
    std::fs::write(
        &input,
        "- city: Lisbon\n  zones: [a, b, c]\n- city: Porto\n  zones: d\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["load", "--sheet", "Cities"])
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Load complete"));

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["headers", "--sheet", "Cities"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("B, C, D"));
}

#[test]
fn test_missing_sheet_fails() {
    let dir = TempDir::new().unwrap();
    let path = fixture(dir.path());

    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["dump", "--sheet", "Nope"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nope"));
}

#[test]
fn test_missing_file_fails() {
    let mut cmd = Command::cargo_bin("sheetmap").unwrap();
    cmd.args(["sheets", "does-not-exist.xlsx"]).assert().failure();
}
