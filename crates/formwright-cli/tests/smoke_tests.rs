//! Smoke tests for the formwright CLI
//!
//! Everything here runs without a browser.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the formwright binary
fn formwright() -> Command {
    Command::cargo_bin("formwright").expect("formwright binary should exist")
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn plan() -> Command {
    let mut cmd = formwright();
    cmd.arg("plan")
        .arg("--json")
        .arg(fixture("poliza.json"))
        .arg("--mapping")
        .arg(fixture("absanet.yaml"));
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    formwright()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    formwright()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("fill"));
}

#[test]
fn test_fill_help_lists_session_flags() {
    formwright()
        .args(["fill", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--url-pattern"))
        .stdout(predicate::str::contains("--sel-timeout"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_no_args_fails() {
    formwright().assert().failure();
}

// ============================================================================
// Plan Command
// ============================================================================

#[test]
fn test_plan_text() {
    plan()
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "  1. aseguradora: ALLIANZ ARGENTINA -> id=idAseguradora",
        ))
        .stdout(predicate::str::contains("patente: AC123BD"))
        .stdout(predicate::str::contains("tipo_contacto_ssn skipped (no value)"))
        .stdout(predicate::str::contains("missing from record: tipo_contacto_ssn"));
}

#[test]
fn test_plan_restricted_to_tab() {
    plan()
        .args(["--tabs", "vehiculo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("marca: VOLKSWAGEN"))
        .stdout(predicate::str::contains("aseguradora:").not());
}

#[test]
fn test_plan_json() {
    let output = plan().args(["--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = doc["plan"]["steps"].as_array().unwrap();
    assert_eq!(steps[0]["field"], "aseguradora");
    assert_eq!(steps[0]["tab"], "condiciones");
    assert!(doc["dry_run"].is_null());
}

#[test]
fn test_plan_dry_run_json() {
    let output = plan()
        .args(["--format", "json", "--dry-run", "--tabs", "condiciones"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let log = doc["dry_run"].as_array().unwrap();
    assert_eq!(log[0]["kind"], "would_switch");
    assert_eq!(log[0]["tab"], "condiciones");
    assert_eq!(log[1]["kind"], "would_fill");
    assert_eq!(log[1]["field"], "aseguradora");
    assert!(log.iter().all(|e| e["kind"] != "failed"));
}

#[test]
fn test_plan_dry_run_text() {
    plan()
        .args(["--dry-run", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would switch to tab: vehiculo"))
        .stdout(predicate::str::contains("Would fill motor"));
}

// ============================================================================
// Error Handling
// ============================================================================

#[test]
fn test_plan_unknown_tab() {
    plan()
        .args(["--tabs", "extras"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown tab 'extras'"));
}

#[test]
fn test_plan_missing_record() {
    formwright()
        .args(["plan", "--json", "/nonexistent/poliza.json", "--mapping"])
        .arg(fixture("absanet.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Configuration error"));
}

#[test]
fn test_plan_malformed_mapping() {
    let temp = TempDir::new().unwrap();
    let mapping = temp.path().join("broken.yaml");
    fs::write(&mapping, "fields:\n  moneda: { by: id, value: \"\" }\n").unwrap();

    formwright()
        .arg("plan")
        .arg("--json")
        .arg(fixture("poliza.json"))
        .arg("--mapping")
        .arg(&mapping)
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty locator value"));
}

#[test]
fn test_fill_rejects_unknown_stage() {
    formwright()
        .arg("fill")
        .arg("--json")
        .arg(fixture("poliza.json"))
        .arg("--mapping")
        .arg(fixture("absanet.yaml"))
        .args(["--url", "https://broker.example/", "--tabs", "checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_fill_requires_url() {
    formwright()
        .arg("fill")
        .arg("--json")
        .arg(fixture("poliza.json"))
        .arg("--mapping")
        .arg(fixture("absanet.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}
