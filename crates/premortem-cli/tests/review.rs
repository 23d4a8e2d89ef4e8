use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const SPARSE_DOC: &str = "# Overview\nWe will build a widget service.\n\nTODO: decide storage\n";

const COVERED_DOC: &str = "\
# Goals and Scope
Ship a reviewed design with clear purpose.

# Success Metrics
Adoption KPI tracked in the dashboard.

# Error Handling
Retries with backoff, timeouts, fallback to cache.

# Dependencies
Upstream billing integration.

# Data Retention
PII encrypted, 30-day retention.

# Security
Access control via the identity service.

# Testing
Unit and integration test plan, QA validation.

# Rollout
Staged deploy with rollback procedure.

# Ownership
Owner: platform team, on-call rotation, runbook linked.

# Performance
Latency budget and capacity estimates.

# Failure Modes
Graceful degradation, availability target, SLO defined.
";

fn premortem() -> Command {
    Command::cargo_bin("premortem-cli").unwrap()
}

#[test]
fn review_renders_text_report() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("design.md");
    fs::write(&path, SPARSE_DOC).unwrap();

    premortem()
        .args(["review", path.to_str().unwrap(), "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Risk Score"))
        .stdout(predicate::str::contains("ARCH-001"))
        .stdout(predicate::str::contains("Maturity"));
}

#[test]
fn review_emits_parseable_json() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("design.md");
    fs::write(&path, SPARSE_DOC).unwrap();

    let output = premortem()
        .args(["review", path.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(value["findings"].is_array());
    assert!(value["risk_score"].as_u64().unwrap() > 0);
    assert_eq!(value["metadata"]["provider"], serde_json::json!("heuristic"));
    assert!(value["maturity"]["score"].is_u64());
}

#[test]
fn fail_on_high_exits_nonzero_for_sparse_doc() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("design.md");
    fs::write(&path, SPARSE_DOC).unwrap();

    premortem()
        .args(["review", path.to_str().unwrap(), "--fail-on", "high"])
        .assert()
        .code(1);
}

#[test]
fn fail_on_high_passes_for_covered_doc() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("design.md");
    fs::write(&path, COVERED_DOC).unwrap();

    premortem()
        .args(["review", path.to_str().unwrap(), "--fail-on", "high"])
        .assert()
        .success();
}

#[test]
fn missing_input_exits_with_runtime_error() {
    premortem()
        .args(["review", "does/not/exist.md"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no supported files"));
}

#[test]
fn invalid_flag_value_is_a_usage_error() {
    premortem()
        .args(["review", "whatever.md", "--fail-on", "sometimes"])
        .assert()
        .code(2);
}

#[test]
fn review_writes_output_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("design.md");
    let out = temp.path().join("report.json");
    fs::write(&path, SPARSE_DOC).unwrap();

    premortem()
        .args([
            "review",
            path.to_str().unwrap(),
            "--format",
            "json",
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(value["findings"].is_array());
}

#[test]
fn show_evidence_includes_line_references() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("design.md");
    fs::write(&path, SPARSE_DOC).unwrap();

    premortem()
        .args([
            "review",
            path.to_str().unwrap(),
            "--no-color",
            "--show-evidence",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("L1: # Overview"))
        .stdout(predicate::str::contains("Recommendation:"));
}

#[test]
fn list_rules_names_catalog_entries() {
    premortem()
        .args(["list-rules"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARCH-001"))
        .stdout(predicate::str::contains("OPS-001"));
}

#[test]
fn list_rules_json_is_parseable() {
    let output = premortem()
        .args(["list-rules", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(value.as_array().unwrap().len() >= 10);
}

#[test]
fn explain_describes_a_rule() {
    premortem()
        .args(["explain", "ARCH-001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARCH-001"))
        .stdout(predicate::str::contains("How to address it"));
}

#[test]
fn explain_unknown_rule_fails() {
    premortem()
        .args(["explain", "NOPE-999"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown rule id"));
}
