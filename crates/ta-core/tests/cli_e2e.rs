//! End-to-end tests for the `ta-core` binary.
//!
//! Schema documents and batches come from `test/fixtures`; stdout carries the
//! JSON payload and stderr carries logs and errors.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn ta_core() -> Command {
    let mut cmd = Command::cargo_bin("ta-core").expect("ta-core binary should exist");
    cmd.env_remove("TA_SCHEMA")
        .env_remove("RUST_LOG")
        .env_remove("TA_LOG")
        .env_remove("TA_LOG_FORMAT");
    cmd
}

fn fixture(parts: &[&str]) -> PathBuf {
    let mut path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test/fixtures");
    for part in parts {
        path = path.join(part);
    }
    path
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

mod check {
    use super::*;

    #[test]
    fn builtin_table_is_valid() {
        let output = ta_core().arg("check").output().unwrap();
        assert!(output.status.success());

        let payload = stdout_json(&output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["source"], "built-in table");
        assert!(payload["types"].as_u64().unwrap() > 50);
        assert_eq!(payload["skipped"], 4);
    }

    #[test]
    fn schema_flag_wins_over_environment() {
        let output = ta_core()
            .env("TA_SCHEMA", fixture(&["schema", "duplicate_type.json"]))
            .args(["check", "--schema"])
            .arg(fixture(&["schema", "valid_markers.toml"]))
            .output()
            .unwrap();
        assert!(output.status.success());
    }

    #[test]
    fn environment_schema_is_used() {
        ta_core()
            .env("TA_SCHEMA", fixture(&["schema", "duplicate_type.json"]))
            .arg("check")
            .assert()
            .code(11)
            .stderr(predicate::str::contains("Duplicate Schema Type"));
    }

    #[test]
    fn rejected_schema_exits_with_schema_error() {
        ta_core()
            .args(["check", "--schema"])
            .arg(fixture(&["schema", "shared_target.json"]))
            .assert()
            .code(11)
            .stderr(predicate::str::contains("Rollup Target Collision"));
    }

    #[test]
    fn json_errors_are_structured() {
        let output = ta_core()
            .args(["--json-errors", "check", "--schema"])
            .arg(fixture(&["schema", "primary_key_rollup.json"]))
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(11));

        let stderr = String::from_utf8_lossy(&output.stderr);
        let line = stderr
            .lines()
            .find(|l| l.starts_with('{') && l.contains("\"category\""))
            .expect("structured error line");
        let err: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(err["category"], "schema");
        assert_eq!(err["recoverable"], false);
    }

    #[test]
    fn diagnostics_are_reported() {
        let output = ta_core()
            .args(["check", "--schema"])
            .arg(fixture(&["schema", "diagnostics.json"]))
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(stdout_json(&output)["diagnostics"].as_array().unwrap().len(), 4);
    }
}

mod merge {
    use super::*;

    fn merge_fixture_batch() -> std::process::Output {
        ta_core()
            .args(["merge", "--schema"])
            .arg(fixture(&["schema", "merge_tree.json"]))
            .arg("--input")
            .arg(fixture(&["batches", "host_snapshots.json"]))
            .output()
            .unwrap()
    }

    #[test]
    fn batch_fixture_merges_cleanly() {
        let output = merge_fixture_batch();
        assert_eq!(output.status.code(), Some(0));

        let payload = stdout_json(&output);
        assert_eq!(payload["report"]["records_in"], 2);
        assert_eq!(payload["record"]["type_name"], "host_snapshot");
        assert_eq!(payload["record"]["fields"]["6"]["uint"], 3);

        let processes = payload["record"]["fields"]["2"]["list"].as_array().unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(
            processes[0]["message"]["fields"]["12"]["rollup"]["weight"],
            2
        );
    }

    #[test]
    fn stdin_input_matches_file_input() {
        let batch = std::fs::read_to_string(fixture(&["batches", "host_snapshots.json"])).unwrap();
        let from_stdin = ta_core()
            .args(["merge", "--input", "-", "--schema"])
            .arg(fixture(&["schema", "merge_tree.json"]))
            .write_stdin(batch)
            .output()
            .unwrap();
        let from_file = merge_fixture_batch();

        assert_eq!(stdout_json(&from_stdin), stdout_json(&from_file));
    }

    #[test]
    fn conflicting_unmarked_values_exit_with_findings() {
        let batch = r#"[
            {"type_name": "counter_time", "fields": {"2": {"uint": 5}, "9": {"uint": 1}}},
            {"type_name": "counter_time", "fields": {"2": {"uint": 5}, "9": {"uint": 2}}}
        ]"#;
        let output = ta_core()
            .args(["merge", "--input", "-"])
            .write_stdin(batch)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));
        assert!(!stdout_json(&output)["report"]["violations"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn list_of_batches_yields_one_outcome_each() {
        let batches = r#"[
            [{"type_name": "counter_time", "fields": {"2": {"uint": 5}}}],
            [{"type_name": "counter_time", "fields": {"2": {"uint": 7}}},
             {"type_name": "counter_time", "fields": {"2": {"uint": 9}}}]
        ]"#;
        let output = ta_core()
            .args(["merge", "--input", "-"])
            .write_stdin(batches)
            .output()
            .unwrap();
        assert!(output.status.success());

        let outcomes = stdout_json(&output);
        let outcomes = outcomes.as_array().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0]["report"]["records_in"], 1);
        assert_eq!(outcomes[1]["report"]["records_in"], 2);
    }

    #[test]
    fn empty_batch_exits_with_merge_error() {
        ta_core()
            .args(["merge", "--input", "-"])
            .write_stdin("[]")
            .assert()
            .code(12)
            .stderr(predicate::str::contains("Empty Batch"));
    }

    #[test]
    fn malformed_input_exits_with_input_error() {
        ta_core()
            .args(["merge", "--input", "-"])
            .write_stdin("{not json")
            .assert()
            .code(13);
    }
}

mod show {
    use super::*;

    #[test]
    fn shows_directives_of_a_type() {
        let output = ta_core()
            .args(["show", "--type", "process", "--schema"])
            .arg(fixture(&["schema", "merge_tree.json"]))
            .output()
            .unwrap();
        assert!(output.status.success());

        let payload = stdout_json(&output);
        assert_eq!(payload["skipped"], false);
        assert_eq!(payload["primary_key"], serde_json::json!([1]));
        assert_eq!(payload["targets"], serde_json::json!([12, 13]));
    }

    #[test]
    fn skipped_type_is_flagged() {
        let output = ta_core()
            .args(["show", "--type", "aggregations64"])
            .output()
            .unwrap();
        assert_eq!(stdout_json(&output)["skipped"], true);
    }
}

#[test]
fn unknown_subcommand_fails() {
    ta_core()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
