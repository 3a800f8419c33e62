use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_pattern_json() -> &'static str {
    r#"
{
  "repeat": false,
  "patterns": [
    { "hours": "00", "minutes": "00", "seconds": "05", "message": "Stretch" },
    { "hours": 0, "minutes": 0, "seconds": 3, "message": "Sit down" }
  ]
}
"#
}

#[test]
fn check_prints_schedule_for_valid_pattern_file() {
    let dir = tempdir().expect("tempdir");
    let patterns = dir.path().join("patterns.json");
    fs::write(&patterns, valid_pattern_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .arg("--patterns")
        .arg(patterns)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total cycle: 00:00:08"))
        .stdout(predicate::str::contains("Repeat: off"))
        .stdout(predicate::str::contains("First trigger: 00:00:05"))
        .stdout(predicate::str::contains("Stretch"));
}

#[test]
fn check_accepts_legacy_bare_array_and_defaults_to_repeat() {
    let dir = tempdir().expect("tempdir");
    let patterns = dir.path().join("patterns.json");
    fs::write(
        &patterns,
        r#"[ { "hours": "00", "minutes": "01", "seconds": "00", "message": "" } ]"#,
    )
    .expect("write json");

    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .arg("--patterns")
        .arg(patterns)
        .assert()
        .success()
        .stdout(predicate::str::contains("Repeat: on"))
        .stdout(predicate::str::contains("(no message)"));
}

#[test]
fn check_without_patterns_reports_empty_cycle() {
    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Patterns: 0"))
        .stdout(predicate::str::contains("First trigger: none (empty cycle)"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let patterns = dir.path().join("patterns.json");
    fs::write(&patterns, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .arg("--patterns")
        .arg(patterns)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn empty_file_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let patterns = dir.path().join("patterns.json");
    fs::write(&patterns, "").expect("write empty file");

    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .arg("--patterns")
        .arg(patterns)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pattern file is empty"));
}

#[test]
fn entry_with_no_recognized_fields_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let patterns = dir.path().join("patterns.json");
    fs::write(&patterns, r#"{ "patterns": [ { "foo": 1 } ] }"#).expect("write json");

    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .arg("--patterns")
        .arg(patterns)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "none of the hours/minutes/seconds/message fields",
        ));
}

#[test]
fn zero_tick_period_is_rejected() {
    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--check")
        .arg("--tick-ms")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tick-ms must be greater than zero"));
}

#[test]
fn bench_reports_tick_pacing() {
    let mut cmd = cargo_bin_cmd!("seagullwatch");
    cmd.arg("--bench")
        .arg("--tick-ms")
        .arg("5")
        .assert()
        .success()
        .stdout(predicate::str::contains("tick pacing benchmark"))
        .stdout(predicate::str::contains("Mean drift"));
}
