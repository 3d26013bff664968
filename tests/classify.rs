mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::snapcheck_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MIXED_OUTPUT: &str = "\
.d..t...... ./
cd+++++++++ var/lib/machines/
>fcst...... etc/hosts
*deleting   tmp/stale
cL+++++++++ bin -> usr/bin

Number of files: 1,234
>f+++++++++ after-stats
";

#[test]
fn classify_counts_real_differences_from_stdin() {
    cargo_bin_cmd!("snapcheck")
        .arg("classify")
        .write_stdin(MIXED_OUTPUT)
        .assert()
        .code(1)
        .stdout("3\n");
}

#[test]
fn classify_reads_file_argument() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("rsync.out"), MIXED_OUTPUT).unwrap();

    snapcheck_cmd(temp.path())
        .arg("classify")
        .arg("rsync.out")
        .assert()
        .code(1)
        .stdout("3\n");
}

#[test]
fn classify_clean_output_succeeds() {
    cargo_bin_cmd!("snapcheck")
        .arg("classify")
        .write_stdin(".d..t...... ./\ncd+++++++++ nested/\n")
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn classify_honours_policy_flags() {
    cargo_bin_cmd!("snapcheck")
        .arg("classify")
        .arg("--no-ignore-dirs")
        .arg("--no-ignore-root-timestamp")
        .write_stdin(".d..t...... ./\ncd+++++++++ nested/\n")
        .assert()
        .code(1)
        .stdout("2\n");
}

#[test]
fn classify_reports_unrecognized_lines_on_stderr_only() {
    cargo_bin_cmd!("snapcheck")
        .arg("classify")
        .write_stdin("rsync: connection unexpectedly closed\n>f+++++++++ new\n")
        .assert()
        .code(1)
        .stdout("1\n")
        .stderr(predicate::str::contains("Unrecognized line"));
}

#[test]
fn classify_empty_input_is_zero() {
    cargo_bin_cmd!("snapcheck")
        .arg("classify")
        .write_stdin("")
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn classify_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();

    snapcheck_cmd(temp.path())
        .arg("classify")
        .arg("missing.out")
        .assert()
        .code(255)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to open missing.out"));
}
