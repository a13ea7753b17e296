//! End-to-end tests driving the compiled `copper` binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn copper() -> Command {
    Command::cargo_bin("copper").unwrap()
}

fn script_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn running_a_file_prints_its_output() {
    let file = script_file("let x = 2 + 2; print x;");
    copper().arg(file.path()).assert().success().stdout(predicate::str::contains("4"));
}

#[test]
fn a_compile_error_exits_non_zero_and_reports_the_line() {
    let file = script_file("let x = ;");
    copper().arg(file.path()).assert().failure().stdout(predicate::str::contains("line 1"));
}

#[test]
fn a_runtime_type_error_exits_non_zero() {
    let file = script_file("let x = true + false;");
    copper().arg(file.path()).assert().failure();
}

#[test]
fn wrong_argument_count_prints_usage_and_exits_one() {
    copper()
        .arg("one")
        .arg("two")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn disassemble_flag_prints_a_bytecode_listing_instead_of_running() {
    let file = script_file("let x = 1; print x;");
    copper()
        .arg("--disassemble")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("LDC"))
        .stdout(predicate::str::contains("PRINT"));
}

#[test]
fn a_nonexistent_file_is_a_clean_error_not_a_panic() {
    copper().arg("/nonexistent/path/definitely-not-here.cu").assert().failure();
}
