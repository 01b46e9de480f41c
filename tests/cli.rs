//! CLI behaviour: output format and exit codes.
#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::{FixtureDir, FAKE_EXPANDER};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn goldrun(fixtures: &FixtureDir) -> Command {
    let mut cmd = Command::cargo_bin("goldrun").unwrap();
    cmd.env_remove("GOLDRUN_LOG")
        .arg("--no-color")
        .arg("--fixture-dir")
        .arg(fixtures.path());
    cmd
}

fn with_expander(cmd: &mut Command) -> &mut Command {
    cmd.args(["--transform-cmd", "sh", "--transform-arg", "-c", "--transform-arg", FAKE_EXPANDER])
}

#[test]
fn passing_suite_is_quiet_and_exits_zero() {
    let fixtures = FixtureDir::new();
    fixtures.case("a", "define(X,1)X\n", Some("1\n"));

    with_expander(&mut goldrun(&fixtures))
        .assert()
        .success()
        .stdout(contains("1 passed, 0 failed, 0 errored"))
        .stdout(contains("PASS").not());
}

#[test]
fn failing_fixture_prints_label_and_diff() {
    let fixtures = FixtureDir::new();
    fixtures.case("b", "define(X,1)X\n", Some("2\n"));

    with_expander(&mut goldrun(&fixtures))
        .assert()
        .code(1)
        .stdout(contains("FAIL: b"))
        .stdout(contains("-1\n+2\n"))
        .stdout(contains("0 passed, 1 failed, 0 errored"));
    assert!(fixtures.file("b.out.actual").exists());
}

#[test]
fn errored_fixture_has_label_without_diff() {
    let fixtures = FixtureDir::new();
    fixtures.case("c", "x\n", Some("x\n"));

    goldrun(&fixtures)
        .args(["--transform-cmd", "false"])
        .assert()
        .code(1)
        .stdout(contains("ERROR: c"))
        .stdout(contains("--- actual").not());
}

#[test]
fn empty_directory_exits_zero() {
    let fixtures = FixtureDir::new();
    goldrun(&fixtures)
        .args(["--transform-cmd", "cat"])
        .assert()
        .success()
        .stdout(contains("0 passed, 0 failed, 0 errored"));
}

#[test]
fn missing_transform_is_fatal() {
    let fixtures = FixtureDir::new();
    fixtures.case("a", "define(X,1)X\n", Some("1\n"));

    goldrun(&fixtures)
        .args(["--transform-cmd", "/nonexistent/goldrun-m4"])
        .assert()
        .code(2)
        .stderr(contains("goldrun::discovery::transform").or(contains("not found")));
    assert_eq!(fixtures.listing(), vec!["a.in", "a.out"]);
}

#[test]
fn missing_fixture_dir_is_fatal() {
    let fixtures = FixtureDir::new();
    let mut cmd = Command::cargo_bin("goldrun").unwrap();
    cmd.args(["--no-color", "--transform-cmd", "cat", "--fixture-dir"])
        .arg(fixtures.file("missing"))
        .assert()
        .code(2)
        .stderr(contains("fixture directory"));
}

#[test]
fn json_report_is_written() {
    let fixtures = FixtureDir::new();
    fixtures
        .case("a", "define(X,1)X\n", Some("1\n"))
        .case("b", "define(X,1)X\n", Some("2\n"));
    let report = fixtures.file("report/goldrun.json");

    with_expander(&mut goldrun(&fixtures))
        .arg("--report")
        .arg(&report)
        .assert()
        .code(1);

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(value["summary"]["passed"], 1);
    assert_eq!(value["summary"]["failed"], 1);
    assert_eq!(value["results"][0]["fixture"]["name"], "a");
}

#[test]
fn config_file_supplies_transform() {
    let fixtures = FixtureDir::new();
    fixtures.case("a", "define(X,1)X\n", Some("1\n"));
    let config = fixtures.file("goldrun.yaml");
    std::fs::write(
        &config,
        format!(
            "transform:\n  program: sh\n  args: [\"-c\", \"{FAKE_EXPANDER}\"]\n"
        ),
    )
    .unwrap();

    goldrun(&fixtures)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("1 passed"));
}

#[test]
fn xfail_marker_keeps_run_green() {
    let fixtures = FixtureDir::new();
    fixtures.case("known", "dnl fail\nfoo\n", Some("bar\n"));

    goldrun(&fixtures)
        .args(["--transform-cmd", "cat", "--xfail-marker", "dnl fail"])
        .assert()
        .success()
        .stdout(contains("XFAIL: known"))
        .stdout(contains("1 expected failures"));
}

#[test]
fn annotate_rewrites_sentinel_from_stdin() {
    Command::cargo_bin("goldrun")
        .unwrap()
        .args(["annotate", "--sentinel", "@LINE@"])
        .write_stdin("first\n#line @LINE@\nthird\n")
        .assert()
        .success()
        .stdout("first\n#line 3\nthird\n");
}

#[test]
fn annotate_reads_file() {
    let fixtures = FixtureDir::new();
    let path = fixtures.file("gen.c");
    std::fs::write(&path, "__LINE__ a\n").unwrap();
    Command::cargo_bin("goldrun")
        .unwrap()
        .arg("annotate")
        .arg(&path)
        .assert()
        .success()
        .stdout("2 a\n");
}

#[test]
fn annotate_passes_non_utf8_bytes_through() {
    let fixtures = FixtureDir::new();
    let path = fixtures.file("latin1.m4");
    std::fs::write(&path, b"caf\xe9\n__LINE__ \xff\n").unwrap();
    Command::cargo_bin("goldrun")
        .unwrap()
        .arg("annotate")
        .arg(&path)
        .assert()
        .success()
        .stdout(b"caf\xe9\n3 \xff\n".to_vec());
}

#[test]
fn repeated_transforms_report_case_and_transform() {
    let fixtures = FixtureDir::new();
    fixtures
        .case("a", "define(X,1)X\n", Some("1\n"))
        .case("known", "dnl fail\nfoo\n", Some("bar\n"));

    goldrun(&fixtures)
        .args(["--transform", "m4=sed -e s/define(X,1)X/1/"])
        .args(["--transform", "parser=cat"])
        .args(["--xfail-marker", "dnl fail", "--xfail-transform", "parser"])
        .assert()
        .code(1)
        .stdout(contains("FAIL: a/parser"))
        .stdout(contains("FAIL: known/m4"))
        .stdout(contains("XFAIL: known/parser"))
        .stdout(contains("1 passed, 2 failed, 0 errored, 1 expected failures"));
    assert!(fixtures.file("a.out.parser.actual").exists());
    assert!(fixtures.file("known.out.m4.actual").exists());
    assert!(!fixtures.file("a.out.m4.actual").exists());
}
