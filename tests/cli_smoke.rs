//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn no_arguments_prints_usage_and_fails() {
    let mut cmd = Command::cargo_bin("volia").expect("binary should be built");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_the_subcommands() {
    let mut cmd = Command::cargo_bin("volia").expect("binary should be built");
    let assert = cmd.arg("--help").assert().success();
    let rendered = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for subcommand in ["create", "lookup", "attach", "detach", "delete", "format"] {
        assert!(
            rendered.contains(subcommand),
            "expected '{subcommand}' in help output, got: {rendered}"
        );
    }
}
