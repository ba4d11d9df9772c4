//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("snapctl");
    cmd.assert().code(2).stdout("").stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_every_command() {
    let mut cmd = cargo_bin_cmd!("snapctl");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("list-instances"))
        .stdout(contains("list-volumes"))
        .stdout(contains("list-snapshots"))
        .stdout(contains("snapshot"))
        .stdout(contains("--verbose"));
}

#[test]
fn cli_help_explains_interrupts() {
    let mut cmd = cargo_bin_cmd!("snapctl");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("Ctrl-C finishes the current instance"))
        .stdout(contains("press it again to exit immediately"));
}

#[test]
fn cli_rejects_unknown_commands() {
    let mut cmd = cargo_bin_cmd!("snapctl");
    cmd.arg("reboot");
    cmd.assert().code(2).stderr(contains("unrecognized subcommand"));
}
