//! Exercises the `gate` binary's CLI flags and stdin/stdout batch loop
//! end-to-end, the way `codex-exec`'s own `tests/` suite drives its binary
//! through `assert_cmd` rather than calling `run_main` in-process.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn gate_cmd() -> Command {
    Command::cargo_bin("gate").unwrap()
}

#[test]
fn non_interactive_gate_without_channel_is_denied() {
    let tool = serde_json::json!({
        "id": "1",
        "name": "read_file",
        "arguments": {"path": "Cargo.toml"}
    })
    .to_string();

    gate_cmd()
        .write_stdin(format!("{tool}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"error\":\"non_interactive_gate\""));
}

#[test]
fn allow_category_runs_the_shell_command() {
    let tool = serde_json::json!({
        "id": "1",
        "name": "shell_execute",
        "arguments": {"command": "echo hello"}
    })
    .to_string();

    gate_cmd()
        .args(["--allow-category", "shell"])
        .write_stdin(format!("{tool}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"));
}

#[test]
fn dangerous_command_is_rejected_even_under_allow_category() {
    let tool = serde_json::json!({
        "id": "1",
        "name": "shell_execute",
        "arguments": {"command": "git status; rm -rf /"}
    })
    .to_string();

    gate_cmd()
        .args(["--allow-category", "shell"])
        .write_stdin(format!("{tool}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"error\":\"dangerous_command\""));
}

#[test]
fn protected_file_write_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let tool = serde_json::json!({
        "id": "1",
        "name": "write_file",
        "arguments": {"path": "ralph.config.json", "content": "{}"}
    })
    .to_string();

    gate_cmd()
        .current_dir(dir.path())
        .args(["--allow-category", "file_write"])
        .write_stdin(format!("{tool}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"error\":\"protected_file\""));
}

#[test]
fn bad_config_file_exits_with_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bad.json");
    std::fs::write(&config_path, "{ not json").unwrap();

    gate_cmd()
        .args(["--config", config_path.to_str().unwrap()])
        .write_stdin("")
        .assert()
        .code(2);
}

#[test]
fn blank_lines_on_stdin_are_skipped() {
    gate_cmd().write_stdin("\n\n").assert().success().stdout(predicate::str::is_empty());
}
