//! Integration tests for the buildlog binary
//!
//! These tests verify:
//! - Local runs writing the build log to stdout and to files
//! - Exit code propagation from the wrapped command
//! - Remote runs through the agent process producing identical logs
//! - Config display

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to get the buildlog binary path
fn buildlog_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_buildlog"))
}

/// Helper to run buildlog isolated from the user's config and data dirs
fn run_buildlog(home: &Path, args: &[&str]) -> Output {
    Command::new(buildlog_binary())
        .current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("BUILDLOG_CONFIG")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute buildlog")
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("build log should exist")
        .lines()
        .map(|l| l.to_string())
        .collect()
}

#[test]
fn test_run_writes_to_stdout_by_default() {
    let temp = TempDir::new().unwrap();
    let output = run_buildlog(temp.path(), &["run", "--", "echo", "hi"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "started\nhi\nfinished: SUCCESS\n"
    );
}

#[test]
fn test_run_writes_to_file() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("out").join("build.log");
    let output = run_buildlog(
        temp.path(),
        &["run", "-o", log.to_str().unwrap(), "--", "sh", "-c", "echo one; echo two"],
    );

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert_eq!(read_lines(&log), vec!["started", "one", "two", "finished: SUCCESS"]);
}

#[test]
fn test_failing_command_exit_code_and_log() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("build.log");
    let output = run_buildlog(temp.path(), &["run", "-o", log.to_str().unwrap(), "--", "sh", "-c", "exit 4"]);

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(
        read_lines(&log),
        vec!["started", "ERROR: sh exited with code 4", "finished: FAILURE"]
    );
}

#[test]
fn test_missing_program_is_fatal() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("build.log");
    let output = run_buildlog(
        temp.path(),
        &["run", "-o", log.to_str().unwrap(), "--", "buildlog-definitely-missing"],
    );

    assert_eq!(output.status.code(), Some(127));
    let lines = read_lines(&log);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("FATAL: cannot find buildlog-definitely-missing"));
    assert_eq!(lines[2], "finished: FAILURE");
}

#[test]
fn test_append_keeps_previous_build() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("build.log");
    let log_str = log.to_str().unwrap();
    run_buildlog(temp.path(), &["run", "-o", log_str, "--", "echo", "first"]);
    run_buildlog(temp.path(), &["run", "-o", log_str, "--append", "--", "echo", "second"]);

    assert_eq!(
        read_lines(&log),
        vec![
            "started",
            "first",
            "finished: SUCCESS",
            "started",
            "second",
            "finished: SUCCESS"
        ]
    );
}

#[test]
fn test_remote_run_matches_local_run() {
    let temp = TempDir::new().unwrap();
    let local = temp.path().join("local.log");
    let remote = temp.path().join("remote.log");
    let script = "echo compiling; echo linking; exit 2";

    let l = run_buildlog(temp.path(), &["run", "-o", local.to_str().unwrap(), "--", "sh", "-c", script]);
    let r = run_buildlog(
        temp.path(),
        &["run", "--remote", "-o", remote.to_str().unwrap(), "--", "sh", "-c", script],
    );

    assert_eq!(l.status.code(), Some(2));
    assert_eq!(r.status.code(), Some(2), "stderr: {}", String::from_utf8_lossy(&r.stderr));
    assert_eq!(fs::read(&local).unwrap(), fs::read(&remote).unwrap());
    assert_eq!(
        read_lines(&remote),
        vec![
            "started",
            "compiling",
            "linking",
            "ERROR: sh exited with code 2",
            "finished: FAILURE"
        ]
    );
}

#[test]
fn test_remote_run_to_stdout() {
    let temp = TempDir::new().unwrap();
    let output = run_buildlog(temp.path(), &["run", "--remote", "--", "echo", "from agent"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "started\nfrom agent\nfinished: SUCCESS\n"
    );
}

#[test]
fn test_agent_rejects_bad_listener() {
    let temp = TempDir::new().unwrap();
    let output = run_buildlog(temp.path(), &["agent", "--listener", "{bogus", "--", "true"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_config_file_selects_output() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("configured.log");
    let config = temp.path().join("buildlog.yaml");
    fs::write(
        &config,
        format!("output:\n  target: file\n  path: {}\n", log.display()),
    )
    .unwrap();

    let output = run_buildlog(
        temp.path(),
        &["--config", config.to_str().unwrap(), "run", "--", "echo", "configured"],
    );

    assert!(output.status.success());
    assert_eq!(read_lines(&log), vec!["started", "configured", "finished: SUCCESS"]);
}

#[test]
fn test_config_show_json() {
    let temp = TempDir::new().unwrap();
    let output = run_buildlog(temp.path(), &["config", "show", "--format", "json"]);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["output"]["target"], "stdout");
    assert_eq!(value["log_level"], "info");
}
