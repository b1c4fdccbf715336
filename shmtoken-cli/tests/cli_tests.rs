// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests driving the `shmtok` binary across processes.

use std::io::{BufRead, BufReader};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn shmtok(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shmtok"))
        .args(args)
        .output()
        .expect("Failed to run shmtok")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// A region created by one process is written and read by others through its token
#[cfg(unix)]
#[test]
fn test_create_write_read_across_processes() {
    let base = format!("shmtok-cli-{}", std::process::id());
    let mut holder = Command::new(env!("CARGO_BIN_EXE_shmtok"))
        .args(["create", base.as_str(), "--size", "8192", "--unique"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn create");

    let stdout = holder.stdout.take().expect("Missing stdout");
    let mut token = String::new();
    BufReader::new(stdout)
        .read_line(&mut token)
        .expect("Failed to read token");
    let token = token.trim().to_string();
    assert!(!token.is_empty());

    let inspect = shmtok(&["inspect", token.as_str(), "--json"]);
    assert!(inspect.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&inspect.stdout).expect("inspect --json emits JSON");
    let name = report["name"].as_str().expect("name field").to_string();
    assert!(name.starts_with(&base));
    assert_eq!(report["region_size"].as_u64().unwrap() % 4096, 0);

    let write = shmtok(&["write", token.as_str(), "--offset", "10", "--data", "hello"]);
    assert!(write.status.success());

    let read = shmtok(&["read", token.as_str(), "--offset", "10", "--len", "5", "--text"]);
    assert!(read.status.success());
    let out = stdout_of(&read);
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("hello"));
    assert!(lines.next().unwrap_or_default().starts_with("crc32: "));

    let hex = shmtok(&["read", token.as_str(), "--offset", "10", "--len", "5"]);
    assert!(stdout_of(&hex).starts_with("0000000a  68 65 6c 6c 6f"));

    // A killed holder leaks the region until it is unlinked by name.
    holder.kill().expect("Failed to kill holder");
    holder.wait().expect("Failed to reap holder");

    let unlink = shmtok(&["unlink", name.as_str()]);
    assert!(unlink.status.success());

    let gone = shmtok(&["read", token.as_str()]);
    assert!(!gone.status.success());
}

/// Garbage tokens are rejected before any region is touched
#[test]
fn test_inspect_rejects_garbage() {
    let output = shmtok(&["inspect", "not a token!"]);
    assert!(!output.status.success());
}

/// The validate command reports good and bad configuration files
#[test]
fn test_validate_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let good = temp_dir.path().join("good.yaml");
    std::fs::write(&good, "shm:\n  lock_warn_timeout_ms: 2000\n").expect("Failed to write config");
    let output = shmtok(&["validate", good.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("2000ms"));

    let bad = temp_dir.path().join("bad.yaml");
    std::fs::write(&bad, "shm:\n  lock_warn_timeout_ms: 0\n").expect("Failed to write config");
    let output = shmtok(&["validate", bad.to_str().unwrap()]);
    assert!(!output.status.success());
}
