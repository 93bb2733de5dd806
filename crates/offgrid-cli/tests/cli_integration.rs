//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! They test the "wiring" between the CLI and the core library.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command with a temporary data directory
fn cli_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("offgrid").expect("Failed to find offgrid binary");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd
}

/// Run a command and return its stdout
fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("Failed to run offgrid");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout is not UTF-8")
}

/// Extract the device id from `info` output (format: "Device ID: <hex>")
fn device_id(data_dir: &TempDir) -> String {
    let out = stdout_of(cli_cmd(data_dir).arg("info"));
    out.lines()
        .find_map(|line| line.strip_prefix("Device ID: "))
        .map(|id| id.trim().to_string())
        .expect("info output has no device id")
}

/// Extract the message id from send/sos output (format: "Queued ... <id>")
fn queued_id(output: &str) -> String {
    output
        .lines()
        .find(|line| line.starts_with("Queued"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
        .expect("output has no queued id")
}

/// Export a bundle from `data_dir` to stdout
fn export(data_dir: &TempDir) -> String {
    stdout_of(cli_cmd(data_dir).arg("export")).trim().to_string()
}

// ============================================================================
// Info Command Tests
// ============================================================================

#[test]
fn test_info_command() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("OffGrid Relay"))
        .stdout(predicate::str::contains("Device ID:"))
        .stdout(predicate::str::contains("Data directory:"))
        .stdout(predicate::str::contains("Messages: 0"));
}

#[test]
fn test_device_id_is_stable() {
    let data_dir = TempDir::new().unwrap();

    let first = device_id(&data_dir);
    let second = device_id(&data_dir);
    assert_eq!(first, second);
    assert_eq!(first.len(), 8);
}

// ============================================================================
// Send / SOS Tests
// ============================================================================

#[test]
fn test_send_shows_in_outbox() {
    let data_dir = TempDir::new().unwrap();

    let out = stdout_of(cli_cmd(&data_dir).args(["send", "1a2b3c4d", "Meet at the school"]));
    let id = queued_id(&out);

    cli_cmd(&data_dir)
        .arg("outbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("Meet at the school"))
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("→ 1a2b3c4d"));

    cli_cmd(&data_dir)
        .arg("inbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("Inbox is empty."));
}

#[test]
fn test_send_with_custom_ttl() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["send", "0", "hello all", "--ttl", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("broadcast"))
        .stdout(predicate::str::contains("TTL: 2"));
}

#[test]
fn test_sos_is_tagged() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["sos", "Injured at trail marker 4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued SOS"));

    cli_cmd(&data_dir)
        .arg("outbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("[SOS]"))
        .stdout(predicate::str::contains("Injured at trail marker 4"));
}

#[test]
fn test_long_body_is_refused() {
    let data_dir = TempDir::new().unwrap();
    let body = "x".repeat(281);

    cli_cmd(&data_dir)
        .args(["send", "0", body.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed"));
}

#[test]
fn test_long_body_with_truncate() {
    let data_dir = TempDir::new().unwrap();
    let body = "x".repeat(300);

    cli_cmd(&data_dir)
        .args(["--truncate", "send", "0", body.as_str()])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .arg("outbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("x".repeat(280)))
        .stdout(predicate::str::contains("x".repeat(281)).not());
}

#[test]
fn test_outbox_filter_by_recipient() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["send", "aaaa0001", "for alice"])
        .assert()
        .success();
    cli_cmd(&data_dir)
        .args(["send", "bbbb0002", "for bob"])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["outbox", "--to", "aaaa0001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("for alice"))
        .stdout(predicate::str::contains("for bob").not());
}

// ============================================================================
// Export / Import Tests
// ============================================================================

#[test]
fn test_export_import_between_devices() {
    let alice = TempDir::new().unwrap();
    let bob = TempDir::new().unwrap();
    let bob_id = device_id(&bob);

    let out = stdout_of(cli_cmd(&alice).args(["send", bob_id.as_str(), "hi bob"]));
    let msg_id = queued_id(&out);

    let bundle = export(&alice);
    cli_cmd(&bob)
        .args(["import", bundle.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 new"))
        .stdout(predicate::str::contains("1 generated"));

    cli_cmd(&bob)
        .arg("inbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("hi bob"));

    cli_cmd(&bob)
        .arg("acks")
        .assert()
        .success()
        .stdout(predicate::str::contains(msg_id.as_str()));

    // The ack travels back and alice sees the message as delivered
    let reply = export(&bob);
    cli_cmd(&alice)
        .args(["import", reply.as_str()])
        .assert()
        .success();

    cli_cmd(&alice)
        .arg("outbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("delivered"));
}

#[test]
fn test_import_twice_is_harmless() {
    let alice = TempDir::new().unwrap();
    let bob = TempDir::new().unwrap();

    cli_cmd(&alice).args(["sos", "help"]).assert().success();
    let bundle = export(&alice);

    cli_cmd(&bob).args(["import", bundle.as_str()]).assert().success();
    cli_cmd(&bob)
        .args(["import", bundle.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 new, 1 already seen"));
}

#[test]
fn test_import_from_file_and_stdin() {
    let alice = TempDir::new().unwrap();
    let bob = TempDir::new().unwrap();
    let carol = TempDir::new().unwrap();

    cli_cmd(&alice).args(["sos", "help"]).assert().success();

    let path = alice.path().join("bundle.txt");
    cli_cmd(&alice)
        .arg("export")
        .arg("--out")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle written to"));

    cli_cmd(&bob)
        .arg("import")
        .arg("--file")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 new"));

    let bundle = std::fs::read_to_string(&path).unwrap();
    cli_cmd(&carol)
        .arg("import")
        .write_stdin(bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 new"));
}

#[test]
fn test_import_garbage_fails() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["import", "this is not a bundle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid bundle"));

    cli_cmd(&data_dir)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Messages: 0"));
}

#[test]
fn test_export_qr() {
    let data_dir = TempDir::new().unwrap();

    let out = stdout_of(cli_cmd(&data_dir).args(["export", "--qr"]));
    assert!(out.lines().count() > 5);
    assert!(out.contains('█') || out.contains('▀') || out.contains('▄'));
}

// ============================================================================
// Reset Tests
// ============================================================================

#[test]
fn test_reset_requires_force() {
    let data_dir = TempDir::new().unwrap();
    let before = device_id(&data_dir);

    cli_cmd(&data_dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("IRREVERSIBLE"));

    assert_eq!(device_id(&data_dir), before);
}

#[test]
fn test_reset_with_force_wipes_state() {
    let data_dir = TempDir::new().unwrap();
    let before = device_id(&data_dir);

    cli_cmd(&data_dir).args(["sos", "help"]).assert().success();

    cli_cmd(&data_dir)
        .args(["reset", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New Device ID:"));

    cli_cmd(&data_dir)
        .arg("outbox")
        .assert()
        .success()
        .stdout(predicate::str::contains("Outbox is empty."));

    assert_ne!(device_id(&data_dir), before);
}
