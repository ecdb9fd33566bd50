//! CLI tests for rustible-ios
//!
//! Runs the binary with assert_cmd and covers:
//! - Module listing in human and JSON form
//! - Offline states (rendered, parsed)
//! - Check runs against a device snapshot
//! - Exit codes for each error class
//! - Defaults taken from a config file

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

// Helper to get a command for testing
fn rustible_cmd() -> Command {
    let mut cmd = Command::cargo_bin("rustible-ios").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("RUSTIBLE_IOS_CONFIG")
        .env_remove("RUSTIBLE_IOS_STATE")
        .env("NO_COLOR", "1");
    cmd
}

// Helper to write a file with the given suffix
fn file_with(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

const ACLS_RUNNING: &str = "\
ip access-list extended 110
 10 deny tcp host 198.51.100.1 any eq telnet ack
 20 permit ip any any
";

// ============================================================================
// Basic commands
// ============================================================================

#[test]
fn test_help() {
    rustible_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Declarative Cisco IOS resource modules"));
}

#[test]
fn test_version() {
    rustible_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_list_modules() {
    rustible_cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("ios_acls"))
        .stdout(predicate::str::contains("ios_route_maps"))
        .stdout(predicate::str::contains("ios_snmp_server"));
}

#[test]
fn test_list_modules_json() {
    let output = rustible_cmd()
        .args(["--output", "json", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let modules = value["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 6);
    assert_eq!(modules[0]["name"], "ios_acls");
}

#[test]
fn test_missing_subcommand() {
    rustible_cmd().assert().failure();
}

// ============================================================================
// Offline states
// ============================================================================

#[test]
fn test_run_rendered() {
    let config = file_with(".yml", "- vlan_id: 10\n  name: users\n");
    rustible_cmd()
        .args(["run", "ios_vlans", "--state", "rendered", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("vlan 10"))
        .stdout(predicate::str::contains("name users"));
}

#[test]
fn test_run_parsed_json_output() {
    let running = file_with(".cfg", "vlan 20\n name servers\n");
    let output = rustible_cmd()
        .args(["--output", "json", "run", "ios_vlans", "--state", "parsed", "--running-config"])
        .arg(running.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["module"], "ios_vlans");
    assert_eq!(value["parsed"], serde_json::json!([{"vlan_id": 20, "name": "servers"}]));
}

// ============================================================================
// Device runs
// ============================================================================

#[test]
fn test_run_check_against_snapshot() {
    let running = file_with(".cfg", ACLS_RUNNING);
    let config = file_with(
        ".yml",
        r#"- afi: ipv4
  acls:
    - name: std_acl
      acl_type: standard
      aces:
        - grant: deny
          source:
            address: 192.0.2.0
            wildcard_bits: 0.0.0.255
"#,
    );
    rustible_cmd()
        .args(["run", "ios_acls", "--state", "merged", "--check", "--config"])
        .arg(config.path())
        .arg("--device-config")
        .arg(running.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("changed"))
        .stdout(predicate::str::contains("ip access-list standard std_acl"))
        .stdout(predicate::str::contains("deny 192.0.2.0 0.0.0.255"));
}

#[test]
fn test_run_diff_mode() {
    let running = file_with(".cfg", "vlan 10\n");
    let config = file_with(".json", r#"[{"vlan_id": 20}]"#);
    rustible_cmd()
        .args(["run", "ios_vlans", "--diff", "--config"])
        .arg(config.path())
        .arg("--device-config")
        .arg(running.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("+- vlan_id: 20"));
}

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn test_unknown_module_exit_code() {
    rustible_cmd()
        .args(["run", "ios_bgp_global", "--state", "gathered"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Module 'ios_bgp_global' not found"));
}

#[test]
fn test_invalid_config_exit_code() {
    let config = file_with(".yml", "- vlan_id: 5000\n");
    rustible_cmd()
        .args(["run", "ios_vlans", "--state", "rendered", "--config"])
        .arg(config.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("outside 1-4094"));
}

#[test]
fn test_policy_violation_exit_code() {
    let running = file_with(".cfg", ACLS_RUNNING);
    let config = file_with(
        ".yml",
        r#"- afi: ipv4
  acls:
    - name: "110"
      aces:
        - sequence: 20
          grant: deny
          protocol: ip
          source: {any: true}
          destination: {any: true}
"#,
    );
    rustible_cmd()
        .args(["run", "ios_acls", "--state", "merged", "--config"])
        .arg(config.path())
        .arg("--device-config")
        .arg(running.path())
        .assert()
        .code(5)
        .stderr(predicate::str::contains("replaced or overridden"));
}

#[test]
fn test_missing_device_exit_code() {
    let config = file_with(".yml", "- vlan_id: 10\n");
    rustible_cmd()
        .args(["run", "ios_vlans", "--state", "merged", "--config"])
        .arg(config.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("requires a device connection"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_default_state_from_config_file() {
    let dir = tempdir().unwrap();
    let config_file = dir.path().join("rustible-ios.toml");
    std::fs::write(&config_file, "[defaults]\nstate = \"rendered\"\n").unwrap();
    let config = file_with(".yml", "- vlan_id: 30\n");

    rustible_cmd()
        .current_dir(dir.path())
        .args(["run", "ios_vlans", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("vlan 30"));
}

#[test]
fn test_state_from_environment() {
    let config = file_with(".yml", "- vlan_id: 40\n");
    rustible_cmd()
        .env("RUSTIBLE_IOS_STATE", "rendered")
        .args(["run", "ios_vlans", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("vlan 40"));
}
