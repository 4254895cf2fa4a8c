//! Integration tests for the `oelo` CLI binary.
//!
//! Argument parsing, completions and error handling run without a
//! controller; the rest talk to a wiremock stand-in.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const NOWHERE: &str = "/tmp/oelo-cli-test-nonexistent";

/// Build a [`Command`] for the `oelo` binary with env isolation.
///
/// Clears all `OELO_*` env vars and points config and data directories at
/// a nonexistent path so tests never touch the user's real files.
fn oelo_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("oelo");
    cmd.env("HOME", NOWHERE)
        .env("XDG_CONFIG_HOME", NOWHERE)
        .env("XDG_DATA_HOME", NOWHERE)
        .env_remove("OELO_PROFILE")
        .env_remove("OELO_CONTROLLER")
        .env_remove("OELO_EFFECTS_FILE")
        .env_remove("OELO_OUTPUT")
        .env_remove("OELO_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// A controller with zone 1 showing solid red and zone 2 dark.
async fn controller() -> MockServer {
    let server = MockServer::start().await;
    let body = json!([
        {
            "num": 1,
            "isOn": true,
            "pattern": "custom",
            "speed": 0,
            "direction": "F",
            "numberOfColors": 1,
            "colorStr": "255,0,0"
        },
        { "num": 2, "isOn": false, "pattern": "off", "colorStr": "0,0,0" }
    ]);
    Mock::given(method("GET"))
        .and(path("/getController"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = oelo_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(
        text.contains("Usage"),
        "Expected 'Usage' in output:\n{text}"
    );
}

#[test]
fn test_help_flag() {
    oelo_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Oelo")
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("effects")),
    );
}

#[test]
fn test_version_flag() {
    oelo_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oelo"));
}

#[test]
fn test_effects_help_lists_subcommands() {
    oelo_cmd().args(["effects", "--help"]).assert().success().stdout(
        predicate::str::contains("capture")
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("rename")),
    );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    oelo_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    oelo_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("oelo"));
}

#[test]
fn test_completions_fish() {
    oelo_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Argument errors ─────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    oelo_cmd()
        .arg("strobe")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_output_format() {
    oelo_cmd()
        .args(["-o", "yaml", "status"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_bad_color_value() {
    oelo_cmd()
        .args(["set", "1", "--color", "300,0,0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("between 0 and 255"));
}

#[test]
fn test_off_conflicts_with_color() {
    oelo_cmd()
        .args(["set", "1", "--off", "--color", "1,2,3"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_apply_requires_a_zone() {
    oelo_cmd()
        .args(["effects", "apply", "Party"])
        .assert()
        .failure()
        .code(2);
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_status_without_controller() {
    let output = oelo_cmd().arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("No controller configured"),
        "Expected config hint in output:\n{text}"
    );
}

#[test]
fn test_unknown_profile() {
    let output = oelo_cmd()
        .args(["--profile", "garage", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("garage"));
}

#[test]
fn test_unreachable_controller() {
    // Port 9 (discard) is closed on test hosts.
    let output = oelo_cmd()
        .args(["--controller", "http://127.0.0.1:9", "--timeout", "2", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}

// ── Against a controller ────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_status_json() {
    let server = controller().await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = oelo_cmd();
    cmd.env("OELO_EFFECTS_FILE", dir.path().join("effects.json"))
        .args(["--controller", &server.uri(), "-o", "json", "status"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let zones: Value = serde_json::from_slice(&output.stdout).unwrap();
    let zones = zones.as_array().unwrap();
    assert_eq!(zones.len(), 6);
    assert_eq!(zones[0]["zone"], 1);
    assert_eq!(zones[0]["is_on"], true);
    assert_eq!(zones[0]["color"], json!([255, 0, 0]));
    assert_eq!(zones[0]["availability"], "online");
    assert_eq!(zones[1]["is_on"], false);
    // Zones the controller left out of its report.
    assert_eq!(zones[2]["availability"], "offline");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_color_sends_pattern() {
    let server = controller().await;
    Mock::given(method("GET"))
        .and(path("/setPattern"))
        .and(query_param("patternType", "custom"))
        .and(query_param("zones", "2"))
        .and(query_param("colors", "0,128,255"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Command Received"))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = oelo_cmd();
    cmd.env("OELO_EFFECTS_FILE", dir.path().join("effects.json"))
        .args(["--controller", &server.uri(), "set", "2", "--color", "#0080ff"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    server.verify().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_capture_then_list() {
    let server = controller().await;
    let dir = tempfile::tempdir().unwrap();
    let effects = dir.path().join("effects.json");

    let mut capture = oelo_cmd();
    capture
        .env("OELO_EFFECTS_FILE", &effects)
        .args(["--controller", &server.uri(), "-o", "plain"])
        .args(["effects", "capture", "1", "--name", "Red"]);
    let output = run(capture).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let id = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    assert!(id.starts_with("custom-"), "unexpected id {id}");

    // Listing works without a reachable controller.
    let mut list = oelo_cmd();
    list.env("OELO_EFFECTS_FILE", &effects)
        .args(["--controller", "http://127.0.0.1:9", "--timeout", "1"])
        .args(["-o", "json-compact", "effects", "list"]);
    let output = run(list).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let listed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed[0]["id"], id.as_str());
    assert_eq!(listed[0]["name"], "Red");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_capture_dark_zone_fails() {
    let server = controller().await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = oelo_cmd();
    cmd.env("OELO_EFFECTS_FILE", dir.path().join("effects.json"))
        .args(["--controller", &server.uri(), "effects", "capture", "2"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Cannot capture zone 2"));
}

#[test]
fn test_unknown_effect_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let output = oelo_cmd()
        .env("OELO_EFFECTS_FILE", dir.path().join("effects.json"))
        .args(["--controller", "http://127.0.0.1:9", "--timeout", "1"])
        .args(["effects", "show", "Party"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("effects list"));
}
