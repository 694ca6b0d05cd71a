//! Integration tests for the `yolocal` CLI binary.
//!
//! Argument parsing, help output, completions and config handling run
//! without a hub. Hub-bound commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const NO_HOME: &str = "/tmp/yolocal-cli-test-nonexistent";

/// Build a [`Command`] for the `yolocal` binary with env isolation.
///
/// Clears all `YOLOCAL_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn yolocal_cmd() -> assert_cmd::Command {
    yolocal_cmd_with_config_home(Path::new(NO_HOME))
}

fn yolocal_cmd_with_config_home(config_home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("yolocal");
    cmd.env("HOME", NO_HOME)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .env_remove("YOLOCAL_PROFILE")
        .env_remove("YOLOCAL_HOST")
        .env_remove("YOLOCAL_CLIENT_ID")
        .env_remove("YOLOCAL_CLIENT_SECRET")
        .env_remove("YOLOCAL_NET_ID")
        .env_remove("YOLOCAL_HTTP_PORT")
        .env_remove("YOLOCAL_STREAM_PORT")
        .env_remove("YOLOCAL_OUTPUT")
        .env_remove("YOLOCAL_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Write `contents` as the yolocal config under a fresh XDG config home.
fn config_home(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("yolocal");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(app_dir.join("config.toml"), contents).unwrap();
    dir
}

/// Hub flags pointing at a mock server.
fn hub_args(server: &MockServer) -> Vec<String> {
    let port = server.address().port().to_string();
    [
        "--host",
        "127.0.0.1",
        "--http-port",
        port.as_str(),
        "--client-id",
        "cid",
        "--client-secret",
        "secret",
        "--net-id",
        "net-1",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok", "expires_in": 7200 })),
        )
        .mount(server)
        .await;
}

async fn mount_method(server: &MockServer, name: &str, data: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/open/yolink/v2/api"))
        .and(header("authorization", "Bearer tok"))
        .and(body_partial_json(json!({ "method": name })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": "000000", "data": data })),
        )
        .mount(server)
        .await;
}

async fn mount_hub(server: &MockServer) {
    mount_token(server).await;
    mount_method(
        server,
        "Home.getDeviceList",
        json!({ "devices": [
            { "deviceId": "d1", "name": "Front Door", "token": "t1", "type": "DoorSensor" },
            { "deviceId": "d2", "name": "Lamp", "token": "t2", "type": "Outlet" }
        ] }),
    )
    .await;
    mount_method(
        server,
        "DoorSensor.getState",
        json!({ "state": { "state": "open" }, "online": true }),
    )
    .await;
    mount_method(server, "Outlet.getState", json!({ "state": "closed" })).await;
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
    let output = yolocal_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    yolocal_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("YoLink")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("check")),
    );
}

#[test]
fn test_version_flag() {
    yolocal_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("yolocal"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    yolocal_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    yolocal_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = yolocal_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_without_config() {
    let output = yolocal_cmd().arg("devices").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("No hub configured"), "{text}");
}

#[test]
fn test_unknown_profile() {
    let output = yolocal_cmd()
        .args(["--profile", "attic", "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("attic"));
}

#[test]
fn test_invalid_output_format() {
    let output = yolocal_cmd()
        .args(["--output", "yaml", "devices"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_points_into_config_home() {
    let dir = config_home("");
    yolocal_cmd_with_config_home(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_secret() {
    let dir = config_home(
        r#"
default_profile = "home"

[profiles.home]
host = "192.168.1.50"
client_id = "ua_home"
client_secret = "super-secret-value"
net_id = "net-home"
"#,
    );
    yolocal_cmd_with_config_home(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("192.168.1.50")
                .and(predicate::str::contains("super-secret-value").not()),
        );
}

#[test]
fn test_config_profiles_lists_names() {
    let dir = config_home(
        r#"
[profiles.home]
host = "h1"
client_id = "c1"
net_id = "n1"

[profiles.cabin]
host = "h2"
client_id = "c2"
net_id = "n2"
"#,
    );
    yolocal_cmd_with_config_home(dir.path())
        .args(["--output", "plain", "config", "profiles"])
        .assert()
        .success()
        .stdout("cabin\nhome\n");
}

// ── Hub-bound commands ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_check_accepts_good_credentials() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).arg("check");
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Credentials OK"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_rejects_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).arg("check");
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_lists_hub_devices() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).args(["--output", "plain", "devices"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "d1\nd2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_json_omits_device_tokens() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).args(["--output", "json", "devices"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["name"], "Front Door");
    assert_eq!(devices[0]["state"]["state"]["state"], "open");
    assert_eq!(devices[1]["type"], "Outlet");
    assert!(devices[0].get("token").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_state_by_name() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server))
        .args(["--output", "plain", "state", "Lamp"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r#"{"state":"closed"}"#
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_on_sends_switch_command() {
    let server = MockServer::start().await;
    mount_hub(&server).await;
    Mock::given(method("POST"))
        .and(path("/open/yolink/v2/api"))
        .and(body_partial_json(json!({
            "method": "Outlet.setState",
            "targetDevice": "d2",
            "token": "t2",
            "params": { "state": "open" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": "000000", "data": { "state": "open" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).args(["on", "d2"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_on_unsupported_device_type() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).args(["on", "d1"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("DoorSensor"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_state_unknown_device() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).args(["state", "garage"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_send_rejects_non_object_params() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let mut cmd = yolocal_cmd();
    cmd.args(hub_args(&server)).args(["send", "d2", "[1,2]"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
}
