//! Integration tests for the `fleetsync` CLI binary.
//!
//! Argument handling and config commands run without a backend; query
//! commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// The binary with config lookups pointed at an empty location.
fn fleetsync() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fleetsync");
    cmd.env("HOME", "/tmp/fleetsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fleetsync-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("FLEETSYNC_CONFIG")
        .env_remove("FLEETSYNC_API_URL")
        .env_remove("FLEETSYNC_TIMEOUT")
        .env_remove("FLEETSYNC_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

async fn backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/fleet/buses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "buses": [
                { "vehicle_id": "B2", "route_id": "R2", "status": "offline" },
                { "vehicle_id": "B1", "route_id": "R1", "location_name": "Fort", "status": "online" },
                { "vehicle_id": "B3", "route_id": "R1", "status": "online" }
            ]
        })))
        .mount(&server)
        .await;
    server
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let output = fleetsync().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    fleetsync().arg("--help").assert().success().stdout(
        predicate::str::contains("buses")
            .and(predicate::str::contains("history"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn version_flag() {
    fleetsync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetsync"));
}

#[test]
fn completions_bash() {
    fleetsync()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn unknown_output_format_is_a_usage_error() {
    fleetsync()
        .args(["-o", "xml", "overview"])
        .assert()
        .code(2);
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn config_path_honours_flag() {
    fleetsync()
        .args(["--config", "/etc/fleetsync/custom.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/fleetsync/custom.toml"));
}

#[test]
fn config_show_prints_defaults() {
    fleetsync()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("api_url = \"http://localhost:5000\"")
                .and(predicate::str::contains("[polling]")),
        );
}

#[test]
fn config_show_reads_file_and_flags() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "api_url = \"http://fleet.internal:8080\"\ntimeout = 3").unwrap();

    fleetsync()
        .arg("--config")
        .arg(file.path())
        .args(["--timeout", "7", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("fleet.internal:8080")
                .and(predicate::str::contains("timeout = 7")),
        );
}

#[test]
fn missing_config_file_fails() {
    fleetsync()
        .args(["--config", "/tmp/fleetsync-cli-test-nonexistent/nope.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn zero_timeout_is_rejected() {
    fleetsync()
        .args(["--timeout", "0", "config", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("timeout"));
}

// ── Query commands ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn buses_plain_is_sorted_and_filtered() {
    let server = backend().await;

    fleetsync()
        .args(["--api-url", &server.uri(), "-o", "plain", "buses"])
        .assert()
        .success()
        .stdout("B1\nB2\nB3\n");

    fleetsync()
        .args(["--api-url", &server.uri(), "-o", "plain", "buses"])
        .args(["--status", "online", "--route", "R1"])
        .assert()
        .success()
        .stdout("B1\nB3\n");

    fleetsync()
        .args(["--api-url", &server.uri(), "-o", "plain", "buses", "-s", "fort"])
        .assert()
        .success()
        .stdout("B1\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_bus_exits_not_found() {
    let server = MockServer::start().await;

    fleetsync()
        .args(["--api-url", &server.uri(), "bus", "GHOST"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("GHOST"));
}

#[tokio::test(flavor = "multi_thread")]
async fn overview_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/fleet/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_buses": 3,
            "online_buses": 2,
            "average_speed": 28.0,
            "total_passengers": 41,
            "road_conditions": { "dry": 2, "wet": 1 }
        })))
        .mount(&server)
        .await;

    fleetsync()
        .args(["--api-url", &server.uri(), "-o", "json-compact", "overview"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"online_buses\":2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unhealthy_backend_sets_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "degraded" })))
        .mount(&server)
        .await;

    fleetsync()
        .args(["--api-url", &server.uri(), "health"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("degraded"));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/fleet/statistics"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    fleetsync()
        .args(["--api-url", &server.uri(), "stats"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("500"));
}
