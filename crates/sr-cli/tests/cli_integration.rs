//! CLI integration tests
//!
//! Tests the shell-relay binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn shell_relay() -> Command {
    Command::cargo_bin("shell-relay")
        .expect("Failed to locate shell-relay binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    shell_relay()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("shell-relay"))
        .stdout(predicate::str::contains("remote shell"));
}

#[test]
fn test_cli_version() {
    shell_relay()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shell-relay"));
}

#[test]
fn test_cli_connect_help() {
    shell_relay()
        .args(["connect", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fingerprint"))
        .stdout(predicate::str::contains("--direct"));
}

#[test]
fn test_config_path_honors_flag() {
    shell_relay()
        .args(["--config", "/tmp/custom-relay.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/custom-relay.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    shell_relay()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    shell_relay()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("remote_port = 2200"))
        .stdout(predicate::str::contains("input_backpressure = \"block\""));
}

#[test]
fn test_watch_renders_peer_table() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    std::fs::write(
        &events,
        concat!(
            r#"{"type":"network_snapshot","name":"laptop","addresses":["100.64.0.7"],"#,
            r#""peers":[{"name":"p1","addresses":["10.0.0.2"]}]}"#,
            "\n",
            r#"{"type":"browse_to_url","url":"https://login.example/a1"}"#,
            "\n",
        ),
    )
    .unwrap();

    let config = dir.path().join("config.toml");
    std::fs::write(&config, "remote_port = 2222\n").unwrap();

    shell_relay()
        .arg("--config")
        .arg(&config)
        .arg("watch")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: laptop"))
        .stdout(predicate::str::contains("10.0.0.2:2222"))
        .stdout(predicate::str::contains(
            "To log in, visit: https://login.example/a1",
        ));
}

#[test]
fn test_connect_without_credentials_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "username = \"user\"\n").unwrap();

    shell_relay()
        .env_remove("SHELL_RELAY_PASSWORD")
        .arg("--config")
        .arg(&config)
        .args(["connect", "10.0.0.2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SHELL_RELAY_PASSWORD"));
}
