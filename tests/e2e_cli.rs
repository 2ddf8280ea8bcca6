//! CLI end-to-end tests
//!
//! Tests for the webm-remux command-line interface.

mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the webm-remux binary, isolated from any config on the host
#[allow(deprecated)]
fn remux_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("webm-remux").unwrap();
    cmd.current_dir(home).env("HOME", home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("webm-remux"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "webm-remux {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_remux_help() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .args(["remux", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remux a WebM file"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_cli_remux_requires_output() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());
    remux_cmd(temp.path())
        .args(["remux", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn test_cli_remux_live_recording() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());
    let output = temp.path().join("out.webm");

    remux_cmd(temp.path())
        .args(["remux", input.to_str().unwrap(), "-o", output.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tracks: video #1, audio #2"))
        .stdout(predicate::str::contains("Frames: 6"))
        .stdout(predicate::str::contains("Output clusters: 2"));

    let (header, segment, mut reader) = common::read_back(&output);
    assert_eq!(header.doc_type, "webm");
    assert!(segment.size().is_some());
    assert_eq!(segment.tags().len(), 1);

    let (_, input_segment, mut input_reader) = common::read_back(&input);
    assert_eq!(
        common::frames(&segment, &mut reader),
        common::frames(&input_segment, &mut input_reader)
    );
}

#[test]
fn test_cli_remux_dry_run() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());
    let output = temp.path().join("out.webm");

    remux_cmd(temp.path())
        .args([
            "remux",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Output would be"));

    assert!(!output.exists());
}

#[test]
fn test_cli_remux_with_config() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());
    let output = temp.path().join("out.webm");
    let config_file = temp.path().join("custom.toml");
    fs::write(
        &config_file,
        r#"
[output]
writing_app = "Canvas Capture"
"#,
    )
    .unwrap();

    remux_cmd(temp.path())
        .args([
            "--config",
            config_file.to_str().unwrap(),
            "remux",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let (_, segment, _) = common::read_back(&output);
    assert_eq!(
        segment.info().unwrap().writing_app.as_deref(),
        Some("Canvas Capture")
    );
}

#[test]
fn test_cli_remux_picks_up_local_config() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());
    let output = temp.path().join("out.webm");
    fs::write(
        temp.path().join("webm-remux.toml"),
        "[output]\nmax_output_bytes = 10\n",
    )
    .unwrap();

    remux_cmd(temp.path())
        .args(["remux", input.to_str().unwrap(), "-o", output.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("byte limit"));

    assert!(!output.exists());
}

#[test]
fn test_cli_remux_nonexistent_file() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .args(["remux", "/nonexistent/path/in.webm", "-o", "out.webm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_remux_corrupt_input() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", b"RIFF....WAVEfmt ");
    let output = temp.path().join("out.webm");

    remux_cmd(temp.path())
        .args(["remux", input.to_str().unwrap(), "-o", output.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to remux"));

    assert!(!output.exists());
}

#[test]
fn test_cli_probe_text() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());

    remux_cmd(temp.path())
        .args(["probe", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("DocType: webm"))
        .stdout(predicate::str::contains("unknown size"))
        .stdout(predicate::str::contains("V_VP9 video 1280x720"))
        .stdout(predicate::str::contains("TITLE = capture"))
        .stdout(predicate::str::contains("Clusters: 2"));
}

#[test]
fn test_cli_probe_json() {
    let temp = tempdir().unwrap();
    let input = common::write_input(temp.path(), "in.webm", &common::live_recording());

    let output = remux_cmd(temp.path())
        .args(["probe", "--json", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["header"]["doc_type"], "webm");
    assert_eq!(json["cluster_count"], 2);
    assert_eq!(json["tracks"].as_array().unwrap().len(), 2);
    assert_eq!(json["tracks"][0]["codec_id"], "V_VP9");
    assert!(json["segment_size"].is_null());
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .args(["probe", "/nonexistent/path/in.webm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_validate_default() {
    let temp = tempdir().unwrap();
    remux_cmd(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("Writing app: webm-remux"));
}

#[test]
fn test_cli_validate_valid_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[output]
writing_app = "recorder"
max_output_bytes = 1048576
measure_first = false
max_cluster_duration_ms = 5000
"#,
    )
    .unwrap();

    remux_cmd(temp.path())
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"))
        .stdout(predicate::str::contains("Max cluster duration: 5000 ms"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[output]\nwriting_app = \"\"\n").unwrap();

    remux_cmd(temp.path())
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("writing_app"));
}

#[test]
fn test_cli_validate_malformed_toml() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "this is not [valid toml").unwrap();

    remux_cmd(temp.path())
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure();
}
