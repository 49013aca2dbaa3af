//! Integration tests for the `argon config` command.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `argon` running in `dir` with an empty environment and no global config.
fn argon(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("argon").unwrap();
    cmd.current_dir(dir.path()).env_clear().env("HOME", dir.path()).env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_config_check_lists_every_missing_key() {
    let temp_dir = TempDir::new().unwrap();

    argon(&temp_dir)
        .args(["config", "check", "train"])
        .env("TRAIN_IMAGE", "1.dkr.ecr/train:latest")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("✓ TRAIN_IMAGE"))
        .stderr(predicate::str::contains("SAGEMAKER_ROLE_ARN, RAW_BUCKET, MODEL_BUCKET"));
}

#[test]
fn test_config_check_complete_stage() {
    let temp_dir = TempDir::new().unwrap();

    argon(&temp_dir)
        .args(["config", "check", "health"])
        .env("ENDPOINT_NAME", "credit-risk-endpoint")
        .assert()
        .success()
        .stdout(predicate::str::contains("health stage is ready"));
}

#[test]
fn test_config_check_null_sentinel_is_missing() {
    let temp_dir = TempDir::new().unwrap();

    argon(&temp_dir)
        .args(["config", "check", "health"])
        .env("ENDPOINT_NAME", "None")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ENDPOINT_NAME"));
}

#[test]
fn test_config_check_json_output() {
    let temp_dir = TempDir::new().unwrap();

    let assert = argon(&temp_dir)
        .args(["config", "check", "register", "--json"])
        .env("MODEL_GROUP", "credit-risk")
        .assert()
        .code(2);

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("config check JSON should be valid");
    assert_eq!(json["stage"], "register");
    assert_eq!(json["ok"], false);
    assert_eq!(json["required"][0]["key"], "MODEL_GROUP");
    assert_eq!(json["required"][0]["present"], true);
    assert_eq!(json["required"][1]["present"], false);
}

#[test]
fn test_local_config_file_supplies_defaults() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(".argonrc"), "[env]\nENDPOINT_NAME = \"from-file\"\n").unwrap();

    argon(&temp_dir).args(["config", "check", "health"]).assert().success();
}

#[test]
fn test_invalid_config_file_is_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(".argonrc"), "env = 3\n").unwrap();

    argon(&temp_dir)
        .args(["config", "check", "health"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(".argonrc"));
}

#[test]
fn test_handoff_files_feed_later_stages() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(".env_artifacts"), "MODEL_ARTIFACTS=s3://m/artifacts/model.tar.gz\n")
        .unwrap();

    argon(&temp_dir)
        .args(["config", "check", "register"])
        .env("MODEL_GROUP", "credit-risk")
        .env("INFER_IMAGE", "1.dkr.ecr/infer:latest")
        .assert()
        .success();
}

#[test]
fn test_unknown_stage_is_rejected() {
    let temp_dir = TempDir::new().unwrap();

    argon(&temp_dir)
        .args(["config", "check", "deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_debug_log_reports_loaded_handoff_files() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(".env_model"), "MODEL_PACKAGE_ARN=arn:pkg/1\n").unwrap();

    argon(&temp_dir)
        .args(["--log-level", "debug", "config", "check", "health"])
        .env("ENDPOINT_NAME", "credit-risk-endpoint")
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded handoff files"));
}
