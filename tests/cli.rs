//! Integration tests for CLI commands

#![allow(deprecated)]

use assert_cmd::{assert::OutputAssertExt, cargo::CommandCargoExt};
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn teamhub(data: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("teamhub").unwrap();
    cmd.arg("--data-dir").arg(data.path()).env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("teamhub").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("send"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("channel"));
}

#[test]
fn test_send_without_keys_records_message_and_hints() {
    let data = TempDir::new().unwrap();

    teamhub(&data)
        .args(["send", "@gpt-4o hello"])
        .assert()
        .success()
        .stderr(predicate::str::contains("@gpt-4o needs an API key for OpenAI"));

    teamhub(&data)
        .args(["channel", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@gpt-4o hello"));
}

#[test]
fn test_empty_message_is_rejected() {
    let data = TempDir::new().unwrap();

    teamhub(&data)
        .args(["send", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Message is empty"));
}

#[test]
fn test_models_reflect_keys() {
    let data = TempDir::new().unwrap();

    teamhub(&data)
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("No models available"));

    teamhub(&data)
        .args(["keys", "set", "deepseek", "sk-test"])
        .assert()
        .success();

    teamhub(&data)
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("@deepseek-chat"))
        .stdout(predicate::str::contains("@gpt-4o").not());

    teamhub(&data)
        .args(["keys", "set", "nosuch", "sk-test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider"));
}

#[test]
fn test_channel_lifecycle() {
    let data = TempDir::new().unwrap();

    teamhub(&data)
        .args(["channel", "new", "Product Review"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#product-review"));

    teamhub(&data)
        .args(["channel", "new", "product review"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Channel already exists"));

    teamhub(&data)
        .args(["channel", "switch", "product-review"])
        .assert()
        .success();

    teamhub(&data).args(["send", "notes only"]).assert().success();

    teamhub(&data)
        .args(["channel", "export"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Team Hub - Product Review"))
        .stdout(predicate::str::contains("### You ("));

    teamhub(&data)
        .args(["channel", "clear"])
        .assert()
        .success();

    teamhub(&data)
        .args(["channel", "export", "product-review"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no messages"));
}

#[test]
fn test_reference_and_custom_mentions() {
    let data = TempDir::new().unwrap();

    teamhub(&data)
        .args(["reference", "add", "Meeting Notes", "--content", "ship friday"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@meeting-notes"));

    teamhub(&data)
        .args([
            "custom",
            "add",
            "Local Llama",
            "http://127.0.0.1:9/v1/chat/completions",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("@local-llama"));

    teamhub(&data)
        .arg("mentions")
        .assert()
        .success()
        .stdout(predicate::str::contains("@meeting-notes"))
        .stdout(predicate::str::contains("@local-llama"));

    teamhub(&data)
        .args(["reference", "remove", "@meeting-notes"])
        .assert()
        .success();

    teamhub(&data)
        .args(["reference", "remove", "meeting-notes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No reference is mentionable as @meeting-notes"));
}

#[test]
fn test_unreachable_custom_endpoint_stores_diagnostic() {
    let data = TempDir::new().unwrap();

    teamhub(&data)
        .args([
            "custom",
            "add",
            "Dead",
            "http://127.0.0.1:9/v1/chat/completions",
        ])
        .assert()
        .success();

    teamhub(&data)
        .args(["send", "@dead ping"])
        .assert()
        .success()
        .stdout(predicate::str::contains("**Error**"))
        .stdout(predicate::str::contains("3. The API quota is sufficient"));
}

#[test]
fn test_backup_excludes_keys_and_restores() {
    let data = TempDir::new().unwrap();
    let backup = data.path().join("backup.json");

    teamhub(&data)
        .args(["keys", "set", "openai", "sk-very-secret"])
        .assert()
        .success();
    teamhub(&data).args(["send", "remember me"]).assert().success();

    teamhub(&data)
        .args(["data", "export", "--output"])
        .arg(&backup)
        .assert()
        .success();
    let exported = std::fs::read_to_string(&backup).unwrap();
    assert!(exported.contains("\"version\": \"3.0\""));
    assert!(exported.contains("remember me"));
    assert!(!exported.contains("sk-very-secret"));

    teamhub(&data)
        .args(["data", "clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
    teamhub(&data)
        .args(["data", "clear", "--yes"])
        .assert()
        .success();

    teamhub(&data)
        .args(["data", "import"])
        .arg(&backup)
        .assert()
        .success();
    teamhub(&data)
        .args(["channel", "show", "general"])
        .assert()
        .success()
        .stdout(predicate::str::contains("remember me"));
    teamhub(&data)
        .args(["keys", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("online").not());
}
