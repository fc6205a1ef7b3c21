use assert_cmd::Command;
use predicates::prelude::*;

fn bookdesk(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("bookdesk").unwrap();
    cmd.env("BOOKDESK_CONFIG_DIR", config_dir)
        .env("BOOKDESK_API_URL", "http://127.0.0.1:9")
        .env_remove("BOOKDESK_API_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    bookdesk(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("review"))
        .stdout(predicate::str::contains("rules"));
}

#[test]
fn export_with_blank_register_account_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    bookdesk(dir.path())
        .args(["export", "Acme", "--register-account", "   "])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: Register account name is required",
        ))
        .stderr(predicate::str::contains("Network error").not());
}

#[test]
fn init_writes_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let exports = dir.path().join("exports");
    bookdesk(dir.path())
        .args([
            "init",
            "--api-url",
            "https://books.example.com/",
            "--export-dir",
            exports.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("settings.json"));

    let written = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["api_base_url"], "https://books.example.com");
    assert!(exports.is_dir());
}

#[test]
fn unreachable_backend_is_reported_by_status() {
    let dir = tempfile::tempdir().unwrap();
    bookdesk(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("unreachable"));
}

#[test]
fn client_type_cannot_be_changed() {
    let dir = tempfile::tempdir().unwrap();
    bookdesk(dir.path())
        .args(["clients", "update", "Acme", "--type", "desktop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be changed"));
}

#[test]
fn completions_for_bash() {
    let dir = tempfile::tempdir().unwrap();
    bookdesk(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bookdesk"));
}
