use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_toolbox(dir: &Path, spec: &str) -> std::path::PathBuf {
    let path = dir.join("toolbox.yaml");
    let yaml = format!(
        "apiVersion: atk.dev/v1\nkind: Toolbox\nmetadata:\n  name: test\nspec:\n{}",
        spec
    );
    fs::write(&path, yaml).unwrap();
    path
}

fn slack_toolbox(dir: &Path) -> std::path::PathBuf {
    write_toolbox(
        dir,
        "  slack:\n    botToken: xoxb-test\n    baseUrl: http://127.0.0.1:1\n",
    )
}

fn atkctl() -> Command {
    let mut cmd = Command::cargo_bin("atkctl").unwrap();
    cmd.env_remove("ATK_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    atkctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("invoke"))
        .stdout(predicate::str::contains("describe"));
}

#[test]
fn test_list_names() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args(["-c", config.to_str().unwrap(), "list", "-o", "name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slack_post_message"))
        .stdout(predicate::str::contains("slack_add_reaction"));
}

#[test]
fn test_list_wide_table() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args(["list"])
        .env("ATK_CONFIG", &config)
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("messaging"));
}

#[test]
fn test_describe_json() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args(["-c", config.to_str().unwrap(), "describe", "slack_post_message", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"failureContract\": \"message\""))
        .stdout(predicate::str::contains("\"required\""));
}

#[test]
fn test_describe_unknown_tool() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args(["-c", config.to_str().unwrap(), "describe", "slack_archive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found in toolbox 'test'"));
}

#[test]
fn test_validate() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args(["-c", config.to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Toolbox 'test' is valid: 4 tools (slack)"));
}

#[test]
fn test_validate_rejects_missing_required_field() {
    let dir = TempDir::new().unwrap();
    let config = write_toolbox(dir.path(), "  slack:\n    botToken: \"\"\n");

    atkctl()
        .args(["-c", config.to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("spec.slack.botToken is required"));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();

    atkctl()
        .args(["-c", dir.path().join("nope.yaml").to_str().unwrap(), "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load toolbox"));
}

#[test]
fn test_invoke_failure_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args([
            "-c",
            config.to_str().unwrap(),
            "invoke",
            "slack_post_message",
            "--args",
            r#"{"text": "hi", "channel": "C1"}"#,
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("Error posting message: connection failed"));
}

#[test]
fn test_invoke_missing_argument() {
    let dir = TempDir::new().unwrap();
    let config = slack_toolbox(dir.path());

    atkctl()
        .args(["-c", config.to_str().unwrap(), "invoke", "slack_post_message"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_invoke_file_tools() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("workspace");
    fs::create_dir(&workspace).unwrap();
    let config = write_toolbox(
        dir.path(),
        &format!("  files:\n    baseDir: {}\n", workspace.display()),
    );

    atkctl()
        .args([
            "-c",
            config.to_str().unwrap(),
            "invoke",
            "file_write",
            "--args",
            r#"{"path": "notes/today.txt", "content": "ship it"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"));

    assert_eq!(
        fs::read_to_string(workspace.join("notes/today.txt")).unwrap(),
        "ship it"
    );

    let args_file = dir.path().join("args.yaml");
    fs::write(&args_file, "path: notes/today.txt\n").unwrap();

    atkctl()
        .args([
            "-c",
            config.to_str().unwrap(),
            "invoke",
            "file_read",
            "--args-file",
            args_file.to_str().unwrap(),
            "-o",
            "yaml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("content: ship it"));
}
