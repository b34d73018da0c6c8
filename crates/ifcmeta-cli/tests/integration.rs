#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ifcmeta() -> Command {
    let mut cmd = Command::cargo_bin("ifcmeta").unwrap();
    cmd.env_remove("PORT")
        .env_remove("CORS_ORIGIN")
        .env_remove("UPLOAD_FOLDER")
        .env_remove("OUTPUT_FOLDER")
        .env_remove("HOST")
        .env_remove("MAX_UPLOAD_MB");
    cmd
}

#[test]
fn help_lists_environment_variables() {
    ifcmeta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("PORT"))
        .stdout(predicate::str::contains("CORS_ORIGIN"))
        .stdout(predicate::str::contains("UPLOAD_FOLDER"));
}

#[test]
fn rejects_non_numeric_port() {
    ifcmeta()
        .env("PORT", "not-a-port")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PORT").or(predicate::str::contains("port")));
}

#[test]
fn fails_when_upload_dir_is_a_file() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    ifcmeta()
        .args(["--host", "127.0.0.1", "--port", "0"])
        .arg("--upload-dir")
        .arg(&blocker)
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
