//! Integration tests for the mirror binary: exit codes and report output

use super::test_utils::Fixture;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Command with config and data directories isolated under `home`.
fn mirror(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mirror"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("MIRROR_LOG")
        .env_remove("MIRROR_LOG_FORMAT")
        .env_remove("MIRROR_LOG_OUTPUT");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    mirror(home).args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn db_arg(fixture: &Fixture) -> String {
    format!("--db={}", fixture.db.display())
}

#[test]
fn test_help_and_version_exit_zero() {
    let home = TempDir::new().unwrap();

    let help = run(home.path(), &["--help"]);
    assert_eq!(help.status.code(), Some(0));
    assert!(stdout(&help).contains("--tool"));
    assert!(stdout(&help).contains("blake3-128"));

    for flag in ["-v", "--version"] {
        let version = run(home.path(), &[flag]);
        assert_eq!(version.status.code(), Some(0));
        let text = stdout(&version);
        assert_eq!(
            text.lines().next(),
            Some(format!("mirror {}", env!("CARGO_PKG_VERSION")).as_str())
        );
        assert!(text.contains("License GPLv3+"));
    }
}

#[test]
fn test_usage_errors_exit_one() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    let db = db_arg(&fixture);

    let no_source = run(home.path(), &["--tool=create-db", &db]);
    assert_eq!(no_source.status.code(), Some(1));
    assert!(stderr(&no_source).contains("No SOURCE file/directory."));

    let too_many = run(home.path(), &["--tool=verify-dir", &db, "a", "b", "c"]);
    assert_eq!(too_many.status.code(), Some(1));
    assert!(stderr(&too_many).contains("Only SOURCE and DEST"));

    let bad_tool = run(home.path(), &["--tool=sync", &db, "a"]);
    assert_eq!(bad_tool.status.code(), Some(1));

    assert!(!fixture.db.exists());
}

#[test]
fn test_merge_dir_is_unsupported() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();

    let output = run(home.path(), &["--tool=merge-dir", &db_arg(&fixture), "a", "b"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("merge-dir"));
    assert!(!fixture.db.exists());
}

#[test]
fn test_create_then_verify_reports_changes() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    fixture.write("a.txt", "hello");
    fixture.write("b/c.txt", "x");
    let db = db_arg(&fixture);
    let root = fixture.root.to_str().unwrap();

    let create = run(home.path(), &["--tool=create-db", &db, root]);
    assert_eq!(create.status.code(), Some(0), "stderr: {}", stderr(&create));
    assert!(stdout(&create).contains("Snapshot created: 2 directories, 2 files, 6 bytes"));

    let clean = run(home.path(), &["--tool=verify-dir", &db, root]);
    assert_eq!(clean.status.code(), Some(0));
    assert_eq!(
        stdout(&clean).trim(),
        "Verified 2 files in 2 directories: 0 findings"
    );

    fixture.write("b/new.txt", "n");
    fs::remove_file(fixture.path("a.txt")).unwrap();

    let changed = run(home.path(), &["--tool=verify-dir", &db, root]);
    assert_eq!(changed.status.code(), Some(0));
    let report = stdout(&changed);
    assert!(report.contains("New file found in the file system: 'b/new.txt'"));
    assert!(report.contains("File not found in the file system: 'a.txt'"));
    assert!(report.contains("2 findings"));
}

#[test]
fn test_json_report_lines() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    fixture.write("a.txt", "hello");
    let db = db_arg(&fixture);
    let root = fixture.root.to_str().unwrap();

    assert!(run(home.path(), &["--tool=create-db", &db, root]).status.success());
    fixture.mkdir("fresh");

    let output = run(
        home.path(),
        &["--tool=verify-dir", &db, "--report-format=json", root],
    );
    assert_eq!(output.status.code(), Some(0));
    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["finding"], "new_directory");
    assert_eq!(lines[0]["path"], "fresh");
    assert_eq!(lines[1]["summary"]["findings"], 1);
}

#[test]
fn test_verify_without_store_fails() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    let root = fixture.root.to_str().unwrap();

    let output = run(home.path(), &["--tool=verify-dir", &db_arg(&fixture), root]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!stderr(&output).is_empty());
}

#[test]
fn test_missing_source_is_fatal() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    let missing = fixture.path("nope");

    let output = run(
        home.path(),
        &["--tool=create-db", &db_arg(&fixture), missing.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unable to scan directory"));
}

#[test]
fn test_invalid_config_from_environment_is_fatal() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    let root = fixture.root.to_str().unwrap();

    let output = mirror(home.path())
        .env("MIRROR__SCAN__CHUNK_SIZE", "0")
        .args(["--tool=create-db", &db_arg(&fixture), root])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("chunk_size"));
}

#[test]
fn test_explicit_config_file_must_exist() {
    let home = TempDir::new().unwrap();
    let fixture = Fixture::new();
    let root = fixture.root.to_str().unwrap();
    let config = home.path().join("absent.toml");

    let output = run(
        home.path(),
        &[
            "--tool=create-db",
            &db_arg(&fixture),
            "--config",
            config.to_str().unwrap(),
            root,
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(!fixture.db.exists());
}
