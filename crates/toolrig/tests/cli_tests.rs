//! Integration tests for the toolrig binary
//!
//! These run the built binary against temporary projects whose drivers wrap
//! `sh`, and check its output, exit codes and leftover files.
#![cfg(unix)]
#![allow(missing_docs)]

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn toolrig(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_toolrig"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("TOOLRIG_CONCURRENCY")
        .env_remove("TOOLRIG_GRAPH")
        .output()
        .unwrap()
}

fn project(settings: &str) -> TempDir {
    let root = TempDir::new().unwrap();
    write(&root.path().join(".config/toolrig.toml"), settings);
    root
}

const GREET: &str = r#"
[drivers.greet]
bin = "sh"
args = ["-c", "echo \"hi $1\"", "sh"]
config_strategy = "none"
"#;

#[test]
fn test_run_echoes_tool_output() {
    let root = project(GREET);
    let output = toolrig(root.path(), &["run", "greet", "there"]);

    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hi there\n");
}

#[test]
fn test_tool_exit_code_is_propagated() {
    let root = project(
        r#"
[drivers.fail]
bin = "sh"
args = ["-c", "echo broken >&2; exit 7"]
config_strategy = "none"
"#,
    );
    let output = toolrig(root.path(), &["run", "fail"]);

    assert_eq!(output.status.code(), Some(7));
    assert!(String::from_utf8_lossy(&output.stderr).contains("broken"));
}

#[test]
fn test_unknown_driver_fails() {
    let root = project(GREET);
    let output = toolrig(root.path(), &["run", "missing"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing"));
}

#[test]
fn test_invalid_settings_are_reported() {
    let root = project("[execute]\nconcurrency = \"many\"\n");
    let output = toolrig(root.path(), &["run", "greet"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("toolrig.toml"));
}

#[test]
fn test_configure_writes_config_and_lists_it() {
    let root = project(
        r#"
[drivers.lint]
config_name = "lint.config.json"
"#,
    );
    write(
        &root.path().join(".config/toolrig/lint.yaml"),
        "rules:\n  semi: error\n",
    );

    let output = toolrig(root.path(), &["configure", "lint"]);

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "lint\tlint.config.json\n"
    );
    let written = std::fs::read_to_string(root.path().join("lint.config.json")).unwrap();
    assert!(written.contains("\"semi\": \"error\""));
}

#[test]
fn test_workspaces_flag_before_driver() {
    let root = project(
        r#"
[drivers.mark]
bin = "sh"
args = ["-c", "touch marker"]
config_strategy = "none"
"#,
    );
    write(
        &root.path().join("package.json"),
        r#"{"name": "repo", "private": true, "workspaces": ["packages/*"]}"#,
    );
    write(&root.path().join("packages/a/package.json"), r#"{"name": "a"}"#);
    write(&root.path().join("packages/b/package.json"), r#"{"name": "b"}"#);

    let output = toolrig(root.path(), &["run", "--workspaces=b", "mark"]);

    assert!(output.status.success(), "{output:?}");
    assert!(root.path().join("packages/b/marker").exists());
    assert!(!root.path().join("packages/a/marker").exists());
}
