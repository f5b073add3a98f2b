//! End-to-end runs of the configure/execute/cleanup pipeline against
//! temporary projects, using `sh` as the wrapped tool.
#![cfg(unix)]
#![allow(missing_docs)]

use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;
use toolrig_core::config::format::load_config;
use toolrig_core::driver::{ConfigStrategy, WorkspaceStrategy};
use toolrig_core::settings::DriverSettings;
use toolrig_core::{CleanupPolicy, Error, ExecutionArgs, RunOutcome, Tool, ToolSettings};

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| (*s).to_string()).collect()
}

/// `sh -c <script> sh`, so forwarded arguments land in `$1`, `$2`, ...
fn shell_driver(script: &str) -> DriverSettings {
    DriverSettings {
        bin: Some("sh".into()),
        args: Some(argv(&["-c", script, "sh"])),
        config_strategy: Some(ConfigStrategy::None),
        ..DriverSettings::default()
    }
}

fn settings_with(name: &str, driver: DriverSettings) -> ToolSettings {
    let mut settings = ToolSettings::default();
    settings.drivers.insert(name.to_string(), driver);
    settings
}

/// `core` and `util` (depending on `core`) under `packages/`.
fn workspace() -> TempDir {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join("package.json"),
        r#"{"name": "repo", "private": true, "workspaces": ["packages/*"]}"#,
    );
    write(
        &root.path().join("packages/util/package.json"),
        r#"{"name": "util", "dependencies": {"core": "workspace:*"}}"#,
    );
    write(
        &root.path().join("packages/core/package.json"),
        r#"{"name": "core"}"#,
    );
    root
}

#[tokio::test]
async fn test_single_target_returns_one_result() {
    let root = TempDir::new().unwrap();
    let tool = Tool::new(root.path(), settings_with("greet", shell_driver("echo \"hi $1\"")));

    let mut ctx = tool.context(ExecutionArgs::new(argv(&["there"])));
    let outcome = tool.run_driver(&mut ctx, "greet").await.unwrap();

    match outcome {
        RunOutcome::Single(output) => {
            assert_eq!(output.stdout, "hi there\n");
            assert_eq!(output.driver, "greet");
        }
        RunOutcome::Workspace(_) => panic!("expected a single result"),
    }
}

#[tokio::test]
async fn test_workspaces_run_in_dependency_order() {
    let root = workspace();
    let tool = Tool::new(
        root.path(),
        settings_with("order", shell_driver("basename \"$PWD\" >> ../../order.log")),
    );

    let args = ExecutionArgs::from_argv(&argv(&["--workspaces", "*", "--concurrency", "4"])).unwrap();
    let mut ctx = tool.context(args);
    let outcome = tool.run_driver(&mut ctx, "order").await.unwrap();

    assert_eq!(outcome.into_vec().len(), 2);
    let log = std::fs::read_to_string(root.path().join("order.log")).unwrap();
    assert_eq!(log.lines().collect::<Vec<_>>(), vec!["core", "util"]);
}

#[tokio::test]
async fn test_workspace_filter_and_parallel_units() {
    let root = workspace();
    let tool = Tool::new(
        root.path(),
        settings_with("mark", shell_driver("touch \"marker$1\"")),
    );

    let args = ExecutionArgs::from_argv(&argv(&[
        "--workspaces=util",
        "--parallel",
        "-a",
        "--parallel",
        "-b",
    ]))
    .unwrap();
    let mut ctx = tool.context(args);
    let results = tool.run_driver(&mut ctx, "mark").await.unwrap().into_vec();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.unit == "util"));
    let util = root.path().join("packages/util");
    assert!(util.join("marker").exists());
    assert!(util.join("marker-a").exists());
    assert!(util.join("marker-b").exists());
    assert!(!root.path().join("packages/core/marker").exists());
}

#[tokio::test]
async fn test_workspaces_without_declarations_fail_fast() {
    let root = TempDir::new().unwrap();
    write(&root.path().join("package.json"), r#"{"name": "solo"}"#);
    let tool = Tool::new(
        root.path(),
        settings_with("noop", shell_driver("touch ran")),
    );

    let args = ExecutionArgs::from_argv(&argv(&["--workspaces"])).unwrap();
    let mut ctx = tool.context(args);
    let err = tool.run_driver(&mut ctx, "noop").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Workspace(toolrig_workspaces::Error::NoWorkspaceDeclarations { .. })
    ));
    assert!(!root.path().join("ran").exists());
}

#[tokio::test]
async fn test_failure_is_aggregated_and_cleanup_runs() {
    let root = workspace();
    let mut driver = shell_driver("test \"$(basename \"$PWD\")\" != core || exit 3");
    driver.config_strategy = Some(ConfigStrategy::Create);
    driver.config_name = Some("check.config.json".into());

    let mut settings = settings_with("check", driver);
    settings.configure.cleanup = CleanupPolicy::OnFailure;
    let tool = Tool::new(root.path(), settings);

    let args = ExecutionArgs::from_argv(&argv(&["--workspaces", "*"])).unwrap();
    let mut ctx = tool.context(args);
    let err = tool.run_driver(&mut ctx, "check").await.unwrap_err();

    match &err {
        Error::Aggregate { messages, exit_code } => {
            assert_eq!(messages.len(), 1);
            assert!(messages[0].starts_with("core"));
            assert_eq!(*exit_code, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 3);
    assert!(!root.path().join("check.config.json").exists());
    assert!(ctx.config_paths.is_empty());
}

#[tokio::test]
async fn test_copy_workspace_strategy_copies_and_cleans_up() {
    let root = workspace();
    write(
        &root.path().join(".config/toolrig/lint.json"),
        r#"{"rules": {"semi": "error"}}"#,
    );
    let mut driver = shell_driver("test -f lint.config.json");
    driver.config_strategy = Some(ConfigStrategy::Create);
    driver.config_name = Some("lint.config.json".into());
    driver.workspace_strategy = Some(WorkspaceStrategy::Copy);

    let mut settings = settings_with("lint", driver);
    settings.configure.cleanup = CleanupPolicy::Always;
    let tool = Tool::new(root.path(), settings);

    let args = ExecutionArgs::from_argv(&argv(&["--workspaces", "*"])).unwrap();
    let mut ctx = tool.context(args);
    let results = tool.run_driver(&mut ctx, "lint").await.unwrap().into_vec();

    assert_eq!(results.len(), 2);
    for path in [
        "lint.config.json",
        "packages/core/lint.config.json",
        "packages/util/lint.config.json",
    ] {
        assert!(!root.path().join(path).exists(), "{path} was not removed");
    }
}

#[tokio::test]
async fn test_configure_resolves_dependencies_first() {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join(".config/toolrig/jest.yaml"),
        "testEnvironment: node\nreporters:\n  - default\n",
    );
    write(
        &root.path().join(".config/toolrig/babel.json"),
        r#"{"presets": ["@babel/preset-env"]}"#,
    );
    write(
        &root.path().join("package.json"),
        r#"{"name": "app", "jest": {"reporters": ["default", "summary"]}}"#,
    );

    let mut settings = ToolSettings::default();
    settings.drivers.insert(
        "jest".into(),
        DriverSettings {
            config_name: Some("jest.config.json".into()),
            dependencies: Some(vec!["babel".into()]),
            ..DriverSettings::default()
        },
    );
    settings.drivers.insert(
        "babel".into(),
        DriverSettings {
            config_name: Some("babel.config.json".into()),
            ..DriverSettings::default()
        },
    );
    let tool = Tool::new(root.path(), settings);

    let mut ctx = tool.context(ExecutionArgs::default());
    let artifacts = tool.configure(&mut ctx, &["jest"], None).await.unwrap();

    let order: Vec<&str> = artifacts.iter().map(|a| a.driver.as_str()).collect();
    assert_eq!(order, vec!["babel", "jest"]);
    assert_eq!(
        ctx.drivers.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["jest", "babel"]
    );

    let jest: Value = load_config(&root.path().join("jest.config.json")).unwrap();
    assert_eq!(
        jest,
        json!({"testEnvironment": "node", "reporters": ["default", "summary"]})
    );
}

#[tokio::test]
async fn test_unknown_driver() {
    let root = TempDir::new().unwrap();
    let tool = Tool::new(root.path(), ToolSettings::default());
    let mut ctx = tool.context(ExecutionArgs::default());

    let err = tool.run_driver(&mut ctx, "missing").await.unwrap_err();
    assert!(matches!(err, Error::UnknownDriver { .. }));
}
