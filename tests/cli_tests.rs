//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use predicates::prelude::*;

use common::{crew_cmd, fixture_path, TestEnvironment};

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    crew_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Crew Runner"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("crew"))
        .stdout(predicate::str::contains("version"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    crew_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("crew-runner"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"))
        .stdout(predicate::str::contains("Target"));
}

#[test]
fn test_short_version_flag() {
    crew_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("crew-runner"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_with_file() {
    let env = TestEnvironment::with_mock(&[]);
    env.cmd()
        .args(["config", "show", "--config", env.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("[llm]"))
        .stdout(predicate::str::contains("provider = \"mock\""))
        .stdout(predicate::str::contains("[output]"))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_show_masks_api_key() {
    let env = TestEnvironment::new();
    env.write_config("[llm]\napi_key = \"sk-very-secret\"");
    env.cmd()
        .args(["config", "show", "--config", env.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("sk-very-secret").not())
        .stdout(predicate::str::contains("********"));
}

#[test]
fn test_config_validate_fixture() {
    crew_cmd()
        .args(["config", "validate", "--config"])
        .arg(fixture_path("valid_crew.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_invalid_fixture() {
    crew_cmd()
        .args(["config", "validate", "--config"])
        .arg(fixture_path("invalid_crew.toml"))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("unknown agent 'writer'"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    crew_cmd()
        .args(["config", "validate", "--config", "/nonexistent/path/crew.toml"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_config_init_writes_loadable_file() {
    let env = TestEnvironment::new();
    let path = env.path().join("nested").join("config.toml");

    env.cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));
    assert!(path.exists());

    // The generated file is a valid configuration on its own
    env.cmd()
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success();

    // Refuses to overwrite without --force
    env.cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .code(10)
        .stderr(predicate::str::contains("--force"));

    env.cmd()
        .args(["config", "init", "--force", "--path"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_init_help() {
    crew_cmd()
        .args(["config", "init", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialize"))
        .stdout(predicate::str::contains("--path"))
        .stdout(predicate::str::contains("--force"));
}

// ─────────────────────────────────────────────────────────────────
// Crew Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_crew_list_bundled_default() {
    let env = TestEnvironment::with_mock(&[]);
    env.cmd()
        .args(["crew", "list", "--config", env.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Senior Analytics Engineer"))
        .stdout(predicate::str::contains("1. sql"))
        .stdout(predicate::str::contains("2. schema"))
        .stdout(predicate::str::contains("3. pipeline"));
}

#[test]
fn test_crew_list_shows_context() {
    crew_cmd()
        .args(["crew", "list", "--config"])
        .arg(fixture_path("valid_crew.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("after: query"));
}

#[test]
fn test_crew_bundled() {
    crew_cmd()
        .args(["crew", "bundled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("analytics (3 agents, 3 tasks)"));
}

// ─────────────────────────────────────────────────────────────────
// Run Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    crew_cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the crew"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--strict"))
        .stdout(predicate::str::contains("--only"));
}

#[test]
fn test_run_with_missing_config() {
    crew_cmd()
        .args(["run", "--config", "/nonexistent/crew.toml"])
        .assert()
        .code(10);
}

#[test]
fn test_run_mock_prints_summary() {
    let env = TestEnvironment::with_mock(&["Data Modeler"]);
    env.cmd()
        .args(["run", "--config", env.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded, 1 did not succeed"))
        .stdout(predicate::str::contains("mock failure for role 'Data Modeler'"))
        .stdout(predicate::str::contains("crew_output.txt"));
}

#[test]
fn test_run_quiet_prints_nothing() {
    let env = TestEnvironment::with_mock(&[]);
    env.cmd()
        .args(["--quiet", "run", "--config", env.config()])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert!(env.output_exists("crew_output.txt"));
}

#[test]
fn test_run_strict_fails_on_item_failure() {
    let env = TestEnvironment::with_mock(&["Data Modeler"]);
    env.cmd()
        .args(["run", "--strict", "--config", env.config()])
        .assert()
        .code(50)
        .stderr(predicate::str::contains("1 of 3 work items did not succeed"));

    // Files are still written before the strict check
    assert!(env.output_exists("schema_output.txt"));
}

#[test]
fn test_run_strict_succeeds_without_failures() {
    let env = TestEnvironment::with_mock(&[]);
    env.cmd()
        .args(["run", "--strict", "--config", env.config()])
        .assert()
        .success();
}

// ─────────────────────────────────────────────────────────────────
// Verbosity and Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_verbose_flag() {
    crew_cmd().args(["-v", "version"]).assert().success();
}

#[test]
fn test_very_verbose_flag() {
    crew_cmd().args(["-vv", "version"]).assert().success();
}

#[test]
fn test_unknown_command() {
    crew_cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    crew_cmd().assert().failure();
}
