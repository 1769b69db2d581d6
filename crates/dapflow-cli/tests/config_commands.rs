mod common;

use common::TestFixture;
use predicates::prelude::*;

#[test]
fn test_config_path_prints_explicit_path() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            fixture.config_path().display().to_string(),
        ));
}

#[test]
#[allow(deprecated)]
fn test_config_path_honors_environment_variable() {
    let fixture = TestFixture::new();
    let env_path = fixture.root().join("from-env.toml");

    assert_cmd::Command::cargo_bin("dapflow")
        .unwrap()
        .env("DAPFLOW_CONFIG", &env_path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-env.toml"));
}

#[test]
fn test_config_show_missing_file_prints_defaults() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[timing]"))
        .stdout(predicate::str::contains("stop_timeout_ms = 86400000"))
        .stdout(predicate::str::contains("quiescence_attempts"));
}

#[test]
fn test_config_show_json_merges_file_with_defaults() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[timing]
poll_interval_ms = 25

[[configurations]]
name = "api"
type = "debugpy"
request = "launch"
module = "uvicorn"
"#,
    );

    let output = fixture
        .command()
        .args(["config", "show", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = common::stdout_json(&output);
    assert_eq!(json["timing"]["poll_interval_ms"], 25);
    assert_eq!(json["timing"]["poll_timeout_ms"], 5000);
    assert_eq!(json["configurations"][0]["name"], "api");
    assert_eq!(json["configurations"][0]["module"], "uvicorn");
}

#[test]
fn test_check_without_file_reports_defaults() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("built-in defaults apply"));
}

#[test]
fn test_check_accepts_valid_file() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[[configurations]]
name = "api"
type = "debugpy"
request = "launch"
"#,
    );

    fixture
        .command()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Config OK"))
        .stdout(predicate::str::contains("1 launch configuration(s)"));
}

#[test]
fn test_check_reports_duplicate_names() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[[configurations]]
name = "api"
type = "debugpy"
request = "launch"

[[configurations]]
name = "api"
type = "pwa-node"
request = "launch"
"#,
    );

    fixture
        .command()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "configuration 'api' is defined more than once",
        ))
        .stderr(predicate::str::contains("1 problem(s) found"));
}

#[test]
fn test_check_rejects_malformed_toml() {
    let fixture = TestFixture::new();
    fixture.write_config("[timing\npoll_interval_ms = 1\n");

    fixture
        .command()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
}
