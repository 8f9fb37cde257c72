use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn cargo_bin() -> Command {
    Command::cargo_bin("apichain").expect("binary exists")
}

fn workspace_with(server: &MockServer) -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("collections/health.yaml")
        .write_str(
            "name: Health\nrequests:\n  - name: ping\n    method: GET\n    url: \"{{base}}/ping\"\n    assert:\n      status: 200\n      jsonpath:\n        \"$.ok\": { eq: \"true\" }\n",
        )
        .unwrap();
    temp.child("env/dev.yaml")
        .write_str(&format!("vars:\n  base: {}\n", server.base_url()))
        .unwrap();
    temp.child("env/staging.yaml")
        .write_str("vars:\n  base: http://staging.invalid\n")
        .unwrap();
    temp
}

#[test]
fn displays_help() {
    let mut cmd = cargo_bin();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Collection-based API test runner"));
}

#[test]
fn displays_version() {
    let mut cmd = cargo_bin();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn errors_when_collection_missing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["run", "--collection", "missing"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("collection not found: missing"));
}

#[test]
fn lists_collections_and_environments() {
    let server = MockServer::start();
    let temp = workspace_with(&server);

    cargo_bin()
        .args(["collections", "-w"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Health"))
        .stdout(predicate::str::contains("health.yaml"));

    cargo_bin()
        .arg("envs")
        .arg("--workspace")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("dev\nstaging"));
}

#[test]
fn runs_a_collection_and_saves_the_artifact() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/ping");
        then.status(200)
            .header("content-type", "application/json")
            .body("{\"ok\":true}");
    });
    let temp = workspace_with(&server);

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["run", "-c", "health", "-e", "dev"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("1 requests, 0 failed"))
        .stdout(predicate::str::contains("Saved:"));

    mock.assert();
    temp.child("runs/index.jsonl")
        .assert(predicate::str::contains("\"env\":\"dev\""));
    temp.child(".apichain/logs/apichain.log")
        .assert(predicate::str::contains("run.finished"));
}

#[test]
fn failing_assertions_exit_non_zero_with_json_output() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ping");
        then.status(500).body("{\"ok\":false}");
    });
    let temp = workspace_with(&server);

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["run", "-c", "health", "--no-save", "--format", "json"]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("\"status_code\": 500"))
        .stdout(predicate::str::contains("\"passed\": false"));

    temp.child("runs").assert(predicate::path::missing());
}

#[test]
fn validates_a_collection_without_sending_requests() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });
    let temp = workspace_with(&server);

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["validate", "-c", "health", "-e", "dev"]);
    cmd.assert().success().stdout(predicate::str::diff("OK\n"));

    mock.assert_hits(0);
}

#[test]
fn validation_names_requests_with_missing_variables() {
    let server = MockServer::start();
    let temp = workspace_with(&server);
    temp.child("env/bare.yaml").write_str("vars: {}\n").unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["validate", "--collection", "health", "--env", "bare"]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains(
            "request \"ping\": request.url: missing variable: base",
        ))
        .stdout(predicate::str::contains("1 of 1 requests invalid"));
}

#[test]
fn validate_requires_a_collection() {
    let mut cmd = cargo_bin();
    cmd.arg("validate");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--collection"));
}

#[test]
fn init_scaffolds_a_workspace_and_keeps_existing_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".gitignore").write_str("target/\n").unwrap();

    let mut cmd = cargo_bin();
    cmd.args(["init", "--path"]).arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("created apichain.json"))
        .stdout(predicate::str::contains("Workspace ready"));

    temp.child("collections/demo.yaml")
        .assert(predicate::str::contains("name: Demo"));
    temp.child("runs").assert(predicate::path::is_dir());
    temp.child(".apichain/logs").assert(predicate::path::is_dir());
    temp.child(".gitignore").assert(predicate::str::diff(
        "target/\n\n# apichain\nruns/\n.apichain/\nenv/secrets.local.yaml\n",
    ));

    temp.child("env/dev.yaml")
        .write_str("vars:\n  base_url: http://mine\n")
        .unwrap();
    let mut cmd = cargo_bin();
    cmd.args(["init", "-p"]).arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("kept env/dev.yaml"));
    temp.child("env/dev.yaml")
        .assert(predicate::str::contains("http://mine"));

    let mut cmd = cargo_bin();
    cmd.args(["init", "--force", "-p"]).arg(temp.path());
    cmd.assert().success();
    temp.child("env/dev.yaml")
        .assert(predicate::str::contains("httpbin.org"));
}

#[test]
fn commands_find_the_workspace_from_a_subdirectory() {
    let server = MockServer::start();
    let temp = workspace_with(&server);
    temp.child("apichain.json").write_str("{}").unwrap();
    let nested = temp.child("collections/nested");
    nested.create_dir_all().unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(nested.path());
    cmd.arg("envs");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dev\nstaging"));
}

#[test]
fn version_subcommand_prints_build_info() {
    let mut cmd = cargo_bin();
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "apichain {} (commit=",
            env!("CARGO_PKG_VERSION")
        )));
}
