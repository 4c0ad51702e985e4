#![allow(deprecated)]
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use cucumber::{given, then, when};
use predicates::prelude::*;

use crate::MarafonWorld;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A `marafon` invocation with a clean environment: no bot token, local
/// listener, and the given database URL.
fn marafon(database_url: &str, port: u16) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("marafon").expect("marafon binary not found");
    cmd.env("DATABASE_URL", database_url)
        .env("WEBHOOK_HOST", "127.0.0.1")
        .env("WEBHOOK_PORT", port.to_string())
        .env_remove("BOT_TOKEN")
        .env_remove("WEBHOOK_TOKEN")
        .env_remove("ADMIN_IDS")
        .timeout(Duration::from_secs(20));
    cmd
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local addr")
        .port()
}

fn temp_dir(world: &mut MarafonWorld) -> PathBuf {
    if world.db_dir.is_none() {
        world.db_dir = Some(tempfile::TempDir::new().expect("create temp dir"));
    }
    world
        .db_dir
        .as_ref()
        .map(|d| d.path().to_path_buf())
        .expect("temp dir")
}

fn run(world: &mut MarafonWorld, mut cmd: assert_cmd::Command) {
    let output = cmd.output().expect("failed to run marafon");
    world.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
    world.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
    world.last_exit_code = output.status.code().unwrap_or(-1);
}

fn database_url(world: &MarafonWorld) -> String {
    world
        .db_path
        .as_ref()
        .expect("no database — did you forget 'Given a marafon database is initialized'?")
        .display()
        .to_string()
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("another process is listening on the webhook port")]
async fn another_process_is_listening(world: &mut MarafonWorld) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    world.server_port = Some(listener.local_addr().expect("local addr").port());
    world.blocker = Some(listener);
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when(expr = "I run marafon init with database {string}")]
async fn i_run_init(world: &mut MarafonWorld, relative: String) {
    let path = temp_dir(world).join(relative);
    let cmd = {
        let mut cmd = marafon(&format!("sqlite:///{}", path.display()), free_port());
        cmd.arg("init");
        cmd
    };
    run(world, cmd);
    world.db_path = Some(path);
}

#[when("I start marafon on the occupied port")]
async fn i_start_on_occupied_port(world: &mut MarafonWorld) {
    let port = world.server_port.expect("no occupied port");
    let path = temp_dir(world).join("db.sqlite3");
    let cmd = {
        let mut cmd = marafon(&path.display().to_string(), port);
        cmd.arg("serve");
        cmd
    };
    run(world, cmd);
}

#[when("I start marafon with a database path below a regular file")]
async fn i_start_with_unwritable_database(world: &mut MarafonWorld) {
    let dir = temp_dir(world);
    let file = dir.join("not-a-directory");
    std::fs::write(&file, b"").expect("create blocking file");
    let path = file.join("db.sqlite3");
    run(world, marafon(&path.display().to_string(), free_port()));
}

#[when("I start marafon in the background")]
async fn i_start_in_background(world: &mut MarafonWorld) {
    let port = free_port();
    let path = temp_dir(world).join("served").join("db.sqlite3");
    let child = Command::new(assert_cmd::cargo::cargo_bin("marafon"))
        .env("DATABASE_URL", &path)
        .env("WEBHOOK_HOST", "127.0.0.1")
        .env("WEBHOOK_PORT", port.to_string())
        .env_remove("BOT_TOKEN")
        .env_remove("WEBHOOK_TOKEN")
        .env_remove("ADMIN_IDS")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn marafon");
    world.child = Some(child);
    world.server_port = Some(port);
    world.db_path = Some(path);

    for _ in 0..100 {
        if world
            .http_client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("marafon did not start listening on port {port}");
}

#[when(expr = "I run marafon find-payment {string} with JSON output")]
async fn i_run_find_payment(world: &mut MarafonWorld, query: String) {
    let mut cmd = marafon(&database_url(world), free_port());
    cmd.args(["find-payment", &query, "--json"]);
    run(world, cmd);
}

#[when(expr = "I run marafon export-logs from {string} to {string} into {string}")]
async fn i_run_export_logs(world: &mut MarafonWorld, start: String, end: String, file: String) {
    let output = temp_dir(world).join(file);
    let mut cmd = marafon(&database_url(world), free_port());
    cmd.args(["export-logs", &start, &end, "--output"]).arg(&output);
    run(world, cmd);
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the command succeeds")]
async fn the_command_succeeds(world: &mut MarafonWorld) {
    assert_eq!(
        world.last_exit_code, 0,
        "expected success, stderr:\n{}",
        world.last_stderr
    );
}

#[then("the command fails")]
async fn the_command_fails(world: &mut MarafonWorld) {
    assert_ne!(
        world.last_exit_code, 0,
        "expected a failure, stdout:\n{}",
        world.last_stdout
    );
}

#[then(expr = "stdout contains {string}")]
async fn stdout_contains(world: &mut MarafonWorld, expected: String) {
    assert!(
        predicate::str::contains(expected.as_str()).eval(&world.last_stdout),
        "expected stdout to contain {expected:?}, got:\n{}",
        world.last_stdout
    );
}

#[then(expr = "the JSON output describes payment {string}")]
async fn the_json_output_describes_payment(world: &mut MarafonWorld, order_id: String) {
    let report: serde_json::Value =
        serde_json::from_str(&world.last_stdout).expect("stdout is not JSON");
    assert_eq!(report["payment"]["order_id"], serde_json::json!(order_id));
    assert!(report["logs"].is_array(), "report has no logs list: {report}");
}

#[then(expr = "stderr contains {string}")]
async fn stderr_contains(world: &mut MarafonWorld, expected: String) {
    assert!(
        predicate::str::contains(expected.as_str()).eval(&world.last_stderr),
        "expected stderr to contain {expected:?}, got:\n{}",
        world.last_stderr
    );
}

#[then("the database file exists")]
async fn the_database_file_exists(world: &mut MarafonWorld) {
    let path = world.db_path.as_ref().expect("no database path");
    assert!(path.is_file(), "{} was not created", path.display());
}

#[then(expr = "the health endpoint answers {string}")]
async fn the_health_endpoint_answers(world: &mut MarafonWorld, expected: String) {
    let port = world.server_port.expect("server not started");
    let body = world
        .http_client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .expect("health request")
        .text()
        .await
        .expect("health body");
    assert_eq!(body, expected);
}

#[then(expr = "the file {string} starts with the CSV header")]
async fn the_file_starts_with_header(world: &mut MarafonWorld, file: String) {
    let path = temp_dir(world).join(file);
    let content = std::fs::read_to_string(&path).expect("read export");
    assert!(
        content.starts_with("\u{feff}id,telegram_id,email,order_id,group_name,group_id,action,timestamp,comment"),
        "unexpected export:\n{content}"
    );
}
