//! Integration tests for the `filterctl` binary.
//!
//! Argument parsing, help output, completions, manifest planning and error
//! exit codes run without a router. The apply tests drive a wiremock
//! command gateway.
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `filterctl` binary with env isolation.
///
/// Clears all `FILTERCTL_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn filterctl_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("filterctl");
    cmd.env("HOME", "/tmp/filterctl-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/filterctl-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/filterctl-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("FILTERCTL_PROFILE")
        .env_remove("FILTERCTL_ROUTER")
        .env_remove("FILTERCTL_USERNAME")
        .env_remove("FILTERCTL_PASSWORD")
        .env_remove("FILTERCTL_STATE")
        .env_remove("FILTERCTL_OUTPUT")
        .env_remove("FILTERCTL_INSECURE")
        .env_remove("FILTERCTL_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const WEB_MANIFEST: &str = r#"
[[group]]
name = "web"
sequence_start = 100

[[group.entry]]
action = "pass"
protocol = "tcp"
destination_port = "443"

[[group.entry]]
action = "reject"

[[group.binding]]
interface = "lan1"
direction = "in"
"#;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let file = dir.join(name);
    std::fs::write(&file, contents).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = filterctl_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    filterctl_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("filter")
            .and(predicate::str::contains("plan"))
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("import")),
    );
}

#[test]
fn test_version_flag() {
    filterctl_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("filterctl"));
}

#[test]
fn test_completions_zsh() {
    filterctl_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    filterctl_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_step_requires_start() {
    let output = filterctl_cmd()
        .args(["import", "ip/web:5,6", "--step", "5"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Plan ────────────────────────────────────────────────────────────

#[test]
fn test_plan_shows_numbered_commands() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(dir.path(), "filters.toml", WEB_MANIFEST);

    filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .args(["--color", "never", "plan", "-f"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ip/web (create)")
                .and(predicate::str::contains("+ ip filter 100 pass * * tcp * 443"))
                .and(predicate::str::contains("+ ip filter 110 reject * * *"))
                .and(predicate::str::contains("+ ip lan1 secure filter in 100 110"))
                .and(predicate::str::contains("1 to create")),
        );
}

#[test]
fn test_plan_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(dir.path(), "filters.toml", WEB_MANIFEST);

    let output = filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .args(["-o", "json", "plan", "-f"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["items"][0]["target"], "ip/web");
    assert_eq!(plan["items"][0]["action"], "create");
    assert_eq!(plan["items"][0]["changes"][0]["change"], "add");
}

#[test]
fn test_plan_rejects_cross_group_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(
        dir.path(),
        "filters.yaml",
        r#"
group:
  - name: a
    entry:
      - { sequence: 10, action: pass }
  - name: b
    entry:
      - { sequence: 10, action: reject }
"#,
    );

    let output = filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .args(["plan", "-f"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("10"));
}

#[test]
fn test_plan_rejects_bad_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(dir.path(), "filters.toml", "[[group]]\nname = 3\n");

    let output = filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .args(["plan", "-f"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── State ───────────────────────────────────────────────────────────

#[test]
fn test_state_list_empty() {
    let dir = tempfile::tempdir().unwrap();
    filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .args(["-o", "json", "state", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_state_show_unknown_group() {
    let dir = tempfile::tempdir().unwrap();
    let output = filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .args(["state", "show", "ip/web"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

// ── Router commands ─────────────────────────────────────────────────

#[test]
fn test_read_without_router_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = filterctl_cmd()
        .arg("--state")
        .arg(dir.path().join("state.json"))
        .arg("read")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("config") || text.contains("router"),
        "Expected a configuration hint:\n{text}"
    );
}

#[test]
fn test_delete_requires_yes_without_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let state = write(
        dir.path(),
        "state.json",
        &json!({
            "version": 1,
            "groups": {
                "ip/web": {
                    "updated_at": "2026-01-01T00:00:00Z",
                    "state": {
                        "family": "ip",
                        "group": {
                            "name": "web",
                            "table": "ip",
                            "mode": { "kind": "manual" },
                            "entries": [{ "number": 5, "action": "pass" }]
                        }
                    }
                }
            }
        })
        .to_string(),
    );

    let output = filterctl_cmd()
        .arg("--state")
        .arg(&state)
        .args(["delete", "ip/web"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

/// Accepts every command with empty output.
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let results: Vec<_> = body["commands"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| json!({ "command": c, "output": "" }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "results": results }))
    }
}

/// Rejects `command` the first time it is sent, then accepts everything.
struct RejectOnce {
    command: &'static str,
    rejected: Arc<AtomicBool>,
}

impl Respond for RejectOnce {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let results: Vec<_> = body["commands"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| {
                let output = if c.as_str() == Some(self.command)
                    && !self.rejected.swap(true, Ordering::SeqCst)
                {
                    "Error: Command rejected"
                } else {
                    ""
                };
                json!({ "command": c, "output": output })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "results": results }))
    }
}

/// Every command sent to the gateway, across all requests.
async fn sent_commands(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .flat_map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["commands"]
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c.as_str().unwrap().to_owned())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn apply_cmd(server: &MockServer, state: &Path, manifest: &Path) -> assert_cmd::Command {
    let mut cmd = apply_cmd(&server, &state, &manifest);
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(
        output.status.success(),
        "apply failed:\n{}",
        combined_output(&output)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("ip/web"));

    let sent = sent_commands(&server).await;
    assert!(sent.contains(&"ip filter 100 pass * * tcp * 443".to_owned()));
    assert!(sent.contains(&"ip filter 110 reject * * *".to_owned()));
    assert!(sent.contains(&"ip lan1 secure filter in 100 110".to_owned()));

    let recorded: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    let group = &recorded["groups"]["ip/web"]["state"];
    assert_eq!(group["family"], "ip");
    assert_eq!(group["group"]["entries"][1]["number"], 110);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_interrupted_apply_converges_on_rerun() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/commands"))
        .respond_with(RejectOnce {
            command: "ip filter 110 reject * * *",
            rejected: Arc::new(AtomicBool::new(false)),
        })
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manifest = write(dir.path(), "filters.toml", WEB_MANIFEST);
    let state = dir.path().join("state.json");

    let mut first = apply_cmd(&server, &state, &manifest);
    let output = tokio::task::spawn_blocking(move || first.output().unwrap())
        .await
        .unwrap();
    assert!(!output.status.success(), "first apply should fail");
    let sent = sent_commands(&server).await;
    assert!(!sent.iter().any(|c| c.starts_with("ip lan1 secure filter in")));

    let recorded: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(recorded["groups"]["ip/web"]["pending"], true);

    let first_run = sent.len();
    let mut second = apply_cmd(&server, &state, &manifest);
    let output = tokio::task::spawn_blocking(move || second.output().unwrap())
        .await
        .unwrap();
    assert!(
        output.status.success(),
        "second apply failed:\n{}",
        combined_output(&output)
    );

    let resent = sent_commands(&server).await.split_off(first_run);
    assert!(resent.contains(&"ip filter 110 reject * * *".to_owned()));
    assert!(resent.contains(&"ip lan1 secure filter in 100 110".to_owned()));

    let recorded: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    assert!(recorded["groups"]["ip/web"].get("pending").is_none());
    assert_eq!(recorded["groups"]["ip/web"]["state"]["group"]["entries"][1]["number"], 110);

    let mut third = apply_cmd(&server, &state, &manifest);
    let output = tokio::task::spawn_blocking(move || third.output().unwrap())
        .await
        .unwrap();
    assert!(output.status.success());
    assert!(combined_output(&output).contains("No changes"));
}
