use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::path::Path;
use tempfile::TempDir;

const LOCAL_ENV: &str = "\
# loopback domain so probes stay on this host
DOMAIN_NAME=example.test
DC_IP=127.0.0.1
DC_FQDN=localhost
HOST_NAME=localhost
PRIMARY_ARTIFACT_DIR=/nonexistent/domainjoin-agent
";

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("domainjoin").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("DOMAINJOIN_ENV_FILE")
        .env_remove("DOMAINJOIN_ADMIN_PASSWORD")
        .env_remove("DOMAINJOIN_ADMIN_PASSWORD_FILE")
        .env_remove("RUST_LOG");
    cmd
}

fn env_file(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("domain.env");
    std::fs::write(&path, contents).unwrap();
    path
}

fn with_env(path: &Path) -> Command {
    let mut cmd = cmd();
    cmd.arg("--env-file").arg(path);
    cmd
}

#[test]
fn help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("join"))
        .stdout(contains("configure"))
        .stdout(contains("verify"))
        .stdout(contains("status"));
}

#[test]
fn missing_env_file_is_fatal() {
    let dir = TempDir::new().unwrap();

    cmd()
        .arg("--env-file")
        .arg(dir.path().join("absent.env"))
        .arg("status")
        .assert()
        .code(1)
        .stdout(contains("[ERROR]"))
        .stdout(contains("environment file not found"));
}

#[test]
fn invalid_dc_ip_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = env_file(
        &dir,
        "DOMAIN_NAME=example.test\nDC_IP=not-an-ip\nDC_FQDN=dc1.example.test\n",
    );

    with_env(&path)
        .arg("status")
        .assert()
        .code(1)
        .stdout(contains("[ERROR]"))
        .stdout(contains("DC_IP"));
}

#[test]
fn env_file_from_environment_variable() {
    let dir = TempDir::new().unwrap();
    let path = env_file(&dir, "DC_IP=127.0.0.1\nDC_FQDN=localhost\n");

    cmd()
        .env("DOMAINJOIN_ENV_FILE", &path)
        .arg("status")
        .assert()
        .code(1)
        .stdout(contains("DOMAIN_NAME"));
}

#[test]
fn join_without_credential_fails_before_any_change() {
    let dir = TempDir::new().unwrap();
    let path = env_file(&dir, LOCAL_ENV);

    // Not root, or root without ADMIN_PASSWORD: preflight stops either way
    with_env(&path)
        .args(["join", "--backend", "fallback"])
        .assert()
        .code(1)
        .stdout(contains("[ERROR]"))
        .stdout(contains("Precondition failed"));
}

#[test]
fn unknown_backend_is_usage_error() {
    cmd()
        .args(["join", "--backend", "both"])
        .assert()
        .failure()
        .stderr(contains("both"));
}

#[test]
fn status_reports_both_backends() {
    let dir = TempDir::new().unwrap();
    let path = env_file(&dir, LOCAL_ENV);

    with_env(&path)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("primary agent"))
        .stdout(contains("fallback broker"))
        .stdout(contains("none in /nonexistent/domainjoin-agent"));
}

#[test]
fn verify_json_emits_full_report() {
    let dir = TempDir::new().unwrap();
    let path = env_file(&dir, LOCAL_ENV);

    let output = with_env(&path)
        .args(["verify", "localhost", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 21);
    assert_eq!(report["target"], "localhost");
    assert!(report["generated_at"].is_string());

    let passed = report["passed"].as_u64().unwrap();
    let failed = report["failed"].as_u64().unwrap();
    let skipped = report["skipped"].as_u64().unwrap();
    assert_eq!(passed + failed + skipped, 21);

    // No credential configured: the ticket check is never attempted
    let kerberos = results
        .iter()
        .find(|r| r["name"] == "kerberos.ticket")
        .unwrap();
    assert_eq!(kerberos["status"], "SKIP");
}

#[test]
fn verify_text_output_is_tagged() {
    let dir = TempDir::new().unwrap();
    let path = env_file(&dir, LOCAL_ENV);

    with_env(&path)
        .args(["verify", "localhost"])
        .assert()
        .success()
        .stdout(contains("dns.controller"))
        .stdout(contains("Verification Summary"))
        .stdout(predicate::str::is_match(r"\[(PASS|FAIL|SKIP)\] dns\.target_host").unwrap());
}
