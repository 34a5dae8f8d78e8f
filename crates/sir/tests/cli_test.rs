//! Integration tests for the `sir` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! document validation and script rendering without touching real keys or DNS.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `sir` binary with env isolation.
///
/// Clears all `SIR_*` env vars and points config directories at `home`
/// so tests never touch the user's real settings.
fn sir_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sir");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("SIR_CONFIG")
        .env_remove("SIR_OUTPUT")
        .env_remove("SIR_DOCUMENT")
        .env_remove("SIR_SCRIPT_DIR")
        .env_remove("SIR_OPENSSL")
        .env_remove("SIR_OPENSSL_CONFIG")
        .env_remove("SIR_NSUPDATE")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Write a document with one cert whose PEM lives in `<dir>/certs/web.pem`.
fn write_document(dir: &Path) -> PathBuf {
    let cert_dir = dir.join("certs");
    std::fs::create_dir_all(&cert_dir).unwrap();
    let key = rcgen::generate_simple_self_signed(vec!["example.com".to_owned()]).unwrap();
    std::fs::write(cert_dir.join("web.pem"), key.cert.pem()).unwrap();

    let doc = dir.join("conf.yaml");
    std::fs::write(
        &doc,
        format!(
            r"
certDefaults:
  certDir: {}
certs:
  - name: web
    domains:
      - name: example.com
        zones:
          - name: example.com
            server: ns1.example.com
            port: 53
            records:
              - port: wildcard
",
            cert_dir.display()
        ),
    )
    .unwrap();
    doc
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = sir_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("addtlsa")
            .and(predicate::str::contains("updatetlsa"))
            .and(predicate::str::contains("phase1")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sir"));
}

#[test]
fn test_unknown_subcommand() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path()).arg("renew").assert().code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Document validation ─────────────────────────────────────────────

#[test]
fn test_check_lists_records() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    sir_cmd(dir.path())
        .args(["-o", "plain", "check", "-c"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "web *._tcp.example.com. 3600 TLSA 3 1 1",
        ))
        .stderr(predicate::str::contains("1 records"));
}

#[test]
fn test_check_reads_document_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    sir_cmd(dir.path())
        .env("SIR_DOCUMENT", &doc)
        .args(["--quiet", "check"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_check_rejects_record_outside_zone() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("conf.yaml");
    std::fs::write(
        &doc,
        r"
certs:
  - name: web
    domains:
      - name: example.org
        zones:
          - name: example.com
            records:
              - port: 443
",
    )
    .unwrap();

    let output = sir_cmd(dir.path())
        .args(["check", "-c"])
        .arg(&doc)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(
        text.contains("Root.Cert[0].Domain[0].Zone[0]"),
        "Expected the document position in output:\n{text}"
    );
}

#[test]
fn test_missing_document() {
    let dir = tempfile::tempdir().unwrap();
    sir_cmd(dir.path())
        .args(["check", "-c"])
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .code(3);
}

// ── Script rendering ────────────────────────────────────────────────

#[test]
fn test_script_add() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    sir_cmd(dir.path())
        .args(["script", "-c"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("server ns1.example.com 53")
                .and(predicate::str::contains("zone example.com."))
                .and(predicate::str::contains(
                    "update add *._tcp.example.com. 3600 TLSA 3 1 1 ",
                ))
                .and(predicate::str::contains("update delete").not()),
        );
}

#[test]
fn test_script_update_deletes_first() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    sir_cmd(dir.path())
        .args(["script", "--update", "-c"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "update delete *._tcp.example.com. TLSA\nupdate add *._tcp.example.com.",
        ));
}

#[test]
fn test_script_json() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    let output = sir_cmd(dir.path())
        .args(["-o", "json", "script", "-c"])
        .arg(&doc)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["key_file"], serde_json::Value::Null);
    assert!(value[0]["script"].as_str().unwrap().ends_with("send\n"));
}

#[test]
fn test_script_missing_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    std::fs::remove_file(dir.path().join("certs/web.pem")).unwrap();
    sir_cmd(dir.path())
        .args(["script", "-c"])
        .arg(&doc)
        .assert()
        .failure()
        .stderr(predicate::str::contains("web.pem"));
}

// ── Workflow steps ──────────────────────────────────────────────────

#[cfg(unix)]
#[test]
fn test_addtlsa_feeds_script_to_nsupdate() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    sir_cmd(dir.path())
        .env("SIR_NSUPDATE", "cat")
        .args(["addtlsa", "-c"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "update add *._tcp.example.com. 3600 TLSA 3 1 1 ",
        ))
        .stderr(predicate::str::contains("addtlsa"));
}

#[cfg(unix)]
#[test]
fn test_failing_nsupdate_exits_external() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_document(dir.path());
    sir_cmd(dir.path())
        .env("SIR_NSUPDATE", "false")
        .args(["addtlsa", "-c"])
        .arg(&doc)
        .assert()
        .code(4);
}

// ── Settings ────────────────────────────────────────────────────────

#[test]
fn test_settings_path() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path())
        .args(["settings", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_settings_show_defaults() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path())
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("document = \"/etc/sir/conf.yaml\""));
}

#[test]
fn test_settings_init_refuses_overwrite() {
    let home = tempfile::tempdir().unwrap();
    sir_cmd(home.path())
        .args(["settings", "init"])
        .assert()
        .success();
    sir_cmd(home.path())
        .args(["settings", "init"])
        .assert()
        .code(2);
    sir_cmd(home.path())
        .args(["settings", "init", "--force"])
        .assert()
        .success();
}
