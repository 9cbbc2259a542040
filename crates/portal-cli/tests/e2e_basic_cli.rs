//! E2E integration tests for the `portal` binary.
//!
//! Spawns the real binary against a temporary config file. Decisions go
//! to stdout; errors and tracing output go to stderr.

mod common;

use common::{portal_cmd, write_config, NOTES_CONFIG};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

const PRIVATE_NOTE: &str = "content://com.example.notes/private/1";

// ─── check ─────────────────────────────────────────────────────────

#[test]
fn check_allowed_exits_zero() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", "content://com.example.notes/items/1"])
        .args(["--uid", "10050"])
        .assert()
        .success()
        .stdout(contains("decision: allowed"));
}

#[test]
fn check_errored_exits_three_with_hint() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", PRIVATE_NOTE])
        .args(["--uid", "10099"])
        .assert()
        .code(3)
        .stdout(contains("decision: errored"))
        .stdout(contains("missing: com.example.notes.PRIVATE"))
        .stdout(contains("hint: requires com.example.notes.PRIVATE"));
}

#[test]
fn check_ignored_exits_two() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", "content://com.example.notes/items"])
        .args(["--uid", "10060"])
        .assert()
        .code(2)
        .stdout(contains("decision: ignored"));
}

#[test]
fn check_write_is_open() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "write", "content://com.example.notes/items"])
        .args(["--uid", "10099"])
        .assert()
        .success();
}

#[test]
fn check_grant_from_config() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", PRIVATE_NOTE])
        .args(["--uid", "10070"])
        .assert()
        .success()
        .stdout(contains("decision: allowed"));
}

#[test]
fn check_owner_bypasses() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", PRIVATE_NOTE])
        .args(["--uid", "10001"])
        .assert()
        .success();
}

#[test]
fn check_foreign_authority_fails() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", "content://com.evil/items"])
        .args(["--uid", "10050"])
        .assert()
        .code(1)
        .stderr(contains("com.evil"));
}

#[test]
fn check_verifies_package() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "check", "read", "content://com.example.notes/items"])
        .args(["--uid", "10060", "--package", "com.example.client"])
        .assert()
        .code(1)
        .stderr(contains("com.example.client"));
}

#[test]
fn check_reads_project_config() {
    let (mut cmd, guard) = portal_cmd();
    let dir = guard.path().join(".portal");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(dir.join("config.toml"), NOTES_CONFIG).expect("write config");

    cmd.args(["check", "read", PRIVATE_NOTE, "--uid", "10099"])
        .assert()
        .code(3);
}

#[test]
fn env_var_overrides_config() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.env("PORTAL_AUTHORITIES", "com.example.other")
        .args(["--config", config.as_str(), "check", "read", "content://com.example.notes/items"])
        .args(["--uid", "10050"])
        .assert()
        .code(1);
}

#[test]
fn missing_config_file_fails() {
    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["--config", "/nonexistent/portal.toml", "check", "read", "content://a/b"])
        .args(["--uid", "1"])
        .assert()
        .code(1)
        .stderr(contains("Config error"));
}

#[test]
fn debug_flag_emits_tracing() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["-d", "--config", config.as_str(), "check", "read"])
        .args(["content://com.example.notes/items", "--uid", "10050"])
        .assert()
        .success()
        .stderr(contains("access allowed"));
}

// ─── locator ───────────────────────────────────────────────────────

#[test]
fn locator_strip() {
    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["locator", "strip", "content://10@com.example.notes/items/1"])
        .assert()
        .success()
        .stdout(contains("content://com.example.notes/items/1"))
        .stdout(contains("10@").not());
}

#[test]
fn locator_with_tenant() {
    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["locator", "with-tenant", "content://com.example.notes/items", "--tenant", "10"])
        .assert()
        .success()
        .stdout(contains("content://10@com.example.notes/items"));
}

#[test]
fn locator_with_tenant_requires_tenant() {
    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["locator", "with-tenant", "content://com.example.notes/items"])
        .assert()
        .code(1)
        .stderr(contains("--tenant"));
}

#[test]
fn locator_normalize_and_tenant() {
    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["locator", "normalize", "content://com.example.notes//items///1"])
        .assert()
        .success()
        .stdout(contains("content://com.example.notes/items/1"));

    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["locator", "tenant", "content://7@com.example.notes/items"])
        .assert()
        .success()
        .stdout(contains("7"));
}

#[test]
fn locator_rejects_garbage() {
    let (mut cmd, _guard) = portal_cmd();
    cmd.args(["locator", "strip", "not a locator"])
        .assert()
        .code(1)
        .stderr(contains("invalid locator"));
}

// ─── config ────────────────────────────────────────────────────────

#[test]
fn config_prints_effective_toml() {
    let (mut cmd, guard) = portal_cmd();
    let config = write_config(guard.path(), NOTES_CONFIG);
    cmd.args(["--config", config.as_str(), "config"])
        .assert()
        .success()
        .stdout(contains("com.example.notes.PRIVATE"))
        .stdout(contains("[resource]"));
}
