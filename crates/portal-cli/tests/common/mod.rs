//! Shared E2E test helpers for `portal` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::Path;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

/// Variables read by the config loader. Removed so the host environment
/// cannot leak into a test.
const PORTAL_ENV_VARS: &[&str] = &[
    "PORTAL_EXPORTED",
    "PORTAL_SINGLE_TENANT",
    "PORTAL_STABLE_CHANNEL",
    "PORTAL_AUTHORITIES",
    "PORTAL_OWNER_UID",
    "RUST_LOG",
];

/// Build a Command for the `portal` binary isolated in a fresh home and
/// project directory.
///
/// Returns (command, _guard); keep the guard alive for the test's duration.
pub fn portal_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir for home");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("portal");
    cmd.timeout(TIMEOUT_BASIC);
    for var in PORTAL_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", tmp.path()).current_dir(tmp.path());
    (cmd, tmp)
}

/// Writes `content` as `<dir>/portal.toml` and returns its path as a string.
pub fn write_config(dir: &Path, content: &str) -> String {
    let path = dir.join("portal.toml");
    std::fs::write(&path, content).expect("write config");
    path.to_str().expect("valid utf8").to_string()
}

/// Notes resource: reads need `READ` (suppressed for uid 10060), the
/// private subtree needs `PRIVATE`, writes are open.
pub const NOTES_CONFIG: &str = r#"
[resource]
authorities = ["com.example.notes"]
owner_uid = 10001
read_permission = "com.example.notes.READ"

[[resource.path_rules]]
path = "/private/*"
kind = "glob"
read_permission = "com.example.notes.PRIVATE"

[[simulation.held]]
uid = 10050
permission = "com.example.notes.READ"

[[simulation.held]]
uid = 10060
permission = "com.example.notes.READ"

[[simulation.ops]]
permission = "com.example.notes.READ"
op = 14

[[simulation.modes]]
op = 14
uid = 10060
mode = "ignored"

[[simulation.grants]]
locator = "content://com.example.notes/private/1"
uid = 10070
read = true

[[simulation.packages]]
package = "com.example.client"
uid = 10050
"#;
