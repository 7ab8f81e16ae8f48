//! Help and version specs

use crate::prelude::*;

#[test]
fn help_lists_every_command() {
    turnstile()
        .args(&["--help"])
        .passes()
        .stdout_has("lock")
        .stdout_has("publish")
        .stdout_has("listen")
        .stdout_has("completions")
        .stdout_has("--store-url");
}

#[test]
fn lock_help_lists_operations() {
    turnstile()
        .args(&["lock", "--help"])
        .passes()
        .stdout_has("acquire")
        .stdout_has("release")
        .stdout_has("extend")
        .stdout_has("status")
        .stdout_has("run");
}

#[test]
fn acquire_help_shows_defaults() {
    turnstile()
        .args(&["lock", "acquire", "--help"])
        .passes()
        .stdout_has("30s")
        .stdout_has("100ms");
}

#[test]
fn version_flag_prints_version() {
    turnstile()
        .args(&["--version"])
        .passes()
        .stdout_has("turnstile");
}
