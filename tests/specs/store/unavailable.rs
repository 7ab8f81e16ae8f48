//! Specs against a store that never answers

use crate::prelude::*;

#[test]
fn acquire_reports_unavailable() {
    turnstile()
        .store(UNREACHABLE_STORE)
        .args(&["lock", "acquire", "orders", "42"])
        .exits_with(EXIT_UNAVAILABLE)
        .stderr_has("unavailable")
        .stderr_has("--connect-timeout");
}

#[test]
fn publish_reports_unavailable() {
    turnstile()
        .store(UNREACHABLE_STORE)
        .args(&["publish", "orders", "hi"])
        .exits_with(EXIT_UNAVAILABLE);
}

#[test]
fn listen_reports_unavailable() {
    turnstile()
        .store(UNREACHABLE_STORE)
        .args(&["listen", "orders"])
        .exits_with(EXIT_UNAVAILABLE);
}

#[test]
fn run_does_not_start_the_command() {
    turnstile()
        .store(UNREACHABLE_STORE)
        .args(&["lock", "run", "orders", "42", "--", "echo", "ran"])
        .exits_with(EXIT_UNAVAILABLE)
        .stdout_lacks("ran");
}

#[test]
fn store_url_can_come_from_env() {
    turnstile()
        .env("TURNSTILE_STORE_URL", UNREACHABLE_STORE)
        .args(&["--connect-timeout", "300ms", "lock", "status", "orders", "42"])
        .exits_with(EXIT_UNAVAILABLE);
}

#[test]
fn password_is_not_echoed() {
    turnstile()
        .store("redis://:s3cret@127.0.0.1:1")
        .args(&["lock", "status", "orders", "42"])
        .exits_with(EXIT_UNAVAILABLE)
        .stderr_has("***");
}
