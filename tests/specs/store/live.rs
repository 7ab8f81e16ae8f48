//! Specs against a real Redis
//!
//! Set `TURNSTILE_TEST_REDIS_URL` to run them.

use crate::prelude::*;

macro_rules! live_store {
    () => {
        match live_store() {
            Some(url) => url,
            None => return,
        }
    };
}

#[test]
fn acquire_then_release() {
    let url = live_store!();
    let id = unique("acq");

    let acquired = turnstile()
        .store(&url)
        .args(&["lock", "acquire", "specs", &id, "--ttl", "10s"])
        .passes();
    let token = acquired.stdout().trim().to_string();
    assert!(!token.is_empty());

    turnstile()
        .store(&url)
        .args(&["lock", "status", "specs", &id])
        .passes()
        .stdout_has("held");

    turnstile()
        .store(&url)
        .args(&["lock", "release", "specs", &id, &token])
        .passes()
        .stdout_has("released");

    turnstile()
        .store(&url)
        .args(&["lock", "status", "specs", &id])
        .passes()
        .stdout_has("free");
}

#[test]
fn second_acquire_is_contended() {
    let url = live_store!();
    let id = unique("contended");

    turnstile()
        .store(&url)
        .args(&["lock", "acquire", "specs", &id, "--ttl", "10s"])
        .passes();

    turnstile()
        .store(&url)
        .args(&["lock", "acquire", "specs", &id, "--retries", "1", "--retry-delay", "10ms"])
        .exits_with(EXIT_CONTENDED)
        .stderr_has("held by another owner");
}

#[test]
fn foreign_token_cannot_release() {
    let url = live_store!();
    let id = unique("foreign");

    turnstile()
        .store(&url)
        .args(&["lock", "acquire", "specs", &id, "--ttl", "10s"])
        .passes();

    turnstile()
        .store(&url)
        .args(&["lock", "release", "specs", &id, "not-my-token"])
        .exits_with(EXIT_FAILURE)
        .stderr_has("was not released");
}

#[test]
fn extend_reports_new_ttl_in_json() {
    let url = live_store!();
    let id = unique("extend");

    let token = turnstile()
        .store(&url)
        .args(&["lock", "acquire", "specs", &id, "--ttl", "2s"])
        .passes()
        .stdout()
        .trim()
        .to_string();

    turnstile()
        .store(&url)
        .args(&["--output", "json", "lock", "extend", "specs", &id, &token, "--ttl", "20s"])
        .passes()
        .stdout_has("\"ttl_ms\": 20000");
}

#[test]
fn run_passes_through_exit_code_and_releases() {
    let url = live_store!();
    let id = unique("run");

    turnstile()
        .store(&url)
        .args(&["lock", "run", "specs", &id, "--", "sh", "-c", "echo inside; exit 7"])
        .exits_with(7)
        .stdout_has("inside");

    turnstile()
        .store(&url)
        .args(&["lock", "status", "specs", &id])
        .passes()
        .stdout_has("free");
}

#[test]
fn publish_without_listeners_reaches_nobody() {
    let url = live_store!();
    let channel = unique("quiet");

    turnstile()
        .store(&url)
        .args(&["publish", &channel, "hello"])
        .passes()
        .stdout_has("0");
}
