//! Error reporting specs
//!
//! None of these reach a store.

use crate::prelude::*;

#[test]
fn missing_store_url_suggests_env_var() {
    turnstile()
        .args(&["lock", "status", "orders", "42"])
        .exits_with(EXIT_FAILURE)
        .stderr_has("No coordination store configured")
        .stderr_has("TURNSTILE_STORE_URL");
}

#[test]
fn non_redis_scheme_is_rejected() {
    turnstile()
        .store("http://localhost:6379")
        .args(&["publish", "orders", "hi"])
        .exits_with(EXIT_FAILURE)
        .stderr_has("Invalid store URL");
}

#[test]
fn blank_resource_fails_before_connecting() {
    turnstile()
        .store(UNREACHABLE_STORE)
        .args(&["lock", "status", " ", "42"])
        .exits_with(EXIT_FAILURE)
        .stderr_has("error:");
}

#[test]
fn invalid_json_body_is_rejected() {
    turnstile()
        .store(UNREACHABLE_STORE)
        .args(&["publish", "orders", "{nope", "--json"])
        .exits_with(EXIT_FAILURE)
        .stderr_has("not valid JSON");
}

#[test]
fn unknown_command_is_a_usage_error() {
    turnstile().args(&["frobnicate"]).exits_with(2);
}
