// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn args(data: &str, json: bool) -> PublishArgs {
    PublishArgs {
        channel: "orders".to_string(),
        data: data.to_string(),
        json,
    }
}

#[test]
fn text_body_passes_through() {
    let payload = args("  {not json ", false).payload().unwrap();
    assert_eq!(payload.as_str(), "  {not json ");
}

#[test]
fn json_body_is_compacted() {
    let payload = args("{ \"id\" : 42 }", true).payload().unwrap();
    assert_eq!(payload.as_str(), "{\"id\":42}");
}

#[test]
fn json_string_is_published_unquoted() {
    let payload = args("\"hello\"", true).payload().unwrap();
    assert_eq!(payload.as_str(), "hello");
}

#[test]
fn invalid_json_is_a_user_error() {
    let err = args("{oops", true).payload().unwrap_err();
    assert!(err.message.contains("not valid JSON"));
    assert_eq!(err.suggestions.len(), 1);
}

#[test]
fn published_text_is_receiver_count() {
    let report = Published {
        channel: "orders",
        receivers: 2,
    };
    assert_eq!(report.to_string(), "2");
}
