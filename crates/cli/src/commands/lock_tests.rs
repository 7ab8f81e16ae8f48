// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[derive(Parser)]
struct Harness {
    #[command(subcommand)]
    command: LockCommand,
}

fn parse(args: &[&str]) -> Result<LockCommand, clap::Error> {
    let argv = std::iter::once("lock").chain(args.iter().copied());
    Harness::try_parse_from(argv).map(|h| h.command)
}

#[test]
fn acquire_defaults_match_library_defaults() {
    let LockCommand::Acquire { target, options } = parse(&["acquire", "orders", "42"]).unwrap()
    else {
        panic!("expected acquire");
    };

    assert_eq!(target.resource, "orders");
    assert_eq!(target.id, "42");
    assert_eq!(options.options(), LockOptions::default());
}

#[test]
fn acquire_flags_map_to_options() {
    let LockCommand::Acquire { options, .. } = parse(&[
        "acquire",
        "orders",
        "42",
        "--ttl",
        "5s",
        "--retries",
        "0",
        "--retry-delay",
        "250ms",
        "--backoff",
        "1.5",
    ])
    .unwrap() else {
        panic!("expected acquire");
    };

    let options = options.options();
    assert_eq!(options.ttl, Duration::from_secs(5));
    assert_eq!(options.total_attempts(), 1);
    assert_eq!(options.retry_delay, Duration::from_millis(250));
    assert_eq!(options.backoff_multiplier, 1.5);
}

#[test]
fn release_takes_token_after_target() {
    let LockCommand::Release { target, token } =
        parse(&["release", "orders", "42", "tok-1"]).unwrap()
    else {
        panic!("expected release");
    };
    assert_eq!(target.id, "42");
    assert_eq!(token, "tok-1");
}

#[test]
fn extend_requires_ttl() {
    assert!(parse(&["extend", "orders", "42", "tok-1"]).is_err());

    let LockCommand::Extend { ttl, .. } =
        parse(&["extend", "orders", "42", "tok-1", "--ttl", "1m"]).unwrap()
    else {
        panic!("expected extend");
    };
    assert_eq!(ttl, Duration::from_secs(60));
}

#[test]
fn run_collects_command_after_separator() {
    let LockCommand::Run { command, .. } =
        parse(&["run", "orders", "42", "--ttl", "2s", "--", "sh", "-c", "exit 3"]).unwrap()
    else {
        panic!("expected run");
    };
    assert_eq!(command, vec!["sh", "-c", "exit 3"]);
}

#[test]
fn run_without_command_is_rejected() {
    assert!(parse(&["run", "orders", "42"]).is_err());
}

#[test]
fn bad_duration_is_rejected() {
    assert!(parse(&["acquire", "orders", "42", "--ttl", "soon"]).is_err());
}

#[test]
fn target_is_reachable_from_every_command() {
    let command = parse(&["status", "orders", "7"]).unwrap();
    assert_eq!(command.target().id, "7");
}

#[test]
fn acquired_text_is_the_bare_token() {
    let report = Acquired {
        resource: "orders",
        id: "42",
        token: "abc-1",
        ttl_ms: 1000,
    };
    assert_eq!(report.to_string(), "abc-1");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["token"], "abc-1");
    assert_eq!(json["ttl_ms"], 1000);
}

#[test]
fn changed_report_omits_ttl_for_release() {
    let report = Changed {
        resource: "orders",
        id: "42",
        action: "released",
        ttl_ms: None,
    };
    assert_eq!(report.to_string(), "released orders:42");
    assert!(serde_json::to_value(&report).unwrap().get("ttl_ms").is_none());
}

#[test]
fn status_text() {
    let held = Status {
        resource: "orders",
        id: "42",
        held: true,
    };
    assert_eq!(held.to_string(), "held");
}

#[cfg(unix)]
#[test]
fn signalled_child_maps_to_failure() {
    use std::os::unix::process::ExitStatusExt;

    // Raw wait status 9: killed by SIGKILL
    let code = exit_code(ExitStatus::from_raw(9));
    assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(EXIT_FAILURE)));

    // Raw wait status 3 << 8: exited with 3
    let code = exit_code(ExitStatus::from_raw(3 << 8));
    assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(3)));
}
