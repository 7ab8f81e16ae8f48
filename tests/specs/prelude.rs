//! Shared helpers for CLI specs

use assert_cmd::assert::Assert;
use assert_cmd::Command;
use predicates::prelude::*;

/// Nothing listens on port 1
pub const UNREACHABLE_STORE: &str = "redis://127.0.0.1:1";

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONTENDED: i32 = 3;
pub const EXIT_UNAVAILABLE: i32 = 4;

/// Redis for live specs, if configured
pub fn live_store() -> Option<String> {
    std::env::var("TURNSTILE_TEST_REDIS_URL").ok()
}

/// Unique name so concurrent spec runs never share keys or channels
pub fn unique(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);
    format!(
        "{}-{}-{}",
        prefix,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

pub fn turnstile() -> CliBuilder {
    CliBuilder {
        args: Vec::new(),
        envs: Vec::new(),
    }
}

pub struct CliBuilder {
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|a| a.to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// Point at a store with a short connect timeout
    pub fn store(self, url: &str) -> Self {
        self.args(&["--store-url", url, "--connect-timeout", "500ms"])
    }

    fn run(self) -> Assert {
        let mut cmd = Command::cargo_bin("turnstile").unwrap();
        cmd.env_remove("TURNSTILE_STORE_URL")
            .env("RUST_LOG", "error")
            .args(&self.args)
            .timeout(std::time::Duration::from_secs(30));
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.assert()
    }

    pub fn passes(self) -> RunAssert {
        RunAssert(self.run().success())
    }

    pub fn exits_with(self, code: i32) -> RunAssert {
        RunAssert(self.run().code(code))
    }
}

pub struct RunAssert(Assert);

impl RunAssert {
    pub fn stdout_has(self, expected: &str) -> Self {
        Self(self.0.stdout(predicate::str::contains(expected)))
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        Self(self.0.stdout(predicate::str::contains(unexpected).not()))
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        Self(self.0.stderr(predicate::str::contains(expected)))
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.0.get_output().stdout).into_owned()
    }
}
