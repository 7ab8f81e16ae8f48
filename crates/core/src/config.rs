// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination store connection settings
//!
//! The only external configuration is a single connection string of the form
//! `redis[s]://[user[:password]@]host[:port][/db][?query]`. Credentials are
//! kept percent-encoded and the query is passed through to the client.

use std::str::FromStr;
use thiserror::Error;
use url::{Host, ParseError, Url};

/// Environment variable holding the connection string
pub const STORE_URL_ENV: &str = "TURNSTILE_STORE_URL";

/// Port used when the connection string has none
pub const DEFAULT_PORT: u16 = 6379;

/// Errors from reading the connection string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingUrl(&'static str),
    #[error("unsupported scheme '{0}' (expected redis or rediss)")]
    UnsupportedScheme(String),
    #[error("connection string has no host")]
    MissingHost,
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("invalid database index '{0}'")]
    InvalidDatabase(String),
    #[error("malformed connection string: {0}")]
    Malformed(ParseError),
}

/// Parsed coordination store connection string
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    /// Client options such as `protocol=resp3`
    pub query: Option<String>,
}

impl StoreConfig {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url.trim()).map_err(|e| match e {
            ParseError::RelativeUrlWithoutBase => ConfigError::UnsupportedScheme(String::new()),
            ParseError::EmptyHost => ConfigError::MissingHost,
            other => ConfigError::Malformed(other),
        })?;

        let tls = match parsed.scheme() {
            "redis" => false,
            "rediss" => true,
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let host = match parsed.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(ConfigError::MissingHost),
        };

        let port = match parsed.port() {
            Some(0) => return Err(ConfigError::InvalidPort("0".to_string())),
            Some(port) => port,
            None => DEFAULT_PORT,
        };

        let path = parsed.path();
        let database = match path.strip_prefix('/').unwrap_or(path).trim_end_matches('/') {
            "" => 0,
            db => db
                .parse()
                .map_err(|_| ConfigError::InvalidDatabase(db.to_string()))?,
        };

        Ok(Self {
            tls,
            host,
            port,
            username: non_empty(parsed.username()),
            password: parsed.password().and_then(non_empty),
            database,
            query: parsed.query().and_then(non_empty),
        })
    }

    /// Read the connection string from [`STORE_URL_ENV`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(STORE_URL_ENV).map_err(|_| ConfigError::MissingUrl(STORE_URL_ENV))?;
        Self::parse(&url)
    }

    /// Connection string including credentials
    pub fn url(&self) -> String {
        self.render(self.password.as_deref())
    }

    /// Connection string safe for logs
    pub fn redacted(&self) -> String {
        self.render(self.password.as_ref().map(|_| "***"))
    }

    fn render(&self, password: Option<&str>) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match (self.username.as_deref(), password) {
            (None, None) => String::new(),
            (Some(user), None) => format!("{}@", user),
            (user, Some(pass)) => format!("{}:{}@", user.unwrap_or(""), pass),
        };
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let query = match &self.query {
            Some(query) => format!("?{}", query),
            None => String::new(),
        };
        format!(
            "{}://{}{}:{}/{}{}",
            scheme, auth, host, self.port, self.database, query
        )
    }
}

impl FromStr for StoreConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreConfig").field(&self.redacted()).finish()
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
