// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration for the Peloton client
//!
//! Credentials and TLS policy come either from the process environment (the
//! upstream-compatible `PELOTON_*` variables) or from the builder-style
//! constructors. Missing credentials fail fast with [`Error::Config`] so a
//! misconfigured script dies before the first request, not in the middle of
//! a listing.

use crate::constants::env_vars;
use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// How the HTTP transport verifies the upstream's TLS certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify against the system trust store (default).
    Verify,
    /// Skip certificate verification entirely. Emits a warning at client
    /// construction unless `ignore_warnings` is set.
    Insecure,
    /// Verify against a custom CA bundle (PEM). Useful behind a TLS
    /// intercepting proxy.
    CustomCa(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    /// Suppress the verify-off warning.
    pub ignore_warnings: bool,
    pub tls: TlsPolicy,
}

impl Config {
    /// Creates a configuration with default TLS policy (verify on).
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ignore_warnings: false,
            tls: TlsPolicy::Verify,
        }
    }

    pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_ignore_warnings(mut self, ignore: bool) -> Self {
        self.ignore_warnings = ignore;
        self
    }

    /// Loads configuration from the process environment, honoring a local
    /// `.env` file if present.
    ///
    /// Recognized variables: `PELOTON_USER` (required), `PELOTON_PASSWORD`
    /// (required), `PELOTON_IGNORE_WARNINGS`, `PELOTON_SSL_VERIFY`,
    /// `PELOTON_SSL_CERT`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let username = env::var(env_vars::USERNAME).map_err(|_| {
            Error::Config(format!("`{}` environment variable not set", env_vars::USERNAME))
        })?;
        let password = env::var(env_vars::PASSWORD).map_err(|_| {
            Error::Config(format!("`{}` environment variable not set", env_vars::PASSWORD))
        })?;

        let ignore_warnings = env::var(env_vars::IGNORE_WARNINGS)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let tls = tls_policy(
            env::var(env_vars::SSL_VERIFY).ok().as_deref(),
            env::var(env_vars::SSL_CERT).ok().as_deref(),
        );

        Ok(Self {
            username,
            password,
            ignore_warnings,
            tls,
        })
    }

    /// Whether constructing a client with this configuration should emit the
    /// insecure-TLS warning.
    pub(crate) fn should_warn_insecure_tls(&self) -> bool {
        self.tls == TlsPolicy::Insecure && !self.ignore_warnings
    }
}

/// Resolves the TLS policy from the raw `PELOTON_SSL_VERIFY` /
/// `PELOTON_SSL_CERT` values. A custom cert path takes precedence over the
/// verify flag since it implies verification.
fn tls_policy(ssl_verify: Option<&str>, ssl_cert: Option<&str>) -> TlsPolicy {
    if let Some(path) = ssl_cert {
        if !path.is_empty() {
            return TlsPolicy::CustomCa(PathBuf::from(path));
        }
    }
    match ssl_verify {
        Some(v) if !parse_bool(v) => TlsPolicy::Insecure,
        _ => TlsPolicy::Verify,
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_forms() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn tls_policy_defaults_to_verify() {
        assert_eq!(tls_policy(None, None), TlsPolicy::Verify);
        assert_eq!(tls_policy(Some("true"), None), TlsPolicy::Verify);
    }

    #[test]
    fn tls_policy_verify_off() {
        assert_eq!(tls_policy(Some("false"), None), TlsPolicy::Insecure);
        assert_eq!(tls_policy(Some("0"), None), TlsPolicy::Insecure);
    }

    #[test]
    fn tls_policy_custom_cert_wins_over_verify_flag() {
        assert_eq!(
            tls_policy(Some("false"), Some("/etc/ssl/corp-ca.pem")),
            TlsPolicy::CustomCa(PathBuf::from("/etc/ssl/corp-ca.pem"))
        );
    }

    #[test]
    fn insecure_tls_warns_unless_suppressed() {
        let config = Config::new("user", "pass").with_tls(TlsPolicy::Insecure);
        assert!(config.should_warn_insecure_tls());

        let suppressed = config.with_ignore_warnings(true);
        assert!(!suppressed.should_warn_insecure_tls());

        let verified = Config::new("user", "pass");
        assert!(!verified.should_warn_insecure_tls());
    }
}
