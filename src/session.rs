// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Authenticated session against the upstream API
//!
//! The session owns the HTTP client (cookie store included; the upstream's
//! auth is cookie-based), the credentials, and the authenticated user id.
//! Authentication happens lazily on the first request and transparently
//! once more when the upstream reports an expired session: the original
//! request is retried exactly once, and a second rejection surfaces as
//! [`Error::Auth`]. Nothing else is ever retried.
//!
//! Re-authentication is serialized behind the auth state mutex with an
//! epoch counter, so concurrent callers hitting the same expiry cause a
//! single re-login and all reuse its result.

use crate::config::{Config, TlsPolicy};
use crate::constants;
use crate::error::{Error, Result};
use reqwest::{header, redirect, Certificate, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug)]
struct AuthState {
    user_id: Option<String>,
    /// Bumped on every successful login. A caller that saw epoch N only
    /// triggers a re-login if the epoch is still N when it gets the lock;
    /// otherwise someone else already re-authenticated and the caller
    /// reuses that result.
    epoch: u64,
}

#[derive(serde::Deserialize)]
struct LoginResponse {
    user_id: String,
}

pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    auth: Mutex<AuthState>,
    /// Outbound request count, for diagnostics only.
    requests: AtomicU64,
}

/// Keeps the password out of debug and log output.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("requests", &self.requests.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(config: &Config, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base URL `{base_url}`: {e}")))?;

        if config.should_warn_insecure_tls() {
            warn!(
                "TLS certificate verification is disabled; set \
                 PELOTON_IGNORE_WARNINGS to silence this"
            );
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .user_agent(constants::user_agent())
            .default_headers(headers)
            .cookie_store(true)
            // The upstream never redirects on the happy path; an unexpected
            // redirect should surface as an API error, not be followed.
            .redirect(redirect::Policy::none());

        match &config.tls {
            TlsPolicy::Verify => {}
            TlsPolicy::Insecure => {
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsPolicy::CustomCa(path) => {
                let pem = fs::read(path).map_err(|e| {
                    Error::Config(format!("cannot read CA bundle {}: {e}", path.display()))
                })?;
                let cert = Certificate::from_pem(&pem).map_err(|e| {
                    Error::Config(format!("invalid CA bundle {}: {e}", path.display()))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            auth: Mutex::new(AuthState {
                user_id: None,
                epoch: 0,
            }),
            requests: AtomicU64::new(0),
        })
    }

    /// Exchanges credentials for a session, if one is not already live.
    /// Idempotent and safe to call after expiry.
    pub(crate) async fn authenticate(&self) -> Result<()> {
        self.ensure_authenticated().await.map(|_| ())
    }

    /// Id of the authenticated user, logging in first if necessary.
    pub(crate) async fn user_id(&self) -> Result<String> {
        let mut state = self.auth.lock().await;
        match &state.user_id {
            Some(id) => Ok(id.clone()),
            None => self.login(&mut state).await,
        }
    }

    /// Issues one API call. Authenticates lazily, and on an auth-expired
    /// response re-authenticates once and retries the original request once.
    pub(crate) async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Response> {
        let epoch = self.ensure_authenticated().await?;

        let response = self.send(method.clone(), path, params).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(response).await;
        }

        debug!(%path, "session expired, re-authenticating once");
        self.reauthenticate(epoch).await?;

        let retried = self.send(method, path, params).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(
                "session rejected again after re-authentication".into(),
            ));
        }
        Self::check_status(retried).await
    }

    /// GETs a path and decodes the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.request(Method::GET, path, params).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Number of HTTP requests issued so far, logins included. Diagnostics
    /// only; not part of any correctness contract.
    pub fn requests_issued(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    async fn ensure_authenticated(&self) -> Result<u64> {
        let mut state = self.auth.lock().await;
        if state.user_id.is_none() {
            self.login(&mut state).await?;
        }
        Ok(state.epoch)
    }

    /// Re-login unless another caller already did since `seen_epoch`.
    async fn reauthenticate(&self, seen_epoch: u64) -> Result<()> {
        let mut state = self.auth.lock().await;
        if state.epoch != seen_epoch {
            return Ok(());
        }
        self.login(&mut state).await.map(|_| ())
    }

    /// Logs in and returns the authenticated user's id.
    async fn login(&self, state: &mut AuthState) -> Result<String> {
        let url = self.join("/auth/login")?;
        debug!(user = %self.username, "logging in");
        self.requests.fetch_add(1, Ordering::Relaxed);

        let response = self
            .http
            .post(url)
            .json(&json!({
                "username_or_email": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("login rejected (HTTP {status}): {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        let body = response.text().await?;
        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::Decode(e.to_string()))?;
        state.user_id = Some(login.user_id.clone());
        state.epoch += 1;
        Ok(login.user_id)
    }

    async fn send(&self, method: Method, path: &str, params: &[(&str, &str)]) -> Result<Response> {
        let url = self.join(path)?;
        debug!(%method, %path, ?params, "api request");
        self.requests.fetch_add(1, Ordering::Relaxed);
        let response = self.http.request(method, url).query(params).send().await?;
        debug!(status = %response.status(), %path, "api response");
        Ok(response)
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api { status, body })
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid request path `{path}`: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex as StdMutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn config() -> Config {
        Config::new("rider@example.com", "hunter2")
    }

    /// Collects everything the subscriber writes, for asserting on log output.
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<StdMutex<Vec<u8>>>);

    impl CaptureWriter {
        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Builds a session under a scoped subscriber and returns how many
    /// insecure-TLS warnings it logged.
    fn insecure_warnings_during_build(cfg: &Config) -> usize {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .with_max_level(tracing::Level::WARN)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        Session::new(cfg, constants::BASE_URL).expect("session builds");
        writer
            .contents()
            .matches("TLS certificate verification is disabled")
            .count()
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = Session::new(&config(), "not a url").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_ca_bundle_is_a_config_error() {
        let cfg = config().with_tls(TlsPolicy::CustomCa("/nonexistent/ca.pem".into()));
        let err = Session::new(&cfg, constants::BASE_URL).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_ca_bundle_is_a_config_error() {
        let mut pem = tempfile::NamedTempFile::new().expect("temp file");
        pem.write_all(b"this is not a certificate").expect("write");

        let cfg = config().with_tls(TlsPolicy::CustomCa(pem.path().to_path_buf()));
        let err = Session::new(&cfg, constants::BASE_URL).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn insecure_tls_builds() {
        let cfg = config()
            .with_tls(TlsPolicy::Insecure)
            .with_ignore_warnings(true);
        assert!(Session::new(&cfg, constants::BASE_URL).is_ok());
    }

    #[test]
    fn insecure_tls_warns_once_per_session() {
        let cfg = config().with_tls(TlsPolicy::Insecure);
        assert_eq!(insecure_warnings_during_build(&cfg), 1);
    }

    #[test]
    fn ignore_warnings_silences_the_insecure_tls_warning() {
        let cfg = config()
            .with_tls(TlsPolicy::Insecure)
            .with_ignore_warnings(true);
        assert_eq!(insecure_warnings_during_build(&cfg), 0);
    }

    #[test]
    fn verified_tls_never_warns() {
        assert_eq!(insecure_warnings_during_build(&config()), 0);
    }

    #[test]
    fn debug_output_omits_the_password() {
        let session = Session::new(&config(), constants::BASE_URL).expect("session builds");
        let dump = format!("{session:?}");
        assert!(dump.contains("rider@example.com"));
        assert!(!dump.contains("hunter2"));
    }
}
