// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error taxonomy for the client library
//!
//! Every fallible operation in this crate returns [`Error`]. The variants
//! keep the upstream failure modes distinguishable so callers can decide
//! their own retry policy; the library itself never retries anything except
//! the single transparent re-authentication in the session layer.

use crate::entities::EntityKind;
use reqwest::StatusCode;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration, surfaced at client construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential rejection, or an expired session that could not be
    /// re-established with a single re-authentication.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure: connection refused, timeout, TLS
    /// verification failure. Never retried by the library.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the upstream API.
    #[error("api error: HTTP {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// A field genuinely absent from an entity even after a full detail
    /// fetch. Distinct from a fetch failure so callers can tell "field
    /// doesn't exist" apart from "couldn't reach the server".
    #[error("attribute `{field}` not found on {kind} {id}")]
    AttributeNotFound {
        kind: EntityKind,
        id: String,
        field: String,
    },

    /// The upstream returned a 2xx response whose body did not match the
    /// expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn attribute_not_found(
        kind: EntityKind,
        id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::AttributeNotFound {
            kind,
            id: id.into(),
            field: field.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
