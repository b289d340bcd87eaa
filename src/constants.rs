// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Upstream endpoint constants and environment variable names

/// Base URL of the private Peloton web API.
pub const BASE_URL: &str = "https://api.onepeloton.com";

/// Courtesy identifier sent with every request so the upstream operator can
/// tell this library's traffic apart from the web UI in their logs.
pub const USER_AGENT_PREFIX: &str = "peloton-client-library";

/// Library version, baked into the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Page size used by the workout list endpoint. The web UI requests 10
/// records per page; we use the same size so this client's traffic pattern
/// is indistinguishable from normal usage. Not user-configurable.
pub const WORKOUT_PAGE_SIZE: usize = 10;

/// Environment variable names recognized by [`crate::config::Config::from_env`].
pub mod env_vars {
    pub const USERNAME: &str = "PELOTON_USER";
    pub const PASSWORD: &str = "PELOTON_PASSWORD";
    pub const IGNORE_WARNINGS: &str = "PELOTON_IGNORE_WARNINGS";
    pub const SSL_VERIFY: &str = "PELOTON_SSL_VERIFY";
    pub const SSL_CERT: &str = "PELOTON_SSL_CERT";
}

/// Builds the `User-Agent` value for outbound requests.
pub fn user_agent() -> String {
    format!("{}/{}", USER_AGENT_PREFIX, VERSION)
}
