// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tracing setup for consuming scripts
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the caller's job. This helper covers the common case: `RUST_LOG`
//! controls the filter, defaulting to `info` for this crate.

use tracing_subscriber::EnvFilter;

/// Initializes a global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    init_with_default("peloton_client=info");
}

/// Initializes a global subscriber with an explicit fallback filter used
/// when `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
