// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Peloton Client
//!
//! A client library for the private Peloton web API, exposing workouts,
//! rides, instructors and per-workout metrics as navigable objects that
//! fetch their own data lazily.
//!
//! ## Design
//!
//! The upstream API is undocumented and rate-sensitive, so the library is
//! built around minimizing request volume:
//!
//! - **Lazy resolution**: an entity constructed from an id alone costs zero
//!   network calls; the first read of an absent field triggers exactly one
//!   detail fetch, after which every field is served from memory.
//! - **Process-local cache**: one live instance per entity id, never
//!   evicted, so two workouts of the same class share one ride fetch.
//! - **UI-shaped traffic**: the workout listing uses the same page size and
//!   `joins=ride` call pattern as the web UI itself.
//! - **No hidden retries**: the only transparent retry is a single
//!   re-authentication when the session expires mid-run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use peloton_client::{Config, PelotonClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), peloton_client::Error> {
//!     let client = PelotonClient::new(Config::from_env()?)?;
//!
//!     let mut workouts = client.workouts();
//!     while let Some(workout) = workouts.next().await? {
//!         let ride = workout.ride(&client).await?;
//!         println!(
//!             "{}: {}",
//!             workout.status(&client).await?,
//!             ride.title(&client).await?,
//!         );
//!     }
//!     Ok(())
//! }
//! ```

/// Top-level client bundling session and cache
pub mod client;

/// Credentials and TLS policy, loaded from the environment
pub mod config;

/// Endpoint constants and environment variable names
pub mod constants;

/// Lazy-resolving entity types and the resolution machinery
pub mod entities;

/// Error taxonomy
pub mod error;

/// Tracing setup helper for consuming scripts
pub mod logging;

/// Lazy pagination over list endpoints
pub mod paginator;

/// Authenticated HTTP session
pub mod session;

mod cache;

pub use client::PelotonClient;
pub use config::{Config, TlsPolicy};
pub use entities::{
    Achievement, Entity, EntityKind, Instructor, Metric, MetricSummary, Resolution, Ride, User,
    Workout, WorkoutMetrics,
};
pub use error::{Error, Result};
pub use paginator::WorkoutPages;
