// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level client
//!
//! [`PelotonClient`] bundles the authenticated [`Session`] with the
//! process-local entity cache. Construction performs no network I/O; the
//! first request (or an explicit [`PelotonClient::authenticate`]) logs in.

use crate::cache::EntityCache;
use crate::config::Config;
use crate::constants::BASE_URL;
use crate::entities::{Instructor, Ride, User, Workout};
use crate::error::Result;
use crate::paginator::WorkoutPages;
use crate::session::Session;
use std::sync::Arc;

#[derive(Debug)]
pub struct PelotonClient {
    session: Session,
    cache: EntityCache,
}

impl PelotonClient {
    /// Builds a client against the production API. No network call occurs
    /// until the first request.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_base_url(config, BASE_URL)
    }

    /// Builds a client against an arbitrary base URL. Intended for tests
    /// and for pointing at a staging mirror.
    pub fn with_base_url(config: Config, base_url: &str) -> Result<Self> {
        Ok(Self {
            session: Session::new(&config, base_url)?,
            cache: EntityCache::new(),
        })
    }

    /// Logs in explicitly. Optional; every request authenticates lazily.
    pub async fn authenticate(&self) -> Result<()> {
        self.session.authenticate().await
    }

    /// The authenticated user's workout history as a lazy page sequence.
    /// No network call until the first item is requested.
    pub fn workouts(&self) -> WorkoutPages<'_> {
        WorkoutPages::new(self)
    }

    /// A workout by id, as an unresolved stub. No detail fetch.
    pub fn workout(&self, id: &str) -> Arc<Workout> {
        self.cache.workout(id, None)
    }

    /// A ride by id, as an unresolved stub. No detail fetch.
    pub fn ride(&self, id: &str) -> Arc<Ride> {
        self.cache.ride(id, None)
    }

    /// An instructor by id, as an unresolved stub. No detail fetch.
    pub fn instructor(&self, id: &str) -> Arc<Instructor> {
        self.cache.instructor(id, None)
    }

    /// The authenticated user as an unresolved stub. Logs in if needed to
    /// learn the user id, but performs no profile fetch.
    pub async fn me(&self) -> Result<Arc<User>> {
        let user_id = self.session.user_id().await?;
        Ok(self.cache.user(&user_id, None))
    }

    /// Number of HTTP requests this client has issued. Diagnostics only.
    pub fn requests_issued(&self) -> u64 {
        self.session.requests_issued()
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn cache(&self) -> &EntityCache {
        &self.cache
    }
}
