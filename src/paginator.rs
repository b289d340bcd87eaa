// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lazy pagination over list endpoints
//!
//! [`WorkoutPages`] walks `GET /api/user/{user_id}/workouts` the same way
//! the web UI does: page 0 first, 10 records per page, `joins=ride` so each
//! record carries a partial ride. A page is fetched only when the consumer
//! crosses into it. The sequence is forward-only; a failed page fetch
//! propagates once and exhausts the sequence, and restarting means asking
//! the client for a fresh paginator.

use crate::client::PelotonClient;
use crate::constants::WORKOUT_PAGE_SIZE;
use crate::entities::Workout;
use crate::error::Result;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

#[derive(Deserialize)]
struct WorkoutPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    /// Total page count the upstream reports on every page.
    page_count: Option<u32>,
}

/// Forward-only lazy sequence of the workouts in a user's history.
pub struct WorkoutPages<'a> {
    client: &'a PelotonClient,
    /// Explicit user id, or `None` for the authenticated user.
    user_id: Option<String>,
    next_page: u32,
    page_count: Option<u32>,
    buffer: VecDeque<Arc<Workout>>,
    exhausted: bool,
}

impl<'a> WorkoutPages<'a> {
    pub(crate) fn new(client: &'a PelotonClient) -> Self {
        Self {
            client,
            user_id: None,
            next_page: 0,
            page_count: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub(crate) fn for_user(client: &'a PelotonClient, user_id: &str) -> Self {
        let mut pages = Self::new(client);
        pages.user_id = Some(user_id.to_string());
        pages
    }

    /// Next workout in the sequence, fetching one more page only when the
    /// buffered ones run out. `Ok(None)` marks the end. An error exhausts
    /// the sequence; callers wanting to continue must start a new listing.
    pub async fn next(&mut self) -> Result<Option<Arc<Workout>>> {
        if let Some(workout) = self.buffer.pop_front() {
            return Ok(Some(workout));
        }
        if self.exhausted {
            return Ok(None);
        }
        if let Err(e) = self.fetch_next_page().await {
            self.exhausted = true;
            return Err(e);
        }
        Ok(self.buffer.pop_front())
    }

    /// Up to `n` workouts from the front of the sequence.
    pub async fn take(&mut self, n: usize) -> Result<Vec<Arc<Workout>>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.next().await? {
                Some(workout) => out.push(workout),
                None => break,
            }
        }
        Ok(out)
    }

    /// Drains the whole sequence. Walks every remaining page.
    pub async fn collect_all(&mut self) -> Result<Vec<Arc<Workout>>> {
        let mut out = Vec::new();
        while let Some(workout) = self.next().await? {
            out.push(workout);
        }
        Ok(out)
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        if let Some(count) = self.page_count {
            if self.next_page >= count {
                self.exhausted = true;
                return Ok(());
            }
        }

        let user_id = match &self.user_id {
            Some(id) => id.clone(),
            None => self.client.session().user_id().await?,
        };

        let page = self.next_page;
        let limit = WORKOUT_PAGE_SIZE.to_string();
        let page_param = page.to_string();
        debug!(%user_id, page, "fetching workout page");

        let response: WorkoutPage = self
            .client
            .session()
            .get_json(
                &format!("/api/user/{user_id}/workouts"),
                &[
                    ("page", page_param.as_str()),
                    ("limit", limit.as_str()),
                    ("joins", "ride"),
                ],
            )
            .await?;

        self.next_page += 1;
        if self.page_count.is_none() {
            self.page_count = response.page_count;
        }

        let short_page = response.data.len() < WORKOUT_PAGE_SIZE;
        for record in response.data {
            let workout = self.client.cache().admit_workout(record)?;
            self.buffer.push_back(workout);
        }

        if short_page || self.page_count.is_some_and(|count| self.next_page >= count) {
            self.exhausted = true;
        }
        Ok(())
    }
}
