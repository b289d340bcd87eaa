// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Workout entity
//!
//! The top-level record of a user's history. List records arrive with a
//! `joins=ride` join, so a partial workout usually carries a partial ride
//! stub from the moment it is constructed. Leaderboard fields and
//! achievements only exist on the detail endpoint and trigger the upgrade
//! fetch on first read; per-workout metrics live on a separate endpoint
//! entirely and are exposed as their own lazily-fetched entity.

use super::{fill, overwrite, Entity, EntityKind, LazyState, Resolution};
use crate::client::PelotonClient;
use crate::entities::metrics::WorkoutMetrics;
use crate::entities::ride::{Ride, RideFields};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// An achievement earned during a workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct WorkoutFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness_discipline: Option<String>,
    // Epoch seconds, as the upstream sends them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard_rank: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_leaderboard_users: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement_templates: Option<Vec<Achievement>>,
    /// Embedded ride join. Taken out at merge time and turned into a cached
    /// [`Ride`] stub; never left resident here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride: Option<RideFields>,
    /// Unknown keys the upstream sends that this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkoutFields {
    pub(crate) fn fill_from(dst: &mut Self, src: Self) {
        fill(&mut dst.id, src.id);
        fill(&mut dst.status, src.status);
        fill(&mut dst.fitness_discipline, src.fitness_discipline);
        fill(&mut dst.created, src.created);
        fill(&mut dst.created_at, src.created_at);
        fill(&mut dst.start_time, src.start_time);
        fill(&mut dst.end_time, src.end_time);
        fill(&mut dst.leaderboard_rank, src.leaderboard_rank);
        fill(&mut dst.total_leaderboard_users, src.total_leaderboard_users);
        fill(&mut dst.achievement_templates, src.achievement_templates);
        for (key, value) in src.extra {
            dst.extra.entry(key).or_insert(value);
        }
    }

    pub(crate) fn overwrite_from(dst: &mut Self, src: Self) {
        overwrite(&mut dst.id, src.id);
        overwrite(&mut dst.status, src.status);
        overwrite(&mut dst.fitness_discipline, src.fitness_discipline);
        overwrite(&mut dst.created, src.created);
        overwrite(&mut dst.created_at, src.created_at);
        overwrite(&mut dst.start_time, src.start_time);
        overwrite(&mut dst.end_time, src.end_time);
        overwrite(&mut dst.leaderboard_rank, src.leaderboard_rank);
        overwrite(&mut dst.total_leaderboard_users, src.total_leaderboard_users);
        overwrite(&mut dst.achievement_templates, src.achievement_templates);
        dst.extra.extend(src.extra);
    }
}

/// A single workout in the authenticated user's history.
#[derive(Debug)]
pub struct Workout {
    id: String,
    state: LazyState<WorkoutFields>,
    ride: OnceLock<Arc<Ride>>,
    metrics: OnceLock<Arc<WorkoutMetrics>>,
}

impl Workout {
    pub(crate) fn new(id: &str, seed: Option<WorkoutFields>) -> Self {
        let state = match seed {
            Some(fields) => LazyState::partial(fields),
            None => LazyState::unresolved(),
        };
        Self {
            id: id.to_string(),
            state,
            ride: OnceLock::new(),
            metrics: OnceLock::new(),
        }
    }

    pub(crate) fn absorb_partial(&self, fields: WorkoutFields) {
        self.state.absorb_partial(fields, WorkoutFields::fill_from);
    }

    pub(crate) fn attach_ride(&self, ride: Arc<Ride>) {
        // First attachment wins; the cache hands out one instance per id
        // anyway, so a second attachment would be the same ride.
        let _ = self.ride.set(ride);
    }

    /// Workout status as reported upstream, e.g. `COMPLETE`.
    pub async fn status(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "status", |f| f.status.clone()).await
    }

    /// Exercise discipline, e.g. `cycling`.
    pub async fn fitness_discipline(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "fitness_discipline", |f| f.fitness_discipline.clone())
            .await
    }

    pub async fn created(&self, client: &PelotonClient) -> Result<DateTime<Utc>> {
        let secs = self.scalar(client, "created", |f| f.created).await?;
        Ok(timestamp(secs))
    }

    pub async fn created_at(&self, client: &PelotonClient) -> Result<DateTime<Utc>> {
        let secs = self.scalar(client, "created_at", |f| f.created_at).await?;
        Ok(timestamp(secs))
    }

    pub async fn start_time(&self, client: &PelotonClient) -> Result<DateTime<Utc>> {
        let secs = self.scalar(client, "start_time", |f| f.start_time).await?;
        Ok(timestamp(secs))
    }

    pub async fn end_time(&self, client: &PelotonClient) -> Result<DateTime<Utc>> {
        let secs = self.scalar(client, "end_time", |f| f.end_time).await?;
        Ok(timestamp(secs))
    }

    /// Leaderboard position. Detail-endpoint only.
    pub async fn leaderboard_rank(&self, client: &PelotonClient) -> Result<f64> {
        self.scalar(client, "leaderboard_rank", |f| f.leaderboard_rank)
            .await
    }

    pub async fn total_leaderboard_users(&self, client: &PelotonClient) -> Result<u64> {
        self.scalar(client, "total_leaderboard_users", |f| f.total_leaderboard_users)
            .await
    }

    /// Achievements earned during this workout. Detail-endpoint only.
    pub async fn achievements(&self, client: &PelotonClient) -> Result<Vec<Achievement>> {
        self.scalar(client, "achievement_templates", |f| f.achievement_templates.clone())
            .await
    }

    /// The ride (class) this workout was taken against. Usually resident
    /// already thanks to the list endpoint's ride join; otherwise the detail
    /// fetch supplies it.
    pub async fn ride(&self, client: &PelotonClient) -> Result<Arc<Ride>> {
        if let Some(ride) = self.ride.get() {
            return Ok(ride.clone());
        }
        if self.state.resolution() < Resolution::Complete {
            self.resolve(client).await?;
        }
        self.ride
            .get()
            .cloned()
            .ok_or_else(|| Error::attribute_not_found(EntityKind::Workout, &self.id, "ride"))
    }

    /// Per-workout performance metrics. Returns an unresolved stub without
    /// any network call; the metrics' own detail endpoint is hit the first
    /// time one of its fields is read.
    pub fn metrics(&self, client: &PelotonClient) -> Arc<WorkoutMetrics> {
        if let Some(metrics) = self.metrics.get() {
            return metrics.clone();
        }
        let metrics = client.cache().metrics(&self.id);
        let _ = self.metrics.set(metrics.clone());
        metrics
    }

    async fn scalar<T, G>(&self, client: &PelotonClient, field: &'static str, get: G) -> Result<T>
    where
        G: Fn(&WorkoutFields) -> Option<T>,
    {
        if let Some(value) = self.state.known(&get) {
            return Ok(value);
        }
        if self.state.resolution() == Resolution::Complete {
            return Err(Error::attribute_not_found(EntityKind::Workout, &self.id, field));
        }
        self.resolve(client).await?;
        self.state
            .known(&get)
            .ok_or_else(|| Error::attribute_not_found(EntityKind::Workout, &self.id, field))
    }
}

#[async_trait]
impl Entity for Workout {
    fn kind(&self) -> EntityKind {
        EntityKind::Workout
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn resolution(&self) -> Resolution {
        self.state.resolution()
    }

    fn serialize(&self) -> serde_json::Value {
        let mut value = self
            .state
            .with_fields(|f| serde_json::to_value(f).unwrap_or_default());
        if let Some(map) = value.as_object_mut() {
            map.insert("id".into(), self.id.clone().into());
            if let Some(ride) = self.ride.get() {
                map.insert("ride".into(), ride.serialize());
            }
            if let Some(metrics) = self.metrics.get() {
                map.insert("metrics".into(), metrics.serialize());
            }
        }
        value
    }

    async fn resolve(&self, client: &PelotonClient) -> Result<()> {
        let _gate = self.state.gate().await;
        if self.state.resolution() == Resolution::Complete {
            return Ok(());
        }

        debug!(workout = %self.id, "fetching workout detail");
        let detail: serde_json::Value = client
            .session()
            .get_json(&format!("/api/workout/{}", self.id), &[])
            .await?;
        let mut fields: WorkoutFields = serde_json::from_value(detail)?;
        let ride_seed = fields.ride.take();

        self.state.complete(fields, WorkoutFields::overwrite_from);

        if let Some(seed) = ride_seed {
            if let Some(ride_id) = seed.id.clone() {
                let ride = client.cache().ride(&ride_id, Some(seed));
                self.attach_ride(ride);
            }
        }
        Ok(())
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
