// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Ride entity
//!
//! A ride is the class a workout was taken against. Rides are shared: two
//! workouts referencing the same class resolve to the same cached instance.
//! The detail endpoint nests the record under a `"ride"` key, unlike the
//! flat workout detail response.

use super::{fill, overwrite, Entity, EntityKind, LazyState, Resolution};
use crate::client::PelotonClient;
use crate::entities::instructor::Instructor;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct RideFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Scheduled class length in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RideFields {
    pub(crate) fn fill_from(dst: &mut Self, src: Self) {
        fill(&mut dst.id, src.id);
        fill(&mut dst.title, src.title);
        fill(&mut dst.description, src.description);
        fill(&mut dst.duration, src.duration);
        fill(&mut dst.instructor_id, src.instructor_id);
        for (key, value) in src.extra {
            dst.extra.entry(key).or_insert(value);
        }
    }

    pub(crate) fn overwrite_from(dst: &mut Self, src: Self) {
        overwrite(&mut dst.id, src.id);
        overwrite(&mut dst.title, src.title);
        overwrite(&mut dst.description, src.description);
        overwrite(&mut dst.duration, src.duration);
        overwrite(&mut dst.instructor_id, src.instructor_id);
        dst.extra.extend(src.extra);
    }
}

/// Shape of `GET /api/ride/{id}/details`.
#[derive(Deserialize)]
struct RideDetailResponse {
    ride: RideFields,
}

/// A class in the upstream catalog, referenced by workouts.
#[derive(Debug)]
pub struct Ride {
    id: String,
    state: LazyState<RideFields>,
    instructor: OnceLock<Arc<Instructor>>,
}

impl Ride {
    pub(crate) fn new(id: &str, seed: Option<RideFields>) -> Self {
        let state = match seed {
            Some(fields) => LazyState::partial(fields),
            None => LazyState::unresolved(),
        };
        Self {
            id: id.to_string(),
            state,
            instructor: OnceLock::new(),
        }
    }

    pub(crate) fn absorb_partial(&self, fields: RideFields) {
        self.state.absorb_partial(fields, RideFields::fill_from);
    }

    pub async fn title(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "title", |f| f.title.clone()).await
    }

    pub async fn description(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "description", |f| f.description.clone())
            .await
    }

    /// Scheduled class length in seconds.
    pub async fn duration(&self, client: &PelotonClient) -> Result<u64> {
        self.scalar(client, "duration", |f| f.duration).await
    }

    pub async fn instructor_id(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "instructor_id", |f| f.instructor_id.clone())
            .await
    }

    /// The instructor who taught this class, as an unresolved stub. May
    /// trigger this ride's own upgrade fetch if the instructor id is not yet
    /// resident, but never fetches the instructor record itself.
    pub async fn instructor(&self, client: &PelotonClient) -> Result<Arc<Instructor>> {
        if let Some(instructor) = self.instructor.get() {
            return Ok(instructor.clone());
        }
        let instructor_id = self.instructor_id(client).await?;
        let instructor = client.cache().instructor(&instructor_id, None);
        let _ = self.instructor.set(instructor.clone());
        Ok(instructor)
    }

    async fn scalar<T, G>(&self, client: &PelotonClient, field: &'static str, get: G) -> Result<T>
    where
        G: Fn(&RideFields) -> Option<T>,
    {
        if let Some(value) = self.state.known(&get) {
            return Ok(value);
        }
        if self.state.resolution() == Resolution::Complete {
            return Err(Error::attribute_not_found(EntityKind::Ride, &self.id, field));
        }
        self.resolve(client).await?;
        self.state
            .known(&get)
            .ok_or_else(|| Error::attribute_not_found(EntityKind::Ride, &self.id, field))
    }
}

#[async_trait]
impl Entity for Ride {
    fn kind(&self) -> EntityKind {
        EntityKind::Ride
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
            if let Some(instructor) = self.instructor.get() {
                map.insert("instructor".into(), instructor.serialize());
            }
        }
        value
    }

    async fn resolve(&self, client: &PelotonClient) -> Result<()> {
        let _gate = self.state.gate().await;
        if self.state.resolution() == Resolution::Complete {
            return Ok(());
        }

        debug!(ride = %self.id, "fetching ride detail");
        let detail: RideDetailResponse = client
            .session()
            .get_json(&format!("/api/ride/{}/details", self.id), &[])
            .await?;
        self.state.complete(detail.ride, RideFields::overwrite_from);
        Ok(())
    }
}
