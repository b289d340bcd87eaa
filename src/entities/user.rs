// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! User entity

use super::{fill, overwrite, Entity, EntityKind, LazyState, Resolution};
use crate::client::PelotonClient;
use crate::error::{Error, Result};
use crate::paginator::WorkoutPages;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct UserFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_workouts: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserFields {
    pub(crate) fn fill_from(dst: &mut Self, src: Self) {
        fill(&mut dst.id, src.id);
        fill(&mut dst.username, src.username);
        fill(&mut dst.location, src.location);
        fill(&mut dst.total_workouts, src.total_workouts);
        for (key, value) in src.extra {
            dst.extra.entry(key).or_insert(value);
        }
    }

    pub(crate) fn overwrite_from(dst: &mut Self, src: Self) {
        overwrite(&mut dst.id, src.id);
        overwrite(&mut dst.username, src.username);
        overwrite(&mut dst.location, src.location);
        overwrite(&mut dst.total_workouts, src.total_workouts);
        dst.extra.extend(src.extra);
    }
}

/// A Peloton user. [`crate::PelotonClient::me`] returns the authenticated
/// user as an unresolved stub; profile fields fetch on first read.
#[derive(Debug)]
pub struct User {
    id: String,
    state: LazyState<UserFields>,
}

impl User {
    pub(crate) fn new(id: &str, seed: Option<UserFields>) -> Self {
        let state = match seed {
            Some(fields) => LazyState::partial(fields),
            None => LazyState::unresolved(),
        };
        Self {
            id: id.to_string(),
            state,
        }
    }

    pub(crate) fn absorb_partial(&self, fields: UserFields) {
        self.state.absorb_partial(fields, UserFields::fill_from);
    }

    pub async fn username(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "username", |f| f.username.clone()).await
    }

    pub async fn location(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "location", |f| f.location.clone()).await
    }

    pub async fn total_workouts(&self, client: &PelotonClient) -> Result<u64> {
        self.scalar(client, "total_workouts", |f| f.total_workouts)
            .await
    }

    /// This user's workout history as a lazy page sequence. No network call
    /// until the first item is requested.
    pub fn workouts<'a>(&self, client: &'a PelotonClient) -> WorkoutPages<'a> {
        WorkoutPages::for_user(client, &self.id)
    }

    async fn scalar<T, G>(&self, client: &PelotonClient, field: &'static str, get: G) -> Result<T>
    where
        G: Fn(&UserFields) -> Option<T>,
    {
        if let Some(value) = self.state.known(&get) {
            return Ok(value);
        }
        if self.state.resolution() == Resolution::Complete {
            return Err(Error::attribute_not_found(EntityKind::User, &self.id, field));
        }
        self.resolve(client).await?;
        self.state
            .known(&get)
            .ok_or_else(|| Error::attribute_not_found(EntityKind::User, &self.id, field))
    }
}

#[async_trait]
impl Entity for User {
    fn kind(&self) -> EntityKind {
        EntityKind::User
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
        }
        value
    }

    async fn resolve(&self, client: &PelotonClient) -> Result<()> {
        let _gate = self.state.gate().await;
        if self.state.resolution() == Resolution::Complete {
            return Ok(());
        }

        debug!(user = %self.id, "fetching user detail");
        let detail: serde_json::Value = client
            .session()
            .get_json(&format!("/api/user/{}", self.id), &[])
            .await?;
        let fields: UserFields = serde_json::from_value(detail)?;
        self.state.complete(fields, UserFields::overwrite_from);
        Ok(())
    }
}
