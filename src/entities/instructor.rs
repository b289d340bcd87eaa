// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Instructor entity

use super::{fill, overwrite, Entity, EntityKind, LazyState, Resolution};
use crate::client::PelotonClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct InstructorFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InstructorFields {
    pub(crate) fn fill_from(dst: &mut Self, src: Self) {
        fill(&mut dst.id, src.id);
        fill(&mut dst.name, src.name);
        fill(&mut dst.first_name, src.first_name);
        fill(&mut dst.last_name, src.last_name);
        fill(&mut dst.bio, src.bio);
        fill(&mut dst.image_url, src.image_url);
        for (key, value) in src.extra {
            dst.extra.entry(key).or_insert(value);
        }
    }

    pub(crate) fn overwrite_from(dst: &mut Self, src: Self) {
        overwrite(&mut dst.id, src.id);
        overwrite(&mut dst.name, src.name);
        overwrite(&mut dst.first_name, src.first_name);
        overwrite(&mut dst.last_name, src.last_name);
        overwrite(&mut dst.bio, src.bio);
        overwrite(&mut dst.image_url, src.image_url);
        dst.extra.extend(src.extra);
    }
}

/// An instructor in the upstream catalog. Shared across every ride they
/// taught; one fetch serves all of them.
#[derive(Debug)]
pub struct Instructor {
    id: String,
    state: LazyState<InstructorFields>,
}

impl Instructor {
    pub(crate) fn new(id: &str, seed: Option<InstructorFields>) -> Self {
        let state = match seed {
            Some(fields) => LazyState::partial(fields),
            None => LazyState::unresolved(),
        };
        Self {
            id: id.to_string(),
            state,
        }
    }

    pub(crate) fn absorb_partial(&self, fields: InstructorFields) {
        self.state.absorb_partial(fields, InstructorFields::fill_from);
    }

    pub async fn name(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "name", |f| f.name.clone()).await
    }

    pub async fn first_name(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "first_name", |f| f.first_name.clone())
            .await
    }

    pub async fn last_name(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "last_name", |f| f.last_name.clone())
            .await
    }

    pub async fn bio(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "bio", |f| f.bio.clone()).await
    }

    pub async fn image_url(&self, client: &PelotonClient) -> Result<String> {
        self.scalar(client, "image_url", |f| f.image_url.clone())
            .await
    }

    async fn scalar<T, G>(&self, client: &PelotonClient, field: &'static str, get: G) -> Result<T>
    where
        G: Fn(&InstructorFields) -> Option<T>,
    {
        if let Some(value) = self.state.known(&get) {
            return Ok(value);
        }
        if self.state.resolution() == Resolution::Complete {
            return Err(Error::attribute_not_found(EntityKind::Instructor, &self.id, field));
        }
        self.resolve(client).await?;
        self.state
            .known(&get)
            .ok_or_else(|| Error::attribute_not_found(EntityKind::Instructor, &self.id, field))
    }
}

#[async_trait]
impl Entity for Instructor {
    fn kind(&self) -> EntityKind {
        EntityKind::Instructor
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

        debug!(instructor = %self.id, "fetching instructor detail");
        let detail: serde_json::Value = client
            .session()
            .get_json(&format!("/api/instructor/{}", self.id), &[])
            .await?;
        let fields: InstructorFields = serde_json::from_value(detail)?;
        self.state.complete(fields, InstructorFields::overwrite_from);
        Ok(())
    }
}
