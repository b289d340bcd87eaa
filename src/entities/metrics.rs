// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-workout performance metrics
//!
//! Metrics live on a separate endpoint from the workout detail
//! (`/api/workout/{id}/performance_graph`), so they are their own entity,
//! keyed by the workout id. The response splits into scalar summaries
//! (total output, distance, calories) and sampled series (output, cadence,
//! resistance, speed, heart rate). Series samples can be null mid-stream,
//! e.g. when no heart rate monitor was paired; those arrive as `None`.

use super::{Entity, EntityKind, LazyState, Resolution};
use crate::client::PelotonClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Summary slugs the upstream is known to send.
const KNOWN_SUMMARY_SLUGS: &[&str] = &["total_output", "distance", "calories"];

/// Series slugs the upstream is known to send.
const KNOWN_METRIC_SLUGS: &[&str] = &["output", "cadence", "resistance", "speed", "heart_rate"];

/// A scalar roll-up of one metric over the whole workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub slug: String,
    #[serde(rename = "display_name")]
    pub name: Option<String>,
    #[serde(rename = "display_unit")]
    pub unit: Option<String>,
    pub value: Option<f64>,
}

/// A sampled series for one metric, with per-workout average and max.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub slug: String,
    #[serde(rename = "display_name")]
    pub name: Option<String>,
    #[serde(rename = "display_unit")]
    pub unit: Option<String>,
    #[serde(rename = "average_value")]
    pub average: Option<f64>,
    #[serde(rename = "max_value")]
    pub max: Option<f64>,
    /// One sample per `every_n` seconds; `None` where the sensor had no data.
    pub values: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    metrics_type: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct MetricsFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summaries: Option<Vec<MetricSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Metric>>,
}

/// Raw shape of the performance graph response.
#[derive(Deserialize)]
struct PerformanceGraphResponse {
    duration: Option<u64>,
    #[serde(default)]
    segment_list: Vec<Segment>,
    #[serde(default)]
    summaries: Vec<MetricSummary>,
    #[serde(default)]
    metrics: Vec<Metric>,
}

impl PerformanceGraphResponse {
    /// Flattens the response into the resident field set, logging any slug
    /// this client does not recognize. Unknown slugs are kept; the warning
    /// exists so new upstream metrics surface in logs instead of vanishing.
    fn into_fields(self) -> MetricsFields {
        for summary in &self.summaries {
            if !KNOWN_SUMMARY_SLUGS.contains(&summary.slug.as_str()) {
                warn!(slug = %summary.slug, "unknown metric summary slug");
            }
        }
        for metric in &self.metrics {
            if !KNOWN_METRIC_SLUGS.contains(&metric.slug.as_str()) {
                warn!(slug = %metric.slug, "unknown metric category slug");
            }
        }
        let discipline = self
            .segment_list
            .first()
            .and_then(|s| s.metrics_type.clone());
        MetricsFields {
            duration: self.duration,
            discipline,
            summaries: Some(self.summaries),
            metrics: Some(self.metrics),
        }
    }
}

/// The full metric set of one workout.
#[derive(Debug)]
pub struct WorkoutMetrics {
    /// Id of the owning workout; metrics have no identifier of their own.
    workout_id: String,
    state: LazyState<MetricsFields>,
}

impl WorkoutMetrics {
    pub(crate) fn new(workout_id: &str) -> Self {
        Self {
            workout_id: workout_id.to_string(),
            state: LazyState::unresolved(),
        }
    }

    /// Workout duration in seconds as reported by the performance graph.
    pub async fn duration(&self, client: &PelotonClient) -> Result<u64> {
        self.field(client, "duration", |f| f.duration).await
    }

    /// Metrics discipline, taken from the first segment.
    pub async fn discipline(&self, client: &PelotonClient) -> Result<String> {
        self.field(client, "discipline", |f| f.discipline.clone())
            .await
    }

    /// All summary roll-ups.
    pub async fn summaries(&self, client: &PelotonClient) -> Result<Vec<MetricSummary>> {
        self.field(client, "summaries", |f| f.summaries.clone())
            .await
    }

    /// All sampled series.
    pub async fn metrics(&self, client: &PelotonClient) -> Result<Vec<Metric>> {
        self.field(client, "metrics", |f| f.metrics.clone()).await
    }

    /// One summary by slug, e.g. `total_output`.
    pub async fn summary(&self, client: &PelotonClient, slug: &str) -> Result<MetricSummary> {
        let summaries = self.summaries(client).await?;
        summaries
            .into_iter()
            .find(|s| s.slug == slug)
            .ok_or_else(|| Error::attribute_not_found(EntityKind::Metrics, &self.workout_id, slug))
    }

    /// One sampled series by slug, e.g. `heart_rate`.
    pub async fn metric(&self, client: &PelotonClient, slug: &str) -> Result<Metric> {
        let metrics = self.metrics(client).await?;
        metrics
            .into_iter()
            .find(|m| m.slug == slug)
            .ok_or_else(|| Error::attribute_not_found(EntityKind::Metrics, &self.workout_id, slug))
    }

    async fn field<T, G>(&self, client: &PelotonClient, field: &'static str, get: G) -> Result<T>
    where
        G: Fn(&MetricsFields) -> Option<T>,
    {
        if let Some(value) = self.state.known(&get) {
            return Ok(value);
        }
        if self.state.resolution() == Resolution::Complete {
            return Err(Error::attribute_not_found(
                EntityKind::Metrics,
                &self.workout_id,
                field,
            ));
        }
        self.resolve(client).await?;
        self.state.known(&get).ok_or_else(|| {
            Error::attribute_not_found(EntityKind::Metrics, &self.workout_id, field)
        })
    }
}

#[async_trait]
impl Entity for WorkoutMetrics {
    fn kind(&self) -> EntityKind {
        EntityKind::Metrics
    }

    fn id(&self) -> &str {
        &self.workout_id
    }

    fn resolution(&self) -> Resolution {
        self.state.resolution()
    }

    fn serialize(&self) -> serde_json::Value {
        let mut value = self
            .state
            .with_fields(|f| serde_json::to_value(f).unwrap_or_default());
        if let Some(map) = value.as_object_mut() {
            map.insert("workout_id".into(), self.workout_id.clone().into());
        }
        value
    }

    async fn resolve(&self, client: &PelotonClient) -> Result<()> {
        let _gate = self.state.gate().await;
        if self.state.resolution() == Resolution::Complete {
            return Ok(());
        }

        debug!(workout = %self.workout_id, "fetching performance graph");
        let response: PerformanceGraphResponse = client
            .session()
            .get_json(
                &format!("/api/workout/{}/performance_graph", self.workout_id),
                &[("every_n", "1")],
            )
            .await?;
        self.state
            .complete(response.into_fields(), |dst, src| *dst = src);
        Ok(())
    }
}
