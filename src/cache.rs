// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Process-local entity cache and relationship resolution
//!
//! One map per entity kind, keyed by identifier, holding the single live
//! instance for that key. Entries are inserted on first construction and
//! never evicted; the library's intended lifetime is a single script run.
//! The cache is owned by the client instance, not process-global state.
//!
//! Relationship resolution goes through here too: when a parent record
//! carries an embedded reference (a workout's ride join, a ride's
//! instructor id), the cache either hands back the existing instance,
//! merging any newly-seen fields without regressing resolution, or
//! constructs a fresh stub.

use crate::entities::instructor::{Instructor, InstructorFields};
use crate::entities::metrics::WorkoutMetrics;
use crate::entities::ride::{Ride, RideFields};
use crate::entities::user::{User, UserFields};
use crate::entities::workout::{Workout, WorkoutFields};
use crate::error::{Error, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct EntityCache {
    workouts: Mutex<HashMap<String, Arc<Workout>>>,
    rides: Mutex<HashMap<String, Arc<Ride>>>,
    instructors: Mutex<HashMap<String, Arc<Instructor>>>,
    users: Mutex<HashMap<String, Arc<User>>>,
    // Keyed by the owning workout's id; metrics have no id of their own.
    metrics: Mutex<HashMap<String, Arc<WorkoutMetrics>>>,
}

impl EntityCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn workout(&self, id: &str, seed: Option<WorkoutFields>) -> Arc<Workout> {
        let mut map = lock(&self.workouts);
        match map.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                let workout = entry.get().clone();
                if let Some(fields) = seed {
                    workout.absorb_partial(fields);
                }
                workout
            }
            Entry::Vacant(entry) => {
                let workout = Arc::new(Workout::new(id, seed));
                entry.insert(workout.clone());
                workout
            }
        }
    }

    pub(crate) fn ride(&self, id: &str, seed: Option<RideFields>) -> Arc<Ride> {
        let mut map = lock(&self.rides);
        match map.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                let ride = entry.get().clone();
                if let Some(fields) = seed {
                    ride.absorb_partial(fields);
                }
                ride
            }
            Entry::Vacant(entry) => {
                let ride = Arc::new(Ride::new(id, seed));
                entry.insert(ride.clone());
                ride
            }
        }
    }

    pub(crate) fn instructor(&self, id: &str, seed: Option<InstructorFields>) -> Arc<Instructor> {
        let mut map = lock(&self.instructors);
        match map.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                let instructor = entry.get().clone();
                if let Some(fields) = seed {
                    instructor.absorb_partial(fields);
                }
                instructor
            }
            Entry::Vacant(entry) => {
                let instructor = Arc::new(Instructor::new(id, seed));
                entry.insert(instructor.clone());
                instructor
            }
        }
    }

    pub(crate) fn user(&self, id: &str, seed: Option<UserFields>) -> Arc<User> {
        let mut map = lock(&self.users);
        match map.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                let user = entry.get().clone();
                if let Some(fields) = seed {
                    user.absorb_partial(fields);
                }
                user
            }
            Entry::Vacant(entry) => {
                let user = Arc::new(User::new(id, seed));
                entry.insert(user.clone());
                user
            }
        }
    }

    pub(crate) fn metrics(&self, workout_id: &str) -> Arc<WorkoutMetrics> {
        let mut map = lock(&self.metrics);
        map.entry(workout_id.to_string())
            .or_insert_with(|| Arc::new(WorkoutMetrics::new(workout_id)))
            .clone()
    }

    /// Wraps one raw list-endpoint record as a partial [`Workout`], wiring
    /// the embedded ride join into a cached ride stub.
    pub(crate) fn admit_workout(&self, record: serde_json::Value) -> Result<Arc<Workout>> {
        let mut fields: WorkoutFields = serde_json::from_value(record)?;
        let id = fields
            .id
            .clone()
            .ok_or_else(|| Error::Decode("workout record without an id".into()))?;
        let ride_seed = fields.ride.take();

        let workout = self.workout(&id, Some(fields));
        if let Some(seed) = ride_seed {
            if let Some(ride_id) = seed.id.clone() {
                workout.attach_ride(self.ride(&ride_id, Some(seed)));
            }
        }
        Ok(workout)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Entity, Resolution};
    use serde_json::json;

    #[test]
    fn same_id_yields_same_instance() {
        let cache = EntityCache::new();
        let first = cache.workout("w1", None);
        let second = cache.workout("w1", None);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn stub_construction_is_unresolved() {
        let cache = EntityCache::new();
        let workout = cache.workout("w1", None);
        assert_eq!(workout.resolution(), Resolution::Unresolved);
    }

    #[test]
    fn admitted_record_seeds_partial_workout_and_ride_stub() {
        let cache = EntityCache::new();
        let workout = cache
            .admit_workout(json!({
                "id": "w1",
                "status": "COMPLETE",
                "ride": {"id": "r1", "title": "30 min climb"}
            }))
            .expect("record admits");

        assert_eq!(workout.resolution(), Resolution::Partial);
        let serialized = workout.serialize();
        assert_eq!(serialized["status"], "COMPLETE");
        assert_eq!(serialized["ride"]["title"], "30 min climb");

        // The ride join landed in the shared ride cache.
        let ride = cache.ride("r1", None);
        assert_eq!(ride.resolution(), Resolution::Partial);
    }

    #[test]
    fn record_without_id_is_rejected() {
        let cache = EntityCache::new();
        let err = cache.admit_workout(json!({"status": "COMPLETE"}));
        assert!(matches!(err, Err(Error::Decode(_))));
    }

    #[test]
    fn later_partial_fills_missing_fields_only() {
        let cache = EntityCache::new();
        cache.admit_workout(json!({"id": "w1", "status": "COMPLETE"})).expect("admits");
        cache
            .admit_workout(json!({"id": "w1", "status": "IN_PROGRESS", "fitness_discipline": "cycling"}))
            .expect("admits");

        let workout = cache.workout("w1", None);
        let serialized = workout.serialize();
        assert_eq!(serialized["status"], "COMPLETE");
        assert_eq!(serialized["fitness_discipline"], "cycling");
    }
}
