// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Lazy-resolving entities
//!
//! Each remote record type (workout, ride, instructor, user, per-workout
//! metrics) is modeled as an explicit struct whose fields are all `Option`
//! until resolved. An entity starts out [`Resolution::Unresolved`] (only the
//! identifier is known) or [`Resolution::Partial`] (seeded from a list
//! endpoint's reduced record), and is promoted to [`Resolution::Complete`]
//! by exactly one detail fetch the first time an absent field is read.
//!
//! Accessors take the owning [`crate::PelotonClient`] so the upgrade fetch
//! can reuse its session and cache. Once complete, scalar fields never
//! change for the lifetime of the process; subsequent reads are served from
//! memory.

pub mod instructor;
pub mod metrics;
pub mod ride;
pub mod user;
pub mod workout;

pub use instructor::Instructor;
pub use metrics::{Metric, MetricSummary, WorkoutMetrics};
pub use ride::Ride;
pub use user::User;
pub use workout::{Achievement, Workout};

use crate::client::PelotonClient;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::RwLock;
use tokio::sync::{Mutex, MutexGuard};

/// How much of a remote record is locally resident.
///
/// Ordered: `Unresolved < Partial < Complete`. Resolution state never
/// regresses within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resolution {
    /// Only the identifier is known. No network call has occurred.
    Unresolved,
    /// Seeded with the reduced field set a list endpoint returns.
    Partial,
    /// The full detail record has been fetched and merged.
    Complete,
}

/// The entity variants the upstream API exposes. Used as half of the cache
/// key and in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Workout,
    Ride,
    Instructor,
    User,
    Metrics,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Workout => "workout",
            Self::Ride => "ride",
            Self::Instructor => "instructor",
            Self::User => "user",
            Self::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// Common capability of all remote-backed objects.
#[async_trait]
pub trait Entity: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn id(&self) -> &str;

    fn resolution(&self) -> Resolution;

    /// Returns the currently-known fields as a plain nested JSON mapping.
    /// Never triggers a fetch; "peek without network cost" is deliberately a
    /// separate operation from normal attribute access.
    fn serialize(&self) -> serde_json::Value;

    /// Performs the upgrade fetch that promotes this entity to
    /// [`Resolution::Complete`]. Idempotent; a no-op once complete. On
    /// failure the entity's state is left untouched.
    async fn resolve(&self, client: &PelotonClient) -> Result<()>;
}

/// Shared state machinery backing every entity variant: the optional field
/// set, the resolution marker, and the async gate serializing the upgrade
/// fetch so concurrent readers cause at most one detail request.
#[derive(Debug)]
pub(crate) struct LazyState<F> {
    inner: RwLock<State<F>>,
    gate: Mutex<()>,
}

#[derive(Debug)]
struct State<F> {
    fields: F,
    resolution: Resolution,
}

impl<F> LazyState<F> {
    pub(crate) fn unresolved() -> Self
    where
        F: Default,
    {
        Self {
            inner: RwLock::new(State {
                fields: F::default(),
                resolution: Resolution::Unresolved,
            }),
            gate: Mutex::new(()),
        }
    }

    pub(crate) fn partial(fields: F) -> Self {
        Self {
            inner: RwLock::new(State {
                fields,
                resolution: Resolution::Partial,
            }),
            gate: Mutex::new(()),
        }
    }

    pub(crate) fn resolution(&self) -> Resolution {
        self.read().resolution
    }

    /// Reads a value out of the field set without any network activity.
    pub(crate) fn known<T>(&self, get: impl FnOnce(&F) -> Option<T>) -> Option<T> {
        get(&self.read().fields)
    }

    /// Runs a closure against the resident fields.
    pub(crate) fn with_fields<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(&self.read().fields)
    }

    /// Acquires the upgrade-fetch gate. Callers must re-check the resolution
    /// after acquisition; a concurrent resolver may have completed the
    /// entity while this caller was waiting.
    pub(crate) async fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Merges newly-seen partial fields, never regressing resolution. If the
    /// entity is already complete the incoming fields are discarded (the
    /// cached version is richer); otherwise `merge` fills in what is missing
    /// and an unresolved entity becomes partial.
    pub(crate) fn absorb_partial(&self, incoming: F, merge: impl FnOnce(&mut F, F)) {
        let mut state = self.write();
        if state.resolution == Resolution::Complete {
            return;
        }
        merge(&mut state.fields, incoming);
        if state.resolution == Resolution::Unresolved {
            state.resolution = Resolution::Partial;
        }
    }

    /// Merges a full detail record and marks the entity complete.
    pub(crate) fn complete(&self, incoming: F, merge: impl FnOnce(&mut F, F)) {
        let mut state = self.write();
        merge(&mut state.fields, incoming);
        state.resolution = Resolution::Complete;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State<F>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State<F>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fills `slot` only if nothing is resident yet. Partial merges use this so
/// already-known values are never blanked by a sparser record.
pub(crate) fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Takes `value` whenever the detail response carries it; fields absent from
/// the response keep their current value. Complete merges use this.
pub(crate) fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Fields {
        a: Option<u32>,
        b: Option<u32>,
    }

    fn fill_missing(dst: &mut Fields, src: Fields) {
        fill(&mut dst.a, src.a);
        fill(&mut dst.b, src.b);
    }

    fn take_all(dst: &mut Fields, src: Fields) {
        overwrite(&mut dst.a, src.a);
        overwrite(&mut dst.b, src.b);
    }

    #[test]
    fn resolution_is_ordered() {
        assert!(Resolution::Unresolved < Resolution::Partial);
        assert!(Resolution::Partial < Resolution::Complete);
    }

    #[test]
    fn unresolved_becomes_partial_on_absorb() {
        let state = LazyState::<Fields>::unresolved();
        assert_eq!(state.resolution(), Resolution::Unresolved);

        state.absorb_partial(
            Fields {
                a: Some(1),
                b: None,
            },
            fill_missing,
        );
        assert_eq!(state.resolution(), Resolution::Partial);
        assert_eq!(state.known(|f| f.a), Some(1));
    }

    #[test]
    fn partial_merge_never_blanks_resident_values() {
        let state = LazyState::partial(Fields {
            a: Some(1),
            b: None,
        });
        state.absorb_partial(
            Fields {
                a: Some(9),
                b: Some(2),
            },
            fill_missing,
        );
        assert_eq!(state.known(|f| f.a), Some(1));
        assert_eq!(state.known(|f| f.b), Some(2));
    }

    #[test]
    fn complete_entity_discards_later_partials() {
        let state = LazyState::partial(Fields {
            a: Some(1),
            b: Some(2),
        });
        state.complete(
            Fields {
                a: Some(3),
                b: Some(4),
            },
            take_all,
        );
        assert_eq!(state.resolution(), Resolution::Complete);

        state.absorb_partial(
            Fields {
                a: Some(99),
                b: None,
            },
            fill_missing,
        );
        assert_eq!(state.known(|f| f.a), Some(3));
        assert_eq!(state.known(|f| f.b), Some(4));
    }
}
