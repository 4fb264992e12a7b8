//! View-local live state.
//!
//! Each view owns one [`LiveState`]. It is filled by a REST snapshot and kept
//! current by socket events routed through [`crate::policy`].

use crisis_common::{IncidentRecord, LatLng, LocationUpdated, Personnel, Resource, ServerEvent};

use crate::error::ClientError;
use crate::policy::{SyncPath, sync_path};
use crate::reconcile::{IncidentView, Snapshot, Summary, derive_all, summarize};

pub const NO_ACTIVE_INCIDENTS: &str = "No active incidents";

/// What the caller has to do after [`LiveState::apply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconcile {
    /// The state already reflects the event.
    Patched,
    /// Refetch the snapshot and hand it to [`LiveState::apply_snapshot`].
    Refetch,
    /// Not a state event.
    Ignored,
}

#[derive(Clone, Debug, Default)]
pub struct LiveState {
    snapshot: Snapshot,
    origin: Option<LatLng>,
    loaded: bool,
    last_error: Option<String>,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distances are measured from `origin` when set.
    pub fn with_origin(origin: LatLng) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    pub fn set_origin(&mut self, origin: Option<LatLng>) {
        self.origin = origin;
    }

    pub fn origin(&self) -> Option<LatLng> {
        self.origin
    }

    /// Replace every collection. Last response wins.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.loaded = true;
        self.last_error = None;
    }

    /// Take the outcome of a snapshot fetch. Returns `true` if it was applied.
    pub fn settle(&mut self, result: Result<Snapshot, ClientError>) -> bool {
        match result {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            Err(e) => {
                self.record_error(&e);
                false
            }
        }
    }

    /// A failed fetch leaves the previous state in place.
    pub fn record_error(&mut self, error: &ClientError) {
        log::error!("Failed to refresh live state: {error}");
        self.last_error = Some(error.inline_message());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn apply(&mut self, event: &ServerEvent) -> Reconcile {
        match (sync_path(event.kind()), event) {
            (SyncPath::Fast, ServerEvent::PersonnelLocationUpdated(update)) => {
                self.patch_location(update);
                Reconcile::Patched
            }
            (SyncPath::Slow, _) => Reconcile::Refetch,
            (path, _) => {
                log::debug!("{:?} event {:?} does not touch live state", path, event.kind());
                Reconcile::Ignored
            }
        }
    }

    /// Fast path. Only location, status and name change; an unknown id is
    /// appended as a minimal entry. Returns `true` if the entry existed.
    pub fn patch_location(&mut self, update: &LocationUpdated) -> bool {
        if let Some(person) = self.snapshot.personnel.iter_mut().find(|p| p.id == update.personnel_id) {
            person.set_location(update.location);
            if let Some(status) = &update.status {
                person.status = status.clone();
            }
            if let Some(name) = &update.name {
                person.name = name.clone();
            }
            return true;
        }

        self.snapshot.personnel.push(Personnel::minimal(
            update.personnel_id,
            update.name.clone().unwrap_or_default(),
            update.status.clone().unwrap_or_default(),
            update.location,
        ));
        false
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn personnel(&self) -> &[Personnel] {
        &self.snapshot.personnel
    }

    pub fn resources(&self) -> &[Resource] {
        &self.snapshot.resources
    }

    pub fn records(&self) -> &[IncidentRecord] {
        &self.snapshot.incidents
    }

    /// Every incident, resolved ones included.
    pub fn incidents(&self) -> Vec<IncidentView> {
        derive_all(&self.snapshot, self.origin)
    }

    /// Resolved incidents are filtered out, never deleted.
    pub fn active_incidents(&self) -> Vec<IncidentView> {
        let mut views = self.incidents();
        views.retain(|view| !view.record.is_resolved());
        views
    }

    /// Active incidents within `radius_m` of the origin, nearest first.
    /// Empty without an origin.
    pub fn nearby_incidents(&self, radius_m: f64) -> Vec<IncidentView> {
        let mut views: Vec<IncidentView> = self
            .active_incidents()
            .into_iter()
            .filter(|view| view.distance_m.is_some_and(|d| d <= radius_m))
            .collect();
        views.sort_by(|a, b| a.distance_m.unwrap_or(f64::MAX).total_cmp(&b.distance_m.unwrap_or(f64::MAX)));
        views
    }

    pub fn incident(&self, id: i64) -> Option<IncidentView> {
        self.incidents().into_iter().find(|view| view.id() == id)
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.snapshot)
    }

    /// Placeholder for the incident list once a fetch has completed.
    pub fn empty_message(&self) -> Option<&'static str> {
        (self.loaded && self.snapshot.incidents.iter().all(IncidentRecord::is_resolved))
            .then_some(NO_ACTIVE_INCIDENTS)
    }
}
