//! Which reconciliation path each socket event takes.

use crisis_common::EventKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPath {
    /// Patch one entity in place from the payload.
    Fast,
    /// Ignore the payload, refetch every collection and recompute joins.
    Slow,
    /// Append to a feed, deduplicated by id.
    Append,
    /// Connection and room bookkeeping; logged only.
    Lifecycle,
}

pub const POLICY: [(EventKind, SyncPath); 11] = [
    (EventKind::PersonnelLocationUpdated, SyncPath::Fast),
    (EventKind::IncidentUpdated, SyncPath::Slow),
    (EventKind::IncidentCreated, SyncPath::Slow),
    (EventKind::PersonnelStatusUpdated, SyncPath::Slow),
    (EventKind::PersonnelAssigned, SyncPath::Slow),
    (EventKind::BroadcastReceived, SyncPath::Append),
    (EventKind::MessageReceived, SyncPath::Append),
    (EventKind::GeofenceAlert, SyncPath::Append),
    (EventKind::ConnectionEstablished, SyncPath::Lifecycle),
    (EventKind::JoinedIncident, SyncPath::Lifecycle),
    (EventKind::LeftIncident, SyncPath::Lifecycle),
];

pub fn sync_path(kind: EventKind) -> SyncPath {
    POLICY
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, path)| *path)
        .unwrap_or(SyncPath::Lifecycle)
}

/// Events a live view must subscribe to, i.e. everything that touches the
/// incident/personnel/resource collections.
pub fn state_events() -> impl Iterator<Item = EventKind> {
    POLICY
        .into_iter()
        .filter(|(_, path)| matches!(path, SyncPath::Fast | SyncPath::Slow))
        .map(|(kind, _)| kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_exactly_one_entry() {
        for kind in EventKind::ALL {
            let entries = POLICY.iter().filter(|(k, _)| *k == kind).count();
            assert_eq!(entries, 1, "{kind:?}");
        }
    }

    #[test]
    fn test_only_location_is_fast() {
        let fast: Vec<_> = POLICY
            .iter()
            .filter(|(_, path)| *path == SyncPath::Fast)
            .map(|(kind, _)| *kind)
            .collect();
        assert_eq!(fast, vec![EventKind::PersonnelLocationUpdated]);
        assert_eq!(sync_path(EventKind::PersonnelAssigned), SyncPath::Slow);
        assert_eq!(state_events().count(), 5);
    }
}
