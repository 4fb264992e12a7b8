//! Derived fields.
//!
//! Everything here is recomputed from scratch out of the three fetched
//! collections. Nothing the backend pre-joined is trusted.

use crisis_common::{IncidentRecord, LatLng, Personnel, Resource, Severity};
use serde::{Deserialize, Serialize};

use crate::geo::haversine_m;

/// The three collections fetched together on every slow-path pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub incidents: Vec<IncidentRecord>,
    pub personnel: Vec<Personnel>,
    pub resources: Vec<Resource>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IncidentView {
    pub record: IncidentRecord,
    /// Names of personnel whose `assigned_incident_id` points here
    pub responders: Vec<String>,
    pub resources: Vec<String>,
    /// Assigned personnel currently on scene; never exceeds `total_units`
    pub arrived_units: usize,
    pub total_units: usize,
    /// Metres from the view's origin, when it has one
    pub distance_m: Option<f64>,
}

impl IncidentView {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn progress_percent(&self) -> u8 {
        if self.total_units == 0 {
            return 0;
        }
        (self.arrived_units * 100 / self.total_units) as u8
    }
}

pub fn derive_incident(
    record: &IncidentRecord,
    personnel: &[Personnel],
    resources: &[Resource],
    origin: Option<LatLng>,
) -> IncidentView {
    let assigned: Vec<&Personnel> = personnel
        .iter()
        .filter(|p| p.assigned_incident_id == Some(record.id))
        .collect();

    IncidentView {
        record: record.clone(),
        responders: assigned.iter().map(|p| p.name.clone()).collect(),
        resources: resources
            .iter()
            .filter(|r| r.assigned_incident_id == Some(record.id))
            .map(|r| r.name.clone())
            .collect(),
        arrived_units: assigned.iter().filter(|p| p.is_on_scene()).count(),
        total_units: assigned.len(),
        distance_m: origin.map(|o| haversine_m(o, record.location())),
    }
}

/// Derive every incident in the snapshot, resolved ones included.
pub fn derive_all(snapshot: &Snapshot, origin: Option<LatLng>) -> Vec<IncidentView> {
    snapshot
        .incidents
        .iter()
        .map(|record| derive_incident(record, &snapshot.personnel, &snapshot.resources, origin))
        .collect()
}

/// Dashboard header counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub active_incidents: usize,
    pub personnel: usize,
    pub equipment: usize,
    pub critical: usize,
}

pub fn summarize(snapshot: &Snapshot) -> Summary {
    let active = snapshot.incidents.iter().filter(|i| !i.is_resolved());
    let (mut active_incidents, mut critical) = (0, 0);
    for incident in active {
        active_incidents += 1;
        if incident.severity == Severity::Critical {
            critical += 1;
        }
    }

    Summary {
        active_incidents,
        personnel: snapshot.personnel.len(),
        equipment: snapshot.resources.len(),
        critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crisis_common::{IncidentStatus, PersonnelStatus, ResourceStatus};

    fn incident(id: i64, severity: Severity) -> IncidentRecord {
        IncidentRecord {
            id,
            title: format!("Incident {id}"),
            description: None,
            kind: Some("fire".into()),
            severity,
            status: IncidentStatus::Active,
            lat: 28.61,
            lng: 77.21,
            location_name: None,
            report_source: None,
            report_count: None,
            created_at: None,
        }
    }

    fn responder(id: i64, status: PersonnelStatus, incident: Option<i64>) -> Personnel {
        let mut p = Personnel::minimal(id, format!("Unit {id}"), status, LatLng::new(28.6, 77.2));
        p.assigned_incident_id = incident;
        p
    }

    fn truck(id: i64, incident: Option<i64>) -> Resource {
        Resource {
            id,
            name: format!("Truck {id}"),
            kind: "vehicle".into(),
            status: ResourceStatus::Deployed,
            lat: None,
            lng: None,
            assigned_incident_id: incident,
            is_public: false,
            description: None,
        }
    }

    #[test]
    fn test_joins_on_assigned_incident_id() {
        let personnel = vec![
            responder(1, PersonnelStatus::OnScene, Some(1)),
            responder(2, PersonnelStatus::EnRoute, Some(1)),
            responder(3, PersonnelStatus::OnScene, Some(2)),
            responder(4, PersonnelStatus::Available, None),
        ];
        let resources = vec![truck(10, Some(1)), truck(11, None)];

        let view = derive_incident(&incident(1, Severity::Critical), &personnel, &resources, None);
        assert_eq!(view.responders, vec!["Unit 1", "Unit 2"]);
        assert_eq!(view.resources, vec!["Truck 10"]);
        assert_eq!((view.arrived_units, view.total_units), (1, 2));
        assert_eq!(view.progress_percent(), 50);
        assert_eq!(view.distance_m, None);
    }

    #[test]
    fn test_on_scene_but_unassigned_is_not_arrived() {
        let personnel = vec![responder(1, PersonnelStatus::OnScene, None)];
        let view = derive_incident(&incident(1, Severity::Low), &personnel, &[], None);
        assert_eq!((view.arrived_units, view.total_units), (0, 0));
        assert_eq!(view.progress_percent(), 0);
    }

    #[test]
    fn test_summary_skips_resolved() {
        let mut resolved = incident(2, Severity::Critical);
        resolved.status = IncidentStatus::Resolved;
        let snapshot = Snapshot {
            incidents: vec![incident(1, Severity::Critical), resolved, incident(3, Severity::High)],
            personnel: vec![responder(1, PersonnelStatus::Available, None)],
            resources: vec![truck(1, None), truck(2, None)],
        };

        assert_eq!(
            summarize(&snapshot),
            Summary { active_incidents: 2, personnel: 1, equipment: 2, critical: 1 }
        );
    }
}
