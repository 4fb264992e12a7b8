use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use crisis_common::{
    Alert, CommRecord, CurrentUser, GeofenceZone, IncidentRecord, IncidentStatus, LatLng, Notification, Personnel,
    PersonnelStatus, Resource, ResourceStatus, Severity, TimelineEntry,
};
use serde_json::{Value as JsonValue, json};

use super::{
    Assignment, Attachment, Backend, CreatedIncident, GeofenceCheck, IncidentFilter, IncidentPatch, LoginResponse,
    NewIncident, NotificationDraft, OutgoingComm, PersonnelFilter, ResolveOutcome, ResourceFilter, TimelineNote,
    UploadedAttachment,
};
use crate::error::{ClientError, Result};
use crate::geo::haversine_m;
use crate::lock;
use crate::reconcile::Snapshot;

/// Reports of the same type within this distance merge into one incident.
const DUPLICATE_RADIUS_M: f64 = 500.0;
const DEFAULT_COMMS_LIMIT: usize = 100;

#[derive(Default)]
struct MemoryState {
    snapshot: Snapshot,
    comms: Vec<CommRecord>,
    timeline: Vec<TimelineEntry>,
    alerts: Vec<Alert>,
    zones: Vec<GeofenceZone>,
    notifications: Vec<Notification>,
    users: Vec<(CurrentUser, String)>,
    token: Option<String>,
    next_id: i64,
    fail_next: Option<ClientError>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn incident_mut(&mut self, id: i64) -> Result<&mut IncidentRecord> {
        self.snapshot
            .incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ClientError::Status { status: 404, message: "Incident not found".into() })
    }

    fn personnel_mut(&mut self, id: i64) -> Result<&mut Personnel> {
        self.snapshot
            .personnel
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ClientError::Status { status: 404, message: "Personnel not found".into() })
    }

    fn log_timeline(&mut self, incident_id: i64, event_type: &str, description: String, user_name: &str) -> i64 {
        let id = self.next_id();
        self.timeline.push(TimelineEntry {
            id,
            incident_id,
            event_type: event_type.to_string(),
            description,
            user_name: Some(user_name.to_string()),
            created_at: Some(crisis_common::now_timestamp()),
        });
        id
    }
}

/// In-process [`Backend`] that applies the same state transitions as the
/// real service: duplicate report merging, two-step resolution, releasing
/// units on resolve and resource deployment.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    requests: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state();
            state.next_id = snapshot
                .incidents
                .iter()
                .map(|i| i.id)
                .chain(snapshot.personnel.iter().map(|p| p.id))
                .chain(snapshot.resources.iter().map(|r| r.id))
                .max()
                .unwrap_or(0)
                .max(1000);
            state.snapshot = snapshot;
        }
        backend
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    /// Count the request and fail it if a failure was queued.
    fn begin(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    /// Number of requests served so far, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Make the next request fail with `error`.
    pub fn fail_next(&self, error: ClientError) {
        self.state().fail_next = Some(error);
    }

    pub fn add_user(&self, user: CurrentUser, password: impl Into<String>) {
        self.state().users.push((user, password.into()));
    }

    pub fn add_zone(&self, zone: GeofenceZone) {
        self.state().zones.push(zone);
    }

    pub fn add_alert(&self, alert: Alert) {
        self.state().alerts.push(alert);
    }

    pub fn add_comm(&self, comm: CommRecord) {
        self.state().comms.push(comm);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot.clone()
    }

    /// Apply an out-of-band change, as another client would.
    pub fn mutate(&self, change: impl FnOnce(&mut Snapshot)) {
        change(&mut self.state().snapshot);
    }
}

#[async_trait(?Send)]
impl Backend for MemoryBackend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let mut state = self.begin()?;
        let user = state
            .users
            .iter()
            .find(|(user, secret)| user.username == username && secret == password)
            .map(|(user, _)| user.clone())
            .ok_or_else(|| ClientError::Status { status: 401, message: "Invalid credentials".into() })?;

        let token = format!("memory-{}-{}", user.id, state.next_id());
        state.token = Some(token.clone());
        Ok(LoginResponse { token, user })
    }

    async fn logout(&self) -> Result<()> {
        self.begin()?.token = None;
        Ok(())
    }

    async fn incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>> {
        let state = self.begin()?;
        Ok(state
            .snapshot
            .incidents
            .iter()
            .filter(|i| filter.status.as_ref().is_none_or(|s| &i.status == s))
            .filter(|i| filter.severity.is_none_or(|s| i.severity == s))
            .filter(|i| filter.kind.is_none() || i.kind == filter.kind)
            .cloned()
            .collect())
    }

    async fn incident(&self, id: i64) -> Result<IncidentRecord> {
        Ok(self.begin()?.incident_mut(id)?.clone())
    }

    async fn create_incident(&self, incident: &NewIncident) -> Result<CreatedIncident> {
        let mut state = self.begin()?;
        let at = LatLng::new(incident.lat, incident.lng);

        let duplicate = state
            .snapshot
            .incidents
            .iter()
            .find(|i| {
                i.status == IncidentStatus::Active
                    && i.kind.as_deref() == Some(incident.kind.as_str())
                    && haversine_m(at, i.location()) <= DUPLICATE_RADIUS_M
            })
            .map(|i| i.id);

        if let Some(id) = duplicate {
            let record = state.incident_mut(id)?;
            let count = record.report_count.unwrap_or(1) + 1;
            record.report_count = Some(count);
            state.log_timeline(
                id,
                "duplicate_report",
                format!("Additional report received. Total reports: {count}"),
                "System",
            );
            return Ok(CreatedIncident { incident_id: id, is_duplicate: true });
        }

        let id = state.next_id();
        state.snapshot.incidents.push(IncidentRecord {
            id,
            title: incident.title.clone(),
            description: Some(incident.description.clone()),
            kind: Some(incident.kind.clone()),
            severity: incident.severity,
            status: IncidentStatus::Active,
            lat: incident.lat,
            lng: incident.lng,
            location_name: Some(incident.location_name.clone()),
            report_source: Some(incident.report_source.clone()),
            report_count: Some(1),
            created_at: Some(crisis_common::now_timestamp()),
        });
        state.log_timeline(id, "incident_created", format!("Incident reported: {}", incident.title), "System");
        Ok(CreatedIncident { incident_id: id, is_duplicate: false })
    }

    async fn update_incident(&self, id: i64, patch: &IncidentPatch) -> Result<()> {
        let mut state = self.begin()?;
        let record = state.incident_mut(id)?;
        if let Some(title) = &patch.title {
            record.title = title.clone();
        }
        if let Some(description) = &patch.description {
            record.description = Some(description.clone());
        }
        if let Some(severity) = patch.severity {
            record.severity = severity;
        }
        if let Some(status) = &patch.status {
            record.status = status.clone();
        }
        Ok(())
    }

    async fn resolve_incident(&self, id: i64, confirm: bool) -> Result<ResolveOutcome> {
        let mut state = self.begin()?;

        if !confirm {
            state.incident_mut(id)?.status = IncidentStatus::PendingReview;
            state.log_timeline(
                id,
                "resolution_submitted",
                "Incident submitted for resolution. Review required.".into(),
                "Responder",
            );
            return Ok(ResolveOutcome {
                status: Some(IncidentStatus::PendingReview),
                message: Some("Incident submitted for review".into()),
                released_personnel: 0,
                released_resources: 0,
            });
        }

        state.incident_mut(id)?.status = IncidentStatus::Resolved;
        let mut released_personnel = 0;
        for person in state.snapshot.personnel.iter_mut().filter(|p| p.assigned_incident_id == Some(id)) {
            person.assigned_incident_id = None;
            person.status = PersonnelStatus::Available;
            released_personnel += 1;
        }
        let mut released_resources = 0;
        for resource in state.snapshot.resources.iter_mut().filter(|r| r.assigned_incident_id == Some(id)) {
            resource.assigned_incident_id = None;
            resource.status = ResourceStatus::Available;
            released_resources += 1;
        }
        state.log_timeline(
            id,
            "incident_resolved",
            format!(
                "Incident resolution confirmed. Released {released_personnel} personnel and {released_resources} resources."
            ),
            "Supervisor",
        );

        Ok(ResolveOutcome {
            status: None,
            message: Some("Incident resolved successfully".into()),
            released_personnel,
            released_resources,
        })
    }

    async fn assign_to_incident(&self, id: i64, assignment: &Assignment) -> Result<()> {
        let mut state = self.begin()?;
        state.incident_mut(id)?;

        for person in state
            .snapshot
            .personnel
            .iter_mut()
            .filter(|p| assignment.personnel_ids.contains(&p.id))
        {
            person.assigned_incident_id = Some(id);
            person.status = PersonnelStatus::EnRoute;
        }
        for resource in state
            .snapshot
            .resources
            .iter_mut()
            .filter(|r| assignment.resource_ids.contains(&r.id))
        {
            resource.assigned_incident_id = Some(id);
            resource.status = ResourceStatus::from("en-route");
        }
        state.log_timeline(
            id,
            "resources_assigned",
            format!(
                "Assigned {} personnel and {} resources",
                assignment.personnel_ids.len(),
                assignment.resource_ids.len()
            ),
            "Dispatcher",
        );
        Ok(())
    }

    async fn upload_attachment(&self, id: i64, attachment: Attachment) -> Result<UploadedAttachment> {
        let mut state = self.begin()?;
        state.incident_mut(id)?;
        let attachment_id = state.next_id();
        state.log_timeline(
            id,
            "attachment_added",
            format!("File uploaded: {}", attachment.file_name),
            "User",
        );
        Ok(UploadedAttachment {
            attachment_id,
            file_info: json!({
                "filename": attachment.file_name,
                "mime_type": attachment.mime,
                "size": attachment.bytes.len(),
            }),
        })
    }

    async fn timeline(&self, id: i64) -> Result<Vec<TimelineEntry>> {
        let state = self.begin()?;
        Ok(state
            .timeline
            .iter()
            .rev()
            .filter(|entry| entry.incident_id == id)
            .cloned()
            .collect())
    }

    async fn add_timeline_event(&self, id: i64, note: &TimelineNote) -> Result<i64> {
        let mut state = self.begin()?;
        for (field, value) in [("event_type", &note.event_type), ("description", &note.description)] {
            if value.trim().is_empty() {
                return Err(ClientError::Status {
                    status: 400,
                    message: format!("Missing required field: {field}"),
                });
            }
        }
        let user_name = note.user_name.as_deref().unwrap_or("System");
        Ok(state.log_timeline(id, &note.event_type, note.description.clone(), user_name))
    }

    async fn personnel(&self, filter: &PersonnelFilter) -> Result<Vec<Personnel>> {
        let state = self.begin()?;
        Ok(state
            .snapshot
            .personnel
            .iter()
            .filter(|p| filter.status.as_ref().is_none_or(|s| &p.status == s))
            .filter(|p| filter.role.as_ref().is_none_or(|r| &p.role == r))
            .filter(|p| filter.incident_id.is_none() || p.assigned_incident_id == filter.incident_id)
            .cloned()
            .collect())
    }

    async fn personnel_for_user(&self, user_id: i64) -> Result<Personnel> {
        let state = self.begin()?;
        state
            .snapshot
            .personnel
            .iter()
            .find(|p| p.user_id == Some(user_id))
            .cloned()
            .ok_or_else(|| ClientError::Status { status: 404, message: "Personnel not found".into() })
    }

    async fn update_location(&self, personnel_id: i64, location: LatLng) -> Result<()> {
        self.begin()?.personnel_mut(personnel_id)?.set_location(location);
        Ok(())
    }

    async fn update_status(&self, personnel_id: i64, status: &PersonnelStatus) -> Result<()> {
        self.begin()?.personnel_mut(personnel_id)?.status = status.clone();
        Ok(())
    }

    async fn resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>> {
        let state = self.begin()?;
        Ok(state
            .snapshot
            .resources
            .iter()
            .filter(|r| filter.status.as_deref().is_none_or(|s| r.status.as_str() == s))
            .filter(|r| filter.kind.as_ref().is_none_or(|k| &r.kind == k))
            .filter(|r| filter.is_public.is_none_or(|p| r.is_public == p))
            .cloned()
            .collect())
    }

    async fn public_resources(&self) -> Result<Vec<Resource>> {
        self.resources(&ResourceFilter { is_public: Some(true), ..Default::default() })
            .await
    }

    async fn assign_resource(&self, resource_id: i64, incident_id: Option<i64>) -> Result<()> {
        let mut state = self.begin()?;
        let resource = state
            .snapshot
            .resources
            .iter_mut()
            .find(|r| r.id == resource_id)
            .ok_or_else(|| ClientError::Status { status: 404, message: "Resource not found".into() })?;
        resource.assigned_incident_id = incident_id;
        resource.status = match incident_id {
            Some(_) => ResourceStatus::Deployed,
            None => ResourceStatus::Available,
        };
        Ok(())
    }

    async fn comms(&self, incident_id: i64, limit: Option<u32>) -> Result<Vec<CommRecord>> {
        let state = self.begin()?;
        let limit = limit.map_or(DEFAULT_COMMS_LIMIT, |l| l as usize);
        Ok(state
            .comms
            .iter()
            .filter(|c| c.incident_id == Some(incident_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn send_comm(&self, comm: &OutgoingComm) -> Result<()> {
        let mut state = self.begin()?;
        let id = state.next_id();
        state.comms.push(CommRecord {
            id,
            incident_id: Some(comm.incident_id),
            sender_id: comm.sender_id,
            sender_name: Some(comm.sender_name.clone()),
            message: comm.message.clone(),
            kind: Some(comm.kind.clone()),
            read_status: false,
            created_at: Some(crisis_common::now_timestamp()),
        });
        Ok(())
    }

    async fn mark_comm_read(&self, comm_id: i64) -> Result<()> {
        let mut state = self.begin()?;
        if let Some(comm) = state.comms.iter_mut().find(|c| c.id == comm_id) {
            comm.read_status = true;
        }
        Ok(())
    }

    async fn unread_comms(&self, incident_id: Option<i64>) -> Result<Vec<CommRecord>> {
        let state = self.begin()?;
        Ok(state
            .comms
            .iter()
            .rev()
            .filter(|c| !c.read_status)
            .filter(|c| incident_id.is_none() || c.incident_id == incident_id)
            .cloned()
            .collect())
    }

    async fn dashboard_analytics(&self) -> Result<JsonValue> {
        let state = self.begin()?;
        let snapshot = &state.snapshot;
        let active = snapshot.incidents.iter().filter(|i| !i.is_resolved()).count();
        let critical = snapshot
            .incidents
            .iter()
            .filter(|i| !i.is_resolved() && i.severity == Severity::Critical)
            .count();
        let deployed = snapshot
            .resources
            .iter()
            .filter(|r| r.status == ResourceStatus::Deployed)
            .count();

        Ok(json!({
            "incidents": { "total": snapshot.incidents.len(), "active": active, "critical": critical },
            "personnel": { "total": snapshot.personnel.len() },
            "resources": { "total": snapshot.resources.len(), "deployed": deployed },
        }))
    }

    async fn nearby_alerts(&self, at: LatLng, radius_m: f64) -> Result<Vec<Alert>> {
        let state = self.begin()?;
        Ok(state
            .alerts
            .iter()
            .filter_map(|alert| {
                let distance = haversine_m(at, LatLng::new(alert.lat, alert.lng));
                (distance <= radius_m).then(|| Alert {
                    distance: Some(distance),
                    ..alert.clone()
                })
            })
            .collect())
    }

    async fn geofence_zones(&self) -> Result<Vec<GeofenceZone>> {
        let state = self.begin()?;
        Ok(state.zones.iter().filter(|z| z.active).cloned().collect())
    }

    async fn check_geofence(&self, at: LatLng, personnel_id: Option<i64>) -> Result<GeofenceCheck> {
        let state = self.begin()?;
        let zones: Vec<GeofenceZone> = state
            .zones
            .iter()
            .filter(|z| z.active && haversine_m(at, LatLng::new(z.lat, z.lng)) <= z.radius)
            .cloned()
            .collect();
        let alerts = zones
            .iter()
            .map(|z| {
                json!({
                    "zone_id": z.id,
                    "personnel_id": personnel_id,
                    "location": at,
                    "alert_type": z.zone_type,
                })
            })
            .collect();

        Ok(GeofenceCheck {
            breached: !zones.is_empty(),
            zones,
            alerts,
        })
    }

    async fn notifications(&self, user_id: Option<i64>) -> Result<Vec<Notification>> {
        let state = self.begin()?;
        Ok(state
            .notifications
            .iter()
            .filter(|n| user_id.is_none() || n.user_id.is_none() || n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: i64) -> Result<()> {
        let mut state = self.begin()?;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| ClientError::Rejected("Notification not found".into()))?;
        notification.read_status = true;
        Ok(())
    }

    async fn broadcast_notification(&self, draft: &NotificationDraft) -> Result<JsonValue> {
        let mut state = self.begin()?;
        let notification = Notification {
            id: state.next_id(),
            user_id: None,
            incident_id: draft.incident_id,
            title: draft.title.clone(),
            message: draft.message.clone(),
            kind: Some("broadcast".into()),
            priority: Some(draft.priority.clone()),
            read_status: false,
            created_at: Some(crisis_common::now_timestamp()),
        };
        state.notifications.push(notification.clone());
        Ok(serde_json::to_value(notification)?)
    }
}
