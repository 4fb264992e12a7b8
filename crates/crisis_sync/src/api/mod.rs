//! REST access to the backend.
//!
//! [`Backend`] is one method per endpoint, returning typed records. There is
//! no retry and no caching; callers decide what a failure means for their
//! view. [`HttpBackend`] is the real implementation, [`MemoryBackend`] keeps
//! everything in process and mirrors the backend's state transitions.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use crisis_common::{
    Alert, CommRecord, CurrentUser, GeofenceZone, IncidentRecord, IncidentStatus, LatLng, Notification,
    Personnel, PersonnelStatus, Resource, Severity, TimelineEntry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ClientError, Result};
use crate::reconcile::Snapshot;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IncidentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IncidentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PersonnelFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PersonnelStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResourceFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub location_name: String,
    #[serde(default)]
    pub report_source: String,
}

/// Reports within a short distance of an active incident of the same type
/// are merged into it.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreatedIncident {
    pub incident_id: i64,
    #[serde(default)]
    pub is_duplicate: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IncidentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IncidentStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Assignment {
    pub personnel_ids: Vec<i64>,
    pub resource_ids: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResolveOutcome {
    /// Absent when the resolution was confirmed
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub released_personnel: u32,
    #[serde(default)]
    pub released_resources: u32,
}

impl ResolveOutcome {
    pub fn is_pending_review(&self) -> bool {
        self.status == Some(IncidentStatus::PendingReview)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// A manual timeline entry. The backend stores `System` when `user_name`
/// is absent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineNote {
    pub event_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl TimelineNote {
    pub fn new(event_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            description: description.into(),
            user_name: None,
            metadata: None,
        }
    }

    pub fn by(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UploadedAttachment {
    pub attachment_id: i64,
    #[serde(default)]
    pub file_info: JsonValue,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutgoingComm {
    pub incident_id: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    pub sender_name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: CurrentUser,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GeofenceCheck {
    pub breached: bool,
    #[serde(default)]
    pub zones: Vec<GeofenceZone>,
    #[serde(default)]
    pub alerts: Vec<JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<i64>,
    pub priority: String,
}

/// One method per backend endpoint.
///
/// Futures are not `Send`: in the browser everything runs on the UI thread.
#[async_trait(?Send)]
pub trait Backend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;
    async fn logout(&self) -> Result<()>;

    async fn incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>>;
    async fn incident(&self, id: i64) -> Result<IncidentRecord>;
    async fn create_incident(&self, incident: &NewIncident) -> Result<CreatedIncident>;
    async fn update_incident(&self, id: i64, patch: &IncidentPatch) -> Result<()>;
    /// Without `confirm` the incident only moves to `pending_review`.
    async fn resolve_incident(&self, id: i64, confirm: bool) -> Result<ResolveOutcome>;
    async fn assign_to_incident(&self, id: i64, assignment: &Assignment) -> Result<()>;
    async fn upload_attachment(&self, id: i64, attachment: Attachment) -> Result<UploadedAttachment>;
    async fn timeline(&self, id: i64) -> Result<Vec<TimelineEntry>>;
    /// Returns the id of the new timeline row.
    async fn add_timeline_event(&self, id: i64, note: &TimelineNote) -> Result<i64>;

    async fn personnel(&self, filter: &PersonnelFilter) -> Result<Vec<Personnel>>;
    async fn personnel_for_user(&self, user_id: i64) -> Result<Personnel>;
    async fn update_location(&self, personnel_id: i64, location: LatLng) -> Result<()>;
    async fn update_status(&self, personnel_id: i64, status: &PersonnelStatus) -> Result<()>;

    async fn resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>>;
    async fn public_resources(&self) -> Result<Vec<Resource>>;
    /// `Some(id)` deploys the resource to that incident, `None` releases it.
    async fn assign_resource(&self, resource_id: i64, incident_id: Option<i64>) -> Result<()>;

    async fn comms(&self, incident_id: i64, limit: Option<u32>) -> Result<Vec<CommRecord>>;
    async fn send_comm(&self, comm: &OutgoingComm) -> Result<()>;
    async fn mark_comm_read(&self, comm_id: i64) -> Result<()>;
    /// Newest first; every incident when `incident_id` is `None`.
    async fn unread_comms(&self, incident_id: Option<i64>) -> Result<Vec<CommRecord>>;

    async fn dashboard_analytics(&self) -> Result<JsonValue>;

    async fn nearby_alerts(&self, at: LatLng, radius_m: f64) -> Result<Vec<Alert>>;
    async fn geofence_zones(&self) -> Result<Vec<GeofenceZone>>;
    async fn check_geofence(&self, at: LatLng, personnel_id: Option<i64>) -> Result<GeofenceCheck>;

    async fn notifications(&self, user_id: Option<i64>) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, id: i64) -> Result<()>;
    async fn broadcast_notification(&self, draft: &NotificationDraft) -> Result<JsonValue>;
}

/// Fetch the three live collections concurrently. Any failure fails the
/// whole snapshot so a view never mixes generations.
pub async fn fetch_snapshot<B: Backend + ?Sized>(backend: &B) -> Result<Snapshot> {
    let incident_filter = IncidentFilter::default();
    let personnel_filter = PersonnelFilter::default();
    let resource_filter = ResourceFilter::default();
    let (incidents, personnel, resources) = futures::try_join!(
        backend.incidents(&incident_filter),
        backend.personnel(&personnel_filter),
        backend.resources(&resource_filter),
    )?;
    Ok(Snapshot {
        incidents,
        personnel,
        resources,
    })
}

/// Check a `{ success, ... }` envelope. Non-2xx statuses and
/// `success: false` bodies both fail, carrying the backend's `error` text.
pub fn check_envelope(status: u16, body: JsonValue) -> Result<JsonValue> {
    let error_text = || {
        body.get("error")
            .or_else(|| body.get("message"))
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if !(200..300).contains(&status) {
        return Err(ClientError::Status {
            status,
            message: error_text(),
        });
    }
    if body.get("success").and_then(JsonValue::as_bool) == Some(false) {
        let message = error_text();
        return Err(ClientError::Rejected(if message.is_empty() {
            "Request failed".to_string()
        } else {
            message
        }));
    }
    Ok(body)
}

/// Decode one top-level key of an envelope, e.g. `incidents`.
pub fn take_field<T: serde::de::DeserializeOwned>(mut body: JsonValue, key: &str) -> Result<T> {
    let value = body
        .get_mut(key)
        .map(JsonValue::take)
        .ok_or_else(|| ClientError::Decode(format!("response has no '{key}'")))?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_false_is_rejected() {
        let res = check_envelope(200, json!({ "success": false, "error": "Incident not found" }));
        assert_eq!(res, Err(ClientError::Rejected("Incident not found".into())));
    }

    #[test]
    fn test_non_2xx_carries_status_and_error() {
        let res = check_envelope(401, json!({ "success": false, "error": "Invalid credentials" }));
        assert_eq!(
            res,
            Err(ClientError::Status { status: 401, message: "Invalid credentials".into() })
        );
    }

    #[test]
    fn test_take_field_decodes_records() {
        let body = check_envelope(
            200,
            json!({
                "success": true,
                "count": 1,
                "resources": [{ "id": 1, "name": "Ambulance A1", "type": "vehicle", "status": "deployed",
                                "assigned_incident_id": 7, "is_public": 0 }]
            }),
        )
        .unwrap();

        let resources: Vec<Resource> = take_field(body, "resources").unwrap();
        assert_eq!(resources[0].assigned_incident_id, Some(7));
        assert!(!resources[0].is_public);
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let res: Result<Vec<Resource>> = take_field(json!({ "success": true }), "resources");
        assert!(matches!(res, Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_filters_skip_unset_fields() {
        let filter = IncidentFilter { severity: Some(Severity::Critical), ..Default::default() };
        assert_eq!(serde_json::to_value(&filter).unwrap(), json!({ "severity": "critical" }));
    }
}
