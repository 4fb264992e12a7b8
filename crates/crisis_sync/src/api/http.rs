use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crisis_common::{
    Alert, CommRecord, GeofenceZone, IncidentRecord, LatLng, Notification, Personnel, PersonnelStatus, Resource,
    ResourceStatus, TimelineEntry,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};

use super::{
    Assignment, Attachment, Backend, CreatedIncident, GeofenceCheck, IncidentFilter, IncidentPatch, LoginResponse,
    NewIncident, NotificationDraft, OutgoingComm, PersonnelFilter, ResolveOutcome, ResourceFilter, TimelineNote,
    UploadedAttachment, check_envelope, take_field,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::lock;

/// [`Backend`] over HTTP.
///
/// Clones share the client and the bearer token.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
    token: Arc<Mutex<Option<String>>>,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Attach (or drop) the bearer token sent with every request.
    pub fn set_token(&self, token: Option<String>) {
        *lock(&self.token) = token;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.config.endpoint(path));
        match lock(&self.token).as_deref() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<JsonValue> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                if (200..300).contains(&status) {
                    ClientError::Decode(e.to_string())
                } else {
                    ClientError::Status { status, message: text.clone() }
                }
            })?
        };
        check_envelope(status, body)
    }

    async fn get(&self, path: &str) -> Result<JsonValue> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn get_with<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> Result<JsonValue> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<JsonValue> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<JsonValue> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = self
            .post("/auth/login", &json!({ "username": username, "password": password }))
            .await?;
        let login: LoginResponse = serde_json::from_value(body)?;
        self.set_token(Some(login.token.clone()));
        Ok(login)
    }

    async fn logout(&self) -> Result<()> {
        let res = self.post("/auth/logout", &json!({})).await;
        self.set_token(None);
        res.map(|_| ())
    }

    async fn incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>> {
        take_field(self.get_with("/incidents", filter).await?, "incidents")
    }

    async fn incident(&self, id: i64) -> Result<IncidentRecord> {
        take_field(self.get(&format!("/incidents/{id}")).await?, "incident")
    }

    async fn create_incident(&self, incident: &NewIncident) -> Result<CreatedIncident> {
        Ok(serde_json::from_value(self.post("/incidents", incident).await?)?)
    }

    async fn update_incident(&self, id: i64, patch: &IncidentPatch) -> Result<()> {
        self.put(&format!("/incidents/{id}"), patch).await.map(|_| ())
    }

    async fn resolve_incident(&self, id: i64, confirm: bool) -> Result<ResolveOutcome> {
        let body = self
            .post(&format!("/incidents/{id}/resolve"), &json!({ "confirm": confirm }))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn assign_to_incident(&self, id: i64, assignment: &Assignment) -> Result<()> {
        self.post(&format!("/incidents/{id}/assign"), assignment).await.map(|_| ())
    }

    async fn upload_attachment(&self, id: i64, attachment: Attachment) -> Result<UploadedAttachment> {
        let part = reqwest::multipart::Part::bytes(attachment.bytes)
            .file_name(attachment.file_name)
            .mime_str(&attachment.mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let body = self
            .send(self.request(Method::POST, &format!("/incidents/{id}/upload")).multipart(form))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn timeline(&self, id: i64) -> Result<Vec<TimelineEntry>> {
        take_field(self.get(&format!("/incidents/{id}/timeline")).await?, "timeline")
    }

    async fn add_timeline_event(&self, id: i64, note: &TimelineNote) -> Result<i64> {
        take_field(self.post(&format!("/incidents/{id}/timeline"), note).await?, "timeline_id")
    }

    async fn personnel(&self, filter: &PersonnelFilter) -> Result<Vec<Personnel>> {
        take_field(self.get_with("/personnel", filter).await?, "personnel")
    }

    async fn personnel_for_user(&self, user_id: i64) -> Result<Personnel> {
        take_field(self.get(&format!("/personnel/user/{user_id}")).await?, "personnel")
    }

    async fn update_location(&self, personnel_id: i64, location: LatLng) -> Result<()> {
        self.put(&format!("/personnel/{personnel_id}/location"), &location)
            .await
            .map(|_| ())
    }

    async fn update_status(&self, personnel_id: i64, status: &PersonnelStatus) -> Result<()> {
        self.put(&format!("/personnel/{personnel_id}/status"), &json!({ "status": status }))
            .await
            .map(|_| ())
    }

    async fn resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>> {
        take_field(self.get_with("/resources", filter).await?, "resources")
    }

    async fn public_resources(&self) -> Result<Vec<Resource>> {
        take_field(self.get("/resources/public").await?, "resources")
    }

    async fn assign_resource(&self, resource_id: i64, incident_id: Option<i64>) -> Result<()> {
        let status = match incident_id {
            Some(_) => ResourceStatus::Deployed,
            None => ResourceStatus::Available,
        };
        self.put(
            &format!("/resources/{resource_id}"),
            &json!({ "assigned_incident_id": incident_id, "status": status }),
        )
        .await
        .map(|_| ())
    }

    async fn comms(&self, incident_id: i64, limit: Option<u32>) -> Result<Vec<CommRecord>> {
        let path = format!("/comms/incident/{incident_id}");
        let body = match limit {
            Some(limit) => self.get_with(&path, &[("limit", limit)]).await?,
            None => self.get(&path).await?,
        };
        take_field(body, "communications")
    }

    async fn send_comm(&self, comm: &OutgoingComm) -> Result<()> {
        self.post("/comms", comm).await.map(|_| ())
    }

    async fn mark_comm_read(&self, comm_id: i64) -> Result<()> {
        self.put(&format!("/comms/{comm_id}/read"), &json!({})).await.map(|_| ())
    }

    async fn unread_comms(&self, incident_id: Option<i64>) -> Result<Vec<CommRecord>> {
        let body = match incident_id {
            Some(id) => self.get_with("/comms/unread", &[("incident_id", id)]).await?,
            None => self.get("/comms/unread").await?,
        };
        take_field(body, "communications")
    }

    async fn dashboard_analytics(&self) -> Result<JsonValue> {
        take_field(self.get("/analytics/dashboard").await?, "analytics")
    }

    async fn nearby_alerts(&self, at: LatLng, radius_m: f64) -> Result<Vec<Alert>> {
        let query = [("lat", at.lat), ("lng", at.lng), ("radius", radius_m)];
        take_field(self.get_with("/alerts/nearby", &query).await?, "alerts")
    }

    async fn geofence_zones(&self) -> Result<Vec<GeofenceZone>> {
        take_field(self.get("/alerts/geofence").await?, "zones")
    }

    async fn check_geofence(&self, at: LatLng, personnel_id: Option<i64>) -> Result<GeofenceCheck> {
        let body = self
            .post(
                "/alerts/geofence/check",
                &json!({ "lat": at.lat, "lng": at.lng, "personnel_id": personnel_id }),
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn notifications(&self, user_id: Option<i64>) -> Result<Vec<Notification>> {
        let body = match user_id {
            Some(user_id) => self.get_with("/notifications", &[("user_id", user_id)]).await?,
            None => self.get("/notifications").await?,
        };
        take_field(body, "notifications")
    }

    async fn mark_notification_read(&self, id: i64) -> Result<()> {
        self.put(&format!("/notifications/{id}/read"), &json!({}))
            .await
            .map(|_| ())
    }

    async fn broadcast_notification(&self, draft: &NotificationDraft) -> Result<JsonValue> {
        take_field(self.post("/notifications/broadcast", draft).await?, "notification")
    }
}
