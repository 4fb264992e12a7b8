//! Closed set of socket events and their payloads.
//!
//! Both enums are adjacently tagged with `event`/`data`, which is exactly the
//! shape of a [`Packet`], so a packet converts to a typed event with one serde
//! pass once its name has been checked against [`EventKind`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::model::{LatLng, PersonnelStatus, Severity};
use crate::Packet;

/// Every server-pushed event the client understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    IncidentUpdated,
    IncidentCreated,
    PersonnelLocationUpdated,
    PersonnelStatusUpdated,
    PersonnelAssigned,
    BroadcastReceived,
    MessageReceived,
    GeofenceAlert,
    ConnectionEstablished,
    JoinedIncident,
    LeftIncident,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::IncidentUpdated,
        EventKind::IncidentCreated,
        EventKind::PersonnelLocationUpdated,
        EventKind::PersonnelStatusUpdated,
        EventKind::PersonnelAssigned,
        EventKind::BroadcastReceived,
        EventKind::MessageReceived,
        EventKind::GeofenceAlert,
        EventKind::ConnectionEstablished,
        EventKind::JoinedIncident,
        EventKind::LeftIncident,
    ];

    /// The wire name carried in [`Packet::event`].
    pub fn name(self) -> &'static str {
        match self {
            EventKind::IncidentUpdated => "incident_updated",
            EventKind::IncidentCreated => "incident_created",
            EventKind::PersonnelLocationUpdated => "personnel_location_updated",
            EventKind::PersonnelStatusUpdated => "personnel_status_updated",
            EventKind::PersonnelAssigned => "personnel_assigned",
            EventKind::BroadcastReceived => "broadcast_received",
            EventKind::MessageReceived => "message_received",
            EventKind::GeofenceAlert => "geofence_alert",
            EventKind::ConnectionEstablished => "connection_established",
            EventKind::JoinedIncident => "joined_incident",
            EventKind::LeftIncident => "left_incident",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("malformed '{event}' payload: {error}")]
    Payload { event: &'static str, error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentUpdated {
    pub incident_id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: JsonValue,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentCreated {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub report_source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdated {
    pub personnel_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub location: LatLng,
    #[serde(default)]
    pub status: Option<PersonnelStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdated {
    pub personnel_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub status: PersonnelStatus,
    #[serde(default)]
    pub assigned_incident_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonnelAssigned {
    pub personnel_id: i64,
    pub incident_id: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BroadcastReceived {
    pub comm_id: i64,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageReceived {
    pub comm_id: i64,
    pub incident_id: i64,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeofenceAlert {
    #[serde(default)]
    pub zone_id: Option<i64>,
    #[serde(default)]
    pub personnel_id: Option<i64>,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub alert_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
}

/// Acknowledgement for a room join or leave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomAck {
    pub incident_id: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// A decoded server-pushed event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    IncidentUpdated(IncidentUpdated),
    IncidentCreated(IncidentCreated),
    PersonnelLocationUpdated(LocationUpdated),
    PersonnelStatusUpdated(StatusUpdated),
    PersonnelAssigned(PersonnelAssigned),
    BroadcastReceived(BroadcastReceived),
    MessageReceived(MessageReceived),
    GeofenceAlert(GeofenceAlert),
    ConnectionEstablished(ConnectionEstablished),
    JoinedIncident(RoomAck),
    LeftIncident(RoomAck),
}

impl ServerEvent {
    /// Check the packet's event name against [`EventKind`] and decode its
    /// payload into the matching typed variant.
    pub fn from_packet(packet: &Packet) -> Result<Self, DecodeError> {
        let kind = EventKind::from_name(&packet.event)
            .ok_or_else(|| DecodeError::UnknownEvent(packet.event.clone()))?;

        let tagged = serde_json::json!({
            "event": kind.name(),
            "data": packet.data,
        });

        serde_json::from_value(tagged).map_err(|e| DecodeError::Payload {
            event: kind.name(),
            error: e.to_string(),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::IncidentUpdated(_) => EventKind::IncidentUpdated,
            ServerEvent::IncidentCreated(_) => EventKind::IncidentCreated,
            ServerEvent::PersonnelLocationUpdated(_) => EventKind::PersonnelLocationUpdated,
            ServerEvent::PersonnelStatusUpdated(_) => EventKind::PersonnelStatusUpdated,
            ServerEvent::PersonnelAssigned(_) => EventKind::PersonnelAssigned,
            ServerEvent::BroadcastReceived(_) => EventKind::BroadcastReceived,
            ServerEvent::MessageReceived(_) => EventKind::MessageReceived,
            ServerEvent::GeofenceAlert(_) => EventKind::GeofenceAlert,
            ServerEvent::ConnectionEstablished(_) => EventKind::ConnectionEstablished,
            ServerEvent::JoinedIncident(_) => EventKind::JoinedIncident,
            ServerEvent::LeftIncident(_) => EventKind::LeftIncident,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomRequest {
    pub incident_id: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub personnel_id: i64,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub personnel_id: i64,
    pub status: PersonnelStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentChange {
    pub incident_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: JsonValue,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentMessage {
    pub incident_id: i64,
    pub message: String,
    pub sender_name: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub message: String,
    pub sender_name: String,
    pub sender_id: Option<i64>,
    pub timestamp: String,
}

/// Every event the client emits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinIncident(RoomRequest),
    LeaveIncident(RoomRequest),
    LocationUpdate(LocationReport),
    StatusUpdate(StatusReport),
    IncidentUpdate(IncidentChange),
    NewMessage(IncidentMessage),
    BroadcastMessage(Broadcast),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinIncident(_) => "join_incident",
            ClientEvent::LeaveIncident(_) => "leave_incident",
            ClientEvent::LocationUpdate(_) => "location_update",
            ClientEvent::StatusUpdate(_) => "status_update",
            ClientEvent::IncidentUpdate(_) => "incident_update",
            ClientEvent::NewMessage(_) => "new_message",
            ClientEvent::BroadcastMessage(_) => "broadcast_message",
        }
    }

    pub fn to_packet(&self) -> Result<Packet, serde_json::Error> {
        let data = match self {
            ClientEvent::JoinIncident(req) | ClientEvent::LeaveIncident(req) => serde_json::to_value(req)?,
            ClientEvent::LocationUpdate(report) => serde_json::to_value(report)?,
            ClientEvent::StatusUpdate(report) => serde_json::to_value(report)?,
            ClientEvent::IncidentUpdate(change) => serde_json::to_value(change)?,
            ClientEvent::NewMessage(msg) => serde_json::to_value(msg)?,
            ClientEvent::BroadcastMessage(msg) => serde_json::to_value(msg)?,
        };
        Ok(Packet::new(self.name(), data))
    }
}

/// RFC 3339 timestamp with millisecond precision, the format the backend
/// stores for client-supplied times.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
