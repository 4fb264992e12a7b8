//! Client-side projections of backend records.
//!
//! The client owns no canonical state; these types only describe what the
//! backend returns so it can be checked once at the boundary.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A WGS84 coordinate pair as the backend sends it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares a status enum whose known wire values get their own variant and
/// whose unknown values survive as `Other(String)`.
///
/// The backend treats statuses as free-form strings, so decoding must never
/// fail on a value the client has not heard of yet.
macro_rules! open_status {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => $name::$variant,)+
                    _ => $name::Other(raw),
                }
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                $name::from(raw.to_string())
            }
        }

        impl From<$name> for String {
            fn from(status: $name) -> Self {
                match status {
                    $name::Other(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

open_status!(
    /// Incident lifecycle status. Resolved incidents are filtered out of the
    /// active views, never deleted.
    IncidentStatus {
        Active => "active",
        PendingReview => "pending_review",
        Resolved => "resolved",
    }
);

open_status!(
    PersonnelStatus {
        Available => "available",
        EnRoute => "en-route",
        Responding => "responding",
        OnScene => "on-scene",
        Busy => "busy",
        OffDuty => "off-duty",
    }
);

open_status!(
    ResourceStatus {
        Available => "available",
        Deployed => "deployed",
        Maintenance => "maintenance",
    }
);

impl Default for PersonnelStatus {
    fn default() -> Self {
        PersonnelStatus::Available
    }
}

impl Default for ResourceStatus {
    fn default() -> Self {
        ResourceStatus::Available
    }
}

/// SQLite hands booleans back as `0`/`1`; accept those as well as real
/// booleans and `null`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}

/// An incident as returned by `GET /incidents`.
///
/// Server-side joins (`responders`, `resources`) are deliberately not decoded:
/// the client recomputes them from the personnel and resource collections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub report_source: Option<String>,
    #[serde(default)]
    pub report_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl IncidentRecord {
    pub fn location(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn is_resolved(&self) -> bool {
        self.status == IncidentStatus::Resolved
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Personnel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: PersonnelStatus,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub assigned_incident_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Personnel {
    /// The entry appended when a location ping names someone the view has
    /// not fetched yet.
    pub fn minimal(id: i64, name: impl Into<String>, status: PersonnelStatus, location: LatLng) -> Self {
        Self {
            id,
            name: name.into(),
            role: String::new(),
            status,
            lat: Some(location.lat),
            lng: Some(location.lng),
            assigned_incident_id: None,
            user_id: None,
        }
    }

    pub fn location(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    }

    pub fn set_location(&mut self, location: LatLng) {
        self.lat = Some(location.lat);
        self.lng = Some(location.lng);
    }

    pub fn is_on_scene(&self) -> bool {
        self.status == PersonnelStatus::OnScene
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub assigned_incident_id: Option<i64>,
    #[serde(default, deserialize_with = "flag")]
    pub is_public: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl Resource {
    pub fn location(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    }
}

/// A stored communication row (`GET /comms/incident/:id`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommRecord {
    pub id: i64,
    #[serde(default)]
    pub incident_id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub read_status: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: i64,
    pub incident_id: i64,
    pub event_type: String,
    pub description: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    #[serde(default)]
    pub incident_id: Option<i64>,
    pub lat: f64,
    pub lng: f64,
    pub radius: f64,
    pub message: String,
    pub severity: String,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeofenceZone {
    pub id: i64,
    #[serde(default)]
    pub incident_id: Option<i64>,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub radius: f64,
    pub zone_type: String,
    #[serde(default, deserialize_with = "flag")]
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub incident_id: Option<i64>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub read_status: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The signed-in user as persisted under the `currentUser` storage key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub username: String,
}

impl CurrentUser {
    /// The identity the command center uses when nobody is signed in.
    pub fn command_center() -> Self {
        Self {
            id: 0,
            name: "Command Center".to_string(),
            role: "user".to_string(),
            username: String::new(),
        }
    }

    pub fn is_responder(&self) -> bool {
        self.role == "responder"
    }
}

/// UI mode flag persisted under `appMode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    User,
    Responder,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::User => "user",
            AppMode::Responder => "responder",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(AppMode::User),
            "responder" => Some(AppMode::Responder),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            AppMode::User => AppMode::Responder,
            AppMode::Responder => AppMode::User,
        }
    }
}

/// Identity of a chat entry: backend rows carry a numeric comm id, local
/// entries (the welcome banner) carry a label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Comm(i64),
    Local(String),
}

/// Purely client-side label; never sent back to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageClass {
    Sent,
    Received,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: Option<i64>,
    pub sender_name: String,
    pub body: String,
    pub timestamp: Option<String>,
    pub class: MessageClass,
}
