//! Map marker layers.
//!
//! Layers are rebuilt from scratch on every state change: clear, then add one
//! marker per entity keyed by id. Rendering the markers is left to the UI;
//! this module only decides what is drawn, how it is styled and when the
//! viewport moves.

use std::collections::BTreeMap;

use crisis_common::{LatLng, Personnel, PersonnelStatus, Resource, Severity};

use crate::reconcile::IncidentView;

/// Where the map opens before anything is selected.
pub const DEFAULT_CENTER: LatLng = LatLng::new(28.7041, 77.1025);
pub const DEFAULT_ZOOM: u8 = 5;
pub const FOCUS_ZOOM: u8 = 16;

const SELECTED_Z_INDEX: i32 = 1000;
const SELECTED_CLASS: &str = "selected-marker";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarkerKind {
    Incident,
    Personnel,
    Resource,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub size: u32,
    pub class: &'static str,
    pub z_index: i32,
    /// Draw the highlight ring
    pub highlighted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub id: i64,
    pub kind: MarkerKind,
    pub position: LatLng,
    pub style: MarkerStyle,
    pub title: String,
    pub popup: Vec<String>,
}

pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#dc2626",
        Severity::High => "#ea580c",
        Severity::Medium => "#eab308",
        Severity::Low => "#22c55e",
    }
}

pub fn personnel_color(status: &PersonnelStatus) -> &'static str {
    match status {
        PersonnelStatus::OnScene => "#22c55e",
        PersonnelStatus::EnRoute => "#f59e0b",
        _ => "#3b82f6",
    }
}

pub fn personnel_label(status: &PersonnelStatus) -> &str {
    match status {
        PersonnelStatus::OnScene => "On Scene",
        PersonnelStatus::EnRoute => "En Route",
        PersonnelStatus::Available => "Available",
        other => other.as_str(),
    }
}

pub fn resource_color(kind: &str) -> &'static str {
    match kind {
        "shelter" => "#f97316",
        "medical" => "#ef4444",
        "food_water" => "#3b82f6",
        _ => "#6b7280",
    }
}

pub fn incident_marker(view: &IncidentView, selected: bool) -> Marker {
    let record = &view.record;
    Marker {
        id: record.id,
        kind: MarkerKind::Incident,
        position: record.location(),
        style: MarkerStyle {
            color: severity_color(record.severity),
            size: if selected { 48 } else { 40 },
            class: if selected { SELECTED_CLASS } else { "" },
            z_index: if selected { SELECTED_Z_INDEX } else { 0 },
            highlighted: selected,
        },
        title: record.title.clone(),
        popup: vec![
            format!("Status: {}", record.status),
            format!("Personnel: {}", view.responders.len()),
        ],
    }
}

/// `None` for personnel without a known position.
pub fn personnel_marker(person: &Personnel) -> Option<Marker> {
    let position = person.location()?;
    let mut popup = vec![
        format!("Role: {}", person.role),
        format!("Status: {}", personnel_label(&person.status)),
    ];
    if let Some(incident_id) = person.assigned_incident_id {
        popup.push(format!("Incident: #{incident_id}"));
    }

    Some(Marker {
        id: person.id,
        kind: MarkerKind::Personnel,
        position,
        style: MarkerStyle {
            color: personnel_color(&person.status),
            size: 32,
            class: "personnel-marker",
            z_index: 0,
            highlighted: false,
        },
        title: person.name.clone(),
        popup,
    })
}

pub fn resource_marker(resource: &Resource) -> Option<Marker> {
    let position = resource.location()?;
    Some(Marker {
        id: resource.id,
        kind: MarkerKind::Resource,
        position,
        style: MarkerStyle {
            color: resource_color(&resource.kind),
            size: 32,
            class: "resource-marker",
            z_index: 0,
            highlighted: false,
        },
        title: resource.name.clone(),
        popup: vec![format!("Type: {}", resource.kind), format!("Status: {}", resource.status)],
    })
}

/// One clear-and-redraw layer.
#[derive(Clone, Debug)]
pub struct MarkerLayer {
    kind: MarkerKind,
    markers: BTreeMap<i64, Marker>,
    redraws: u64,
}

impl MarkerLayer {
    pub fn new(kind: MarkerKind) -> Self {
        Self {
            kind,
            markers: BTreeMap::new(),
            redraws: 0,
        }
    }

    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    /// Drop every marker and add `markers`. A later marker with the same id
    /// replaces an earlier one.
    pub fn redraw(&mut self, markers: impl IntoIterator<Item = Marker>) {
        self.markers.clear();
        for marker in markers {
            debug_assert_eq!(marker.kind, self.kind);
            self.markers.insert(marker.id, marker);
        }
        self.redraws += 1;
    }

    pub fn get(&self, id: i64) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Markers in paint order: lowest z-index first, then by id.
    pub fn paint_order(&self) -> Vec<&Marker> {
        let mut markers: Vec<&Marker> = self.markers.values().collect();
        markers.sort_by_key(|m| (m.style.z_index, m.id));
        markers
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// The three layers of one map plus its viewport.
#[derive(Clone, Debug)]
pub struct MapView {
    pub incidents: MarkerLayer,
    pub personnel: MarkerLayer,
    pub resources: MarkerLayer,
    viewport: Viewport,
    last_selected: Option<i64>,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new()
    }
}

impl MapView {
    pub fn new() -> Self {
        Self {
            incidents: MarkerLayer::new(MarkerKind::Incident),
            personnel: MarkerLayer::new(MarkerKind::Personnel),
            resources: MarkerLayer::new(MarkerKind::Resource),
            viewport: Viewport::default(),
            last_selected: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Rebuild every layer. Returns the new viewport only on the pass where
    /// the selected incident changed, so user panning survives plain updates.
    pub fn render(
        &mut self,
        incidents: &[IncidentView],
        personnel: &[Personnel],
        resources: &[Resource],
        selected: Option<i64>,
    ) -> Option<Viewport> {
        self.incidents
            .redraw(incidents.iter().map(|view| incident_marker(view, Some(view.id()) == selected)));
        self.personnel.redraw(personnel.iter().filter_map(personnel_marker));
        self.resources.redraw(resources.iter().filter_map(resource_marker));

        if selected == self.last_selected {
            return None;
        }
        let Some(id) = selected else {
            self.last_selected = None;
            return None;
        };
        // Not loaded yet; try again on the next pass.
        let marker = self.incidents.get(id)?;
        self.last_selected = selected;
        self.viewport = Viewport {
            center: marker.position,
            zoom: FOCUS_ZOOM,
        };
        Some(self.viewport)
    }

    /// The user moved the map by hand.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}
