//! End-to-end behavior of a live view: REST snapshot, socket events,
//! reconciliation, chat and rooms, against the in-memory backend.

use std::sync::{Arc, Mutex};

use crisis_common::{
    CurrentUser, IncidentRecord, IncidentStatus, LatLng, Packet, Personnel, PersonnelStatus, Resource,
    ResourceStatus, Severity,
};
use crisis_sync::chat::{COMMAND_CENTER_WELCOME, ComposerState, DISCONNECTED_NOTICE};
use crisis_sync::store::NO_ACTIVE_INCIDENTS;
use crisis_sync::{
    ChatLog, ClientConfig, ClientError, LiveView, MemoryBackend, Reconcile, RoomState, RoomTracker, Snapshot,
    SocketClient,
};
use serde_json::json;

fn incident(id: i64, severity: Severity) -> IncidentRecord {
    IncidentRecord {
        id,
        title: "Building collapse".into(),
        description: Some("Three storey residential".into()),
        kind: Some("structural".into()),
        severity,
        status: IncidentStatus::Active,
        lat: 28.6448,
        lng: 77.2167,
        location_name: Some("Karol Bagh".into()),
        report_source: Some("web".into()),
        report_count: Some(1),
        created_at: None,
    }
}

fn unit(id: i64, name: &str, status: PersonnelStatus, assigned: Option<i64>) -> Personnel {
    Personnel {
        id,
        name: name.into(),
        role: "rescue".into(),
        status,
        lat: Some(28.64),
        lng: Some(77.21),
        assigned_incident_id: assigned,
        user_id: None,
    }
}

fn ambulance(id: i64) -> Resource {
    Resource {
        id,
        name: format!("Ambulance {id}"),
        kind: "vehicle".into(),
        status: ResourceStatus::Available,
        lat: None,
        lng: None,
        assigned_incident_id: None,
        is_public: false,
        description: None,
    }
}

fn recording_socket() -> (SocketClient, Arc<Mutex<Vec<Packet>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&sent);
    (SocketClient::new(move |packet| sink.lock().unwrap().push(packet)), sent)
}

#[tokio::test]
async fn empty_backend_shows_placeholder_and_zero_counters() {
    let mut view = LiveView::new(MemoryBackend::new());
    assert!(view.refresh().await);

    let state = view.state();
    assert_eq!(state.empty_message(), Some(NO_ACTIVE_INCIDENTS));
    let summary = state.summary();
    assert_eq!(
        (summary.active_incidents, summary.personnel, summary.equipment, summary.critical),
        (0, 0, 0, 0)
    );
}

#[tokio::test]
async fn critical_incident_with_half_the_units_on_scene() {
    let backend = MemoryBackend::with_snapshot(Snapshot {
        incidents: vec![incident(1, Severity::Critical)],
        personnel: vec![
            unit(10, "Rescue 10", PersonnelStatus::OnScene, Some(1)),
            unit(11, "Rescue 11", PersonnelStatus::EnRoute, Some(1)),
        ],
        resources: vec![],
    });
    let mut view = LiveView::new(backend);
    view.refresh().await;

    let active = view.state().active_incidents();
    assert_eq!(active.len(), 1);
    let detail = &active[0];
    assert_eq!(detail.arrived_units, 1);
    assert_eq!(detail.total_units, 2);
    assert_eq!(detail.progress_percent(), 50);
    assert_eq!(view.state().summary().critical, 1);
}

#[tokio::test]
async fn incident_updated_recomputes_from_fresh_collections() {
    let backend = MemoryBackend::with_snapshot(Snapshot {
        incidents: vec![incident(1, Severity::High)],
        personnel: vec![unit(10, "Rescue 10", PersonnelStatus::EnRoute, Some(1))],
        resources: vec![ambulance(20)],
    });
    let mut view = LiveView::new(backend);
    view.refresh().await;

    // Another dispatcher changes assignments behind our back.
    view.backend().mutate(|s| {
        s.personnel[0].status = PersonnelStatus::OnScene;
        s.personnel.push(unit(12, "Rescue 12", PersonnelStatus::OnScene, Some(1)));
        s.resources[0].assigned_incident_id = Some(1);
    });

    // The payload is deliberately misleading: only the refetch counts.
    let packet = Packet::new(
        "incident_updated",
        json!({ "incident_id": 1, "type": "status", "data": { "arrived_units": 99 } }),
    );
    assert_eq!(view.handle_packet(&packet).await.unwrap(), Reconcile::Refetch);

    let detail = view.state().incident(1).unwrap();
    assert_eq!(detail.responders, vec!["Rescue 10", "Rescue 12"]);
    assert_eq!(detail.resources, vec!["Ambulance 20"]);
    assert_eq!((detail.arrived_units, detail.total_units), (2, 2));
}

#[tokio::test]
async fn location_ping_is_patched_without_refetch() {
    let backend = MemoryBackend::with_snapshot(Snapshot {
        personnel: vec![unit(10, "Rescue 10", PersonnelStatus::EnRoute, Some(1))],
        ..Default::default()
    });
    let mut view = LiveView::new(backend);
    view.refresh().await;
    let requests = view.backend().request_count();

    let ping = Packet::new(
        "personnel_location_updated",
        json!({ "personnel_id": 44, "name": "Boat 44", "location": { "lat": 28.7, "lng": 77.3 } }),
    );
    assert_eq!(view.handle_packet(&ping).await.unwrap(), Reconcile::Patched);
    assert_eq!(view.backend().request_count(), requests);

    let personnel = view.state().personnel();
    assert_eq!(personnel.len(), 2);
    assert_eq!(personnel[1].name, "Boat 44");
    assert_eq!(personnel[1].location(), Some(LatLng::new(28.7, 77.3)));
}

#[tokio::test]
async fn failed_refetch_keeps_last_good_state() {
    let backend = MemoryBackend::with_snapshot(Snapshot {
        incidents: vec![incident(1, Severity::Low)],
        ..Default::default()
    });
    let mut view = LiveView::new(backend);
    view.refresh().await;

    view.backend().fail_next(ClientError::Http("connection reset".into()));
    let packet = Packet::new("incident_created", json!({ "id": 2 }));
    view.handle_packet(&packet).await.unwrap();

    assert_eq!(view.state().active_incidents().len(), 1);
    assert_eq!(view.state().last_error(), Some("Network error: connection reset"));
}

#[tokio::test]
async fn assigned_resource_comes_back_deployed() {
    let backend = MemoryBackend::with_snapshot(Snapshot {
        incidents: vec![incident(7, Severity::Medium)],
        personnel: vec![],
        resources: vec![ambulance(3)],
    });
    let mut view = LiveView::new(backend);
    view.refresh().await;

    view.assign_resource(3, Some(7)).await.unwrap();

    let resource = &view.state().resources()[0];
    assert_eq!(resource.assigned_incident_id, Some(7));
    assert_eq!(resource.status.as_str(), "deployed");
    assert_eq!(view.state().incident(7).unwrap().resources, vec!["Ambulance 3"]);
}

#[tokio::test]
async fn confirmed_resolution_leaves_active_list() {
    let backend = MemoryBackend::with_snapshot(Snapshot {
        incidents: vec![incident(1, Severity::High), incident(2, Severity::Low)],
        personnel: vec![unit(10, "Rescue 10", PersonnelStatus::OnScene, Some(1))],
        resources: vec![],
    });
    let mut view = LiveView::new(backend);
    view.refresh().await;

    let review = view.resolve_incident(1, false).await.unwrap();
    assert!(review.is_pending_review());
    assert_eq!(view.state().active_incidents().len(), 2);

    view.resolve_incident(1, true).await.unwrap();
    let active: Vec<i64> = view.state().active_incidents().iter().map(|v| v.id()).collect();
    assert_eq!(active, vec![2]);
    // Filtered, not deleted.
    assert_eq!(view.state().incidents().len(), 2);
    assert_eq!(view.state().personnel()[0].assigned_incident_id, None);
}

#[test]
fn disconnect_disables_composer_until_reconnect() {
    let (socket, sent) = recording_socket();
    let composer = Arc::new(Mutex::new(ComposerState::for_connection(false, false)));
    {
        let composer = Arc::clone(&composer);
        socket.on_connection_change(move |up| *composer.lock().unwrap() = ComposerState::for_connection(up, false));
    }

    socket.set_connected(true);
    assert!(composer.lock().unwrap().can_send("All units hold"));

    socket.set_connected(false);
    let state = *composer.lock().unwrap();
    assert!(!state.enabled);
    assert_eq!(state.notice, Some(DISCONNECTED_NOTICE));
    assert_eq!(DISCONNECTED_NOTICE, "Disconnected from server. Reconnecting...");
    socket.broadcast("All units hold", "Command Center", Some(0)).unwrap();
    assert!(sent.lock().unwrap().is_empty());

    socket.set_connected(true);
    assert!(composer.lock().unwrap().enabled);
}

#[test]
fn repeated_broadcast_creates_one_entry() {
    let (socket, _) = recording_socket();
    let me = CurrentUser::command_center();
    let log = Arc::new(Mutex::new(ChatLog::broadcast(Some(me.id), COMMAND_CENTER_WELCOME)));
    {
        let log = Arc::clone(&log);
        socket.on(crisis_common::EventKind::BroadcastReceived, move |event| {
            log.lock().unwrap().ingest(event);
        });
    }

    let frame = Packet::new(
        "broadcast_received",
        json!({ "comm_id": 77, "sender_id": 0, "sender_name": "Command Center",
                "message": "Evacuate sector 4", "timestamp": "2026-03-02T10:00:00Z", "type": "broadcast" }),
    );
    socket.handle_packet(&frame).unwrap();
    socket.handle_packet(&frame).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.messages()[1].class, crisis_common::MessageClass::Sent);
}

#[test]
fn selected_room_is_rejoined_after_reconnect() {
    let (socket, sent) = recording_socket();
    let config = ClientConfig::default();
    let rooms = Arc::new(Mutex::new(RoomTracker::new(config.rejoin_rooms_on_reconnect)));
    {
        let rooms = Arc::clone(&rooms);
        let emitter = socket.clone();
        socket.on_connection_change(move |up| {
            let events = {
                let mut rooms = rooms.lock().unwrap();
                if up {
                    rooms.on_connected()
                } else {
                    rooms.on_disconnected();
                    Vec::new()
                }
            };
            let _ = emitter.emit_all(&events);
        });
    }

    socket.set_connected(true);
    let events = rooms.lock().unwrap().select(Some(7), socket.is_connected());
    socket.emit_all(&events).unwrap();

    socket.set_connected(false);
    assert_eq!(rooms.lock().unwrap().state(), RoomState::Unsubscribed);
    socket.set_connected(true);

    let names: Vec<String> = sent.lock().unwrap().iter().map(|p| p.event.clone()).collect();
    assert_eq!(names, vec!["join_incident", "join_incident"]);
    assert_eq!(rooms.lock().unwrap().state(), RoomState::Subscribed(7));
}
