#![cfg(target_arch = "wasm32")]

//! Hooks mounted in a bare reactive owner over the in-memory backend, with
//! the socket driven by hand.

use std::sync::{Arc, Mutex};

use any_spawner::Executor;
use crisis_client::{AppContext, CrisisContext, use_chat, use_incident_room, use_live_state};
use crisis_common::{
    CommRecord, CurrentUser, IncidentRecord, IncidentStatus, LatLng, MessageClass, Packet, Personnel,
    PersonnelStatus, Severity,
};
use crisis_sync::chat::DISCONNECTED_NOTICE;
use crisis_sync::{ClientConfig, MemoryBackend, MemoryStore, RoomState, Session, Snapshot, SocketClient};
use leptos::prelude::*;
use leptos_use::core::ConnectionReadyState;
use serde_json::json;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn responder() -> CurrentUser {
    CurrentUser {
        id: 12,
        name: "Asha".to_string(),
        role: "responder".to_string(),
        username: "asha".to_string(),
    }
}

fn incident(id: i64) -> IncidentRecord {
    IncidentRecord {
        id,
        title: "Flooded underpass".into(),
        description: None,
        kind: Some("flood".into()),
        severity: Severity::High,
        status: IncidentStatus::Active,
        lat: 28.63,
        lng: 77.22,
        location_name: None,
        report_source: Some("web".into()),
        report_count: Some(1),
        created_at: None,
    }
}

/// Wait for a macrotask so spawned futures and queued effects drain.
async fn settle() {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

struct Harness {
    owner: Owner,
    backend: Arc<MemoryBackend>,
    socket: SocketClient,
    sent: Arc<Mutex<Vec<Packet>>>,
    ready_state: RwSignal<ConnectionReadyState>,
}

impl Harness {
    fn mount(backend: MemoryBackend) -> Self {
        let _ = Executor::init_wasm_bindgen();

        let backend = Arc::new(backend);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let socket = SocketClient::new(move |packet| sink.lock().unwrap().push(packet));

        let owner = Owner::new();
        let ready_state = owner.with(|| {
            let ready_state = RwSignal::new(ConnectionReadyState::Closed);
            let session = Session::load(Arc::new(MemoryStore::new()));
            session.sign_in("token-1", &responder()).unwrap();

            provide_context(CrisisContext::new(
                ClientConfig::default(),
                socket.clone(),
                backend.clone(),
                ready_state.into(),
                Arc::new(|| {}),
                Arc::new(|| {}),
            ));
            provide_context(AppContext::new(session));
            ready_state
        });

        Self {
            owner,
            backend,
            socket,
            sent,
            ready_state,
        }
    }

    /// What the provider does on an open/close of the WebSocket.
    fn set_connected(&self, up: bool) {
        self.ready_state.set(if up {
            ConnectionReadyState::Open
        } else {
            ConnectionReadyState::Closed
        });
        self.socket.set_connected(up);
    }

    fn take_sent(&self) -> Vec<(String, i64)> {
        self.sent
            .lock()
            .unwrap()
            .drain(..)
            .map(|p| (p.event, p.data["incident_id"].as_i64().unwrap_or_default()))
            .collect()
    }
}

#[wasm_bindgen_test]
async fn test_live_state_refetches_on_slow_path_events() {
    let harness = Harness::mount(MemoryBackend::with_snapshot(Snapshot {
        incidents: vec![incident(1)],
        personnel: vec![Personnel::minimal(4, "Unit 4", PersonnelStatus::Available, LatLng::new(0.0, 0.0))],
        ..Default::default()
    }));
    let live = harness.owner.with(use_live_state);
    settle().await;

    let state = live.state();
    assert_eq!(state.with_untracked(|s| s.active_incidents().len()), 1);
    let loaded = harness.backend.request_count();
    assert_eq!(loaded, 3);

    let ping = Packet::new(
        "personnel_location_updated",
        json!({ "personnel_id": 4, "location": { "lat": 28.7, "lng": 77.3 } }),
    );
    assert_eq!(harness.socket.handle_packet(&ping).unwrap(), 1);
    settle().await;
    assert_eq!(harness.backend.request_count(), loaded);
    assert_eq!(
        state.with_untracked(|s| s.personnel()[0].location()),
        Some(LatLng::new(28.7, 77.3))
    );

    harness.backend.mutate(|s| s.incidents.push(incident(2)));
    let created = Packet::new("incident_created", json!({ "id": 2 }));
    assert_eq!(harness.socket.handle_packet(&created).unwrap(), 1);
    settle().await;
    assert_eq!(harness.backend.request_count(), loaded + 3);
    assert_eq!(state.with_untracked(|s| s.active_incidents().len()), 2);

    harness.owner.cleanup();
    let later = Packet::new("incident_updated", json!({ "incident_id": 2 }));
    assert_eq!(harness.socket.handle_packet(&later).unwrap(), 0);
}

#[wasm_bindgen_test]
async fn test_incident_room_follows_selection_and_leaves_on_cleanup() {
    let harness = Harness::mount(MemoryBackend::new());
    harness.set_connected(true);

    let (selected, room) = harness.owner.with(|| {
        let selected = RwSignal::new(Some(3));
        (selected, use_incident_room(selected.into()))
    });
    settle().await;
    assert_eq!(harness.take_sent(), vec![("join_incident".to_string(), 3)]);
    assert_eq!(room.get_untracked(), RoomState::Subscribed(3));

    selected.set(Some(5));
    settle().await;
    assert_eq!(
        harness.take_sent(),
        vec![("leave_incident".to_string(), 3), ("join_incident".to_string(), 5)]
    );

    harness.set_connected(false);
    assert_eq!(room.get_untracked(), RoomState::Unsubscribed);
    harness.set_connected(true);
    assert_eq!(harness.take_sent(), vec![("join_incident".to_string(), 5)]);

    harness.owner.cleanup();
    assert_eq!(harness.take_sent(), vec![("leave_incident".to_string(), 5)]);
}

#[wasm_bindgen_test]
async fn test_chat_composer_disables_while_disconnected() {
    let backend = MemoryBackend::new();
    backend.add_comm(CommRecord {
        id: 1,
        incident_id: Some(7),
        sender_id: None,
        sender_name: Some("Ravi".into()),
        message: "Pump truck on the way".into(),
        kind: Some("text".into()),
        read_status: false,
        created_at: None,
    });
    let harness = Harness::mount(backend);
    harness.set_connected(true);

    let chat = harness.owner.with(|| use_chat(Some(7)));
    settle().await;
    assert_eq!(chat.messages.get_untracked().len(), 1);
    assert!(chat.composer.get_untracked().can_send("Copy"));

    harness.owner.with(|| chat.send("Copy, en route")).unwrap();
    assert_eq!(harness.take_sent(), vec![("new_message".to_string(), 7)]);

    harness.set_connected(false);
    let composer = chat.composer.get_untracked();
    assert!(!composer.enabled);
    assert_eq!(composer.notice, Some(DISCONNECTED_NOTICE));
    assert!(harness.owner.with(|| chat.send("Anyone there?")).is_err());
    assert!(harness.take_sent().is_empty());

    let echo = Packet::new(
        "message_received",
        json!({ "comm_id": 2, "incident_id": 7, "sender_name": "Asha", "message": "Copy, en route" }),
    );
    harness.socket.handle_packet(&echo).unwrap();
    harness.socket.handle_packet(&echo).unwrap();

    let classes: Vec<_> = chat.messages.get_untracked().iter().map(|m| m.class).collect();
    assert_eq!(classes, vec![MessageClass::Received, MessageClass::Sent]);

    harness.set_connected(true);
    assert!(chat.composer.get_untracked().enabled);
}
