//! Socket event bus and emitter.
//!
//! [`SocketClient`] does not own the socket. Like the rest of this crate it is
//! transport-agnostic: the owner hands it a `send` closure and feeds it every
//! received [`Packet`] plus connection changes. Consumers register handlers
//! per [`EventKind`] and receive typed [`ServerEvent`]s.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crisis_common::{
    Broadcast, ClientEvent, EventKind, IncidentChange, IncidentMessage, LatLng, LocationReport,
    Packet, PersonnelStatus, RoomRequest, ServerEvent, StatusReport, now_timestamp,
};
use serde_json::Value as JsonValue;

use crate::error::{ClientError, Result};
use crate::lock;

/// Token returned by [`EventBus::on`], used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;
type ConnectionHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Fan-out of decoded events to independent consumers.
///
/// Delivery follows registration order. Nothing is deduplicated here.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(HandlerId, EventKind, EventHandler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&ServerEvent) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.handlers).push((id, kind, Arc::new(handler)));
        id
    }

    /// Returns `false` if the handler was already gone.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = lock(&self.handlers);
        let before = handlers.len();
        handlers.retain(|(handler_id, _, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.handlers).iter().filter(|(_, k, _)| *k == kind).count()
    }

    /// Deliver `event` to every handler registered for its kind and return
    /// how many ran.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let kind = event.kind();
        // Snapshot first so a handler may call `on`/`off` without deadlocking.
        let targets: Vec<EventHandler> = lock(&self.handlers)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }
}

/// Shared handle to the socket connection.
///
/// Cloning is cheap; every clone talks to the same connection and bus.
#[derive(Clone)]
pub struct SocketClient {
    send: Arc<dyn Fn(Packet) + Send + Sync>,
    connected: Arc<AtomicBool>,
    bus: Arc<EventBus>,
    connection_handlers: Arc<Mutex<Vec<(HandlerId, ConnectionHandler)>>>,
    next_connection_id: Arc<AtomicU64>,
}

impl SocketClient {
    pub fn new(send: impl Fn(Packet) + Send + Sync + 'static) -> Self {
        Self {
            send: Arc::new(send),
            connected: Arc::new(AtomicBool::new(false)),
            bus: Arc::new(EventBus::new()),
            connection_handlers: Arc::new(Mutex::new(Vec::new())),
            next_connection_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&ServerEvent) + Send + Sync + 'static) -> HandlerId {
        self.bus.on(kind, handler)
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.bus.off(id)
    }

    /// Register for connect (`true`) and disconnect (`false`) transitions.
    pub fn on_connection_change(&self, handler: impl Fn(bool) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.connection_handlers).push((id, Arc::new(handler)));
        id
    }

    pub fn off_connection_change(&self, id: HandlerId) -> bool {
        let mut handlers = lock(&self.connection_handlers);
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Record the connection state reported by the socket owner. Listeners
    /// only hear about actual transitions.
    pub fn set_connected(&self, connected: bool) -> bool {
        if self.connected.swap(connected, Ordering::SeqCst) == connected {
            return false;
        }

        if connected {
            log::info!("Socket connected");
        } else {
            log::warn!("Socket disconnected");
        }

        let listeners: Vec<ConnectionHandler> = lock(&self.connection_handlers)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for listener in listeners {
            listener(connected);
        }
        true
    }

    /// Decode one received frame and hand it to the bus.
    pub fn handle_packet(&self, packet: &Packet) -> Result<usize> {
        let event = ServerEvent::from_packet(packet).map_err(|e| {
            log::warn!("Dropping socket frame: {e}");
            ClientError::from(e)
        })?;
        log::debug!("Received {}", packet.event);
        Ok(self.bus.dispatch(&event))
    }

    /// Fire and forget. While disconnected this logs a warning and sends
    /// nothing; there is no queue.
    pub fn emit(&self, event: &ClientEvent) -> Result<()> {
        if !self.is_connected() {
            log::warn!("Socket not connected, cannot emit {}", event.name());
            return Ok(());
        }
        let packet = event.to_packet()?;
        (self.send)(packet);
        Ok(())
    }

    /// Emit each event in order, stopping at the first failure.
    pub fn emit_all(&self, events: &[ClientEvent]) -> Result<()> {
        events.iter().try_for_each(|event| self.emit(event))
    }

    pub fn join_incident(&self, incident_id: i64) -> Result<()> {
        self.emit(&ClientEvent::JoinIncident(RoomRequest { incident_id }))
    }

    pub fn leave_incident(&self, incident_id: i64) -> Result<()> {
        self.emit(&ClientEvent::LeaveIncident(RoomRequest { incident_id }))
    }

    pub fn update_location(&self, personnel_id: i64, location: LatLng) -> Result<()> {
        self.emit(&ClientEvent::LocationUpdate(LocationReport {
            personnel_id,
            lat: location.lat,
            lng: location.lng,
        }))
    }

    pub fn update_status(&self, personnel_id: i64, status: PersonnelStatus) -> Result<()> {
        self.emit(&ClientEvent::StatusUpdate(StatusReport { personnel_id, status }))
    }

    pub fn send_incident_update(&self, incident_id: i64, kind: impl Into<String>, data: JsonValue) -> Result<()> {
        self.emit(&ClientEvent::IncidentUpdate(IncidentChange {
            incident_id,
            kind: kind.into(),
            data,
            timestamp: now_timestamp(),
        }))
    }

    pub fn send_message(&self, incident_id: i64, message: impl Into<String>, sender_name: impl Into<String>) -> Result<()> {
        self.emit(&ClientEvent::NewMessage(IncidentMessage {
            incident_id,
            message: message.into(),
            sender_name: sender_name.into(),
            timestamp: now_timestamp(),
        }))
    }

    pub fn broadcast(&self, message: impl Into<String>, sender_name: impl Into<String>, sender_id: Option<i64>) -> Result<()> {
        self.emit(&ClientEvent::BroadcastMessage(Broadcast {
            message: message.into(),
            sender_name: sender_name.into(),
            sender_id,
            timestamp: now_timestamp(),
        }))
    }
}
