use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crisis_common::{AppMode, ChatMessage, ClientEvent, EventKind, GeofenceAlert, LatLng};
use crisis_sync::chat::{COMMAND_CENTER_WELCOME, ComposerState};
use crisis_sync::error::{ClientError, Result};
use crisis_sync::geo::Fix;
use crisis_sync::markers::Viewport;
use crisis_sync::{
    AlertFeed, Backend, ChatLog, HandlerId, IncidentView, LiveState, LocationPulse, MapView, Reconcile, RoomState,
    RoomTracker, SocketClient, Summary, fetch_snapshot, policy, report_fix,
};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_use::{UseGeolocationReturn, use_geolocation, use_interval_fn};

use crate::context::{AppContext, CrisisConnection, CrisisContext, SharedBackend};

const ALERT_FEED_LIMIT: usize = 50;
const CHAT_HISTORY_LIMIT: u32 = 100;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Disconnected emits are already logged by the socket; only encode
/// failures land here.
fn emit_logged(socket: &SocketClient, events: &[ClientEvent]) {
    if let Err(e) = socket.emit_all(events) {
        log::error!("Failed to emit room change: {e}");
    }
}

/// Unregister socket handlers when the calling component unmounts.
fn off_on_cleanup(socket: SocketClient, ids: Vec<HandlerId>) {
    on_cleanup(move || {
        for id in ids {
            socket.off(id);
        }
    });
}

/// Hook to access the crisis context.
///
/// # Panics
///
/// Panics if called outside of a `CrisisProvider`.
pub fn use_crisis() -> CrisisContext {
    expect_context::<CrisisContext>()
}

/// Session-backed identity and mode. Panics outside a `CrisisProvider`.
pub fn use_app_context() -> AppContext {
    expect_context::<AppContext>()
}

/// Hook to access the WebSocket connection control interface.
///
/// # Example
///
/// ```rust,ignore
/// use crisis_client::use_connection;
/// use leptos_use::core::ConnectionReadyState;
///
/// #[component]
/// fn ConnectionStatus() -> impl IntoView {
///     let connection = use_connection();
///     let is_connected = move || connection.ready_state.get() == ConnectionReadyState::Open;
///
///     view! {
///         <button on:click=move |_| (connection.open)() disabled=is_connected>"Connect"</button>
///     }
/// }
/// ```
pub fn use_connection() -> CrisisConnection {
    use_crisis().connection()
}

/// A view's live incident/personnel/resource state.
#[derive(Clone)]
pub struct LiveHandle {
    state: RwSignal<LiveState>,
    backend: SharedBackend,
    refetch: Arc<dyn Fn() + Send + Sync>,
}

impl LiveHandle {
    pub fn state(&self) -> ReadSignal<LiveState> {
        self.state.read_only()
    }

    pub fn refetch(&self) {
        (self.refetch)()
    }

    /// Distances are measured from `origin` on the next recompute.
    pub fn set_origin(&self, origin: Option<LatLng>) {
        self.state.update(|s| s.set_origin(origin));
    }

    pub fn active_incidents(&self) -> Signal<Vec<IncidentView>> {
        let state = self.state;
        Signal::derive(move || state.with(LiveState::active_incidents))
    }

    pub fn nearby_incidents(&self, radius_m: f64) -> Signal<Vec<IncidentView>> {
        let state = self.state;
        Signal::derive(move || state.with(|s| s.nearby_incidents(radius_m)))
    }

    pub fn incident(&self, id: Signal<Option<i64>>) -> Signal<Option<IncidentView>> {
        let state = self.state;
        Signal::derive(move || id.get().and_then(|id| state.with(|s| s.incident(id))))
    }

    pub fn summary(&self) -> Signal<Summary> {
        let state = self.state;
        Signal::derive(move || state.with(LiveState::summary))
    }

    /// Shown instead of the list: the placeholder when nothing is active,
    /// otherwise the last fetch error.
    pub fn notice(&self) -> Signal<Option<String>> {
        let state = self.state;
        Signal::derive(move || {
            state.with(|s| {
                s.last_error()
                    .map(str::to_string)
                    .or_else(|| s.empty_message().map(str::to_string))
            })
        })
    }

    /// Deploy (`Some`) or release (`None`) a resource, then refetch.
    pub fn assign_resource(&self, resource_id: i64, incident_id: Option<i64>) {
        let backend = self.backend.clone();
        let state = self.state;
        let refetch = self.refetch.clone();
        spawn_local(async move {
            match backend.assign_resource(resource_id, incident_id).await {
                Ok(()) => refetch(),
                Err(e) => {
                    log::error!("Assigning resource {resource_id} failed: {e}");
                    state.try_update(|s| s.record_error(&e));
                }
            }
        });
    }

    /// Without `confirm` the incident goes to review; with it, it resolves
    /// and drops out of the active list after the refetch.
    pub fn resolve_incident(&self, incident_id: i64, confirm: bool) {
        let backend = self.backend.clone();
        let state = self.state;
        let refetch = self.refetch.clone();
        spawn_local(async move {
            match backend.resolve_incident(incident_id, confirm).await {
                Ok(outcome) => {
                    if outcome.is_pending_review() {
                        log::info!("Incident {incident_id} submitted for review");
                    }
                    refetch();
                }
                Err(e) => {
                    log::error!("Resolving incident {incident_id} failed: {e}");
                    state.try_update(|s| s.record_error(&e));
                }
            }
        });
    }
}

/// Load the live collections and keep them reconciled with socket events.
///
/// Location pings patch in place; every other state event refetches all
/// three collections and recomputes the derived joins. A failed refetch
/// keeps the previous state and surfaces the error through
/// [`LiveHandle::notice`].
pub fn use_live_state() -> LiveHandle {
    let ctx = use_crisis();
    let state = RwSignal::new(LiveState::new());

    let refetch: Arc<dyn Fn() + Send + Sync> = {
        let backend = ctx.backend.clone();
        Arc::new(move || {
            let backend = backend.clone();
            spawn_local(async move {
                let result = fetch_snapshot(backend.as_ref()).await;
                state.try_update(|s| s.settle(result));
            });
        })
    };
    refetch();

    let ids = policy::state_events()
        .map(|kind| {
            let refetch = refetch.clone();
            ctx.socket.on(kind, move |event| {
                if state.try_update(|s| s.apply(event)) == Some(Reconcile::Refetch) {
                    refetch();
                }
            })
        })
        .collect();
    off_on_cleanup(ctx.socket.clone(), ids);

    LiveHandle {
        state,
        backend: ctx.backend,
        refetch,
    }
}

/// Keep the socket in the room of the selected incident.
///
/// Changing the selection leaves the previous room first; unmounting leaves
/// the current one. After a reconnect the room is joined again when
/// `rejoin_rooms_on_reconnect` is set.
pub fn use_incident_room(selected: Signal<Option<i64>>) -> Signal<RoomState> {
    let ctx = use_crisis();
    let socket = ctx.socket;
    let tracker = Arc::new(Mutex::new(RoomTracker::new(ctx.config.rejoin_rooms_on_reconnect)));
    let room = RwSignal::new(RoomState::Unsubscribed);

    {
        let socket = socket.clone();
        let tracker = tracker.clone();
        Effect::new(move || {
            let id = selected.get();
            let mut tracker = lock(&tracker);
            emit_logged(&socket, &tracker.select(id, socket.is_connected()));
            room.try_set(tracker.state());
        });
    }

    let listener = {
        let socket = socket.clone();
        let tracker = tracker.clone();
        socket.clone().on_connection_change(move |connected| {
            let mut tracker = lock(&tracker);
            if connected {
                emit_logged(&socket, &tracker.on_connected());
            } else {
                tracker.on_disconnected();
            }
            room.try_set(tracker.state());
        })
    };

    on_cleanup(move || {
        socket.off_connection_change(listener);
        let events = lock(&tracker).teardown(socket.is_connected());
        emit_logged(&socket, &events);
    });

    room.into()
}

/// A chat channel: the global broadcast when `incident_id` is `None`,
/// otherwise that incident's room.
#[derive(Clone)]
pub struct ChatHandle {
    pub messages: Signal<Vec<ChatMessage>>,
    pub composer: Signal<ComposerState>,
    incident_id: Option<i64>,
    socket: SocketClient,
    app: AppContext,
}

impl ChatHandle {
    /// Emit `draft` on the socket. Nothing is appended locally; the server
    /// echo arrives with its comm id and goes through dedup.
    pub fn send(&self, draft: &str) -> Result<()> {
        if !self.composer.get_untracked().can_send(draft) {
            return Err(ClientError::Rejected("Cannot send message right now".into()));
        }
        let body = draft.trim();
        let user = self.app.user().get_untracked();
        match self.incident_id {
            Some(id) => self.socket.send_message(id, body, user.name),
            None => self.socket.broadcast(body, user.name, Some(user.id)),
        }
    }
}

pub fn use_chat(incident_id: Option<i64>) -> ChatHandle {
    let ctx = use_crisis();
    let app = use_app_context();
    let user = app.user();

    let me = user.get_untracked();
    let chat_log = RwSignal::new(
        match incident_id {
            Some(id) => ChatLog::incident(Some(me.id), id),
            None => ChatLog::broadcast(Some(me.id), COMMAND_CENTER_WELCOME),
        }
        .with_user_name(Some(me.name)),
    );

    Effect::new(move || {
        let (id, name) = user.with(|u| (u.id, u.name.clone()));
        chat_log.update(|l| l.set_current_user(Some(id), Some(name)));
    });

    if let Some(id) = incident_id {
        let backend = ctx.backend.clone();
        spawn_local(async move {
            match backend.comms(id, Some(CHAT_HISTORY_LIMIT)).await {
                Ok(records) => {
                    chat_log.try_update(|l| l.load_history(records));
                }
                Err(e) => log::error!("Error loading messages for incident {id}: {e}"),
            }
        });
    }

    let ids = [EventKind::BroadcastReceived, EventKind::MessageReceived]
        .into_iter()
        .map(|kind| {
            ctx.socket.on(kind, move |event| {
                chat_log.try_update(|l| l.ingest(event));
            })
        })
        .collect();
    off_on_cleanup(ctx.socket.clone(), ids);

    let connected = ctx.connected;
    ChatHandle {
        messages: Signal::derive(move || chat_log.with(|l| l.messages().to_vec())),
        composer: Signal::derive(move || ComposerState::for_connection(connected.get(), false)),
        incident_id,
        socket: ctx.socket,
        app,
    }
}

/// Geofence alerts, newest first.
pub fn use_alert_feed() -> Signal<Vec<GeofenceAlert>> {
    let ctx = use_crisis();
    let feed = RwSignal::new(AlertFeed::with_limit(ALERT_FEED_LIMIT));
    let id = ctx.socket.on(EventKind::GeofenceAlert, move |event| {
        feed.try_update(|f| f.ingest(event));
    });
    off_on_cleanup(ctx.socket.clone(), vec![id]);
    Signal::derive(move || feed.with(|f| f.alerts().to_vec()))
}

#[derive(Clone, Copy)]
pub struct MapHandle {
    pub map: ReadSignal<MapView>,
    pub viewport: RwSignal<Viewport>,
}

/// Rebuild the marker layers whenever the live state or the selection
/// changes. The viewport only moves when the selection does.
pub fn use_map(live: &LiveHandle, selected: Signal<Option<i64>>) -> MapHandle {
    let state = live.state();
    let map = RwSignal::new(MapView::new());
    let viewport = RwSignal::new(Viewport::default());

    Effect::new(move || {
        let selected = selected.get();
        let moved = state.with(|s| {
            let incidents = s.active_incidents();
            map.try_update(|m| m.render(&incidents, s.personnel(), s.resources(), selected))
                .flatten()
        });
        if let Some(next) = moved {
            viewport.set(next);
        }
    });

    MapHandle {
        map: map.read_only(),
        viewport,
    }
}

/// Push the device position every `location_interval_ms` while the app is
/// in responder mode and the signed-in user has a personnel row. Returns the
/// last position sent.
pub fn use_responder_location() -> Signal<Option<Fix>> {
    let ctx = use_crisis();
    let app = use_app_context();
    let UseGeolocationReturn { coords, error, .. } = use_geolocation();

    let pulse = StoredValue::new(LocationPulse::new(ctx.config.default_location));
    let last_fix = RwSignal::new(None::<Fix>);

    let mode = app.mode();
    let state = app.state();
    {
        let backend = ctx.backend.clone();
        Effect::new(move || {
            let mode = mode.get();
            let user_id = state.with(|s| s.user.as_ref().map(|u| u.id));
            pulse.update_value(|p| {
                p.set_mode(mode);
                p.set_personnel(None);
            });

            let (AppMode::Responder, Some(user_id)) = (mode, user_id) else {
                return;
            };
            let backend = backend.clone();
            spawn_local(async move {
                match backend.personnel_for_user(user_id).await {
                    Ok(person) => {
                        pulse.try_update_value(|p| p.set_personnel(Some(person.id)));
                    }
                    Err(e) => log::warn!("No personnel record for user {user_id}: {e}"),
                }
            });
        });
    }

    let backend = ctx.backend.clone();
    let socket = ctx.socket.clone();
    let tick = move || {
        let reading = match (coords.get_untracked(), error.get_untracked()) {
            (Some(c), _) => Ok(LatLng::new(c.latitude(), c.longitude())),
            (None, Some(e)) => Err(ClientError::Geolocation(e.message())),
            (None, None) => Err(ClientError::Geolocation("position not yet available".into())),
        };
        let Some((personnel_id, fix)) = pulse.try_update_value(|p| p.next_fix(reading)).flatten() else {
            return;
        };
        let backend = backend.clone();
        let socket = socket.clone();
        spawn_local(async move {
            match report_fix(personnel_id, fix, backend.as_ref(), &socket).await {
                Ok(()) => {
                    last_fix.try_set(Some(fix));
                }
                Err(e) => log::error!("Error updating location: {e}"),
            }
        });
    };
    use_interval_fn(tick, ctx.config.location_interval_ms);

    last_fix.into()
}
