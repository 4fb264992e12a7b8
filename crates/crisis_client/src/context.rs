use std::sync::Arc;

use crisis_common::{AppMode, CurrentUser};
use crisis_sync::error::Result;
use crisis_sync::{Backend, ClientConfig, Session, SessionState, SocketClient};
use leptos::prelude::*;
use leptos_use::core::ConnectionReadyState;

/// REST client shared by every hook. The provider installs an
/// `HttpBackend`; tests can install a `MemoryBackend`.
pub type SharedBackend = Arc<dyn Backend + Send + Sync>;

/// Connection control interface exposed to components.
#[derive(Clone)]
pub struct CrisisConnection {
    /// Current connection state
    pub ready_state: Signal<ConnectionReadyState>,
    /// Open the WebSocket connection
    pub open: Arc<dyn Fn() + Send + Sync>,
    /// Close the WebSocket connection
    pub close: Arc<dyn Fn() + Send + Sync>,
}

/// Context provided by [`CrisisProvider`](crate::CrisisProvider).
///
/// Holds the one socket shared by every view on the page and the REST
/// client. Each hook that consumes it keeps its own collections.
#[derive(Clone)]
pub struct CrisisContext {
    pub config: ClientConfig,
    pub socket: SocketClient,
    pub backend: SharedBackend,
    pub ready_state: Signal<ConnectionReadyState>,
    /// `true` while the socket is open
    pub connected: Signal<bool>,
    open: Arc<dyn Fn() + Send + Sync>,
    close: Arc<dyn Fn() + Send + Sync>,
}

impl CrisisContext {
    /// Typically called by `CrisisProvider`, not by user code.
    pub fn new(
        config: ClientConfig,
        socket: SocketClient,
        backend: SharedBackend,
        ready_state: Signal<ConnectionReadyState>,
        open: Arc<dyn Fn() + Send + Sync>,
        close: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            config,
            socket,
            backend,
            ready_state,
            connected: Signal::derive(move || ready_state.get() == ConnectionReadyState::Open),
            open,
            close,
        }
    }

    pub fn connection(&self) -> CrisisConnection {
        CrisisConnection {
            ready_state: self.ready_state,
            open: self.open.clone(),
            close: self.close.clone(),
        }
    }
}

/// Reactive mirror of the persisted [`Session`].
///
/// Writes go through the session so storage stays the source of truth; the
/// signals follow through a session listener, so every view sees a mode
/// toggle or sign-out at once.
#[derive(Clone)]
pub struct AppContext {
    session: Session,
    state: RwSignal<SessionState>,
}

impl AppContext {
    pub fn new(session: Session) -> Self {
        let state = RwSignal::new(session.state());
        session.subscribe(move |next| {
            state.try_set(next.clone());
        });
        Self { session, state }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> Signal<SessionState> {
        self.state.into()
    }

    pub fn user(&self) -> Signal<CurrentUser> {
        let state = self.state;
        Signal::derive(move || state.with(SessionState::effective_user))
    }

    pub fn mode(&self) -> Signal<AppMode> {
        let state = self.state;
        Signal::derive(move || state.with(|s| s.mode))
    }

    pub fn is_authenticated(&self) -> Signal<bool> {
        let state = self.state;
        Signal::derive(move || state.with(SessionState::is_authenticated))
    }

    pub fn sign_in(&self, token: &str, user: &CurrentUser) -> Result<()> {
        self.session.sign_in(token, user)
    }

    pub fn sign_out(&self) -> Result<()> {
        self.session.sign_out()
    }

    pub fn set_mode(&self, mode: AppMode) -> Result<()> {
        self.session.set_mode(mode)
    }

    pub fn toggle_mode(&self) -> Result<AppMode> {
        self.session.toggle_mode()
    }
}
