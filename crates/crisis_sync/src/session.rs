//! Observable application context backed by persistent key/value storage.
//!
//! Storage is read once when the session loads. Afterwards every view reads
//! the in-memory state and is told about changes, instead of each one going
//! back to storage on mount.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crisis_common::{AppMode, CurrentUser};

use crate::error::{ClientError, Result};
use crate::lock;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const CURRENT_USER_KEY: &str = "currentUser";
pub const APP_MODE_KEY: &str = "appMode";

/// Persistent string storage (browser local storage in the UI).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<CurrentUser>,
    pub mode: AppMode,
}

impl SessionState {
    /// The signed-in user, or the command center identity.
    pub fn effective_user(&self) -> CurrentUser {
        self.user.clone().unwrap_or_else(CurrentUser::command_center)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    state: Arc<Mutex<SessionState>>,
    listeners: Arc<Mutex<Vec<(ListenerId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl Session {
    /// Read the persisted keys. Unreadable values are dropped with a
    /// warning rather than failing the app.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let read = |key: &str| match store.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Could not read '{key}' from storage: {e}");
                None
            }
        };

        let token = read(AUTH_TOKEN_KEY);
        let user = read(CURRENT_USER_KEY).and_then(|raw| match serde_json::from_str::<CurrentUser>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("Ignoring stored {CURRENT_USER_KEY}: {e}");
                None
            }
        });
        let mode = read(APP_MODE_KEY)
            .and_then(|raw| AppMode::parse(&raw))
            .unwrap_or_default();

        Self {
            store,
            state: Arc::new(Mutex::new(SessionState { token, user, mode })),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.state).clone()
    }

    pub fn current_user(&self) -> CurrentUser {
        lock(&self.state).effective_user()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.state).token.clone()
    }

    pub fn mode(&self) -> AppMode {
        lock(&self.state).mode
    }

    pub fn sign_in(&self, token: &str, user: &CurrentUser) -> Result<()> {
        let raw = serde_json::to_string(user).map_err(|e| ClientError::Storage(e.to_string()))?;
        self.store.set(AUTH_TOKEN_KEY, token)?;
        self.store.set(CURRENT_USER_KEY, &raw)?;
        self.update(|state| {
            state.token = Some(token.to_string());
            state.user = Some(user.clone());
        });
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.store.remove(AUTH_TOKEN_KEY)?;
        self.store.remove(CURRENT_USER_KEY)?;
        self.update(|state| {
            state.token = None;
            state.user = None;
        });
        Ok(())
    }

    pub fn set_mode(&self, mode: AppMode) -> Result<()> {
        self.store.set(APP_MODE_KEY, mode.as_str())?;
        self.update(|state| state.mode = mode);
        Ok(())
    }

    pub fn toggle_mode(&self) -> Result<AppMode> {
        let mode = self.mode().toggled();
        self.set_mode(mode)?;
        Ok(mode)
    }

    /// `listener` runs after every change with the new state.
    pub fn subscribe(&self, listener: impl Fn(&SessionState) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        lock(&self.listeners).retain(|(listener_id, _)| *listener_id != id);
    }

    fn update(&self, change: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut state = lock(&self.state);
            change(&mut state);
            state.clone()
        };
        let listeners: Vec<Listener> = lock(&self.listeners).iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}
