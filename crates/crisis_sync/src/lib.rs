//! Client-side live state for the crisis command center and field app.
//!
//! This crate is NOT tied to a UI framework or a socket implementation. The
//! owner of the WebSocket feeds packets into a [`SocketClient`]; views keep a
//! [`LiveState`] filled from REST snapshots and patched by socket events:
//!
//! - location pings are merged in place (fast path),
//! - anything coarser triggers a full refetch and recomputation of every
//!   derived join (slow path),
//! - chat and alert feeds append with dedup.
//!
//! See [`policy`] for the event-to-path table.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod geo;
pub mod live;
pub mod location;
pub mod markers;
pub mod policy;
pub mod reconcile;
pub mod room;
pub mod session;
pub mod store;
pub mod transport;

pub use api::{Backend, HttpBackend, MemoryBackend, fetch_snapshot};
pub use chat::{AlertFeed, ChatLog, ComposerState};
pub use config::ClientConfig;
pub use error::ClientError;
pub use live::LiveView;
pub use location::{LocationPulse, report_fix};
pub use markers::{MapView, Marker, MarkerLayer};
pub use policy::{SyncPath, sync_path};
pub use reconcile::{IncidentView, Snapshot, Summary};
pub use room::{RoomState, RoomTracker};
pub use session::{KeyValueStore, MemoryStore, Session, SessionState};
pub use store::{LiveState, Reconcile};
pub use transport::{EventBus, HandlerId, SocketClient};

/// Shared handles are only touched from the UI thread; a poisoned lock just
/// means a handler panicked, and the data is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
