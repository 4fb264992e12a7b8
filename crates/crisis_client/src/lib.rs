//! # Crisis Client
//!
//! Leptos integration for `crisis_sync`.
//!
//! [`CrisisProvider`] owns the single WebSocket of the page and provides a
//! [`CrisisContext`] (socket, REST client, connection state) and an
//! [`AppContext`] (session, identity and mode). Each view then builds its own
//! state through hooks:
//!
//! - [`use_live_state`]: incidents, personnel and resources with fast/slow
//!   reconciliation,
//! - [`use_incident_room`]: join/leave the selected incident's room,
//! - [`use_chat`] and [`use_alert_feed`]: append-only feeds with dedup,
//! - [`use_map`]: marker layers and viewport,
//! - [`use_responder_location`]: the periodic location pulse.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leptos::prelude::*;
//! use crisis_client::{CrisisProvider, IncidentList, SummaryBar, use_live_state};
//!
//! #[component]
//! fn App() -> impl IntoView {
//!     view! {
//!         <CrisisProvider>
//!             <Dashboard/>
//!         </CrisisProvider>
//!     }
//! }
//!
//! #[component]
//! fn Dashboard() -> impl IntoView {
//!     let live = use_live_state();
//!     view! {
//!         <SummaryBar live=live.clone()/>
//!         <IncidentList live=live/>
//!     }
//! }
//! ```

mod components;
mod context;
mod hooks;
mod provider;
mod storage;

pub use components::{ChatPanel, ConnectionStatus, IncidentList, ModeToggle, SummaryBar};
pub use context::{AppContext, CrisisConnection, CrisisContext, SharedBackend};
pub use hooks::{
    ChatHandle, LiveHandle, MapHandle, use_alert_feed, use_app_context, use_chat, use_connection, use_crisis,
    use_incident_room, use_live_state, use_map, use_responder_location,
};
pub use provider::CrisisProvider;
pub use storage::LocalStorage;

/// Route `log` records to the browser console and panics to
/// `console.error`. Call once before mounting.
pub fn init_logging(level: log::Level) {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(level) {
        leptos::logging::warn!("Logger already initialised: {e}");
    }
}
