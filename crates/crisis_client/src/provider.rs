use std::sync::Arc;

use crisis_common::Packet;
use crisis_common::codec::PacketJsonCodec;
use crisis_sync::{ClientConfig, HttpBackend, Session, SocketClient};
use leptos::prelude::*;
use leptos_use::{DummyEncoder, ReconnectLimit, UseWebSocketOptions, UseWebSocketReturn, use_websocket_with_options};

use crate::context::{AppContext, CrisisContext};
use crate::storage::LocalStorage;

/// Provider component that owns the WebSocket and provides [`CrisisContext`]
/// and [`AppContext`].
///
/// Wrap either front-end in it once; every view below shares the socket.
///
/// # Example
///
/// ```rust,ignore
/// use crisis_client::CrisisProvider;
///
/// #[component]
/// pub fn App() -> impl IntoView {
///     view! {
///         <CrisisProvider>
///             <Dashboard />
///         </CrisisProvider>
///     }
/// }
/// ```
#[component]
pub fn CrisisProvider(
    /// Endpoints and timings; read from the build environment when omitted
    #[prop(optional)]
    config: Option<ClientConfig>,
    /// Whether to connect on mount (default: true)
    #[prop(optional)]
    auto_connect: Option<bool>,
    children: Children,
) -> impl IntoView {
    let auto_connect = auto_connect.unwrap_or(true);
    let config = config.unwrap_or_else(|| {
        ClientConfig::from_build_env().unwrap_or_else(|e| {
            log::error!("Falling back to default endpoints: {e}");
            ClientConfig::default()
        })
    });

    let UseWebSocketReturn {
        ready_state,
        message: raw_message,
        send: raw_send,
        open,
        close,
        ..
    } = use_websocket_with_options::<Packet, Packet, PacketJsonCodec, (), DummyEncoder>(
        &config.socket_url,
        UseWebSocketOptions::default()
            .immediate(false)
            .reconnect_limit(ReconnectLimit::Limited(config.reconnect_attempts))
            .reconnect_interval(config.reconnect_delay_ms),
    );

    if auto_connect {
        open();
    }

    let socket = SocketClient::new(move |packet: Packet| raw_send(&packet));

    let session = Session::load(Arc::new(LocalStorage));
    let backend = HttpBackend::new(config.clone());
    backend.set_token(session.token());
    {
        let backend = backend.clone();
        session.subscribe(move |state| backend.set_token(state.token.clone()));
    }

    let open_arc = Arc::new(move || {
        open();
    });
    let close_arc = Arc::new(move || {
        close();
    });

    let ctx = CrisisContext::new(
        config,
        socket.clone(),
        Arc::new(backend),
        ready_state.into(),
        open_arc,
        close_arc,
    );
    let connected = ctx.connected;

    provide_context(ctx);
    provide_context(AppContext::new(session));

    // Connection transitions drive the composer and room re-joins.
    {
        let socket = socket.clone();
        Effect::new(move || {
            socket.set_connected(connected.get());
        });
    }

    Effect::new(move || {
        if let Some(packet) = raw_message.get() {
            match socket.handle_packet(&packet) {
                Ok(delivered) => log::debug!("[CrisisProvider] {} -> {delivered} handler(s)", packet.event),
                Err(e) => log::warn!("[CrisisProvider] Dropped packet {packet:?}: {e}"),
            }
        }
    });

    children()
}
