use crisis_common::{AppMode, MessageClass};
use crisis_sync::geo::format_distance;
use crisis_sync::IncidentView;
use leptos::prelude::*;
use leptos_use::core::ConnectionReadyState;

use crate::hooks::{LiveHandle, use_app_context, use_chat, use_connection};

#[component]
pub fn ConnectionStatus() -> impl IntoView {
    let connection = use_connection();
    let label = move || match connection.ready_state.get() {
        ConnectionReadyState::Connecting => "Connecting...",
        ConnectionReadyState::Open => "Connected",
        ConnectionReadyState::Closing => "Closing...",
        ConnectionReadyState::Closed => "Disconnected",
    };
    let class = move || {
        if connection.ready_state.get() == ConnectionReadyState::Open {
            "connection-status connected"
        } else {
            "connection-status disconnected"
        }
    };

    view! { <span class=class>{label}</span> }
}

/// The four dashboard counters.
#[component]
pub fn SummaryBar(live: LiveHandle) -> impl IntoView {
    let summary = live.summary();
    view! {
        <div class="summary-bar">
            <div class="stat">"Active Incidents: " {move || summary.get().active_incidents}</div>
            <div class="stat">"Personnel: " {move || summary.get().personnel}</div>
            <div class="stat">"Equipment: " {move || summary.get().equipment}</div>
            <div class="stat critical">"Critical: " {move || summary.get().critical}</div>
        </div>
    }
}

fn incident_row(incident: IncidentView, selected: Option<i64>, on_select: Option<Callback<i64>>) -> impl IntoView {
    let id = incident.id();
    let class = if selected == Some(id) { "incident-card selected" } else { "incident-card" };
    let progress = format!("{} of {} units arrived", incident.arrived_units, incident.total_units);
    let percent = format!("width: {}%", incident.progress_percent());
    let distance = incident.distance_m.map(format_distance);
    let responders = incident.responders.join(", ");
    let record = incident.record;

    view! {
        <li class=class on:click=move |_| {
            if let Some(cb) = on_select {
                cb.run(id);
            }
        }>
            <div class="incident-title">{record.title}</div>
            <div class="incident-meta">
                <span class="severity">{record.severity.to_string()}</span>
                <span class="status">{record.status.to_string()}</span>
                {distance.map(|d| view! { <span class="distance">{d}</span> })}
            </div>
            <div class="responders">{responders}</div>
            <div class="progress-text">{progress}</div>
            <div class="progress-bar"><div class="progress-fill" style=percent></div></div>
        </li>
    }
}

/// Active incidents with their derived progress, or the placeholder.
#[component]
pub fn IncidentList(
    live: LiveHandle,
    #[prop(into, optional)] selected: Signal<Option<i64>>,
    #[prop(optional)] on_select: Option<Callback<i64>>,
) -> impl IntoView {
    let incidents = live.active_incidents();
    let notice = live.notice();

    view! {
        <div class="incident-list">
            {move || notice.get().map(|text| view! { <p class="empty-state">{text}</p> })}
            <ul>
                {move || {
                    let selected = selected.get();
                    incidents
                        .get()
                        .into_iter()
                        .map(|incident| incident_row(incident, selected, on_select))
                        .collect_view()
                }}
            </ul>
        </div>
    }
}

/// Broadcast chat when `incident_id` is absent, incident room chat otherwise.
#[component]
pub fn ChatPanel(#[prop(optional)] incident_id: Option<i64>) -> impl IntoView {
    let chat = use_chat(incident_id);
    let draft = RwSignal::new(String::new());
    let error = RwSignal::new(None::<String>);
    let messages = chat.messages;
    let composer = chat.composer;

    let submit = move || {
        let text = draft.get_untracked();
        match chat.send(&text) {
            Ok(()) => {
                draft.set(String::new());
                error.set(None);
            }
            Err(e) => error.set(Some(e.inline_message())),
        }
    };
    let submit_on_enter = submit.clone();

    view! {
        <div class="chat-panel">
            <ul class="chat-messages">
                {move || {
                    messages
                        .get()
                        .into_iter()
                        .map(|m| {
                            let class = match m.class {
                                MessageClass::Sent => "message sent",
                                MessageClass::Received => "message received",
                                MessageClass::System => "message system",
                            };
                            view! {
                                <li class=class>
                                    <span class="sender">{m.sender_name}</span>
                                    <span class="body">{m.body}</span>
                                </li>
                            }
                        })
                        .collect_view()
                }}
            </ul>
            {move || composer.get().notice.map(|text| view! { <p class="chat-notice">{text}</p> })}
            {move || error.get().map(|text| view! { <p class="chat-error">{text}</p> })}
            <div class="chat-composer">
                <input
                    type="text"
                    prop:value=draft
                    disabled=move || !composer.get().enabled
                    on:input=move |ev| draft.set(event_target_value(&ev))
                    on:keydown=move |ev| {
                        if ev.key() == "Enter" {
                            submit_on_enter();
                        }
                    }
                />
                <button
                    disabled=move || !draft.with(|d| composer.get().can_send(d))
                    on:click=move |_| submit()
                >
                    "Send"
                </button>
            </div>
        </div>
    }
}

#[component]
pub fn ModeToggle() -> impl IntoView {
    let app = use_app_context();
    let mode = app.mode();
    let label = move || match mode.get() {
        AppMode::User => "Switch to Responder Mode",
        AppMode::Responder => "Switch to User Mode",
    };

    view! {
        <button class="mode-toggle" on:click=move |_| {
            if let Err(e) = app.toggle_mode() {
                log::error!("Could not switch mode: {e}");
            }
        }>
            {label}
        </button>
    }
}
