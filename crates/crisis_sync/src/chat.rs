//! Chat log, composer gating and the geofence alert feed.

use std::collections::HashSet;

use crisis_common::{
    BroadcastReceived, ChatMessage, CommRecord, GeofenceAlert, MessageClass, MessageId, MessageReceived,
    ServerEvent,
};

pub const COMMAND_CENTER_WELCOME: &str =
    "Command Center communications active. All messages are broadcast to field responders.";
pub const TEAM_WELCOME: &str = "Team communication channel active. All responders will receive your messages.";
pub const DISCONNECTED_NOTICE: &str = "Disconnected from server. Reconnecting...";

const WELCOME_ID: &str = "welcome";
const SYSTEM_SENDER: &str = "System";

/// Ordered, id-deduplicated message list for one channel.
///
/// A log either follows the global broadcast channel or one incident room.
#[derive(Clone, Debug)]
pub struct ChatLog {
    current_user_id: Option<i64>,
    current_user_name: Option<String>,
    incident_id: Option<i64>,
    messages: Vec<ChatMessage>,
    seen: HashSet<MessageId>,
}

impl ChatLog {
    /// Broadcast channel log opened with a system welcome line.
    pub fn broadcast(current_user_id: Option<i64>, welcome: &str) -> Self {
        let mut log = Self {
            current_user_id,
            current_user_name: None,
            incident_id: None,
            messages: Vec::new(),
            seen: HashSet::new(),
        };
        log.push(ChatMessage {
            id: MessageId::Local(WELCOME_ID.to_string()),
            sender_id: None,
            sender_name: SYSTEM_SENDER.to_string(),
            body: welcome.to_string(),
            timestamp: None,
            class: MessageClass::System,
        });
        log
    }

    /// Incident room log; starts empty until history loads.
    pub fn incident(current_user_id: Option<i64>, incident_id: i64) -> Self {
        Self {
            current_user_id,
            current_user_name: None,
            incident_id: Some(incident_id),
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Room messages carry only a sender name, so the name is needed to
    /// recognise our own echoes there.
    pub fn with_user_name(mut self, name: Option<String>) -> Self {
        self.current_user_name = name;
        self
    }

    /// Identity can change after login; existing entries keep their class.
    pub fn set_current_user(&mut self, user_id: Option<i64>, user_name: Option<String>) {
        self.current_user_id = user_id;
        self.current_user_name = user_name;
    }

    pub fn classify(&self, sender_id: Option<i64>) -> MessageClass {
        match (sender_id, self.current_user_id) {
            (Some(sender), Some(me)) if sender == me => MessageClass::Sent,
            _ => MessageClass::Received,
        }
    }

    /// Falls back to the sender name when the payload has no sender id.
    pub fn classify_sender(&self, sender_id: Option<i64>, sender_name: Option<&str>) -> MessageClass {
        if sender_id.is_some() {
            return self.classify(sender_id);
        }
        match (sender_name, self.current_user_name.as_deref()) {
            (Some(sender), Some(me)) if !me.is_empty() && sender == me => MessageClass::Sent,
            _ => MessageClass::Received,
        }
    }

    /// Returns `false` if a message with the same id is already present.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id.clone()) {
            log::debug!("Message {:?} already exists, skipping duplicate", message.id);
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Route a socket event into the log. Events for other channels are
    /// ignored.
    pub fn ingest(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::BroadcastReceived(msg) if self.incident_id.is_none() => self.push_broadcast(msg),
            ServerEvent::MessageReceived(msg) if self.incident_id == Some(msg.incident_id) => {
                self.push_room_message(msg)
            }
            _ => false,
        }
    }

    pub fn push_broadcast(&mut self, msg: &BroadcastReceived) -> bool {
        let message = ChatMessage {
            id: MessageId::Comm(msg.comm_id),
            sender_id: msg.sender_id,
            sender_name: msg.sender_name.clone().unwrap_or_default(),
            body: msg.message.clone(),
            timestamp: msg.timestamp.clone(),
            class: self.classify_sender(msg.sender_id, msg.sender_name.as_deref()),
        };
        self.push(message)
    }

    pub fn push_room_message(&mut self, msg: &MessageReceived) -> bool {
        self.push(ChatMessage {
            id: MessageId::Comm(msg.comm_id),
            sender_id: None,
            sender_name: msg.sender_name.clone().unwrap_or_default(),
            body: msg.message.clone(),
            timestamp: msg.timestamp.clone(),
            class: self.classify_sender(None, msg.sender_name.as_deref()),
        })
    }

    /// Merge stored history in front of anything received live, skipping ids
    /// already present. Returns how many rows were added.
    pub fn load_history(&mut self, records: Vec<CommRecord>) -> usize {
        let mut history = Vec::with_capacity(records.len());
        for record in records {
            let id = MessageId::Comm(record.id);
            if !self.seen.insert(id.clone()) {
                continue;
            }
            let class = self.classify_sender(record.sender_id, record.sender_name.as_deref());
            history.push(ChatMessage {
                id,
                sender_id: record.sender_id,
                sender_name: record.sender_name.unwrap_or_default(),
                body: record.message,
                timestamp: record.created_at,
                class,
            });
        }

        let added = history.len();
        let system_len = self
            .messages
            .iter()
            .take_while(|m| m.class == MessageClass::System)
            .count();
        self.messages.splice(system_len..system_len, history);
        added
    }
}

/// What the message composer may do right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposerState {
    pub enabled: bool,
    pub notice: Option<&'static str>,
}

impl ComposerState {
    pub fn for_connection(connected: bool, sending: bool) -> Self {
        Self {
            enabled: connected && !sending,
            notice: (!connected).then_some(DISCONNECTED_NOTICE),
        }
    }

    /// Whether `draft` may be submitted.
    pub fn can_send(&self, draft: &str) -> bool {
        self.enabled && !draft.trim().is_empty()
    }
}

/// Geofence alerts, newest first, one per `(zone, personnel)` pair.
#[derive(Clone, Debug, Default)]
pub struct AlertFeed {
    alerts: Vec<GeofenceAlert>,
    limit: Option<usize>,
}

impl AlertFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            alerts: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn alerts(&self) -> &[GeofenceAlert] {
        &self.alerts
    }

    /// A repeated pair replaces the older entry and moves to the front.
    pub fn push(&mut self, alert: GeofenceAlert) {
        self.alerts
            .retain(|a| (a.zone_id, a.personnel_id) != (alert.zone_id, alert.personnel_id));
        self.alerts.insert(0, alert);
        if let Some(limit) = self.limit {
            self.alerts.truncate(limit);
        }
    }

    pub fn ingest(&mut self, event: &ServerEvent) -> bool {
        if let ServerEvent::GeofenceAlert(alert) = event {
            self.push(alert.clone());
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast(comm_id: i64, sender_id: Option<i64>) -> ServerEvent {
        ServerEvent::BroadcastReceived(BroadcastReceived {
            comm_id,
            sender_id,
            sender_name: Some("Dispatcher".into()),
            message: "Stage at gate 3".into(),
            timestamp: None,
        })
    }

    #[test]
    fn test_duplicate_broadcast_is_dropped() {
        let mut log = ChatLog::broadcast(Some(5), COMMAND_CENTER_WELCOME);
        assert!(log.ingest(&broadcast(41, Some(2))));
        assert!(!log.ingest(&broadcast(41, Some(2))));
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].class, MessageClass::System);
    }

    #[test]
    fn test_classification_uses_current_user() {
        let mut log = ChatLog::broadcast(Some(5), TEAM_WELCOME);
        log.ingest(&broadcast(1, Some(5)));
        log.ingest(&broadcast(2, Some(6)));
        log.ingest(&broadcast(3, None));

        let classes: Vec<_> = log.messages().iter().skip(1).map(|m| m.class).collect();
        assert_eq!(classes, vec![MessageClass::Sent, MessageClass::Received, MessageClass::Received]);
    }

    #[test]
    fn test_room_log_ignores_other_rooms_and_broadcasts() {
        let mut log = ChatLog::incident(Some(1), 7);
        let other_room = ServerEvent::MessageReceived(MessageReceived {
            comm_id: 1,
            incident_id: 8,
            sender_name: None,
            message: "wrong room".into(),
            timestamp: None,
        });
        assert!(!log.ingest(&other_room));
        assert!(!log.ingest(&broadcast(2, None)));
        assert!(log.is_empty());
    }

    #[test]
    fn test_room_messages_classified_by_sender_name() {
        let mut log = ChatLog::incident(Some(12), 7).with_user_name(Some("Asha".into()));
        let room_message = |comm_id: i64, sender: &str| {
            ServerEvent::MessageReceived(MessageReceived {
                comm_id,
                incident_id: 7,
                sender_name: Some(sender.into()),
                message: "on scene".into(),
                timestamp: None,
            })
        };
        assert!(log.ingest(&room_message(1, "Asha")));
        assert!(log.ingest(&room_message(2, "Ravi")));

        let classes: Vec<_> = log.messages().iter().map(|m| m.class).collect();
        assert_eq!(classes, vec![MessageClass::Sent, MessageClass::Received]);

        log.set_current_user(Some(13), Some("Ravi".into()));
        assert!(log.ingest(&room_message(3, "Ravi")));
        assert_eq!(log.messages()[2].class, MessageClass::Sent);
        assert_eq!(log.messages()[0].class, MessageClass::Sent);
    }

    #[test]
    fn test_history_goes_before_live_messages() {
        let mut log = ChatLog::broadcast(Some(5), COMMAND_CENTER_WELCOME);
        log.ingest(&broadcast(30, Some(2)));

        let row = |id: i64| CommRecord {
            id,
            incident_id: None,
            sender_id: Some(5),
            sender_name: Some("Command Center".into()),
            message: format!("row {id}"),
            kind: Some("broadcast".into()),
            read_status: false,
            created_at: None,
        };
        assert_eq!(log.load_history(vec![row(10), row(30), row(11)]), 2);

        let ids: Vec<_> = log.messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                MessageId::Local("welcome".into()),
                MessageId::Comm(10),
                MessageId::Comm(11),
                MessageId::Comm(30),
            ]
        );
        assert_eq!(log.messages()[1].class, MessageClass::Sent);
    }

    #[test]
    fn test_composer_follows_connection() {
        let down = ComposerState::for_connection(false, false);
        assert!(!down.enabled);
        assert_eq!(down.notice, Some(DISCONNECTED_NOTICE));

        let up = ComposerState::for_connection(true, false);
        assert!(up.can_send("copy that"));
        assert!(!up.can_send("   "));
        assert!(!ComposerState::for_connection(true, true).enabled);
    }

    #[test]
    fn test_alert_feed_dedups_by_zone_and_person() {
        let alert = |zone: i64, person: i64, kind: &str| GeofenceAlert {
            zone_id: Some(zone),
            personnel_id: Some(person),
            location: None,
            alert_type: Some(kind.into()),
            priority: Some("high".into()),
        };

        let mut feed = AlertFeed::with_limit(2);
        feed.push(alert(1, 4, "entered"));
        feed.push(alert(2, 4, "entered"));
        feed.push(alert(1, 4, "exited"));

        assert_eq!(feed.alerts().len(), 2);
        assert_eq!(feed.alerts()[0].alert_type.as_deref(), Some("exited"));
        assert_eq!(feed.alerts()[1].zone_id, Some(2));
    }
}
