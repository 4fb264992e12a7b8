//! Per-incident room membership.
//!
//! The tracker is a pure state machine: every transition returns the events
//! the caller must emit. Joins and leaves are not acknowledged, so the state
//! changes as soon as the event is produced.

use crisis_common::{ClientEvent, RoomRequest};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoomState {
    #[default]
    Unsubscribed,
    Subscribed(i64),
}

#[derive(Clone, Debug, Default)]
pub struct RoomTracker {
    selected: Option<i64>,
    state: RoomState,
    rejoin_on_reconnect: bool,
    /// The selection has been announced on some connection already
    announced: bool,
}

impl RoomTracker {
    pub fn new(rejoin_on_reconnect: bool) -> Self {
        Self {
            rejoin_on_reconnect,
            ..Self::default()
        }
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    /// Change the selected incident. Leaves the previous room and joins the
    /// new one when connected.
    pub fn select(&mut self, incident_id: Option<i64>, connected: bool) -> Vec<ClientEvent> {
        let mut events = Vec::new();

        if let RoomState::Subscribed(current) = self.state {
            if Some(current) == incident_id {
                return events;
            }
            if connected {
                events.push(ClientEvent::LeaveIncident(RoomRequest { incident_id: current }));
            }
            self.state = RoomState::Unsubscribed;
        }

        if self.selected != incident_id {
            self.announced = false;
        }
        self.selected = incident_id;
        if let (Some(id), true) = (incident_id, connected) {
            events.push(ClientEvent::JoinIncident(RoomRequest { incident_id: id }));
            self.state = RoomState::Subscribed(id);
            self.announced = true;
        }
        events
    }

    /// The view is going away.
    pub fn teardown(&mut self, connected: bool) -> Vec<ClientEvent> {
        self.select(None, connected)
    }

    /// The server drops room membership with the connection.
    pub fn on_disconnected(&mut self) {
        self.state = RoomState::Unsubscribed;
    }

    /// Joins a selection made while offline; re-joins after a reconnect
    /// only when configured to.
    pub fn on_connected(&mut self) -> Vec<ClientEvent> {
        match (self.selected, self.state) {
            (Some(id), RoomState::Unsubscribed) if self.rejoin_on_reconnect || !self.announced => {
                self.state = RoomState::Subscribed(id);
                self.announced = true;
                vec![ClientEvent::JoinIncident(RoomRequest { incident_id: id })]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(id: i64) -> ClientEvent {
        ClientEvent::JoinIncident(RoomRequest { incident_id: id })
    }

    fn leave(id: i64) -> ClientEvent {
        ClientEvent::LeaveIncident(RoomRequest { incident_id: id })
    }

    #[test]
    fn test_select_then_switch() {
        let mut rooms = RoomTracker::new(true);
        assert_eq!(rooms.select(Some(3), true), vec![join(3)]);
        assert_eq!(rooms.state(), RoomState::Subscribed(3));

        assert!(rooms.select(Some(3), true).is_empty());
        assert_eq!(rooms.select(Some(5), true), vec![leave(3), join(5)]);
        assert_eq!(rooms.teardown(true), vec![leave(5)]);
        assert_eq!(rooms.state(), RoomState::Unsubscribed);
    }

    #[test]
    fn test_select_while_disconnected_defers_join() {
        let mut rooms = RoomTracker::new(true);
        assert!(rooms.select(Some(9), false).is_empty());
        assert_eq!(rooms.state(), RoomState::Unsubscribed);
        assert_eq!(rooms.on_connected(), vec![join(9)]);
    }

    #[test]
    fn test_reconnect_rejoins_selected_room() {
        let mut rooms = RoomTracker::new(true);
        rooms.select(Some(7), true);
        rooms.on_disconnected();
        assert_eq!(rooms.on_connected(), vec![join(7)]);
        assert!(rooms.on_connected().is_empty());
    }

    #[test]
    fn test_first_connect_joins_even_without_rejoin() {
        let mut rooms = RoomTracker::new(false);
        assert!(rooms.select(Some(4), false).is_empty());
        assert_eq!(rooms.on_connected(), vec![join(4)]);
        rooms.on_disconnected();
        assert!(rooms.on_connected().is_empty());
    }

    #[test]
    fn test_reconnect_without_rejoin_stays_out() {
        let mut rooms = RoomTracker::new(false);
        rooms.select(Some(7), true);
        rooms.on_disconnected();
        assert!(rooms.on_connected().is_empty());
        assert_eq!(rooms.selected(), Some(7));
        assert_eq!(rooms.state(), RoomState::Unsubscribed);
    }
}
