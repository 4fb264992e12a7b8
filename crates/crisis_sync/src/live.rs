//! A view driver that owns its backend handle and live state.
//!
//! The browser wires [`LiveState`] into signals itself; this driver is the
//! same loop for native callers and tests.

use crisis_common::{Packet, ServerEvent};

use crate::api::{Backend, ResolveOutcome, fetch_snapshot};
use crate::error::Result;
use crate::store::{LiveState, Reconcile};

pub struct LiveView<B> {
    backend: B,
    state: LiveState,
}

impl<B: Backend> LiveView<B> {
    pub fn new(backend: B) -> Self {
        Self::with_state(backend, LiveState::new())
    }

    pub fn with_state(backend: B, state: LiveState) -> Self {
        Self { backend, state }
    }

    pub fn state(&self) -> &LiveState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LiveState {
        &mut self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch all three collections. On failure the previous state stays and
    /// the error is kept for inline display.
    pub async fn refresh(&mut self) -> bool {
        let result = fetch_snapshot(&self.backend).await;
        self.state.settle(result)
    }

    pub async fn handle_event(&mut self, event: &ServerEvent) -> Reconcile {
        let outcome = self.state.apply(event);
        if outcome == Reconcile::Refetch {
            self.refresh().await;
        }
        outcome
    }

    pub async fn handle_packet(&mut self, packet: &Packet) -> Result<Reconcile> {
        let event = ServerEvent::from_packet(packet)?;
        Ok(self.handle_event(&event).await)
    }

    /// Deploy (`Some`) or release (`None`) a resource, then refetch.
    pub async fn assign_resource(&mut self, resource_id: i64, incident_id: Option<i64>) -> Result<()> {
        let result = self.backend.assign_resource(resource_id, incident_id).await;
        if let Err(e) = &result {
            self.state.record_error(e);
            return result;
        }
        self.refresh().await;
        Ok(())
    }

    /// First call without `confirm` parks the incident in review; the
    /// confirmed call resolves it and it drops out of the active list.
    pub async fn resolve_incident(&mut self, incident_id: i64, confirm: bool) -> Result<ResolveOutcome> {
        let outcome = match self.backend.resolve_incident(incident_id, confirm).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state.record_error(&e);
                return Err(e);
            }
        };
        self.refresh().await;
        Ok(outcome)
    }
}
