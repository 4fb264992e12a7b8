//! Responder location pulse.
//!
//! While the app is in responder mode and the signed-in user maps to a
//! personnel row, every tick pushes the device position to the backend and
//! announces it on the socket.

use crisis_common::{AppMode, LatLng};

use crate::api::Backend;
use crate::error::{ClientError, Result};
use crate::geo::{Fix, resolve_position};
use crate::transport::SocketClient;

#[derive(Clone, Debug)]
pub struct LocationPulse {
    mode: AppMode,
    personnel_id: Option<i64>,
    fallback: LatLng,
    last_fix: Option<Fix>,
}

impl LocationPulse {
    pub fn new(fallback: LatLng) -> Self {
        Self {
            mode: AppMode::User,
            personnel_id: None,
            fallback,
            last_fix: None,
        }
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        self.mode = mode;
    }

    pub fn set_personnel(&mut self, personnel_id: Option<i64>) {
        self.personnel_id = personnel_id;
    }

    pub fn is_active(&self) -> bool {
        self.mode == AppMode::Responder && self.personnel_id.is_some()
    }

    /// The position chosen by the latest active tick.
    pub fn last_fix(&self) -> Option<Fix> {
        self.last_fix
    }

    /// Resolve the position for this tick and record it. Returns the
    /// personnel row to report for, or `None` when inactive.
    pub fn next_fix(&mut self, reading: std::result::Result<LatLng, ClientError>) -> Option<(i64, Fix)> {
        let personnel_id = self.personnel_id.filter(|_| self.mode == AppMode::Responder)?;
        let fix = resolve_position(reading, self.fallback);
        self.last_fix = Some(fix);
        Some((personnel_id, fix))
    }

    /// One timer tick. Returns the position sent, or `None` when inactive.
    pub async fn tick<B: Backend + ?Sized>(
        &mut self,
        reading: std::result::Result<LatLng, ClientError>,
        backend: &B,
        socket: &SocketClient,
    ) -> Result<Option<Fix>> {
        let Some((personnel_id, fix)) = self.next_fix(reading) else {
            return Ok(None);
        };
        report_fix(personnel_id, fix, backend, socket).await?;
        Ok(Some(fix))
    }
}

/// Push `fix` over REST, then announce it on the socket. A socket that is
/// down only logs; the REST update already reached the backend.
pub async fn report_fix<B: Backend + ?Sized>(
    personnel_id: i64,
    fix: Fix,
    backend: &B,
    socket: &SocketClient,
) -> Result<()> {
    backend.update_location(personnel_id, fix.position()).await?;
    socket.update_location(personnel_id, fix.position())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::reconcile::Snapshot;
    use crisis_common::{Personnel, PersonnelStatus};
    use std::sync::{Arc, Mutex};

    fn backend_with_unit() -> MemoryBackend {
        MemoryBackend::with_snapshot(Snapshot {
            personnel: vec![Personnel::minimal(4, "Unit 4", PersonnelStatus::Available, LatLng::new(0.0, 0.0))],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_inactive_outside_responder_mode() {
        let backend = backend_with_unit();
        let socket = SocketClient::new(|_| {});
        let mut pulse = LocationPulse::new(LatLng::new(28.6139, 77.2090));
        pulse.set_personnel(Some(4));

        let sent = pulse.tick(Ok(LatLng::new(1.0, 1.0)), &backend, &socket).await.unwrap();
        assert_eq!(sent, None);
        assert_eq!(pulse.last_fix(), None);
        assert_eq!(backend.request_count(), 0);
    }

    #[test]
    fn test_next_fix_records_last_fix_in_place() {
        let fallback = LatLng::new(28.6139, 77.2090);
        let mut pulse = LocationPulse::new(fallback);
        pulse.set_mode(AppMode::Responder);
        assert_eq!(pulse.next_fix(Ok(LatLng::new(1.0, 1.0))), None);

        pulse.set_personnel(Some(4));
        let here = LatLng::new(28.5, 77.3);
        assert_eq!(pulse.next_fix(Ok(here)), Some((4, Fix::Device(here))));
        assert_eq!(pulse.last_fix(), Some(Fix::Device(here)));

        let denied = pulse.next_fix(Err(ClientError::Geolocation("User denied Geolocation".into())));
        assert_eq!(denied, Some((4, Fix::Fallback(fallback))));
        assert_eq!(pulse.last_fix(), Some(Fix::Fallback(fallback)));
    }

    #[tokio::test]
    async fn test_denied_geolocation_sends_default() {
        let backend = backend_with_unit();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let socket = SocketClient::new(move |packet| sink.lock().unwrap().push(packet));
        socket.set_connected(true);

        let fallback = LatLng::new(28.6139, 77.2090);
        let mut pulse = LocationPulse::new(fallback);
        pulse.set_mode(AppMode::Responder);
        pulse.set_personnel(Some(4));

        let fix = pulse
            .tick(Err(ClientError::Geolocation("User denied Geolocation".into())), &backend, &socket)
            .await
            .unwrap()
            .unwrap();

        assert!(fix.is_degraded());
        assert_eq!(backend.snapshot().personnel[0].location(), Some(fallback));
        assert_eq!(sent.lock().unwrap()[0].event, "location_update");
    }

    #[tokio::test]
    async fn test_socket_down_still_updates_backend() {
        let backend = backend_with_unit();
        let socket = SocketClient::new(|_| {});
        let mut pulse = LocationPulse::new(LatLng::new(0.0, 0.0));
        pulse.set_mode(AppMode::Responder);
        pulse.set_personnel(Some(4));

        let here = LatLng::new(28.5, 77.3);
        let fix = pulse.tick(Ok(here), &backend, &socket).await.unwrap();
        assert_eq!(fix, Some(Fix::Device(here)));
        assert_eq!(pulse.last_fix(), fix);
        assert_eq!(backend.snapshot().personnel[0].location(), Some(here));
    }
}
