//! Client configuration.
//!
//! The two endpoints can be baked in at build time (`CRISIS_API_URL`,
//! `CRISIS_SOCKET_URL`), read from the process environment, or supplied by any
//! lookup function. Everything else has fixed defaults that callers may
//! override field by field.

use url::Url;

use crate::error::{ClientError, Result};
use crisis_common::LatLng;

pub const API_URL_VAR: &str = "CRISIS_API_URL";
pub const SOCKET_URL_VAR: &str = "CRISIS_SOCKET_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000/ws";

/// Used when the browser refuses or fails to report a position (New Delhi).
pub const DEFAULT_LOCATION: LatLng = LatLng::new(28.6139, 77.2090);

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// REST base, without a trailing slash
    pub api_url: String,
    pub socket_url: String,
    pub reconnect_attempts: u64,
    pub reconnect_delay_ms: u64,
    /// Responder location pulse period
    pub location_interval_ms: u64,
    /// Re-announce the selected incident room after a reconnect
    pub rejoin_rooms_on_reconnect: bool,
    pub nearby_radius_m: f64,
    pub default_location: LatLng,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
            location_interval_ms: 10_000,
            rejoin_rooms_on_reconnect: true,
            nearby_radius_m: 5000.0,
            default_location: DEFAULT_LOCATION,
        }
    }
}

impl ClientConfig {
    /// Endpoints captured by the compiler from the build environment.
    pub fn from_build_env() -> Result<Self> {
        Self::from_lookup(|key| match key {
            API_URL_VAR => option_env!("CRISIS_API_URL").map(str::to_string),
            SOCKET_URL_VAR => option_env!("CRISIS_SOCKET_URL").map(str::to_string),
            _ => None,
        })
    }

    /// Endpoints from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(api_url) = lookup(API_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.api_url = api_url;
        }
        if let Some(socket_url) = lookup(SOCKET_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.socket_url = socket_url;
        }
        config.validated()
    }

    /// Check both endpoints and normalize the REST base.
    pub fn validated(mut self) -> Result<Self> {
        let api = Url::parse(self.api_url.trim())?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "{API_URL_VAR} must be http(s), got '{}'",
                api.scheme()
            )));
        }
        let socket = Url::parse(self.socket_url.trim())?;
        if !matches!(socket.scheme(), "ws" | "wss") {
            return Err(ClientError::Config(format!(
                "{SOCKET_URL_VAR} must be ws(s), got '{}'",
                socket.scheme()
            )));
        }

        self.api_url = api.as_str().trim_end_matches('/').to_string();
        self.socket_url = socket.to_string();
        Ok(self)
    }

    /// Absolute URL for a REST path such as `/incidents/7`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.api_url, "http://localhost:5000/api");
        assert_eq!(config.reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert_eq!(config.location_interval_ms, 10_000);
        assert!(config.rejoin_rooms_on_reconnect);
    }

    #[test]
    fn test_lookup_overrides_and_normalizes() {
        let config = ClientConfig::from_lookup(|key| match key {
            API_URL_VAR => Some("https://crisis.example.org/api/".to_string()),
            SOCKET_URL_VAR => Some("wss://crisis.example.org/ws".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.api_url, "https://crisis.example.org/api");
        assert_eq!(config.endpoint("/incidents/7"), "https://crisis.example.org/api/incidents/7");
    }

    #[test]
    fn test_wrong_scheme_is_a_config_error() {
        let res = ClientConfig::from_lookup(|key| {
            (key == SOCKET_URL_VAR).then(|| "http://localhost:5000".to_string())
        });
        assert!(matches!(res, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_blank_value_falls_back_to_default() {
        let config = ClientConfig::from_lookup(|_| Some("  ".to_string())).unwrap();
        assert_eq!(config.socket_url, DEFAULT_SOCKET_URL);
    }
}
