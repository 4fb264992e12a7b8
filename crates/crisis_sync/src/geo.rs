//! Distance helpers and the geolocation fallback.

use crisis_common::LatLng;

use crate::error::ClientError;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// `"0.8 km"` below ten kilometres, `"12 km"` above.
pub fn format_distance(metres: f64) -> String {
    let km = metres / 1000.0;
    if km < 10.0 {
        format!("{km:.1} km")
    } else {
        format!("{km:.0} km")
    }
}

/// Where a position came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fix {
    Device(LatLng),
    /// The device could not report; the view runs in degraded mode.
    Fallback(LatLng),
}

impl Fix {
    pub fn position(&self) -> LatLng {
        match *self {
            Fix::Device(p) | Fix::Fallback(p) => p,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fix::Fallback(_))
    }
}

/// Collapse a geolocation result into a usable position.
pub fn resolve_position(reading: Result<LatLng, ClientError>, fallback: LatLng) -> Fix {
    match reading {
        Ok(position) => Fix::Device(position),
        Err(e) => {
            log::warn!("Geolocation unavailable, using default location: {e}");
            Fix::Fallback(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Connaught Place to India Gate is a little under 2.5 km.
        let cp = LatLng::new(28.6315, 77.2167);
        let gate = LatLng::new(28.6129, 77.2295);
        let d = haversine_m(cp, gate);
        assert!((2300.0..2500.0).contains(&d), "got {d}");
        assert_eq!(haversine_m(cp, cp), 0.0);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(812.0), "0.8 km");
        assert_eq!(format_distance(2_140.0), "2.1 km");
        assert_eq!(format_distance(12_300.0), "12 km");
    }

    #[test]
    fn test_denied_geolocation_falls_back() {
        let fallback = LatLng::new(28.6139, 77.2090);
        let fix = resolve_position(Err(ClientError::Geolocation("denied".into())), fallback);
        assert!(fix.is_degraded());
        assert_eq!(fix.position(), fallback);
    }
}
