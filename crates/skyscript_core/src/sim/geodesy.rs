//! WGS-84 geodesy for the simulated host.
//!
//! Local frame: origin on the ellipsoid at the reference point, x east,
//! y up, z south (OpenGL convention, -z points north).

use glam::DVec3;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const ECCENTRICITY_SQ: f64 = FLATTENING * (2.0 - FLATTENING);

/// Dipole model of the geomagnetic north pole.
const MAGNETIC_POLE_LAT: f64 = 80.65;
const MAGNETIC_POLE_LON: f64 = -72.68;

pub fn geodetic_to_ecef(latitude: f64, longitude: f64, altitude: f64) -> DVec3 {
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
    let n = SEMI_MAJOR_AXIS / (1.0 - ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
    DVec3::new(
        (n + altitude) * cos_lat * cos_lon,
        (n + altitude) * cos_lat * sin_lon,
        (n * (1.0 - ECCENTRICITY_SQ) + altitude) * sin_lat,
    )
}

pub fn ecef_to_geodetic(ecef: DVec3) -> (f64, f64, f64) {
    let p = ecef.x.hypot(ecef.y);
    let longitude = ecef.y.atan2(ecef.x);
    let mut latitude = ecef.z.atan2(p * (1.0 - ECCENTRICITY_SQ));

    for _ in 0..16 {
        let sin_lat = latitude.sin();
        let n = SEMI_MAJOR_AXIS / (1.0 - ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        let next = (ecef.z + ECCENTRICITY_SQ * n * sin_lat).atan2(p);
        let converged = (next - latitude).abs() < 1e-15;
        latitude = next;
        if converged {
            break;
        }
    }

    let (sin_lat, cos_lat) = latitude.sin_cos();
    let altitude = p * cos_lat + ecef.z * sin_lat
        - SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
    (latitude.to_degrees(), longitude.to_degrees(), altitude)
}

/// Tangent-plane frame anchored at a reference point.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    latitude: f64,
    longitude: f64,
    origin: DVec3,
    east: DVec3,
    north: DVec3,
    up: DVec3,
}

impl LocalFrame {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
        Self {
            latitude,
            longitude,
            origin: geodetic_to_ecef(latitude, longitude, 0.0),
            east: DVec3::new(-sin_lon, cos_lon, 0.0),
            north: DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
            up: DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
        }
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn to_local(&self, latitude: f64, longitude: f64, altitude: f64) -> DVec3 {
        let d = geodetic_to_ecef(latitude, longitude, altitude) - self.origin;
        DVec3::new(d.dot(self.east), d.dot(self.up), -d.dot(self.north))
    }

    pub fn to_world(&self, local: DVec3) -> (f64, f64, f64) {
        let ecef = self.origin + self.east * local.x + self.up * local.y - self.north * local.z;
        ecef_to_geodetic(ecef)
    }
}

/// Declination in degrees, east positive, in `(-180, 180]`.
///
/// Taken as the initial great-circle bearing towards the dipole pole.
pub fn magnetic_variation(latitude: f64, longitude: f64) -> f64 {
    let phi1 = latitude.to_radians();
    let phi2 = MAGNETIC_POLE_LAT.to_radians();
    let delta = (MAGNETIC_POLE_LON - longitude).to_radians();
    let y = delta.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta.cos();
    y.atan2(x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecef_round_trip() {
        let points = [(0.0, 0.0, 0.0), (47.46, -122.31, 132.5), (-33.9, 151.2, 10_000.0)];
        for (lat, lon, alt) in points {
            let (back_lat, back_lon, back_alt) = ecef_to_geodetic(geodetic_to_ecef(lat, lon, alt));
            assert!((back_lat - lat).abs() < 1e-9);
            assert!((back_lon - lon).abs() < 1e-9);
            assert!((back_alt - alt).abs() < 1e-6);
        }
    }

    #[test]
    fn test_origin_maps_to_zero() {
        let frame = LocalFrame::new(47.4647, -122.3144);
        let local = frame.to_local(47.4647, -122.3144, 0.0);
        assert!(local.length() < 1e-6);
    }

    #[test]
    fn test_variation_sign() {
        // West coast of North America points east of true north to the pole
        assert!(magnetic_variation(47.46, -122.31) > 0.0);
        // Europe points west
        assert!(magnetic_variation(51.47, -0.45) < 0.0);
    }
}
