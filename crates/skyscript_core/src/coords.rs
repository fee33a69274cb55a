//! Conversion between geodetic world coordinates and the host's local frame.
//!
//! The local frame is a Cartesian system in meters around a reference origin
//! owned by the host. The origin may move between frames, so a converted
//! point is only meaningful for the frame it was computed in.

use crate::error::{BridgeError, Result};
use crate::host::Host;
use serde::{Deserialize, Serialize};

/// Round-trip tolerance for latitude and longitude, in degrees.
pub const LATLON_TOLERANCE_DEG: f64 = 1e-7;
/// Round-trip tolerance for altitude and local axes, in meters.
pub const ALTITUDE_TOLERANCE_M: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above mean sea level.
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalCoordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldCoordinates {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Within round-trip tolerance of `other`.
    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.latitude - other.latitude).abs() <= LATLON_TOLERANCE_DEG
            && (self.longitude - other.longitude).abs() <= LATLON_TOLERANCE_DEG
            && (self.altitude - other.altitude).abs() <= ALTITUDE_TOLERANCE_M
    }
}

impl LocalCoordinates {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() <= ALTITUDE_TOLERANCE_M
            && (self.y - other.y).abs() <= ALTITUDE_TOLERANCE_M
            && (self.z - other.z).abs() <= ALTITUDE_TOLERANCE_M
    }
}

pub fn world_to_local<H: Host>(host: &H, world: WorldCoordinates) -> Result<LocalCoordinates> {
    finite("latitude", world.latitude)?;
    finite("longitude", world.longitude)?;
    finite("altitude", world.altitude)?;
    if !(-90.0..=90.0).contains(&world.latitude) {
        return Err(BridgeError::invalid(
            "latitude",
            format!("{} is outside [-90, 90]", world.latitude),
        ));
    }
    let (x, y, z) = host.world_to_local(world.latitude, world.longitude, world.altitude);
    Ok(LocalCoordinates { x, y, z })
}

pub fn local_to_world<H: Host>(host: &H, local: LocalCoordinates) -> Result<WorldCoordinates> {
    finite("x", local.x)?;
    finite("y", local.y)?;
    finite("z", local.z)?;
    let (latitude, longitude, altitude) = host.local_to_world(local.x, local.y, local.z);
    Ok(WorldCoordinates {
        latitude,
        longitude,
        altitude,
    })
}

fn finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BridgeError::invalid(name, format!("{value} is not finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sim::SimHost;

    #[test]
    fn test_round_trip_near_origin() {
        let host = SimHost::new().with_origin(47.4647, -122.3144);
        let points = [
            WorldCoordinates::new(47.4647, -122.3144, 0.0),
            WorldCoordinates::new(47.4502, -122.3088, 132.5),
            WorldCoordinates::new(47.6062, -122.3321, 1500.0),
            WorldCoordinates::new(46.9, -121.7, 4392.0),
        ];
        for world in points {
            let local = world_to_local(&host, world).unwrap();
            let back = local_to_world(&host, local).unwrap();
            assert!(back.approx_eq(&world), "{world:?} came back as {back:?}");
        }
    }

    #[test]
    fn test_local_axes() {
        let host = SimHost::new().with_origin(0.0, 0.0);
        let north = world_to_local(&host, WorldCoordinates::new(0.01, 0.0, 0.0)).unwrap();
        assert!(north.z < -1000.0, "north should be -z, got {north:?}");
        let east = world_to_local(&host, WorldCoordinates::new(0.0, 0.01, 0.0)).unwrap();
        assert!(east.x > 1000.0, "east should be +x, got {east:?}");
        let up = world_to_local(&host, WorldCoordinates::new(0.0, 0.0, 100.0)).unwrap();
        assert!((up.y - 100.0).abs() < ALTITUDE_TOLERANCE_M);
    }

    #[test]
    fn test_non_finite_rejected() {
        let host = SimHost::new();
        let err = world_to_local(&host, WorldCoordinates::new(f64::NAN, 0.0, 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err =
            local_to_world(&host, LocalCoordinates::new(0.0, f64::INFINITY, 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(world_to_local(&host, WorldCoordinates::new(95.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_serializes_with_script_field_names() {
        let json = serde_json::to_value(WorldCoordinates::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json["latitude"], 1.0);
        assert_eq!(json["longitude"], 2.0);
        assert_eq!(json["altitude"], 3.0);
    }
}
