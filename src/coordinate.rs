//! Geographic coordinate captured from the upstream site table.

use serde::{Deserialize, Serialize};

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// OSRM wants `lon,lat` with a fixed precision.
    pub fn to_osrm(&self) -> String {
        format!("{:.6},{:.6}", self.lon, self.lat)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(coordinate: Coordinate) -> Self {
        (coordinate.lat, coordinate.lon)
    }
}
