//! Haversine travel-time estimator (fallback when OSRM is unavailable).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than OSRM (ignores roads) but always available.

use crate::coordinate::Coordinate;
use crate::error::ServiceError;
use crate::traits::{TableRequest, TravelTimeService};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Straight-line to road distance ratio.
const DEFAULT_ROAD_COEFFICIENT: f64 = 1.3;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in meters.
pub fn distance_m(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c * 1000.0
}

/// Haversine-based travel-time service.
///
/// Estimates travel time using straight-line distance, a road coefficient
/// and an assumed speed. Every pair is reachable.
#[derive(Debug, Clone)]
pub struct HaversineEstimator {
    /// Assumed average speed in km/h.
    pub speed_kmh: f64,
    pub road_coefficient: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            road_coefficient: DEFAULT_ROAD_COEFFICIENT,
        }
    }
}

impl HaversineEstimator {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_kmh,
            ..Self::default()
        }
    }

    /// Travel time in seconds for a straight-line distance in meters.
    fn seconds_for(&self, meters: f64) -> f64 {
        let road_km = meters / 1000.0 * self.road_coefficient;
        road_km / self.speed_kmh * 3600.0
    }
}

impl TravelTimeService for HaversineEstimator {
    fn durations(&self, request: &TableRequest<'_>) -> Result<Vec<Vec<Option<f64>>>, ServiceError> {
        let all: Vec<usize> = (0..request.coordinates.len()).collect();
        let sources = request.sources.as_deref().unwrap_or(&all);
        let destinations = request.destinations.as_deref().unwrap_or(&all);

        sources
            .iter()
            .map(|&i| {
                destinations
                    .iter()
                    .map(|&j| {
                        let from = request.coordinates.get(i).copied();
                        let to = request.coordinates.get(j).copied();
                        match (from, to) {
                            (Some(from), Some(to)) => {
                                Ok(Some(self.seconds_for(distance_m(from, to))))
                            }
                            _ => Err(ServiceError::Malformed(format!(
                                "index pair ({}, {}) outside {} coordinates",
                                i,
                                j,
                                request.coordinates.len()
                            ))),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }
}
