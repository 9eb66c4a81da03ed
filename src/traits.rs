//! Seams between the planner and its collaborators.
//!
//! These are intentionally narrow. The OSRM client, the haversine estimator
//! and in-memory test doubles implement the service traits; alternative
//! search engines implement [`TourSolver`].

use std::time::Instant;

use crate::coordinate::Coordinate;
use crate::error::ServiceError;
use crate::matrix::TravelTimeMatrix;
use crate::solver::{TourConstraint, TourSolution};

/// One pairwise travel-time query.
///
/// `sources` and `destinations` index into `coordinates`; `None` means all.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRequest<'a> {
    pub coordinates: &'a [Coordinate],
    pub sources: Option<Vec<usize>>,
    pub destinations: Option<Vec<usize>>,
}

impl<'a> TableRequest<'a> {
    pub fn all_pairs(coordinates: &'a [Coordinate]) -> Self {
        Self {
            coordinates,
            sources: None,
            destinations: None,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources
            .as_ref()
            .map_or(self.coordinates.len(), |sources| sources.len())
    }

    pub fn destination_count(&self) -> usize {
        self.destinations
            .as_ref()
            .map_or(self.coordinates.len(), |destinations| destinations.len())
    }
}

/// Provides directed travel durations between coordinates.
///
/// Rows follow `sources`, columns follow `destinations`. A `None` cell means
/// the service could not route that pair.
pub trait TravelTimeService: Sync {
    fn durations(&self, request: &TableRequest<'_>) -> Result<Vec<Vec<Option<f64>>>, ServiceError>;
}

/// Provides the road path through an ordered list of waypoints.
pub trait RouteGeometryService: Sync {
    fn route(&self, waypoints: &[Coordinate]) -> Result<Vec<Coordinate>, ServiceError>;
}

/// Computes a visiting order over a travel-time matrix.
///
/// Implementations must return a complete tour by `deadline`.
pub trait TourSolver {
    fn solve(
        &self,
        matrix: &TravelTimeMatrix,
        constraint: &TourConstraint,
        deadline: Instant,
    ) -> TourSolution;
}
