//! In-memory service doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tour_planner::config::PlannerConfig;
use tour_planner::error::ServiceError;
use tour_planner::geometry::GeometryOptions;
use tour_planner::haversine::HaversineEstimator;
use tour_planner::matrix::MatrixOptions;
use tour_planner::retry::RetryPolicy;
use tour_planner::traits::{RouteGeometryService, TableRequest, TravelTimeService};
use tour_planner::Coordinate;

/// Haversine table that fails whenever `fail_if` matches the request.
pub struct FlakyTable {
    inner: HaversineEstimator,
    fail_if: fn(&TableRequest<'_>) -> bool,
    failure: fn() -> ServiceError,
    calls: AtomicUsize,
}

impl FlakyTable {
    /// Fails with a retryable 503.
    pub fn new(fail_if: fn(&TableRequest<'_>) -> bool) -> Self {
        Self {
            inner: HaversineEstimator::default(),
            fail_if,
            failure: || ServiceError::Status { status: 503 },
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails with a malformed response, which is never retried.
    pub fn rejecting(fail_if: fn(&TableRequest<'_>) -> bool) -> Self {
        Self {
            failure: || ServiceError::Malformed("truncated body".to_string()),
            ..Self::new(fail_if)
        }
    }

    pub fn reliable() -> Self {
        Self::new(|_| false)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TravelTimeService for FlakyTable {
    fn durations(&self, request: &TableRequest<'_>) -> Result<Vec<Vec<Option<f64>>>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if (self.fail_if)(request) {
            return Err((self.failure)());
        }
        self.inner.durations(request)
    }
}

/// Haversine table reporting no route for the cells `gap` matches. Indices
/// are positions within the request.
pub struct GappyTable {
    inner: HaversineEstimator,
    gap: fn(usize, usize) -> bool,
}

impl GappyTable {
    pub fn new(gap: fn(usize, usize) -> bool) -> Self {
        Self {
            inner: HaversineEstimator::default(),
            gap,
        }
    }
}

impl TravelTimeService for GappyTable {
    fn durations(&self, request: &TableRequest<'_>) -> Result<Vec<Vec<Option<f64>>>, ServiceError> {
        let mut rows = self.inner.durations(request)?;
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                if (self.gap)(i, j) {
                    *cell = None;
                }
            }
        }
        Ok(rows)
    }
}

/// Route service returning the waypoints with a midpoint between each pair,
/// or failing for requests matched by `fail_if`.
pub struct FakeRoutes {
    fail_if: fn(&[Coordinate]) -> bool,
    calls: AtomicUsize,
}

impl FakeRoutes {
    pub fn new(fail_if: fn(&[Coordinate]) -> bool) -> Self {
        Self {
            fail_if,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reliable() -> Self {
        Self::new(|_| false)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn road_path(waypoints: &[Coordinate]) -> Vec<Coordinate> {
        let mut path = Vec::new();
        for pair in waypoints.windows(2) {
            path.push(pair[0]);
            path.push(Coordinate::new(
                (pair[0].lat + pair[1].lat) / 2.0,
                (pair[0].lon + pair[1].lon) / 2.0,
            ));
        }
        if let Some(last) = waypoints.last() {
            path.push(*last);
        }
        path
    }
}

impl RouteGeometryService for FakeRoutes {
    fn route(&self, waypoints: &[Coordinate]) -> Result<Vec<Coordinate>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if (self.fail_if)(waypoints) {
            return Err(ServiceError::Status { status: 502 });
        }
        Ok(Self::road_path(waypoints))
    }
}

pub fn fast_matrix_options(batch_size: usize) -> MatrixOptions {
    MatrixOptions {
        batch_size,
        pause: Duration::ZERO,
        retry: RetryPolicy::immediate(3),
        ..MatrixOptions::default()
    }
}

pub fn fast_geometry_options(waypoints_per_call: usize) -> GeometryOptions {
    GeometryOptions {
        waypoints_per_call,
        pause: Duration::ZERO,
        retry: RetryPolicy::immediate(3),
        ..GeometryOptions::default()
    }
}

pub fn fast_config() -> PlannerConfig {
    PlannerConfig {
        matrix: fast_matrix_options(50),
        geometry: fast_geometry_options(80),
        time_limit: Duration::from_secs(5),
        ..PlannerConfig::default()
    }
}
