//! Road geometry for a computed tour.
//!
//! The ordered stops are cut into overlapping windows (consecutive windows
//! share one point) and each window is routed on its own. A window that
//! cannot be routed falls back to straight lines through its stops.

use std::ops::Range;
use std::time::Duration;

use tracing::{debug, warn};

use crate::coordinate::Coordinate;
use crate::error::ServiceError;
use crate::polyline::Polyline;
use crate::retry::RetryPolicy;
use crate::throttle::{Pacer, run_bounded};
use crate::traits::RouteGeometryService;

#[derive(Debug, Clone)]
pub struct GeometryOptions {
    /// Waypoints per route request.
    pub waypoints_per_call: usize,
    /// Start-to-start spacing between route requests, as in
    /// [`MatrixOptions::pause`](crate::matrix::MatrixOptions::pause).
    pub pause: Duration,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            waypoints_per_call: 80,
            pause: Duration::from_secs(1),
            max_in_flight: 1,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct GeometryFetcher<'a, G: RouteGeometryService> {
    service: &'a G,
    options: GeometryOptions,
    pacer: Pacer,
}

impl<'a, G: RouteGeometryService> GeometryFetcher<'a, G> {
    pub fn new(service: &'a G, options: GeometryOptions) -> Self {
        let pacer = Pacer::new(options.pause);
        Self {
            service,
            options,
            pacer,
        }
    }

    /// One segment per window, in tour order. Never fails; unroutable
    /// windows become straight lines.
    pub fn fetch(&self, coordinates: &[Coordinate], tour: &[usize]) -> Vec<Polyline> {
        if tour.len() < 2 {
            return Vec::new();
        }

        let ordered: Vec<Coordinate> = tour.iter().map(|&index| coordinates[index]).collect();
        let windows = window_bounds(ordered.len(), self.options.waypoints_per_call);
        debug!(stops = ordered.len(), windows = windows.len(), "fetching route geometry");

        run_bounded(&windows, self.options.max_in_flight, |index, window| {
            let waypoints = &ordered[window.clone()];
            let result = self.options.retry.run("route", || {
                self.pacer.wait();
                self.service.route(waypoints)
            });
            match result {
                Ok(path) if path.len() >= 2 => Polyline::from(path),
                Ok(_) => {
                    warn!(window = index, "route geometry is empty, using straight lines");
                    Polyline::straight_line(waypoints)
                }
                Err(err) => {
                    warn!(window = index, error = %err, "route geometry failed, using straight lines");
                    Polyline::straight_line(waypoints)
                }
            }
        })
    }
}

/// Offline route service: the path is the waypoints themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineRoutes;

impl RouteGeometryService for StraightLineRoutes {
    fn route(&self, waypoints: &[Coordinate]) -> Result<Vec<Coordinate>, ServiceError> {
        Ok(waypoints.to_vec())
    }
}

/// Windows of at most `size` points over `n` ordered points, each starting
/// on the last point of the previous one.
pub fn window_bounds(n: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(2);
    let mut windows = Vec::new();
    let mut start = 0;
    while start + 1 < n {
        let end = (start + size).min(n);
        windows.push(start..end);
        start = end - 1;
    }
    windows
}
