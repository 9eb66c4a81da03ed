//! One planning request end to end: sites in, itinerary and geometry out.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::coordinate::Coordinate;
use crate::error::PlanError;
use crate::geometry::GeometryFetcher;
use crate::haversine::distance_m;
use crate::itinerary::{ItineraryStop, RouteSummary, Site, assemble};
use crate::matrix::MatrixBuilder;
use crate::polyline::Polyline;
use crate::solver::{GuidedLocalSearch, SolveStatus, TourConstraint, TourShape, deadline_after};
use crate::traits::{RouteGeometryService, TourSolver, TravelTimeService};

/// Id given to a custom start that does not match any site.
pub const START_SITE_ID: &str = "START_POINT";

/// User-chosen place to start the tour from.
#[derive(Debug, Clone, PartialEq)]
pub struct StartPoint {
    pub label: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub shape: TourShape,
    pub start: Option<StartPoint>,
    /// Overrides the configured solver budget.
    pub time_limit: Option<Duration>,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            shape: TourShape::Open,
            start: None,
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanWarning {
    NotEnoughSites { routable: usize },
    UnreachablePairs { fraction: f64 },
    FailedBatches { failed: usize, total: usize },
    SolverFallback,
    GeometrySkipped { stops: usize, limit: usize },
}

#[derive(Debug, Clone)]
pub struct Plan {
    /// Sites the tour indexes into, including a spliced start point.
    pub sites: Vec<Site>,
    pub tour: Vec<usize>,
    pub total_secs: i64,
    pub status: SolveStatus,
    pub itinerary: Vec<ItineraryStop<Site>>,
    /// `None` when geometry was skipped.
    pub geometry: Option<Vec<Polyline>>,
    pub summary: RouteSummary,
    pub warnings: Vec<PlanWarning>,
}

pub struct Planner<'a, T, G, S = GuidedLocalSearch>
where
    T: TravelTimeService,
    G: RouteGeometryService,
    S: TourSolver,
{
    table: &'a T,
    routes: &'a G,
    solver: S,
    config: PlannerConfig,
}

impl<'a, T, G> Planner<'a, T, G>
where
    T: TravelTimeService,
    G: RouteGeometryService,
{
    pub fn new(table: &'a T, routes: &'a G, config: PlannerConfig) -> Self {
        let solver = GuidedLocalSearch::new(config.search.clone());
        Self::with_solver(table, routes, solver, config)
    }
}

impl<'a, T, G, S> Planner<'a, T, G, S>
where
    T: TravelTimeService,
    G: RouteGeometryService,
    S: TourSolver,
{
    pub fn with_solver(table: &'a T, routes: &'a G, solver: S, config: PlannerConfig) -> Self {
        Self {
            table,
            routes,
            solver,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, sites: &[Site], request: &PlanRequest) -> Result<Plan, PlanError> {
        if let Some(site) = sites
            .iter()
            .find(|site| !site.latitude.is_finite() || !site.longitude.is_finite())
        {
            return Err(PlanError::InvalidCoordinate {
                id: site.site_id.clone(),
            });
        }
        if sites.len() > self.config.max_sites {
            return Err(PlanError::TooManySites {
                count: sites.len(),
                limit: self.config.max_sites,
            });
        }

        let closed_loop = request.shape == TourShape::Closed;
        if sites.len() < 2 {
            warn!(routable = sites.len(), "not enough sites for a route");
            return Ok(Plan {
                sites: sites.to_vec(),
                tour: Vec::new(),
                total_secs: 0,
                status: SolveStatus::Trivial,
                itinerary: Vec::new(),
                geometry: None,
                summary: RouteSummary::new(0, 0, closed_loop),
                warnings: vec![PlanWarning::NotEnoughSites {
                    routable: sites.len(),
                }],
            });
        }

        let mut sites = sites.to_vec();
        let start = request
            .start
            .as_ref()
            .map(|start| splice_start(&mut sites, start, self.config.start_tolerance_m));
        let coordinates: Vec<Coordinate> = sites.iter().map(Site::coordinate).collect();
        let mut warnings = Vec::new();

        info!(points = coordinates.len(), "computing travel-time matrix");
        let build = MatrixBuilder::new(self.table, self.config.matrix.clone()).build(&coordinates);
        if build.failed_batches > 0 {
            warnings.push(PlanWarning::FailedBatches {
                failed: build.failed_batches,
                total: build.batches,
            });
        }
        if build.quality_warning {
            warnings.push(PlanWarning::UnreachablePairs {
                fraction: build.unreachable_fraction,
            });
        }

        let constraint = TourConstraint {
            shape: request.shape,
            start,
        };
        let time_limit = request.time_limit.unwrap_or(self.config.time_limit);
        info!(
            time_limit_secs = time_limit.as_secs_f64(),
            open = !closed_loop,
            start = ?start,
            "solving tour"
        );
        let solution = self
            .solver
            .solve(&build.matrix, &constraint, deadline_after(time_limit));
        if solution.status == SolveStatus::Fallback {
            warnings.push(PlanWarning::SolverFallback);
        }

        let itinerary = assemble(&sites, &solution.tour, &build.matrix);

        let geometry = if solution.tour.len() <= self.config.geometry_max_sites {
            let fetcher = GeometryFetcher::new(self.routes, self.config.geometry.clone());
            Some(fetcher.fetch(&coordinates, &solution.tour))
        } else {
            warnings.push(PlanWarning::GeometrySkipped {
                stops: solution.tour.len(),
                limit: self.config.geometry_max_sites,
            });
            None
        };

        let summary = RouteSummary::new(solution.tour.len(), solution.total_cost, closed_loop);
        info!(
            visited = summary.visited_sites,
            total_minutes = summary.total_minutes,
            status = ?solution.status,
            "route planned"
        );

        Ok(Plan {
            sites,
            tour: solution.tour,
            total_secs: solution.total_cost,
            status: solution.status,
            itinerary,
            geometry,
            summary,
            warnings,
        })
    }
}

/// Returns the index the tour must start from. A start within
/// `tolerance_m` of an existing site reuses that site; otherwise a synthetic
/// site is inserted at index 0.
pub fn splice_start(sites: &mut Vec<Site>, start: &StartPoint, tolerance_m: f64) -> usize {
    if let Some(index) = sites
        .iter()
        .position(|site| distance_m(site.coordinate(), start.coordinate) <= tolerance_m)
    {
        info!(index, site = %sites[index].site_id, "start point matches an existing site");
        return index;
    }

    let label = if start.label.trim().is_empty() {
        format!(
            "Start point ({:.4}, {:.4})",
            start.coordinate.lat, start.coordinate.lon
        )
    } else {
        start.label.clone()
    };
    info!(label = %label, "start point added");
    sites.insert(
        0,
        Site::new(START_SITE_ID, label, start.coordinate.lat, start.coordinate.lon),
    );
    0
}
