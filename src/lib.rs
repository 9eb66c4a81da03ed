//! tour-planner core
//!
//! Plans a visiting order over geocoded sites using road travel times:
//! batched travel-time matrix, tour optimization under a time budget,
//! itinerary assembly and windowed road geometry.

pub mod config;
pub mod coordinate;
pub mod error;
pub mod geometry;
pub mod haversine;
pub mod itinerary;
pub mod matrix;
pub mod osrm;
pub mod planner;
pub mod polyline;
pub mod retry;
pub mod solver;
pub mod throttle;
pub mod traits;

pub use coordinate::Coordinate;
pub use error::{ConfigError, PlanError, ServiceError};
pub use matrix::{MatrixBuild, MatrixBuilder, TravelTimeMatrix, UNREACHABLE_SECS};
pub use planner::{Plan, PlanRequest, Planner, StartPoint};
pub use solver::{TourConstraint, TourShape, TourSolution, solve};
