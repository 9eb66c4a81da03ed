//! Polyline representation for route geometries.
//!
//! One polyline is the geometry segment of one request window. The display
//! route is the concatenation of segments in tour order.

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// A route geometry as decoded (latitude, longitude) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Creates a polyline from (latitude, longitude) points.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Straight segments through the given waypoints.
    pub fn straight_line(waypoints: &[Coordinate]) -> Self {
        Self {
            points: waypoints.iter().map(|c| (c.lat, c.lon)).collect(),
        }
    }

    /// Returns the decoded points.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the polyline has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consumes the polyline, returning its points.
    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }
}

impl From<Vec<Coordinate>> for Polyline {
    fn from(path: Vec<Coordinate>) -> Self {
        Self::straight_line(&path)
    }
}

/// Joins window segments into one path, dropping the point shared by
/// consecutive windows.
pub fn concat(segments: &[Polyline]) -> Polyline {
    let mut points: Vec<(f64, f64)> = Vec::new();
    for segment in segments {
        let skip = match (points.last(), segment.points.first()) {
            (Some(last), Some(first)) if last == first => 1,
            _ => 0,
        };
        points.extend(segment.points.iter().skip(skip));
    }
    Polyline { points }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_keeps_order() {
        let waypoints = [Coordinate::new(38.5, -120.2), Coordinate::new(40.7, -120.95)];
        let polyline = Polyline::straight_line(&waypoints);
        assert_eq!(polyline.points(), &[(38.5, -120.2), (40.7, -120.95)]);
    }

    #[test]
    fn test_empty_polyline() {
        let polyline = Polyline::new(vec![]);
        assert!(polyline.is_empty());
    }

    #[test]
    fn test_concat_drops_shared_boundary_point() {
        let first = Polyline::new(vec![(1.0, 1.0), (2.0, 2.0)]);
        let second = Polyline::new(vec![(2.0, 2.0), (3.0, 3.0)]);
        let joined = concat(&[first, second]);
        assert_eq!(joined.into_points(), vec![(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
    }

    #[test]
    fn test_serializes_as_point_list() {
        let polyline = Polyline::new(vec![(1.5, 2.5)]);
        let json = serde_json::to_string(&polyline).unwrap();
        assert_eq!(json, "[[1.5,2.5]]");
    }
}
