//! Itinerary assembly, summary statistics and CSV export.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::matrix::TravelTimeMatrix;

/// A geocoded, deduplicated site from the upstream table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    /// People working at the site.
    #[serde(default)]
    pub headcount: u32,
}

impl Site {
    pub fn new(site_id: impl Into<String>, label: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            site_id: site_id.into(),
            label: label.into(),
            latitude,
            longitude,
            headcount: 0,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryStop<S> {
    /// 1-based position in the tour.
    pub order: usize,
    pub site: S,
    pub segment_secs: i64,
    pub cumulative_secs: i64,
}

impl<S> ItineraryStop<S> {
    pub fn segment_minutes(&self) -> f64 {
        round_to(self.segment_secs as f64 / 60.0, 1)
    }

    pub fn cumulative_minutes(&self) -> f64 {
        round_to(self.cumulative_secs as f64 / 60.0, 1)
    }

    pub fn cumulative_hours(&self) -> f64 {
        round_to(self.cumulative_secs as f64 / 3600.0, 2)
    }
}

/// Pairs each tour position with its site and travel times.
pub fn assemble<S: Clone>(sites: &[S], tour: &[usize], matrix: &TravelTimeMatrix) -> Vec<ItineraryStop<S>> {
    let mut cumulative = 0;
    tour.iter()
        .enumerate()
        .map(|(position, &index)| {
            let segment = if position == 0 {
                0
            } else {
                matrix.get(tour[position - 1], index)
            };
            cumulative += segment;
            ItineraryStop {
                order: position + 1,
                site: sites[index].clone(),
                segment_secs: segment,
                cumulative_secs: cumulative,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub visited_sites: usize,
    pub total_secs: i64,
    pub total_minutes: f64,
    pub total_hours: f64,
    pub avg_segment_minutes: f64,
    pub closed_loop: bool,
}

impl RouteSummary {
    /// `total_secs` is the optimizer's cost, which includes the return edge
    /// of a closed loop.
    pub fn new(visited_sites: usize, total_secs: i64, closed_loop: bool) -> Self {
        let total_minutes = total_secs as f64 / 60.0;
        let segments = visited_sites.saturating_sub(1).max(1);
        Self {
            visited_sites,
            total_secs,
            total_minutes: round_to(total_minutes, 1),
            total_hours: round_to(total_secs as f64 / 3600.0, 2),
            avg_segment_minutes: round_to(total_minutes / segments as f64, 1),
            closed_loop,
        }
    }
}

#[derive(Debug, Serialize)]
struct StopRow<'a> {
    visit_order: usize,
    site_id: &'a str,
    label: &'a str,
    latitude: f64,
    longitude: f64,
    headcount: u32,
    segment_s: i64,
    segment_min: f64,
    cumul_s: i64,
    cumul_min: f64,
    cumul_h: f64,
}

/// Writes the itinerary as CSV with a header row.
pub fn write_csv<W: Write>(stops: &[ItineraryStop<Site>], writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    for stop in stops {
        out.serialize(StopRow {
            visit_order: stop.order,
            site_id: &stop.site.site_id,
            label: &stop.site.label,
            latitude: stop.site.latitude,
            longitude: stop.site.longitude,
            headcount: stop.site.headcount,
            segment_s: stop.segment_secs,
            segment_min: stop.segment_minutes(),
            cumul_s: stop.cumulative_secs,
            cumul_min: stop.cumulative_minutes(),
            cumul_h: stop.cumulative_hours(),
        })?;
    }
    out.flush()?;
    Ok(())
}

pub fn export_csv(stops: &[ItineraryStop<Site>], path: &Path) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    write_csv(stops, file)
}

/// Reads sites from a CSV with `site_id,label,latitude,longitude[,headcount]`.
pub fn read_sites<R: std::io::Read>(reader: R) -> Result<Vec<Site>, csv::Error> {
    csv::Reader::from_reader(reader).deserialize().collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites() -> Vec<Site> {
        vec![
            Site::new("a", "A", 48.85, 2.35),
            Site::new("b", "B", 48.86, 2.36),
            Site::new("c", "C", 48.87, 2.37),
        ]
    }

    fn matrix() -> TravelTimeMatrix {
        TravelTimeMatrix::from_rows(vec![vec![0, 90, 600], vec![95, 0, 30], vec![610, 45, 0]])
    }

    #[test]
    fn test_assemble_accumulates_in_tour_order() {
        let stops = assemble(&sites(), &[2, 1, 0], &matrix());
        let ids: Vec<&str> = stops.iter().map(|s| s.site.site_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(stops[0].segment_secs, 0);
        assert_eq!(stops[1].segment_secs, 45);
        assert_eq!(stops[2].segment_secs, 95);
        assert_eq!(stops[2].cumulative_secs, 140);
        assert_eq!(stops[2].order, 3);
    }

    #[test]
    fn test_minutes_and_hours_rounding() {
        let stop = ItineraryStop {
            order: 1,
            site: (),
            segment_secs: 95,
            cumulative_secs: 5400,
        };
        assert_eq!(stop.segment_minutes(), 1.6);
        assert_eq!(stop.cumulative_minutes(), 90.0);
        assert_eq!(stop.cumulative_hours(), 1.5);
    }

    #[test]
    fn test_empty_tour() {
        assert!(assemble(&sites(), &[], &matrix()).is_empty());
    }

    #[test]
    fn test_summary_average_segment() {
        let summary = RouteSummary::new(4, 1800, false);
        assert_eq!(summary.total_minutes, 30.0);
        assert_eq!(summary.avg_segment_minutes, 10.0);
        assert_eq!(summary.total_hours, 0.5);
    }

    #[test]
    fn test_csv_round_trip_of_sites_and_export() {
        let input = "site_id,label,latitude,longitude,headcount\ns1,Cabinet A,48.85,2.35,3\ns2,Cabinet B,48.86,2.36,1\n";
        let parsed = read_sites(input.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].headcount, 3);

        let m = TravelTimeMatrix::from_rows(vec![vec![0, 120], vec![130, 0]]);
        let stops = assemble(&parsed, &[0, 1], &m);
        let mut out = Vec::new();
        write_csv(&stops, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("visit_order,site_id,label,latitude,longitude,headcount,segment_s,segment_min,cumul_s,cumul_min,cumul_h")
        );
        assert_eq!(lines.next(), Some("1,s1,Cabinet A,48.85,2.35,3,0,0.0,0,0.0,0.0"));
        assert_eq!(lines.next(), Some("2,s2,Cabinet B,48.86,2.36,1,120,2.0,120,2.0,0.03"));
    }

    #[test]
    fn test_sites_without_headcount_column() {
        let input = "site_id,label,latitude,longitude\ns1,A,1.0,2.0\n";
        let parsed = read_sites(input.as_bytes()).unwrap();
        assert_eq!(parsed[0].headcount, 0);
    }
}
